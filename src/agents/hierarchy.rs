//! Assembly of the standard hierarchy.

use crate::agents::{
    Director, DomainManager, EquipmentSpecialist, HealthInsights, NutritionSpecialist, Services,
};
use crate::config::Settings;
use tracing::debug;

/// Domain that owns the nutrition and equipment specialists.
pub const HEALTH_DOMAIN: &str = "health";

/// Builds a director with one manager per domain in the routing table.
///
/// The health manager gets the nutrition and equipment specialists and
/// weekly insights; other domains answer directly.
#[must_use]
pub fn build_director(services: Services, settings: &Settings) -> Director {
    let labels: Vec<String> = services.table.domains.names().map(str::to_string).collect();

    let mut director = Director::new(services.clone(), &settings.memory, settings.fan_out);
    for label in labels {
        let mut manager = DomainManager::new(label.as_str(), services.clone(), &settings.memory);
        if label == HEALTH_DOMAIN {
            manager = manager
                .with_specialist(Box::new(NutritionSpecialist::new(
                    services.clone(),
                    settings.area.as_str(),
                )))
                .with_specialist(Box::new(EquipmentSpecialist::new(
                    services.clone(),
                    settings.area.as_str(),
                )))
                .with_insights(Box::new(HealthInsights::new(settings.area.as_str())));
        }
        debug!(domain = %label, specialists = ?manager.specialist_labels(), "registered domain");
        director = director.with_domain(manager);
    }
    director
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{fixture, seeded_store};
    use crate::completion::ScriptedCompletion;
    use crate::routing::RoutingTable;
    use std::sync::Arc;

    #[test]
    fn test_every_table_domain_registered() {
        let store = seeded_store();
        let (services, _) = fixture(&store, ScriptedCompletion::new());
        let director = build_director(services, &Settings::default());
        assert_eq!(
            director.domain_labels(),
            vec!["health", "finance", "productivity", "learning"]
        );
        assert_eq!(
            director.domain("health").unwrap().specialist_labels(),
            vec!["nutrition", "equipment"]
        );
        assert!(director.domain("finance").unwrap().specialist_labels().is_empty());
    }

    #[test]
    fn test_custom_table_domains() {
        let store = seeded_store();
        let (mut services, _) = fixture(&store, ScriptedCompletion::new());
        let table = RoutingTable::from_json(
            r#"{"version": 1,
                "domains": {"labels": [
                    {"label": "finance", "keywords": ["budget"], "priority": 2},
                    {"label": "health", "keywords": ["meal"], "priority": 1}
                ], "bridges": []},
                "specialists": {},
                "intents": {"labels": [], "bridges": []}}"#,
        )
        .unwrap();
        services.table = Arc::new(table);

        let director = build_director(services, &Settings::default());
        assert_eq!(director.domain_labels(), vec!["health", "finance"]);
    }
}
