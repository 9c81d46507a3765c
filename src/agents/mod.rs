//! The agent hierarchy.
//!
//! A [`Director`] routes each message to one or more [`DomainManager`]s,
//! which route in turn to their registered [`Specialist`]s. Every node owns
//! its own bounded [`crate::core::ConversationContext`]; the store, the
//! completion backend, the routing table and the prompts are shared through
//! [`Services`].

pub mod director;
pub mod domain;
pub mod equipment;
pub mod hierarchy;
pub mod insights;
pub mod nutrition;
pub mod prompt;
pub mod specialist;

pub use director::{Director, STRATEGY_TRIGGERS};
pub use domain::DomainManager;
pub use equipment::EquipmentSpecialist;
pub use hierarchy::build_director;
pub use insights::{DomainInsights, HealthInsights};
pub use nutrition::NutritionSpecialist;
pub use prompt::PromptSet;
pub use specialist::{APOLOGY, Specialist, SpecialistReply};

use crate::completion::SharedCompletion;
use crate::routing::RoutingTable;
use crate::storage::Store;
use serde::Serialize;
use std::sync::Arc;

/// Handles shared by every node.
#[derive(Clone)]
pub struct Services {
    /// Row store.
    pub store: Arc<dyn Store>,
    /// Language model.
    pub completion: SharedCompletion,
    /// Keyword rules.
    pub table: Arc<RoutingTable>,
    /// System prompts.
    pub prompts: Arc<PromptSet>,
}

impl Services {
    /// Bundles the shared handles.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        completion: SharedCompletion,
        table: Arc<RoutingTable>,
        prompts: PromptSet,
    ) -> Self {
        Self {
            store,
            completion,
            table,
            prompts: Arc::new(prompts),
        }
    }
}

/// Level of a node in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Top-level coordinator.
    Director,
    /// Domain manager.
    Domain,
    /// Leaf handler.
    Specialist,
}

/// Status of one node and everything below it.
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    /// Node label.
    pub name: String,
    /// Node level.
    pub tier: Tier,
    /// What the node does.
    pub description: String,
    /// Turns held in memory.
    pub memory_used: usize,
    /// Memory capacity in turns.
    pub memory_max: usize,
    /// Child nodes in routing order.
    pub children: Vec<NodeStatus>,
}

impl NodeStatus {
    /// Total number of nodes in this subtree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }
}

/// Upper-cases the first character of a label for display.
#[must_use]
pub fn display_name(label: &str) -> String {
    let mut chars = label.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{PromptSet, Services};
    use crate::completion::{ScriptedCompletion, SharedCompletion};
    use crate::routing::RoutingTable;
    use crate::storage::{SqliteStore, Store, seed_defaults};
    use std::sync::Arc;

    pub fn seeded_store() -> Arc<SqliteStore> {
        let store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        seed_defaults(&store, "health").unwrap();
        Arc::new(store)
    }

    pub fn fixture(
        store: &Arc<SqliteStore>,
        scripted: ScriptedCompletion,
    ) -> (Services, Arc<ScriptedCompletion>) {
        let scripted = Arc::new(scripted);
        let completion: SharedCompletion = scripted.clone();
        let store: Arc<dyn Store> = store.clone();
        let services = Services::new(
            store,
            completion,
            Arc::new(RoutingTable::default_table()),
            PromptSet::defaults(),
        );
        (services, scripted)
    }
}
