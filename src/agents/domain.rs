//! Domain managers.
//!
//! A manager owns the specialists registered under one domain. It forwards
//! a message to the best-matching registered specialist, or answers itself
//! when none matches. Either way it records the exchange in its own memory.

use crate::agents::insights::DomainInsights;
use crate::agents::specialist::{APOLOGY, Specialist};
use crate::agents::{NodeStatus, Services, Tier, display_name};
use crate::completion::Prompt;
use crate::config::MemoryLimits;
use crate::core::{ConversationContext, Message, ResponseEnvelope, keys};
use crate::error::Result;
use crate::routing::{Granularity, RoutingDecision, classify};
use serde_json::{Value, json};
use tracing::{debug, warn};

struct SpecialistSlot {
    specialist: Box<dyn Specialist>,
    context: ConversationContext,
}

/// Middle tier of the hierarchy.
pub struct DomainManager {
    label: String,
    services: Services,
    specialists: Vec<SpecialistSlot>,
    insights: Option<Box<dyn DomainInsights>>,
    context: ConversationContext,
    specialist_memory: usize,
}

impl DomainManager {
    /// Creates a manager with no specialists.
    #[must_use]
    pub fn new(label: impl Into<String>, services: Services, memory: &MemoryLimits) -> Self {
        Self {
            label: label.into(),
            services,
            specialists: Vec::new(),
            insights: None,
            context: ConversationContext::new(memory.domain),
            specialist_memory: memory.specialist,
        }
    }

    /// Registers a specialist.
    ///
    /// A specialist whose label has no rule in the routing table can never
    /// be selected.
    #[must_use]
    pub fn with_specialist(mut self, specialist: Box<dyn Specialist>) -> Self {
        let routable = self
            .services
            .table
            .specialists_for(&self.label)
            .is_some_and(|rules| rules.contains(specialist.label()));
        if !routable {
            warn!(
                domain = %self.label,
                specialist = specialist.label(),
                "specialist has no routing rule"
            );
        }
        self.specialists.push(SpecialistSlot {
            specialist,
            context: ConversationContext::new(self.specialist_memory),
        });
        self
    }

    /// Attaches store-backed insights.
    #[must_use]
    pub fn with_insights(mut self, insights: Box<dyn DomainInsights>) -> Self {
        self.insights = Some(insights);
        self
    }

    /// Domain label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The manager's own memory.
    #[must_use]
    pub const fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Memory of a registered specialist.
    #[must_use]
    pub fn specialist_context(&self, label: &str) -> Option<&ConversationContext> {
        self.slot(label).map(|i| &self.specialists[i].context)
    }

    /// Labels of registered specialists, in registration order.
    #[must_use]
    pub fn specialist_labels(&self) -> Vec<String> {
        self.specialists
            .iter()
            .map(|s| s.specialist.label().to_string())
            .collect()
    }

    fn slot(&self, label: &str) -> Option<usize> {
        self.specialists
            .iter()
            .position(|s| s.specialist.label() == label)
    }

    /// Classifies `text` over this domain's specialist rules, keeping only
    /// registered specialists.
    ///
    /// When no keyword matches, a specialist waiting on `text` as the answer
    /// to its question is chosen.
    #[must_use]
    pub fn classify(&self, text: &str) -> RoutingDecision {
        let mut decision = self
            .services
            .table
            .specialists_for(&self.label)
            .map(|rules| classify(text, rules, Granularity::Specialist))
            .unwrap_or_default();
        decision.targets.retain(|t| self.slot(t).is_some());
        decision.scores.retain(|t, _| self.slot(t).is_some());

        if decision.targets.is_empty()
            && let Some(label) = self.follow_up_for(text)
        {
            debug!(domain = %self.label, specialist = label, "routing follow-up answer");
            decision.targets.push(label.to_string());
        }
        decision
    }

    /// Label of a specialist waiting on `text` as the answer to its question.
    #[must_use]
    pub fn follow_up_for(&self, text: &str) -> Option<&str> {
        self.specialists
            .iter()
            .find(|s| s.specialist.expects_follow_up(text))
            .map(|s| s.specialist.label())
    }

    /// Handles one message and records the exchange.
    ///
    /// Forwarded replies carry `handled_by` and `routed_to` naming the
    /// specialist, plus its flags under `domain_metadata`. Direct replies
    /// name this domain.
    pub fn route(&mut self, message: &Message) -> ResponseEnvelope {
        let decision = self.classify(message.text());
        debug!(domain = %self.label, targets = ?decision.targets, "domain routing decision");

        let envelope = match decision.primary().and_then(|t| self.slot(t)) {
            Some(index) => self.forward(index, message),
            None => self.answer_directly(message),
        };
        self.context.push_exchange(message.text(), &envelope.reply);
        envelope
    }

    fn forward(&mut self, index: usize, message: &Message) -> ResponseEnvelope {
        let slot = &mut self.specialists[index];
        let reply = slot.specialist.handle(message, &slot.context);
        slot.context.push_exchange(message.text(), &reply.reply);

        let label = slot.specialist.label().to_string();
        let failed = reply.flags.get(keys::ERROR).and_then(Value::as_bool) == Some(true);
        let mut envelope = ResponseEnvelope::new(reply.reply)
            .with(keys::HANDLED_BY, label.as_str())
            .with(keys::ROUTED_TO, label.as_str())
            .with(keys::DOMAIN, self.label.as_str())
            .with(keys::DOMAIN_METADATA, Value::Object(reply.flags));
        if failed {
            envelope = envelope.with(keys::ERROR, true);
        }
        envelope
    }

    fn answer_directly(&self, message: &Message) -> ResponseEnvelope {
        let base = ResponseEnvelope::new(String::new())
            .with(keys::HANDLED_BY, self.label.as_str())
            .with(keys::ROUTED_TO, self.label.as_str())
            .with(keys::DOMAIN, self.label.as_str());
        match self.try_answer(message) {
            Ok(reply) => ResponseEnvelope { reply, ..base },
            Err(e) => {
                warn!(domain = %self.label, error = %e, "domain manager failed");
                ResponseEnvelope {
                    reply: APOLOGY.to_string(),
                    ..base
                }
                .with(keys::ERROR, true)
            }
        }
    }

    fn try_answer(&self, message: &Message) -> Result<String> {
        let system = self
            .services
            .prompts
            .domain_prompt(&self.label, &self.specialist_labels());
        let mut prompt = Prompt::new(system, message.text());
        if let Some(insights) = &self.insights
            && insights.triggered(message.text())
        {
            prompt = prompt.note(insights.summary(self.services.store.as_ref())?);
        }
        self.services
            .completion
            .complete(&prompt, &self.context.to_vec())
    }

    /// Clears this manager's memory and every specialist's.
    pub fn clear_memory(&mut self) {
        self.context.clear();
        for slot in &mut self.specialists {
            slot.context.clear();
            slot.specialist.reset();
        }
    }

    /// Status of this manager and its specialists.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            name: self.label.clone(),
            tier: Tier::Domain,
            description: format!("{} manager", display_name(&self.label)),
            memory_used: self.context.len(),
            memory_max: self.context.max_length(),
            children: self
                .specialists
                .iter()
                .map(|slot| NodeStatus {
                    name: slot.specialist.label().to_string(),
                    tier: Tier::Specialist,
                    description: slot.specialist.description().to_string(),
                    memory_used: slot.context.len(),
                    memory_max: slot.context.max_length(),
                    children: Vec::new(),
                })
                .collect(),
        }
    }

    /// Dashboard section for this domain.
    #[must_use]
    pub fn dashboard(&self) -> Value {
        let insights = self.insights.as_ref().map(|i| {
            i.snapshot(self.services.store.as_ref())
                .unwrap_or_else(|e| json!({ "error": e.to_string() }))
        });
        json!({
            "status": "active",
            "specialists": self.specialist_labels(),
            "memory_used": self.context.len(),
            "recent_conversation": self.context.summary(6, 150),
            "insights": insights,
        })
    }

    /// Last few exchanges as text.
    #[must_use]
    pub fn conversation_summary(&self) -> String {
        if self.context.is_empty() {
            format!("No recent {} conversations.", self.label)
        } else {
            self.context.summary(6, 150)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{fixture, seeded_store};
    use crate::agents::{EquipmentSpecialist, HealthInsights, NutritionSpecialist};
    use crate::completion::ScriptedCompletion;
    use crate::core::envelope::{flag, nested_flag};
    use crate::error::CompletionError;

    fn message(text: &str) -> Message {
        Message::new(text).unwrap()
    }

    fn health(services: &Services) -> DomainManager {
        DomainManager::new("health", services.clone(), &MemoryLimits::default())
            .with_specialist(Box::new(NutritionSpecialist::new(services.clone(), "health")))
            .with_specialist(Box::new(EquipmentSpecialist::new(services.clone(), "health")))
            .with_insights(Box::new(HealthInsights::new("health")))
    }

    #[test]
    fn test_forward_to_specialist() {
        let store = seeded_store();
        let (services, _) = fixture(&store, ScriptedCompletion::new().with_default("Try soup."));
        let mut manager = health(&services);

        let envelope = manager.route(&message("Suggest a recipe for dinner"));
        assert_eq!(envelope.reply, "Try soup.");
        assert_eq!(envelope.get_str(keys::HANDLED_BY), Some("nutrition"));
        assert_eq!(envelope.get_str(keys::ROUTED_TO), Some("nutrition"));
        assert_eq!(envelope.get_str(keys::DOMAIN), Some("health"));
        assert!(!nested_flag(&envelope.metadata, keys::MEAL_LOGGED));
        assert!(envelope.metadata[keys::DOMAIN_METADATA].get(keys::MEAL_LOGGED).is_some());

        assert_eq!(manager.context().len(), 2);
        assert_eq!(manager.specialist_context("nutrition").unwrap().len(), 2);
        assert_eq!(manager.specialist_context("equipment").unwrap().len(), 0);
    }

    #[test]
    fn test_direct_answer_with_insights() {
        let store = seeded_store();
        let (services, scripted) =
            fixture(&store, ScriptedCompletion::new().with_default("You're doing well."));
        let mut manager = health(&services);

        let envelope = manager.route(&message("How is my wellness progress?"));
        assert_eq!(envelope.get_str(keys::HANDLED_BY), Some("health"));
        assert_eq!(envelope.get_str(keys::ROUTED_TO), Some("health"));

        let prompt = &scripted.prompts()[0];
        assert!(prompt.system.contains("nutrition, equipment"));
        assert!(prompt.notes[0].starts_with("Health progress"));
    }

    #[test]
    fn test_unregistered_specialist_not_routable() {
        let store = seeded_store();
        let (services, scripted) = fixture(&store, ScriptedCompletion::new().with_default("ok"));
        let mut manager = DomainManager::new("health", services.clone(), &MemoryLimits::default())
            .with_specialist(Box::new(EquipmentSpecialist::new(services, "health")));

        let envelope = manager.route(&message("Suggest a recipe"));
        assert_eq!(envelope.get_str(keys::HANDLED_BY), Some("health"));
        assert_eq!(scripted.calls(), 1);
    }

    #[test]
    fn test_direct_failure_is_apology() {
        let store = seeded_store();
        let scripted = ScriptedCompletion::new();
        scripted.push_error(CompletionError::Timeout { seconds: 1 });
        let (services, _) = fixture(&store, scripted);
        let mut manager = health(&services);

        let envelope = manager.route(&message("Any thoughts on my wellness?"));
        assert_eq!(envelope.reply, APOLOGY);
        assert!(flag(&envelope.metadata, keys::ERROR));
        assert_eq!(manager.context().len(), 2);
    }

    #[test]
    fn test_clear_memory_cascades() {
        let store = seeded_store();
        let (services, _) = fixture(&store, ScriptedCompletion::new().with_default("ok"));
        let mut manager = health(&services);
        manager.route(&message("Suggest a recipe"));
        manager.clear_memory();

        let status = manager.status();
        assert_eq!(status.memory_used, 0);
        assert!(status.children.iter().all(|c| c.memory_used == 0));
        assert_eq!(status.children.len(), 2);
    }
}
