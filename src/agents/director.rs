//! The top-level coordinator.
//!
//! The director classifies each message over the domain rules and either
//! forwards it to one domain manager, fans it out to several, or answers
//! itself. Exactly one envelope comes back per message and the exchange is
//! recorded once in the director's memory.

use crate::agents::prompt::STRATEGY_QUERY;
use crate::agents::specialist::APOLOGY;
use crate::agents::{DomainManager, NodeStatus, Services, Tier, display_name};
use crate::completion::Prompt;
use crate::config::{FanOut, MemoryLimits};
use crate::core::envelope::flag;
use crate::core::message::now;
use crate::core::{ConversationContext, Message, Metadata, ResponseEnvelope, keys};
use crate::error::Result;
use crate::routing::{Granularity, RoutePlan, RoutingDecision, classify};
use rayon::prelude::*;
use serde_json::{Map, Value, json};
use std::fmt::Write;
use tracing::{debug, info, warn};

/// Words that add cross-domain context to a direct answer.
pub const STRATEGY_TRIGGERS: &[&str] = &[
    "strategy",
    "overview",
    "priorities",
    "plan",
    "coordinate",
    "integrate",
];

const DIRECTOR: &str = "director";
const EMPTY_REPLY: &str = "Please type a message so I know how to help.";

/// Coordinator over every domain manager.
pub struct Director {
    services: Services,
    domains: Vec<DomainManager>,
    context: ConversationContext,
    fan_out: FanOut,
}

impl Director {
    /// Creates a director with no domains.
    #[must_use]
    pub fn new(services: Services, memory: &MemoryLimits, fan_out: FanOut) -> Self {
        Self {
            services,
            domains: Vec::new(),
            context: ConversationContext::new(memory.director),
            fan_out,
        }
    }

    /// Registers a domain manager, replacing one with the same label.
    ///
    /// Managers are kept in declared priority order.
    #[must_use]
    pub fn with_domain(mut self, manager: DomainManager) -> Self {
        if !self.services.table.domains.contains(manager.label()) {
            warn!(domain = manager.label(), "domain has no routing rule");
        }
        self.domains.retain(|m| m.label() != manager.label());
        self.domains.push(manager);
        let table = self.services.table.clone();
        self.domains.sort_by_key(|m| table.domains.rank(m.label()));
        self
    }

    /// Registered domain labels, in priority order.
    #[must_use]
    pub fn domain_labels(&self) -> Vec<String> {
        self.domains.iter().map(|m| m.label().to_string()).collect()
    }

    /// A registered domain manager.
    #[must_use]
    pub fn domain(&self, label: &str) -> Option<&DomainManager> {
        self.domains.iter().find(|m| m.label() == label)
    }

    /// The director's own memory.
    #[must_use]
    pub const fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Classifies `text` over the domain rules, keeping only registered
    /// domains.
    ///
    /// When no keyword matches, a domain whose specialist is waiting on
    /// `text` as the answer to its question is chosen.
    #[must_use]
    pub fn classify(&self, text: &str) -> RoutingDecision {
        let mut decision = classify(text, &self.services.table.domains, Granularity::Domain);
        decision
            .targets
            .retain(|t| self.domains.iter().any(|m| m.label() == t));
        decision
            .scores
            .retain(|t, _| self.domains.iter().any(|m| m.label() == t));

        if decision.targets.is_empty()
            && let Some(manager) = self
                .domains
                .iter()
                .find(|m| m.follow_up_for(text).is_some())
        {
            debug!(domain = manager.label(), "routing follow-up answer");
            decision.targets.push(manager.label().to_string());
        }
        decision.is_multi_domain = decision.targets.len() >= 2;
        decision
    }

    /// Handles one message and returns the reply and its metadata.
    pub fn chat(&mut self, text: &str) -> (String, Metadata) {
        self.respond(text).into_parts()
    }

    /// Handles one message.
    ///
    /// Blank input gets a short prompt back without consulting any node.
    pub fn respond(&mut self, text: &str) -> ResponseEnvelope {
        let Ok(message) = Message::new(text) else {
            return ResponseEnvelope::new(EMPTY_REPLY)
                .with(keys::HANDLED_BY, DIRECTOR)
                .with(keys::ROUTED_TO, DIRECTOR)
                .with(keys::COORDINATION_TYPE, "direct");
        };

        let decision = self.classify(message.text());
        info!(
            targets = ?decision.targets,
            multi_domain = decision.is_multi_domain,
            "director routing decision"
        );

        let envelope = match decision.plan() {
            RoutePlan::Direct => self.answer_directly(&message),
            RoutePlan::Single(domain) => self.forward(&domain, &message),
            RoutePlan::Multi(domains) => self.handle_multi_domain_request(&message, &domains),
        };
        self.context.push_exchange(message.text(), &envelope.reply);
        envelope
    }

    /// Asks for a cross-domain strategic overview.
    pub fn strategy(&mut self) -> (String, Metadata) {
        self.chat(STRATEGY_QUERY)
    }

    fn forward(&mut self, domain: &str, message: &Message) -> ResponseEnvelope {
        let Some(manager) = self.domains.iter_mut().find(|m| m.label() == domain) else {
            return self.answer_directly(message);
        };
        let (reply, mut metadata) = manager.route(message).into_parts();

        let mut nested = match metadata.remove(keys::DOMAIN_METADATA) {
            Some(Value::Object(inner)) => inner,
            _ => Map::new(),
        };
        for key in [keys::ROUTED_TO, keys::HANDLED_BY] {
            if let Some(value) = metadata.get(key) {
                nested.insert(key.to_string(), value.clone());
            }
        }
        metadata
            .entry(keys::HANDLED_BY.to_string())
            .or_insert_with(|| Value::from(domain));
        metadata.insert(keys::ROUTED_TO.to_string(), Value::from(domain));
        metadata.insert(keys::COORDINATION_TYPE.to_string(), Value::from("single_domain"));
        metadata.insert(keys::DOMAIN_METADATA.to_string(), Value::Object(nested));

        ResponseEnvelope { reply, metadata }
    }

    /// Sends `message` to every listed domain and merges the replies.
    ///
    /// Domains are consulted and reported in priority order. Each domain
    /// records the exchange in its own memory.
    pub fn handle_multi_domain_request(
        &mut self,
        message: &Message,
        domains: &[String],
    ) -> ResponseEnvelope {
        let selected: Vec<&mut DomainManager> = self
            .domains
            .iter_mut()
            .filter(|m| domains.iter().any(|d| d == m.label()))
            .collect();

        let responses: Vec<(String, ResponseEnvelope)> = match self.fan_out {
            FanOut::Sequential => selected
                .into_iter()
                .map(|m| (m.label().to_string(), m.route(message)))
                .collect(),
            FanOut::Parallel => selected
                .into_par_iter()
                .map(|m| (m.label().to_string(), m.route(message)))
                .collect(),
        };

        let involved: Vec<String> = responses.iter().map(|(d, _)| d.clone()).collect();
        let failed = responses.iter().any(|(_, e)| flag(&e.metadata, keys::ERROR));
        let reply = merge_replies(&responses);
        let domain_responses: Vec<Value> = responses
            .into_iter()
            .map(|(domain, envelope)| {
                json!({
                    "domain": domain,
                    "reply": envelope.reply,
                    "metadata": envelope.metadata,
                })
            })
            .collect();

        let mut envelope = ResponseEnvelope::new(reply)
            .with(keys::HANDLED_BY, DIRECTOR)
            .with(keys::ROUTED_TO, DIRECTOR)
            .with(keys::COORDINATION_TYPE, "multi_domain")
            .with(keys::INVOLVED_DOMAINS, involved)
            .with(keys::DOMAIN_RESPONSES, domain_responses);
        if failed {
            envelope = envelope.with(keys::ERROR, true);
        }
        envelope
    }

    fn answer_directly(&self, message: &Message) -> ResponseEnvelope {
        let base = ResponseEnvelope::new(String::new())
            .with(keys::HANDLED_BY, DIRECTOR)
            .with(keys::ROUTED_TO, DIRECTOR)
            .with(keys::COORDINATION_TYPE, "direct");
        match self.try_answer(message) {
            Ok(reply) => ResponseEnvelope { reply, ..base },
            Err(e) => {
                warn!(error = %e, "director failed to answer");
                ResponseEnvelope {
                    reply: APOLOGY.to_string(),
                    ..base
                }
                .with(keys::ERROR, true)
            }
        }
    }

    fn try_answer(&self, message: &Message) -> Result<String> {
        let system = self.services.prompts.director_prompt(&self.domain_labels());
        let mut prompt = Prompt::new(system, message.text());

        let lowered = message.text().to_lowercase();
        if STRATEGY_TRIGGERS.iter().any(|w| lowered.contains(w)) {
            let insights = serde_json::to_string_pretty(&self.cross_domain_insights())
                .unwrap_or_else(|_| "{}".to_string());
            prompt = prompt.note(format!("Cross-domain context:\n{insights}"));
        }
        self.services
            .completion
            .complete(&prompt, &self.context.to_vec())
    }

    /// Per-domain insight snapshots plus the bridges between domains.
    #[must_use]
    pub fn cross_domain_insights(&self) -> Value {
        let statuses: Map<String, Value> = self
            .domains
            .iter()
            .map(|m| (m.label().to_string(), m.dashboard()))
            .collect();
        let opportunities: Vec<String> = self
            .services
            .table
            .domains
            .bridges
            .iter()
            .map(|b| format!("{} ({})", b.phrase, b.labels.join(" + ")))
            .collect();
        json!({
            "domain_statuses": statuses,
            "cross_domain_opportunities": opportunities,
        })
    }

    /// Name of the completion backend every node shares.
    #[must_use]
    pub fn completion_name(&self) -> &str {
        self.services.completion.name()
    }

    /// Executive dashboard across every domain.
    #[must_use]
    pub fn dashboard(&self) -> Value {
        let insights = self.cross_domain_insights();
        json!({
            "director_status": "active",
            "generated_at": now(),
            "completion": self.services.completion.name(),
            "domain_managers": insights["domain_statuses"],
            "cross_domain_opportunities": insights["cross_domain_opportunities"],
            "memory": {
                "used": self.context.len(),
                "max": self.context.max_length(),
            },
        })
    }

    /// Status of the whole hierarchy.
    #[must_use]
    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            name: DIRECTOR.to_string(),
            tier: Tier::Director,
            description: "Top-level coordinator".to_string(),
            memory_used: self.context.len(),
            memory_max: self.context.max_length(),
            children: self.domains.iter().map(DomainManager::status).collect(),
        }
    }

    /// Recent conversation and the active domains.
    #[must_use]
    pub fn conversation_summary(&self) -> String {
        let mut output = if self.context.is_empty() {
            "No recent conversations.\n".to_string()
        } else {
            format!("Recent conversation:\n{}", self.context.summary(8, 200))
        };
        let names: Vec<String> = self.domains.iter().map(|m| display_name(m.label())).collect();
        let _ = write!(output, "\nActive domain managers: {}", names.join(", "));
        output
    }

    /// Clears memory at every level.
    pub fn clear_memory(&mut self) {
        self.context.clear();
        for manager in &mut self.domains {
            manager.clear_memory();
        }
        info!("cleared conversation memory");
    }
}

/// Concatenates domain replies under one framing sentence.
fn merge_replies(responses: &[(String, ResponseEnvelope)]) -> String {
    let names: Vec<String> = responses.iter().map(|(d, _)| display_name(d)).collect();
    let mut output = format!(
        "This request touches {}. Here is what each area suggests:\n",
        join_names(&names)
    );
    for (domain, envelope) in responses {
        let _ = write!(output, "\n**{}**\n{}\n", display_name(domain), envelope.reply.trim());
    }
    output.trim_end().to_string()
}

fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}
