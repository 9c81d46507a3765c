//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::agents::{NodeStatus, display_name};
use crate::core::envelope::{flag, nested_flag};
use crate::core::{Metadata, keys, truncate_graphemes};
use crate::error::Error;
use crate::routing::{RoutingDecision, RoutingTable, RuleSet};
use crate::storage::{Record, StoreStats};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Routing of one message at both levels, for `classify`.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    /// Input text.
    pub text: String,
    /// Director-level decision.
    pub domains: RoutingDecision,
    /// Keywords that fired per domain.
    pub matched: BTreeMap<String, Vec<String>>,
    /// Specialist-level decision inside the primary domain, when routed to one.
    pub specialists: Option<RoutingDecision>,
    /// Intent labels that fired.
    pub intents: Vec<String>,
}

/// Bracketed routing summary for a reply, e.g. `[Routed to Health → Equipment]`.
#[must_use]
pub fn routing_label(metadata: &Metadata) -> String {
    let text = |key: &str| metadata.get(key).and_then(Value::as_str).unwrap_or_default();

    let mut label = match text(keys::COORDINATION_TYPE) {
        "single_domain" => {
            let domain = text(keys::ROUTED_TO);
            let handler = text(keys::HANDLED_BY);
            if handler.is_empty() || handler == domain {
                format!("[Routed to {}]", display_name(domain))
            } else {
                format!("[Routed to {} → {}]", display_name(domain), display_name(handler))
            }
        }
        "multi_domain" => {
            let domains: Vec<String> = metadata
                .get(keys::INVOLVED_DOMAINS)
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(display_name)
                        .collect()
                })
                .unwrap_or_default();
            format!("[Multi-domain: {}]", domains.join(", "))
        }
        _ => "[Director]".to_string(),
    };

    let markers = [
        (keys::EQUIPMENT_ADDED, "Equipment Added"),
        (keys::MEAL_LOGGED, "Meal Logged"),
        (keys::NEEDS_CLARIFICATION, "Needs Clarification"),
    ];
    for (key, marker) in markers {
        if nested_flag(metadata, key) {
            let _ = write!(label, " [{marker}]");
        }
    }
    if flag(metadata, keys::ERROR) {
        label.push_str(" [Error]");
    }
    label
}

/// Formats a chat reply.
#[must_use]
pub fn format_chat(reply: &str, metadata: &Metadata, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("{}\n{reply}\n", routing_label(metadata)),
        OutputFormat::Json => format_json(&json!({ "reply": reply, "metadata": metadata })),
    }
}

/// Formats store statistics and the hierarchy.
#[must_use]
pub fn format_status(
    stats: &StoreStats,
    hierarchy: &NodeStatus,
    completion: &str,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Text => format_status_text(stats, hierarchy, completion),
        OutputFormat::Json => format_json(&json!({
            "store": stats,
            "completion": completion,
            "hierarchy": hierarchy,
        })),
    }
}

fn format_status_text(stats: &StoreStats, hierarchy: &NodeStatus, completion: &str) -> String {
    let mut output = String::new();
    output.push_str("director-rs Status\n");
    output.push_str("==================\n\n");
    let _ = writeln!(output, "  Schema:        v{}", stats.schema_version);
    if let Some(size) = stats.db_size {
        let _ = writeln!(output, "  DB size:       {size} bytes");
    }
    let _ = writeln!(output, "  Completion:    {completion}");

    output.push_str("\nRows:\n");
    for (table, count) in &stats.row_counts {
        let _ = writeln!(output, "  {table:<18} {count}");
    }

    output.push_str("\nHierarchy:\n");
    write_node(&mut output, hierarchy, 1);
    output
}

/// Formats the hierarchy alone.
#[must_use]
pub fn format_hierarchy(hierarchy: &NodeStatus, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::from("Hierarchy:\n");
            write_node(&mut output, hierarchy, 1);
            output
        }
        OutputFormat::Json => format_json(hierarchy),
    }
}

fn write_node(output: &mut String, node: &NodeStatus, depth: usize) {
    let _ = write!(
        output,
        "{}{} (memory {}/{})",
        "  ".repeat(depth),
        node.name,
        node.memory_used,
        node.memory_max
    );
    if !node.description.is_empty() {
        let _ = write!(output, " - {}", node.description);
    }
    output.push('\n');
    for child in &node.children {
        write_node(output, child, depth + 1);
    }
}

/// Formats the executive dashboard.
#[must_use]
pub fn format_dashboard(dashboard: &Value, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_dashboard_text(dashboard),
        OutputFormat::Json => format_json(dashboard),
    }
}

fn format_dashboard_text(dashboard: &Value) -> String {
    let mut output = String::new();
    output.push_str("Executive Dashboard\n");
    output.push_str("===================\n");

    if let Some(domains) = dashboard["domain_managers"].as_object() {
        for (domain, section) in domains {
            let _ = writeln!(output, "\n{}", display_name(domain));
            let specialists: Vec<&str> = section["specialists"]
                .as_array()
                .map(|list| list.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            if !specialists.is_empty() {
                let _ = writeln!(output, "  Specialists:   {}", specialists.join(", "));
            }
            let _ = writeln!(
                output,
                "  Memory:        {} turns",
                section["memory_used"].as_u64().unwrap_or_default()
            );
            write_insights(&mut output, &section["insights"]);
        }
    }

    if let Some(opportunities) = dashboard["cross_domain_opportunities"].as_array()
        && !opportunities.is_empty()
    {
        output.push_str("\nCross-domain opportunities:\n");
        for item in opportunities.iter().filter_map(Value::as_str) {
            let _ = writeln!(output, "  - {item}");
        }
    }
    output
}

fn write_insights(output: &mut String, insights: &Value) {
    if let Some(error) = insights["error"].as_str() {
        let _ = writeln!(output, "  Insights:      unavailable ({error})");
        return;
    }
    let nutrition = &insights["nutrition"];
    if nutrition.is_object() {
        let days = insights["period_days"].as_i64().unwrap_or(7);
        let _ = writeln!(
            output,
            "  Last {days} days:   {} meals, {} kcal ({} per day)",
            nutrition["meals_logged"].as_u64().unwrap_or_default(),
            nutrition["calories"].as_i64().unwrap_or_default(),
            nutrition["daily_avg_calories"].as_i64().unwrap_or_default()
        );
    }
    if let Some(goals) = insights["goals"].as_array() {
        let _ = writeln!(output, "  Goals:         {}", goals.len());
        for goal in goals {
            if let Some(description) = goal["description"].as_str() {
                let _ = writeln!(output, "    - {}", truncate_graphemes(description, 60));
            }
        }
    }
}

/// Formats a routing classification.
#[must_use]
pub fn format_classification(classification: &Classification, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_classification_text(classification),
        OutputFormat::Json => format_json(classification),
    }
}

fn format_classification_text(c: &Classification) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Message: {}", truncate_graphemes(&c.text, 80));

    if c.domains.is_empty() {
        output.push_str("Domains: none (director answers directly)\n");
    } else {
        let kind = if c.domains.is_multi_domain {
            "multi-domain"
        } else {
            "single domain"
        };
        let _ = writeln!(output, "Domains ({kind}):");
        for target in &c.domains.targets {
            let score = c.domains.scores.get(target).copied().unwrap_or_default();
            let hits = c.matched.get(target).map(|h| h.join(", ")).unwrap_or_default();
            let _ = writeln!(output, "  {target:<14} score {score:<3} {hits}");
        }
    }

    if let Some(specialists) = &c.specialists {
        match specialists.primary() {
            Some(primary) => {
                let _ = writeln!(output, "Specialist: {primary}");
            }
            None => output.push_str("Specialist: none (domain answers directly)\n"),
        }
    }
    if !c.intents.is_empty() {
        let _ = writeln!(output, "Intents: {}", c.intents.join(", "));
    }
    output
}

/// Formats the routing table.
#[must_use]
pub fn format_routes(table: &RoutingTable, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = format!("Routing table v{}\n", table.version);
            write_rule_set(&mut output, "Domains", &table.domains);
            for (domain, rules) in &table.specialists {
                write_rule_set(&mut output, &format!("{} specialists", display_name(domain)), rules);
            }
            write_rule_set(&mut output, "Intents", &table.intents);
            output
        }
        OutputFormat::Json => table.to_json(),
    }
}

fn write_rule_set(output: &mut String, heading: &str, rules: &RuleSet) {
    let _ = writeln!(output, "\n{heading}:");
    for rule in &rules.labels {
        let _ = writeln!(
            output,
            "  {:<14} p{:<3} {}",
            rule.label,
            rule.priority,
            truncate_graphemes(&rule.keywords.join(", "), 60)
        );
    }
    for bridge in &rules.bridges {
        let _ = writeln!(output, "  \"{}\" → {}", bridge.phrase, bridge.labels.join(" + "));
    }
}

/// Formats rows of one table.
#[must_use]
pub fn format_rows(table: &str, rows: &[Record], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            if rows.is_empty() {
                return format!("No rows in {table}.\n");
            }
            let mut output = format!("{table} ({} rows):\n", rows.len());
            for row in rows {
                let fields: Vec<String> = row
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| match v {
                        Value::String(s) => format!("{k}={}", truncate_graphemes(s, 40)),
                        other => format!("{k}={other}"),
                    })
                    .collect();
                let _ = writeln!(output, "  {}", fields.join("  "));
            }
            output
        }
        OutputFormat::Json => format_json(&rows),
    }
}

/// Formats an error for display.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => format_json(&json!({
            "error": error.to_string(),
            "kind": error_kind(error),
        })),
    }
}

const fn error_kind(error: &Error) -> &'static str {
    match error {
        Error::Storage(_) => "storage",
        Error::Completion(_) => "completion",
        Error::Validation(_) => "validation",
        Error::Routing(_) => "routing",
        Error::Command(_) => "command",
        Error::InvalidState { .. } => "invalid_state",
        Error::Config { .. } => "config",
    }
}

/// Formats a value as JSON.
fn format_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}
