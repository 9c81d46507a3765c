//! Message routing.
//!
//! A single [`RoutingTable`] carries every rule set; [`classify`] scores a
//! message against one of them.

pub mod classifier;
pub mod table;

pub use classifier::{Granularity, RoutePlan, RoutingDecision, classify, matched_keywords};
pub use table::{
    BridgeRule, INTENT_ADD, INTENT_BROWSE, INTENT_LOCATE, INTENT_LOG, LabelRule,
    ROUTING_TABLE_VERSION, RoutingTable, RuleSet,
};
