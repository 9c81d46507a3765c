//! Equipment specialist.
//!
//! Tracks fitness equipment by group (home gym, office, ...). Reads inform
//! the model's reply; an add request goes through field extraction and a
//! single validated insert. When the group cannot be resolved the item is
//! held and the user is asked where it goes; naming a group on the next
//! turn completes the write.

use crate::agents::Services;
use crate::agents::prompt::{format_groups, format_items};
use crate::agents::specialist::{Specialist, SpecialistReply};
use crate::completion::{ExtractionSchema, FieldKind, FieldSpec, Prompt, extract_fields};
use crate::core::{ConversationContext, Message, keys};
use crate::error::{Error, Result, StorageError};
use crate::routing::{Granularity, INTENT_ADD, INTENT_BROWSE, INTENT_LOCATE, classify};
use crate::storage::{EQUIPMENT_GROUPS, EQUIPMENT_ITEMS, Filter, Record, record_i64, record_str};
use std::collections::BTreeSet;
use tracing::{debug, info};

const ADD_ITEM_SCHEMA: ExtractionSchema = ExtractionSchema {
    name: EQUIPMENT_ITEMS,
    fields: &[
        FieldSpec {
            name: "item_name",
            kind: FieldKind::Text,
            required: true,
            description: "name of the piece of equipment",
        },
        FieldSpec {
            name: "item_description",
            kind: FieldKind::Text,
            required: false,
            description: "short description such as weight, size or brand",
        },
        FieldSpec {
            name: "equipment_group",
            kind: FieldKind::Text,
            required: false,
            description: "equipment group or location the message names, by name or ID",
        },
    ],
};

const ITEM_WORDS: &[&str] = &["equipment", "items", "gear"];

/// Specialist for equipment inventory.
pub struct EquipmentSpecialist {
    services: Services,
    area: String,
    pending: Option<Record>,
}

impl EquipmentSpecialist {
    /// Label used in the routing table.
    pub const LABEL: &'static str = "equipment";

    /// Creates the specialist for groups in `area`.
    #[must_use]
    pub fn new(services: Services, area: impl Into<String>) -> Self {
        Self {
            services,
            area: area.into(),
            pending: None,
        }
    }

    /// Whether an item is waiting for its group.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn groups(&self) -> Result<Vec<Record>> {
        self.services.store.get_all(
            EQUIPMENT_GROUPS,
            &Filter::new().eq("area", self.area.as_str()),
            None,
        )
    }

    fn add_item(
        &mut self,
        message: &Message,
        context: &ConversationContext,
        groups: &[Record],
    ) -> Result<SpecialistReply> {
        let system = format!(
            "{}\n\n{}",
            self.services.prompts.extraction,
            format_groups(groups)
        );
        let fields = match extract_fields(
            self.services.completion.as_ref(),
            &system,
            message.text(),
            &ADD_ITEM_SCHEMA,
            &context.to_vec(),
        ) {
            Ok(fields) => fields,
            Err(Error::Validation(e)) => {
                debug!(error = %e, "could not extract equipment item");
                return Ok(SpecialistReply::clarify(
                    "What's the name of the equipment you'd like to add?",
                ));
            }
            Err(e) => return Err(e),
        };

        let reference = record_str(&fields, "equipment_group");
        if let Some(group) = resolve_group(groups, reference, message.text()) {
            return self.insert_item(fields, group);
        }

        let item = record_str(&fields, "item_name").unwrap_or("item").to_string();
        if groups.is_empty() {
            return Ok(SpecialistReply::clarify(format!(
                "There are no equipment groups for {} yet, so I can't file the {item}. Run `director-rs init` to create the defaults.",
                self.area
            )));
        }
        self.pending = Some(fields);
        Ok(SpecialistReply::clarify(format!(
            "Which group should the {item} go in? Options: {}.",
            group_names(groups).join(", ")
        )))
    }

    fn insert_item(&mut self, mut fields: Record, group: &Record) -> Result<SpecialistReply> {
        self.pending = None;
        let group_id = record_i64(group, "id")
            .ok_or_else(|| StorageError::Database("equipment group without id".to_string()))?;
        let group_name = record_str(group, "group_name").unwrap_or("that group");
        fields.insert("equipment_group".to_string(), group_id.into());

        let item = self.services.store.insert_one(EQUIPMENT_ITEMS, fields)?;
        let name = record_str(&item, "item_name").unwrap_or("item");
        info!(item = name, group = group_name, "equipment added");

        let reply = match record_str(&item, "item_description") {
            Some(description) => format!("Added {name} ({description}) to {group_name}."),
            None => format!("Added {name} to {group_name}."),
        };
        Ok(SpecialistReply::new(reply).flag(keys::EQUIPMENT_ADDED, true))
    }

    fn gather_context(&self, text: &str, browse: bool, locate: bool, groups: &[Record]) -> Result<Vec<String>> {
        let lowered = text.to_lowercase();
        let wants_items = browse || ITEM_WORDS.iter().any(|w| lowered.contains(w));

        let mut notes = Vec::new();
        if locate || !wants_items {
            notes.push(format_groups(groups));
        }
        if wants_items {
            let store = &self.services.store;
            match named_in(groups, text) {
                Some(group) => {
                    let id = record_i64(group, "id").unwrap_or_default();
                    let items =
                        store.get_all(EQUIPMENT_ITEMS, &Filter::new().eq("equipment_group", id), None)?;
                    let heading = format!(
                        "Equipment in {}",
                        record_str(group, "group_name").unwrap_or("group")
                    );
                    notes.push(format_items(&heading, &items));
                }
                None => {
                    let ids: BTreeSet<i64> =
                        groups.iter().filter_map(|g| record_i64(g, "id")).collect();
                    let items: Vec<Record> = store
                        .get_all(EQUIPMENT_ITEMS, &Filter::new(), None)?
                        .into_iter()
                        .filter(|item| {
                            record_i64(item, "equipment_group").is_some_and(|g| ids.contains(&g))
                        })
                        .collect();
                    notes.push(format_items("All equipment", &items));
                }
            }
        }
        Ok(notes)
    }
}

impl Specialist for EquipmentSpecialist {
    fn label(&self) -> &str {
        Self::LABEL
    }

    fn description(&self) -> &'static str {
        "Tracks fitness equipment across groups and locations"
    }

    fn write_flag(&self) -> Option<&'static str> {
        Some(keys::EQUIPMENT_ADDED)
    }

    fn try_handle(
        &mut self,
        message: &Message,
        context: &ConversationContext,
    ) -> Result<SpecialistReply> {
        let text = message.text();
        let groups = self.groups()?;
        let intents = classify(text, &self.services.table.intents, Granularity::Specialist);

        if intents.matched(INTENT_ADD) {
            self.pending = None;
            return self.add_item(message, context, &groups);
        }
        if let Some(pending) = self.pending.take() {
            if let Some(group) = resolve_group(&groups, None, text) {
                return self.insert_item(pending, group);
            }
            debug!("dropping equipment item awaiting a group");
        }

        let notes = self.gather_context(
            text,
            intents.matched(INTENT_BROWSE),
            intents.matched(INTENT_LOCATE),
            &groups,
        )?;
        let prompt = notes
            .into_iter()
            .fold(Prompt::new(self.services.prompts.equipment.as_str(), text), |p, n| {
                p.note(n)
            });
        let reply = self.services.completion.complete(&prompt, &context.to_vec())?;
        Ok(SpecialistReply::new(reply).flag(keys::EQUIPMENT_ADDED, false))
    }

    fn reset(&mut self) {
        self.pending = None;
    }

    fn expects_follow_up(&self, text: &str) -> bool {
        self.pending.is_some()
            && self
                .groups()
                .is_ok_and(|groups| resolve_group(&groups, None, text).is_some())
    }
}

/// Finds the group a reference or message points at.
///
/// A numeric reference matches by id; otherwise the longest group name
/// contained in the reference, then in the message, wins.
fn resolve_group<'a>(groups: &'a [Record], reference: Option<&str>, text: &str) -> Option<&'a Record> {
    if let Some(id) = reference.and_then(|r| r.trim().parse::<i64>().ok())
        && let Some(group) = groups.iter().find(|g| record_i64(g, "id") == Some(id))
    {
        return Some(group);
    }
    reference
        .into_iter()
        .chain(std::iter::once(text))
        .find_map(|haystack| named_in(groups, haystack))
}

fn named_in<'a>(groups: &'a [Record], haystack: &str) -> Option<&'a Record> {
    let haystack = haystack.to_lowercase();
    groups
        .iter()
        .filter_map(|g| record_str(g, "group_name").map(|name| (g, name.to_lowercase())))
        .filter(|(_, name)| !name.is_empty() && haystack.contains(name.as_str()))
        .max_by_key(|(_, name)| name.len())
        .map(|(g, _)| g)
}

fn group_names(groups: &[Record]) -> Vec<&str> {
    groups
        .iter()
        .filter_map(|g| record_str(g, "group_name"))
        .collect()
}
