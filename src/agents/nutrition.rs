//! Nutrition specialist.
//!
//! Meal planning and recipe advice grounded in the user's goals, today's
//! food log and the cookbook. "I had ..." style messages are logged to the
//! food log through field extraction.

use crate::agents::Services;
use crate::agents::prompt::{format_goals, format_meals, format_recipes};
use crate::agents::specialist::{Specialist, SpecialistReply};
use crate::completion::{ExtractionSchema, FieldKind, FieldSpec, Prompt, extract_fields};
use crate::core::message::now;
use crate::core::{ConversationContext, Message, keys};
use crate::error::{Error, Result};
use crate::routing::{Granularity, INTENT_LOG, classify};
use crate::storage::{
    COOKBOOK, FOOD_LOG, Filter, GOALS, MEAL_TYPES, Record, record_i64, record_str,
};
use tracing::{debug, info};

const SECONDS_PER_DAY: i64 = 86_400;
const RECIPE_LIMIT: usize = 20;

const MEAL_SCHEMA: ExtractionSchema = ExtractionSchema {
    name: FOOD_LOG,
    fields: &[
        FieldSpec {
            name: "meal_details",
            kind: FieldKind::Text,
            required: true,
            description: "what was eaten, in a few words",
        },
        FieldSpec {
            name: "calories",
            kind: FieldKind::Integer,
            required: false,
            description: "calories, only if stated or clearly estimable",
        },
        FieldSpec {
            name: "protein",
            kind: FieldKind::Integer,
            required: false,
            description: "protein in grams",
        },
        FieldSpec {
            name: "carbs",
            kind: FieldKind::Integer,
            required: false,
            description: "carbohydrates in grams",
        },
        FieldSpec {
            name: "fats",
            kind: FieldKind::Integer,
            required: false,
            description: "fat in grams",
        },
    ],
};

/// Specialist for meals, recipes and the food log.
pub struct NutritionSpecialist {
    services: Services,
    area: String,
}

impl NutritionSpecialist {
    /// Label used in the routing table.
    pub const LABEL: &'static str = "nutrition";

    /// Creates the specialist reading goals for `area`.
    #[must_use]
    pub fn new(services: Services, area: impl Into<String>) -> Self {
        Self {
            services,
            area: area.into(),
        }
    }

    fn log_meal(&self, message: &Message, context: &ConversationContext) -> Result<SpecialistReply> {
        let fields = match extract_fields(
            self.services.completion.as_ref(),
            &self.services.prompts.extraction,
            message.text(),
            &MEAL_SCHEMA,
            &context.to_vec(),
        ) {
            Ok(fields) => fields,
            Err(Error::Validation(e)) => {
                debug!(error = %e, "could not extract meal");
                return Ok(SpecialistReply::clarify(
                    "What did you eat? Tell me the meal and I'll log it.",
                ));
            }
            Err(e) => return Err(e),
        };

        let meal = self.services.store.insert_one(FOOD_LOG, fields)?;
        let details = record_str(&meal, "meal_details").unwrap_or("meal");
        info!(meal = details, calories = ?record_i64(&meal, "calories"), "meal logged");

        let macros = macro_summary(&meal);
        let reply = if macros.is_empty() {
            format!("Logged {details}.")
        } else {
            format!("Logged {details} ({macros}).")
        };
        Ok(SpecialistReply::new(reply).flag(keys::MEAL_LOGGED, true))
    }

    fn gather_context(&self, text: &str) -> Result<Vec<String>> {
        let store = &self.services.store;
        let goals = store.get_all(GOALS, &Filter::new().eq("area", self.area.as_str()), None)?;
        let today = store.get_all(
            FOOD_LOG,
            &Filter::new().gte("meal_time", start_of_day(now())),
            None,
        )?;

        let lowered = text.to_lowercase();
        let meal_type = store
            .get_all(MEAL_TYPES, &Filter::new(), None)?
            .into_iter()
            .find(|t| record_str(t, "name").is_some_and(|name| lowered.contains(&name.to_lowercase())));
        let recipes = match meal_type.as_ref().and_then(|t| record_i64(t, "id")) {
            Some(id) => store.get_all(COOKBOOK, &Filter::new().eq("meal_type", id), Some(RECIPE_LIMIT))?,
            None => store.get_all(COOKBOOK, &Filter::new(), Some(RECIPE_LIMIT))?,
        };

        Ok(vec![
            format_goals(&goals),
            format_meals("Meals logged today", &today),
            format_recipes(&recipes),
        ])
    }
}

impl Specialist for NutritionSpecialist {
    fn label(&self) -> &str {
        Self::LABEL
    }

    fn description(&self) -> &'static str {
        "Plans meals, suggests recipes and keeps the food log"
    }

    fn write_flag(&self) -> Option<&'static str> {
        Some(keys::MEAL_LOGGED)
    }

    fn try_handle(
        &mut self,
        message: &Message,
        context: &ConversationContext,
    ) -> Result<SpecialistReply> {
        let text = message.text();
        let intents = classify(text, &self.services.table.intents, Granularity::Specialist);
        if intents.matched(INTENT_LOG) {
            return self.log_meal(message, context);
        }

        let prompt = self
            .gather_context(text)?
            .into_iter()
            .fold(Prompt::new(self.services.prompts.nutrition.as_str(), text), |p, n| {
                p.note(n)
            });
        let reply = self.services.completion.complete(&prompt, &context.to_vec())?;
        Ok(SpecialistReply::new(reply).flag(keys::MEAL_LOGGED, false))
    }
}

/// Midnight UTC of the day containing `timestamp`.
pub(crate) const fn start_of_day(timestamp: i64) -> i64 {
    timestamp - timestamp.rem_euclid(SECONDS_PER_DAY)
}

fn macro_summary(meal: &Record) -> String {
    [
        ("calories", " kcal"),
        ("protein", "g protein"),
        ("carbs", "g carbs"),
        ("fats", "g fat"),
    ]
    .iter()
    .filter_map(|(column, unit)| record_i64(meal, column).map(|v| format!("{v}{unit}")))
    .collect::<Vec<_>>()
    .join(", ")
}
