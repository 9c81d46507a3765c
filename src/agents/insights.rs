//! Domain insights.
//!
//! Store-backed summaries a domain manager adds to its own replies and to
//! the dashboard.

use crate::agents::nutrition::start_of_day;
use crate::agents::prompt::format_goals;
use crate::core::message::now;
use crate::error::Result;
use crate::storage::{FOOD_LOG, Filter, GOALS, Record, Store, record_i64};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt::Write;

/// Words that make a manager include its insights.
pub const INSIGHT_TRIGGERS: &[&str] = &["progress", "analysis", "goals", "overview", "summary"];

const WINDOW_DAYS: i64 = 7;

/// Trait for per-domain summaries.
pub trait DomainInsights: Send + Sync {
    /// Whether `text` asks for an overview.
    fn triggered(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        INSIGHT_TRIGGERS.iter().any(|t| lowered.contains(t))
    }

    /// Text summary used as completion context.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn summary(&self, store: &dyn Store) -> Result<String>;

    /// Structured snapshot for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn snapshot(&self, store: &dyn Store) -> Result<Value>;
}

/// Nutrition totals over a window of days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NutritionTotals {
    /// Total calories.
    pub calories: i64,
    /// Protein in grams.
    pub protein: i64,
    /// Carbohydrates in grams.
    pub carbs: i64,
    /// Fat in grams.
    pub fats: i64,
    /// Meals logged.
    pub meals_logged: usize,
    /// Calories divided by the window length.
    pub daily_avg_calories: i64,
}

impl NutritionTotals {
    /// Sums food log rows; missing values count as zero and totals saturate.
    #[must_use]
    pub fn from_meals(meals: &[Record], days: i64) -> Self {
        let sum = |column: &str| -> i64 {
            meals
                .iter()
                .filter_map(|m| record_i64(m, column))
                .fold(0, i64::saturating_add)
        };
        let calories = sum("calories");
        Self {
            calories,
            protein: sum("protein"),
            carbs: sum("carbs"),
            fats: sum("fats"),
            meals_logged: meals.len(),
            daily_avg_calories: if days > 0 { calories / days } else { calories },
        }
    }
}

/// Weekly nutrition and goals for the health domain.
#[derive(Debug, Clone)]
pub struct HealthInsights {
    area: String,
}

impl HealthInsights {
    /// Insights for goals in `area`.
    #[must_use]
    pub fn new(area: impl Into<String>) -> Self {
        Self { area: area.into() }
    }

    /// Totals for the last seven days, counted from midnight UTC.
    ///
    /// # Errors
    ///
    /// Returns an error if the food log cannot be read.
    pub fn weekly_totals(&self, store: &dyn Store) -> Result<NutritionTotals> {
        let since = start_of_day(now()) - (WINDOW_DAYS - 1) * 86_400;
        let meals = store.get_all(FOOD_LOG, &Filter::new().gte("meal_time", since), None)?;
        Ok(NutritionTotals::from_meals(&meals, WINDOW_DAYS))
    }

    fn goals(&self, store: &dyn Store) -> Result<Vec<Record>> {
        store.get_all(GOALS, &Filter::new().eq("area", self.area.as_str()), None)
    }
}

impl DomainInsights for HealthInsights {
    fn summary(&self, store: &dyn Store) -> Result<String> {
        let totals = self.weekly_totals(store)?;
        let mut output = format!("Health progress (last {WINDOW_DAYS} days):\n");
        let _ = writeln!(output, "- Meals logged: {}", totals.meals_logged);
        let _ = writeln!(
            output,
            "- Calories: {} total, {} per day",
            totals.calories, totals.daily_avg_calories
        );
        let _ = writeln!(
            output,
            "- Protein {}g, carbs {}g, fat {}g",
            totals.protein, totals.carbs, totals.fats
        );
        output.push_str(&format_goals(&self.goals(store)?));
        Ok(output)
    }

    fn snapshot(&self, store: &dyn Store) -> Result<Value> {
        let goals = self.goals(store)?;
        Ok(json!({
            "period_days": WINDOW_DAYS,
            "nutrition": self.weekly_totals(store)?,
            "active_goals": goals.len(),
            "goals": goals,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;

    fn record(value: &Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.init().unwrap();
        store
    }

    #[test]
    fn test_totals_skip_missing_values() {
        let meals = vec![
            record(&json!({"calories": 700, "protein": 30})),
            record(&json!({"calories": 700, "fats": 20})),
            record(&json!({"meal_details": "tea"})),
        ];
        let totals = NutritionTotals::from_meals(&meals, 7);
        assert_eq!(totals.calories, 1400);
        assert_eq!(totals.protein, 30);
        assert_eq!(totals.fats, 20);
        assert_eq!(totals.meals_logged, 3);
        assert_eq!(totals.daily_avg_calories, 200);
    }

    #[test]
    fn test_totals_saturate_on_huge_values() {
        let meals = vec![
            record(&json!({"calories": i64::MAX, "fats": i64::MIN})),
            record(&json!({"calories": i64::MAX, "fats": i64::MIN})),
        ];
        let totals = NutritionTotals::from_meals(&meals, 7);
        assert_eq!(totals.calories, i64::MAX);
        assert_eq!(totals.fats, i64::MIN);
        assert_eq!(totals.daily_avg_calories, i64::MAX / 7);
    }

    #[test]
    fn test_triggered() {
        let insights = HealthInsights::new("health");
        assert!(insights.triggered("How is my PROGRESS?"));
        assert!(!insights.triggered("What's for dinner?"));
    }

    #[test]
    fn test_snapshot_counts_recent_meals_only() {
        let store = store();
        store
            .insert_one(FOOD_LOG, record(&json!({"meal_details": "Eggs", "calories": 300})))
            .unwrap();
        store
            .insert_one(
                FOOD_LOG,
                record(&json!({"meal_details": "Old pizza", "calories": 900, "meal_time": 1000})),
            )
            .unwrap();
        store
            .insert_one(GOALS, record(&json!({"description": "Run 5k", "area": "health"})))
            .unwrap();
        store
            .insert_one(GOALS, record(&json!({"description": "Save more", "area": "finance"})))
            .unwrap();

        let snapshot = HealthInsights::new("health").snapshot(&store).unwrap();
        assert_eq!(snapshot["nutrition"]["calories"], 300);
        assert_eq!(snapshot["nutrition"]["meals_logged"], 1);
        assert_eq!(snapshot["active_goals"], 1);
        assert_eq!(snapshot["goals"][0]["description"], "Run 5k");
    }

    #[test]
    fn test_summary_mentions_goals() {
        let store = store();
        store
            .insert_one(GOALS, record(&json!({"description": "Sleep 8h", "area": "health"})))
            .unwrap();
        let summary = HealthInsights::new("health").summary(&store).unwrap();
        assert!(summary.starts_with("Health progress (last 7 days):"));
        assert!(summary.contains("- Meals logged: 0"));
        assert!(summary.contains("- Sleep 8h"));
    }
}
