//! System prompts and template builders for every node.
//!
//! Prompts are compiled in and may be overridden file-by-file from a prompt
//! directory. Builders format store reads into context notes.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::storage::Record;

/// System prompt for the director.
pub const DIRECTOR_SYSTEM_PROMPT: &str = r"You are the Director, the top-level coordinator of a network of assistants that together help one person run their life.

You oversee these domain managers: {domains}.

Your responsibilities:
1. Route requests to the domain manager that owns them.
2. Coordinate requests that span several domains.
3. Set priorities and give high-level strategic guidance.
4. Connect insights across domains.

You are answering directly because no single domain owns this request. Give an executive-level answer that considers the whole picture. Be concise and concrete. When cross-domain context is provided, ground your answer in it.";

/// System prompt for the health domain manager.
pub const HEALTH_SYSTEM_PROMPT: &str = r"You are the Health Manager, responsible for the user's overall health and wellness.

Your specialists: {specialists}. They handle nutrition and equipment requests; you are answering because this request is about health in general.

Your responsibilities:
1. Help set, track, and achieve health goals.
2. Monitor progress across nutrition, fitness, and sleep.
3. Give holistic, sustainable lifestyle guidance.

Be supportive and data-driven. When a health summary is provided, use its numbers.";

/// System prompt template for domains without a dedicated prompt.
pub const DOMAIN_SYSTEM_PROMPT: &str = r"You are the {domain} manager in a network of personal assistants.

Your specialists: {specialists}.

Answer requests about {domain} directly with practical, specific guidance. Keep answers short and actionable.";

/// System prompt for the equipment specialist.
pub const EQUIPMENT_SYSTEM_PROMPT: &str = r"You are the Equipment Manager. You help the user keep track of fitness equipment across locations (home gym, office, commercial gym, outdoor).

You can see the user's equipment groups and the items in them in the context provided. Use it to answer questions about what equipment they have and where it is, and to suggest equipment for their goals.

Be practical and encouraging. Consider space, budget, and goals. Ask a clarifying question when the request is ambiguous.";

/// System prompt for the nutrition specialist.
pub const NUTRITION_SYSTEM_PROMPT: &str = r"You are the Personal Chef. You help the user plan meals, find recipes, and eat in line with their goals.

The context provided lists their goals, what they have eaten today, and recipes from their cookbook. Prefer recipes from the cookbook when they fit. Give calorie and macro estimates when suggesting meals.

Be warm and specific.";

/// System prompt for structured field extraction.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r"You extract structured fields from a single user message for a database write. Read only what the message states. Never invent values.";

/// Fixed query sent by the `strategy` command.
pub const STRATEGY_QUERY: &str = "Give me a strategic overview of my priorities across all domains and a plan to coordinate them this week.";

/// Default prompt directory relative to home.
const DEFAULT_PROMPT_DIR: &str = ".config/director-rs/prompts";

const DIRECTOR_FILENAME: &str = "director.md";
const HEALTH_FILENAME: &str = "health.md";
const DOMAIN_FILENAME: &str = "domain.md";
const EQUIPMENT_FILENAME: &str = "equipment.md";
const NUTRITION_FILENAME: &str = "nutrition.md";
const EXTRACTION_FILENAME: &str = "extraction.md";

/// Loaded system prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// Director prompt; `{domains}` is substituted.
    pub director: String,
    /// Health manager prompt; `{specialists}` is substituted.
    pub health: String,
    /// Generic domain prompt; `{domain}` and `{specialists}` are substituted.
    pub domain: String,
    /// Equipment specialist prompt.
    pub equipment: String,
    /// Nutrition specialist prompt.
    pub nutrition: String,
    /// Field extraction prompt.
    pub extraction: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Resolution order for `prompt_dir`:
    /// 1. Explicit `prompt_dir` argument (from `--prompt-dir` CLI flag)
    /// 2. `DIRECTOR_PROMPT_DIR` environment variable
    /// 3. `~/.config/director-rs/prompts/`
    ///
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir
            .map(PathBuf::from)
            .or_else(|| std::env::var("DIRECTOR_PROMPT_DIR").ok().map(PathBuf::from))
            .or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            director: load_file(DIRECTOR_FILENAME, DIRECTOR_SYSTEM_PROMPT),
            health: load_file(HEALTH_FILENAME, HEALTH_SYSTEM_PROMPT),
            domain: load_file(DOMAIN_FILENAME, DOMAIN_SYSTEM_PROMPT),
            equipment: load_file(EQUIPMENT_FILENAME, EQUIPMENT_SYSTEM_PROMPT),
            nutrition: load_file(NUTRITION_FILENAME, NUTRITION_SYSTEM_PROMPT),
            extraction: load_file(EXTRACTION_FILENAME, EXTRACTION_SYSTEM_PROMPT),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            director: DIRECTOR_SYSTEM_PROMPT.to_string(),
            health: HEALTH_SYSTEM_PROMPT.to_string(),
            domain: DOMAIN_SYSTEM_PROMPT.to_string(),
            equipment: EQUIPMENT_SYSTEM_PROMPT.to_string(),
            nutrition: NUTRITION_SYSTEM_PROMPT.to_string(),
            extraction: EXTRACTION_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (DIRECTOR_FILENAME, DIRECTOR_SYSTEM_PROMPT),
            (HEALTH_FILENAME, HEALTH_SYSTEM_PROMPT),
            (DOMAIN_FILENAME, DOMAIN_SYSTEM_PROMPT),
            (EQUIPMENT_FILENAME, EQUIPMENT_SYSTEM_PROMPT),
            (NUTRITION_FILENAME, NUTRITION_SYSTEM_PROMPT),
            (EXTRACTION_FILENAME, EXTRACTION_SYSTEM_PROMPT),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    ///
    /// Returns `None` if the home directory cannot be determined.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }

    /// Director prompt with the domain roster filled in.
    #[must_use]
    pub fn director_prompt(&self, domains: &[String]) -> String {
        self.director.replace("{domains}", &roster(domains))
    }

    /// Prompt for a domain manager.
    #[must_use]
    pub fn domain_prompt(&self, domain: &str, specialists: &[String]) -> String {
        let template = if domain == "health" {
            &self.health
        } else {
            &self.domain
        };
        template
            .replace("{domain}", domain)
            .replace("{specialists}", &roster(specialists))
    }
}

fn roster(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

fn text<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn number(record: &Record, key: &str) -> Option<i64> {
    record.get(key).and_then(Value::as_i64)
}

/// Formats equipment groups as a context note.
#[must_use]
pub fn format_groups(groups: &[Record]) -> String {
    if groups.is_empty() {
        return "No equipment groups found.".to_string();
    }
    let mut output = String::from("Available Equipment Groups:\n");
    for group in groups {
        let _ = writeln!(
            output,
            "- {} (ID: {})",
            text(group, "group_name").unwrap_or("Unknown"),
            number(group, "id").unwrap_or_default()
        );
        if let Some(description) = text(group, "description") {
            let _ = writeln!(output, "  Description: {description}");
        }
    }
    output
}

/// Formats equipment items as a context note.
#[must_use]
pub fn format_items(heading: &str, items: &[Record]) -> String {
    let mut output = format!("{heading} ({}):\n", items.len());
    if items.is_empty() {
        output.push_str("No equipment items yet.\n");
    }
    for item in items {
        let _ = writeln!(output, "- {}", text(item, "item_name").unwrap_or("Unknown"));
        if let Some(description) = text(item, "item_description") {
            let _ = writeln!(output, "  Description: {description}");
        }
    }
    output
}

/// Formats goals as a context note.
#[must_use]
pub fn format_goals(goals: &[Record]) -> String {
    if goals.is_empty() {
        return "No goals recorded.".to_string();
    }
    let mut output = String::from("Goals:\n");
    for goal in goals {
        let _ = write!(output, "- {}", text(goal, "description").unwrap_or("Goal"));
        if let Some(status) = text(goal, "status") {
            let _ = write!(output, " [{status}]");
        }
        output.push('\n');
    }
    output
}

/// Formats food log rows as a context note.
#[must_use]
pub fn format_meals(heading: &str, meals: &[Record]) -> String {
    if meals.is_empty() {
        return format!("{heading}: nothing logged.");
    }
    let mut output = format!("{heading}:\n");
    for meal in meals {
        let _ = write!(output, "- {}", text(meal, "meal_details").unwrap_or("Meal"));
        if let Some(calories) = number(meal, "calories") {
            let _ = write!(output, " ({calories} kcal)");
        }
        output.push('\n');
    }
    output
}

/// Formats cookbook recipes as a context note.
#[must_use]
pub fn format_recipes(recipes: &[Record]) -> String {
    if recipes.is_empty() {
        return "Cookbook is empty.".to_string();
    }
    let mut output = String::from("Cookbook:\n");
    for recipe in recipes {
        let _ = write!(output, "- {}", text(recipe, "recipe_name").unwrap_or("Recipe"));
        if let Some(calories) = number(recipe, "calories") {
            let _ = write!(output, " ({calories} kcal)");
        }
        output.push('\n');
        if let Some(ingredients) = text(recipe, "ingredients") {
            let _ = writeln!(output, "  Ingredients: {ingredients}");
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: &Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults_match_constants() {
        let prompts = PromptSet::defaults();
        assert_eq!(prompts.director, DIRECTOR_SYSTEM_PROMPT);
        assert_eq!(prompts.extraction, EXTRACTION_SYSTEM_PROMPT);
    }

    #[test]
    fn test_load_overrides_single_file() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(EQUIPMENT_FILENAME), "custom equipment").unwrap();

        let prompts = PromptSet::load(Some(dir.path()));
        assert_eq!(prompts.equipment, "custom equipment");
        assert_eq!(prompts.nutrition, NUTRITION_SYSTEM_PROMPT);
    }

    #[test]
    fn test_write_defaults_skips_existing() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(DIRECTOR_FILENAME), "keep me").unwrap();

        let written = PromptSet::write_defaults(dir.path()).unwrap();
        assert_eq!(written.len(), 5);
        let kept = std::fs::read_to_string(dir.path().join(DIRECTOR_FILENAME)).unwrap();
        assert_eq!(kept, "keep me");
    }

    #[test]
    fn test_domain_prompt_substitution() {
        let prompts = PromptSet::defaults();
        let finance = prompts.domain_prompt("finance", &[]);
        assert!(finance.contains("You are the finance manager"));
        assert!(finance.contains("Your specialists: none."));

        let health = prompts.domain_prompt(
            "health",
            &["nutrition".to_string(), "equipment".to_string()],
        );
        assert!(health.contains("nutrition, equipment"));
    }

    #[test]
    fn test_format_groups() {
        let groups = vec![record(&json!({
            "id": 1, "group_name": "Home Gym", "description": "Garage"
        }))];
        let note = format_groups(&groups);
        assert!(note.contains("- Home Gym (ID: 1)"));
        assert!(note.contains("Description: Garage"));
        assert_eq!(format_groups(&[]), "No equipment groups found.");
    }

    #[test]
    fn test_format_meals_and_recipes() {
        let meals = vec![record(&json!({ "meal_details": "Oats", "calories": 350 }))];
        assert!(format_meals("Today", &meals).contains("- Oats (350 kcal)"));
        assert_eq!(format_meals("Today", &[]), "Today: nothing logged.");

        let recipes = vec![record(&json!({ "recipe_name": "Chili", "ingredients": "beans" }))];
        assert!(format_recipes(&recipes).contains("Ingredients: beans"));
    }
}
