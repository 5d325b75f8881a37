#![allow(clippy::needless_pass_by_value)]

use schemars::schema_for;
use serde::Serialize;
use serde_json::Value;

use super::foreign::ForeignInfo;
use super::{CommandCategory, CommandInfo};
use crate::state::AppState;

/// A registry entry: metadata + JSON schema for the params.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRegistryEntry {
    #[serde(rename = "type")]
    pub name: &'static str,
    pub description: &'static str,
    pub category: CommandCategory,
    pub mutating: bool,
    pub opens_view: bool,
    pub param_schema: Value,
}

pub(super) fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

pub(super) fn schema_value<T: schemars::JsonSchema>() -> Value {
    let root = schema_for!(T);
    serde_json::to_value(root).unwrap_or(empty_object_schema())
}

pub(super) fn entry(info: CommandInfo, param_schema: Value) -> CommandRegistryEntry {
    CommandRegistryEntry {
        name: info.name,
        description: info.description,
        category: info.category,
        mutating: info.mutating,
        opens_view: info.opens_view,
        param_schema,
    }
}

pub(super) fn de<T: serde::de::DeserializeOwned>(input: &Value) -> Result<T, String> {
    serde_json::from_value(input.clone()).map_err(|e| e.to_string())
}

/// Every built-in type, auto-generated from param struct schemas.
pub fn command_registry() -> Vec<CommandRegistryEntry> {
    super::UriCommand::registry_entries()
}

/// Foreign types registered at runtime, with their enabled flag.
pub fn foreign_entries(state: &AppState) -> Vec<ForeignInfo> {
    state.foreign.entries()
}

/// Help text for type discovery.
/// Three tiers: no topic → categories, category → type list, type → full schema.
pub fn help_text(topic: Option<&str>) -> String {
    let registry = command_registry();

    match topic {
        None => {
            let mut lines = vec!["Available categories:".to_string()];
            for category in CommandCategory::all() {
                let count = registry.iter().filter(|e| e.category == *category).count();
                if count > 0 {
                    lines.push(format!(
                        "  {} ({count}): {}",
                        category.slug(),
                        category.description()
                    ));
                }
            }
            lines.push(String::new());
            lines.push("Use `help document` to list the types in a category.".to_string());
            lines.push("Use `help write` for full parameter details.".to_string());
            lines.join("\n")
        }
        Some(topic) => {
            if let Some(entry) = registry.iter().find(|e| e.name == topic) {
                let schema_str = serde_json::to_string_pretty(&entry.param_schema)
                    .unwrap_or_else(|_| "{}".to_string());
                return format!(
                    "{}: {}\nCategory: {} | Mutating: {} | Opens view: {}\n\nParameters:\n{}",
                    entry.name,
                    entry.description,
                    entry.category.slug(),
                    if entry.mutating { "yes" } else { "no" },
                    if entry.opens_view { "yes" } else { "no" },
                    schema_str,
                );
            }

            let cat_lower = topic.to_lowercase();
            let matching: Vec<&CommandRegistryEntry> = registry
                .iter()
                .filter(|e| e.category.slug() == cat_lower)
                .collect();

            if matching.is_empty() {
                format!("Unknown topic: \"{topic}\". Use `help` to see categories and types.")
            } else {
                let mut lines = vec![format!("{topic} types:")];
                for entry in &matching {
                    lines.push(format!("  - {}: {}", entry.name, entry.description));
                }
                lines.push(String::new());
                lines.push("Use `help <type>` for parameter details.".to_string());
                lines.join("\n")
            }
        }
    }
}

/// JSON Schema formatted type list, foreign types included when a state is given.
pub fn to_json_schema(state: Option<&AppState>) -> Value {
    let mut types: Vec<Value> = command_registry()
        .iter()
        .map(|e| {
            serde_json::json!({
                "type": e.name,
                "description": e.description,
                "category": e.category.slug(),
                "mutating": e.mutating,
                "inputSchema": e.param_schema,
            })
        })
        .collect();
    if let Some(state) = state {
        types.extend(foreign_entries(state).into_iter().map(|f| {
            serde_json::json!({
                "type": f.kind,
                "description": f.description,
                "category": "foreign",
                "enabled": f.enabled,
                "inputSchema": empty_object_schema(),
            })
        }));
    }
    Value::Array(types)
}
