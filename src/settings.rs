use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::persist::{read_json, write_json, PersistError};

/// Which vault identity is emitted as the `vault` parameter of generated URIs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum VaultParam {
    #[default]
    Name,
    Id,
}

/// Dispatcher settings stored in the app config directory.
///
/// Every field has a default so older or hand-written files load cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct UriSettings {
    pub open_file_on_write: bool,
    pub open_file_on_write_in_new_pane: bool,
    pub open_file_without_write_in_new_pane: bool,
    /// Frontmatter key holding a document's unique id.
    pub id_field: String,
    pub use_uid: bool,
    pub add_filepath_when_using_uid: bool,
    pub allow_eval: bool,
    pub include_vault_name: bool,
    pub vault_param: VaultParam,
    /// Foreign handler types allowed to run.
    pub enabled_foreign_types: Vec<String>,
    pub scheme: String,
    pub link_name: String,
    /// Upper bound for waiting on the metadata indexer. 0 waits forever.
    pub index_wait_ms: u64,
}

impl Default for UriSettings {
    fn default() -> Self {
        Self {
            open_file_on_write: true,
            open_file_on_write_in_new_pane: false,
            open_file_without_write_in_new_pane: false,
            id_field: "id".to_string(),
            use_uid: false,
            add_filepath_when_using_uid: false,
            allow_eval: false,
            include_vault_name: true,
            vault_param: VaultParam::Name,
            enabled_foreign_types: Vec::new(),
            scheme: crate::paths::DEFAULT_SCHEME.to_string(),
            link_name: crate::paths::DEFAULT_LINK_NAME.to_string(),
            index_wait_ms: 30_000,
        }
    }
}

impl UriSettings {
    pub fn is_foreign_enabled(&self, kind: &str) -> bool {
        self.enabled_foreign_types.iter().any(|t| t == kind)
    }

    /// Add or remove `kind` from the foreign allow-list. Returns whether it changed.
    pub fn set_foreign_enabled(&mut self, kind: &str, enabled: bool) -> bool {
        let present = self.is_foreign_enabled(kind);
        match (present, enabled) {
            (false, true) => {
                self.enabled_foreign_types.push(kind.to_string());
                true
            }
            (true, false) => {
                self.enabled_foreign_types.retain(|t| t != kind);
                true
            }
            _ => false,
        }
    }

    /// Set a single field from its JSON key, e.g. `("allow_eval", "true")`.
    /// Values that parse as JSON are used as such, otherwise as plain strings.
    pub fn set_key(&mut self, key: &str, raw: &str) -> Result<(), crate::error::AppError> {
        let mut value = serde_json::to_value(&*self)?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| crate::error::AppError::internal("settings are not an object"))?;
        if !obj.contains_key(key) {
            return Err(crate::error::AppError::not_found(format!("Setting \"{key}\"")));
        }
        let parsed = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        obj.insert(key.to_string(), parsed);
        *self = serde_json::from_value(value)?;
        Ok(())
    }
}

/// Load settings from the app config directory. A missing file yields defaults.
pub fn load_settings(app_config_dir: &Path) -> Result<UriSettings, PersistError> {
    let path = crate::paths::settings_path(app_config_dir);
    if !path.exists() {
        return Ok(UriSettings::default());
    }
    read_json(&path)
}

/// Save settings to the app config directory.
pub fn save_settings(app_config_dir: &Path, settings: &UriSettings) -> Result<(), PersistError> {
    std::fs::create_dir_all(app_config_dir)?;
    write_json(&crate::paths::settings_path(app_config_dir), settings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = UriSettings::default();
        settings.allow_eval = true;
        settings.enabled_foreign_types.push("dataview".into());
        save_settings(dir.path(), &settings).unwrap();

        let loaded = load_settings(dir.path()).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_missing_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_settings(&dir.path().join("nope")).unwrap();
        assert_eq!(loaded, UriSettings::default());
        assert!(loaded.open_file_on_write);
        assert_eq!(loaded.id_field, "id");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            crate::paths::settings_path(dir.path()),
            r#"{ "id_field": "uuid", "vault_param": "id", "open_daily_in_new_pane": true }"#,
        )
        .unwrap();
        let loaded = load_settings(dir.path()).unwrap();
        assert_eq!(loaded.id_field, "uuid");
        assert_eq!(loaded.vault_param, VaultParam::Id);
        assert!(loaded.include_vault_name);
    }

    #[test]
    fn test_set_key() {
        let mut s = UriSettings::default();
        s.set_key("allow_eval", "true").unwrap();
        s.set_key("id_field", "uid").unwrap();
        assert!(s.allow_eval);
        assert_eq!(s.id_field, "uid");
        assert!(s.set_key("nonexistent", "1").is_err());
        assert!(s.set_key("allow_eval", "\"maybe\"").is_err());
    }

    #[test]
    fn test_foreign_allow_list() {
        let mut s = UriSettings::default();
        assert!(s.set_foreign_enabled("x", true));
        assert!(!s.set_foreign_enabled("x", true));
        assert!(s.is_foreign_enabled("x"));
        assert!(s.set_foreign_enabled("x", false));
        assert!(!s.is_foreign_enabled("x"));
    }
}
