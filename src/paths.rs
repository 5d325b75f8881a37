//! Centralized names for the URI surface and the config directory.
//!
//! No other module should hard-code these strings.

use std::path::{Path, PathBuf};

// ── Application identity ─────────────────────────────────────────

/// `directories::ProjectDirs` triple for the default config dir.
pub const APP_QUALIFIER: &str = "md";
pub const APP_ORGANIZATION: &str = "vault-uri";
pub const APP_NAME: &str = "vault-uri";

// ── URI surface ──────────────────────────────────────────────────

pub const DEFAULT_SCHEME: &str = "obsidian";
pub const DEFAULT_LINK_NAME: &str = "uri-link";

// ── Leaf filenames ───────────────────────────────────────────────

pub const SETTINGS_FILE: &str = "settings.json";
pub const MARKDOWN_EXT: &str = "md";

// ── Config-dir functions (take app_config_dir) ───────────────────

pub fn settings_path(app_config_dir: &Path) -> PathBuf {
    app_config_dir.join(SETTINGS_FILE)
}

/// OS config dir for the CLI, `None` when no home directory can be found.
pub fn default_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
}

// ── Vault path helpers ───────────────────────────────────────────

/// Parent folder of a vault path, `""` for the root.
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// File name of a vault path.
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// Strip a trailing `.md`/`.MD`; only the last extension is removed
/// (`Note.md.md` → `Note.md`).
pub fn strip_md(name: &str) -> &str {
    name.strip_suffix(".md")
        .or_else(|| name.strip_suffix(".MD"))
        .unwrap_or(name)
}

pub fn is_markdown(path: &str) -> bool {
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MARKDOWN_EXT))
}
