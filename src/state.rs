use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::events;
use crate::host::Host;
use crate::registry::foreign::{ForeignHandler, ForeignRegistry};
use crate::settings::{self, UriSettings};

// ── Application State ──────────────────────────────────────────────

/// State shared by every dispatch: host collaborators, settings and the
/// foreign handler registry.
pub struct AppState {
    pub host: Host,
    pub settings: Mutex<UriSettings>,
    pub foreign: ForeignRegistry,
    pub app_config_dir: PathBuf,
    /// Fired on shutdown; aborts waits on the metadata indexer.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(host: Host, settings: UriSettings, app_config_dir: PathBuf) -> Self {
        Self {
            host,
            settings: Mutex::new(settings),
            foreign: ForeignRegistry::default(),
            app_config_dir,
            shutdown: CancellationToken::new(),
        }
    }

    /// Snapshot of the current settings. Handlers never hold the lock across an await.
    pub fn settings(&self) -> UriSettings {
        self.settings.lock().clone()
    }

    /// Mutate the settings and persist the result.
    pub fn update_settings<F, R>(&self, f: F) -> Result<R, AppError>
    where
        F: FnOnce(&mut UriSettings) -> R,
    {
        let (result, snapshot) = {
            let mut guard = self.settings.lock();
            let result = f(&mut guard);
            (result, guard.clone())
        };
        settings::save_settings(&self.app_config_dir, &snapshot).map_err(|e| AppError::SettingsSaveError {
            message: e.to_string(),
        })?;
        Ok(result)
    }

    /// Register a foreign handler. It starts enabled when its type is on the
    /// persisted allow-list.
    pub fn register_foreign(&self, handler: Arc<dyn ForeignHandler>) -> Result<bool, AppError> {
        if handler.kind().is_empty() || handler.description().is_empty() {
            return Err(AppError::invalid("foreign handlers need a type and a description"));
        }
        let enabled = self.settings.lock().is_foreign_enabled(handler.kind());
        tracing::info!(kind = handler.kind(), enabled, "registering foreign handler");
        self.host.events.publish(
            events::FOREIGN_HANDLER_REGISTERED,
            &json!({
                "type": handler.kind(),
                "description": handler.description(),
                "enabled": enabled,
            }),
        );
        self.foreign.register(handler, enabled);
        Ok(enabled)
    }

    /// Allow or block a foreign type, persisting the allow-list. Returns the
    /// number of registered entries of that type.
    pub fn set_foreign_enabled(&self, kind: &str, enabled: bool) -> Result<usize, AppError> {
        self.update_settings(|s| s.set_foreign_enabled(kind, enabled))?;
        Ok(self.foreign.set_enabled(kind, enabled))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::host::memory::MemoryHost;
    use crate::registry::foreign::tests::EchoHandler;

    #[test]
    fn registration_reads_allow_list_and_announces() {
        let memory = MemoryHost::new("v");
        let dir = tempfile::tempdir().unwrap();
        let mut settings = UriSettings::default();
        settings.enabled_foreign_types.push("echo".into());
        let state = AppState::new(memory.host(), settings, dir.path().to_path_buf());

        assert!(state.register_foreign(Arc::new(EchoHandler::new("echo"))).unwrap());
        assert!(!state.register_foreign(Arc::new(EchoHandler::new("other"))).unwrap());
        let announced = memory.events.named(events::FOREIGN_HANDLER_REGISTERED);
        assert_eq!(announced.len(), 2);
        assert_eq!(announced[0]["type"], "echo");
        assert_eq!(announced[1]["enabled"], false);
    }

    #[test]
    fn toggling_persists_allow_list() {
        let memory = MemoryHost::new("v");
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(memory.host(), UriSettings::default(), dir.path().to_path_buf());
        state.register_foreign(Arc::new(EchoHandler::new("echo"))).unwrap();

        assert_eq!(state.set_foreign_enabled("echo", true).unwrap(), 1);
        assert!(state.foreign.find_enabled("echo").is_some());
        let saved = settings::load_settings(dir.path()).unwrap();
        assert_eq!(saved.enabled_foreign_types, vec!["echo".to_string()]);

        state.set_foreign_enabled("echo", false).unwrap();
        assert!(state.foreign.find_enabled("echo").is_none());
    }

    #[test]
    fn handler_without_description_is_rejected() {
        let memory = MemoryHost::new("v");
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(memory.host(), UriSettings::default(), dir.path().to_path_buf());
        let err = state
            .register_foreign(Arc::new(EchoHandler::new("x").with_description("")))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }
}
