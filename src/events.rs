//! Single source of truth for event names published on the host event bus.

/// Broadcast when a foreign handler is registered. Payload: `{ "type": ..., "enabled": ... }`.
pub const FOREIGN_HANDLER_REGISTERED: &str = "uri:foreign-registered";
/// Broadcast when a `write` dispatch changed a document. Payload: `{ "path": ... }`.
pub const DOCUMENT_WRITTEN: &str = "uri:document-written";
