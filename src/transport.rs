//! Collaborator traits at the transport seam.
//!
//! The session never touches sockets. Outbound requests go through
//! [`CommandTransport`]; the clean-log history of the JSON model family is
//! served by a REST endpoint reached through [`CleanLogFetcher`]. Wire
//! serialization (XML stanza vs MQTT topic + REST call) is entirely the
//! collaborator's concern, as is retry, ack, and keep-alive handling.

use crate::catalog::CommandRequest;
use crate::error::Result;

/// Outbound request sink implemented by the transport collaborator
pub trait CommandTransport: Send {
    /// Deliver one constructed request. Fire-and-forget from the session's
    /// perspective; delivery guarantees belong to the implementation.
    fn send(&mut self, request: &CommandRequest) -> Result<()>;
}

/// Clean-log REST collaborator for the JSON model family
pub trait CleanLogFetcher: Send {
    /// Fetch up to `count` most recent log records for a device, returned as
    /// the raw JSON the log service produced.
    fn fetch_clean_logs(&mut self, device_id: &str, count: usize) -> Result<serde_json::Value>;
}
