//! Structured transfer-lifecycle audit events.
//!
//! Emitted through `tracing::event!` at `info` level when
//! [`crate::config::LoggingConfig::transfer_audit`] is enabled, so a
//! JSON-formatted subscriber can feed them into a log pipeline without this
//! crate depending on a specific sink.

use std::net::SocketAddr;

use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum AuditEvent {
    TransferStarted {
        direction: &'static str,
        remote_filename: String,
        peer: SocketAddr,
    },
    TidLatched {
        peer: SocketAddr,
    },
    RetryAttempted {
        retry_count: u32,
        max_retries: u32,
    },
    TransferCompleted {
        bytes_transferred: u64,
    },
    TransferFailed {
        reason: String,
    },
}

/// Logs `event` at `info` level as a structured field if `enabled`; always a
/// no-op otherwise. The human-readable `tracing` spans the engine emits at
/// `debug`/`info` level are unaffected by this flag.
pub fn emit(enabled: bool, event: &AuditEvent) {
    if !enabled {
        return;
    }
    match serde_json::to_string(event) {
        Ok(json) => info!(audit = %json, "transfer audit event"),
        Err(e) => info!(error = %e, "failed to serialize audit event"),
    }
}
