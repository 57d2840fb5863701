//! Structured observability hooks for chatbot lifecycle events.
//!
//! This module provides:
//! - A session-scoped tracing span
//! - Emission functions for bookkeeping events: release lookup, experiment
//!   recording, session start, event append, completed turns
//!
//! Events are emitted at `info!` level (configurable via `RUST_LOG`).
//! For JSON output, run the binary with `--json`.

use tracing::{info, Span};

/// Session-scoped span; attach with `tracing::Instrument` so every event
/// logged while serving the session carries its hash.
///
/// # Example
///
/// ```ignore
/// interaction.run(reader, writer).instrument(session_span("3f9a...")).await
/// ```
pub fn session_span(session: &str) -> Span {
    tracing::info_span!("chatbot.session", session = %session)
}

/// Emit event: a new Release was persisted for this version.
pub fn emit_release_created(release: &str, version: &str) {
    info!(event = "release.created", release = %release, version = %version);
}

/// Emit event: an existing Release was found for this version.
pub fn emit_release_reused(release: &str, version: &str) {
    info!(event = "release.reused", release = %release, version = %version);
}

/// Emit event: dev-mode Experiment created.
pub fn emit_experiment_started(experiment: &str, release: &str, version: &str) {
    info!(
        event = "experiment.started",
        experiment = %experiment,
        release = %release,
        version = %version,
    );
}

/// Emit event: one configuration snapshot written to the Experiment.
pub fn emit_experiment_field_recorded(experiment: &str, field: &str) {
    info!(event = "experiment.field_recorded", experiment = %experiment, field = %field);
}

/// Emit event: Session record written.
///
/// ```ignore
/// emit_session_started("ab12..", "ada", "1.0.0", true);
/// // logs: event=session.started session=ab12.. username=ada version=1.0.0 dev=true
/// ```
pub fn emit_session_started(session: &str, username: &str, version: &str, dev: bool) {
    info!(
        event = "session.started",
        session = %session,
        username = %username,
        version = %version,
        dev = dev,
    );
}

/// Emit event: a single event appended to the session log.
pub fn emit_session_event_appended(session: &str, kind: &str, seq: u64) {
    info!(event = "session.event_appended", session = %session, kind = %kind, seq = seq);
}

/// Emit event: a session hook could not persist its event (warning level).
pub fn emit_session_callback_error(session: &str, kind: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(
        event = "session.callback_error",
        session = %session,
        kind = %kind,
        error = %error,
    );
}

/// Emit event: one user/agent exchange finished.
pub fn emit_turn_completed(turn: u64, duration_ms: u64, success: bool) {
    info!(
        event = "turn.completed",
        turn = turn,
        duration_ms = duration_ms,
        success = success,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_span_enters_without_subscriber() {
        let _entered = session_span("test-session").entered();
    }
}
