//! SurrealDB schema migrations and initialization
//!
//! Sets up the chatbot tables with their indexes and permissions.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all chatbot tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing chatbot SurrealDB schema");

    init_releases_table(db).await?;
    init_experiments_table(db).await?;
    init_sessions_table(db).await?;
    init_session_events_table(db).await?;

    info!("chatbot schema initialization complete");
    Ok(())
}

/// Initialize `releases` table
///
/// Schema:
/// ```text
/// TABLE releases {
///   hash:        STRING (unique identity)
///   version:     STRING (lookup key, indexed)
///   created_at:  DATETIME
/// }
/// ```
///
/// Releases are immutable once written. Version uniqueness is not enforced
/// here: concurrent first runs of a new version may each create one.
async fn init_releases_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing releases table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS releases
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_release_hash ON TABLE releases COLUMNS hash UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_release_version ON TABLE releases COLUMNS version;
        DEFINE INDEX IF NOT EXISTS idx_release_version_created_at ON TABLE releases COLUMNS version, created_at;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ releases table initialized");
    Ok(())
}

/// Initialize `experiments` table
///
/// Schema:
/// ```text
/// TABLE experiments {
///   hash:               STRING (unique identity)
///   release_reference:  STRING (hash of a release)
///   version:            STRING
///   started_at:         DATETIME
///   fields:             STRING (JSON map: snapshot name -> value)
/// }
/// ```
///
/// Updates are allowed because snapshot fields are assigned one at a time
/// while the agent is assembled.
async fn init_experiments_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing experiments table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS experiments
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_experiment_hash ON TABLE experiments COLUMNS hash UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_experiment_release ON TABLE experiments COLUMNS release_reference;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ experiments table initialized");
    Ok(())
}

/// Initialize `sessions` table
///
/// Schema:
/// ```text
/// TABLE sessions {
///   hash:                  STRING (unique identity)
///   kind:                  STRING (dev | user)
///   username:              STRING
///   chatbot_version:       STRING
///   model_name:            STRING
///   started_at:            DATETIME
///   available_tools:       ARRAY<{ name, description }>
///   release_reference:     STRING
///   experiment_reference:  STRING?
/// }
/// ```
async fn init_sessions_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing sessions table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS sessions
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_session_hash ON TABLE sessions COLUMNS hash UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_session_release ON TABLE sessions COLUMNS release_reference;
        DEFINE INDEX IF NOT EXISTS idx_session_experiment ON TABLE sessions COLUMNS experiment_reference;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ sessions table initialized");
    Ok(())
}

/// Initialize `session_events` table
///
/// Schema:
/// ```text
/// TABLE session_events {
///   session:    STRING (hash of a session)
///   seq:        INT (monotonic within the session, 1-based)
///   kind:       STRING (turn | agent_action | tool_result | turn_error)
///   payload:    OBJECT
///   timestamp:  DATETIME
/// }
/// ```
///
/// `(session, seq)` is unique so a replayed append cannot duplicate a turn.
async fn init_session_events_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing session_events table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS session_events
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_session_seq ON TABLE session_events COLUMNS session, seq UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_session_event_kind ON TABLE session_events COLUMNS kind;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ session_events table initialized");
    Ok(())
}
