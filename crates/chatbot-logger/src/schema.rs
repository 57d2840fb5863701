//! Row definitions for the chatbot SurrealDB tables
//!
//! Tables:
//! - releases: one row per chatbot version
//! - experiments: dev-run configuration snapshots
//! - sessions: interactive runs
//! - session_events: per-session append-only log
//!
//! Rows hold plain strings and SurrealDB datetimes; conversion to the
//! `storage_traits` types happens at the boundary and validates hashes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage_traits::{
    ExperimentRecord, RecordHash, ReleaseRecord, SessionEvent, SessionKind, SessionRecord,
    StorageResult, ToolDescriptor,
};

/// Module for serializing chrono DateTime to SurrealDB datetime format
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sd = SurrealDatetime::from(*date);
        serde::Serialize::serialize(&sd, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Stores a JSON map as its text encoding.
///
/// SurrealDB drops object keys whose value is `null`, which would lose
/// declared-but-unset snapshot fields.
mod json_text {
    use std::collections::BTreeMap;

    use serde::{self, de, ser, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(
        map: &BTreeMap<String, serde_json::Value>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let text = serde_json::to_string(map).map_err(ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<String, serde_json::Value>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        serde_json::from_str(&text).map_err(de::Error::custom)
    }
}

fn parse_hash(raw: String) -> StorageResult<RecordHash> {
    RecordHash::try_from(raw)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ReleaseRow {
    pub hash: String,
    pub version: String,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ReleaseRow {
    pub fn new(version: &str) -> Self {
        Self {
            hash: RecordHash::generate("release").to_string(),
            version: version.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn into_record(self) -> StorageResult<ReleaseRecord> {
        Ok(ReleaseRecord {
            hash: parse_hash(self.hash)?,
            version: self.version,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ExperimentRow {
    pub hash: String,
    pub release_reference: String,
    pub version: String,
    #[serde(with = "surreal_datetime")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "json_text")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl ExperimentRow {
    pub fn new(release_reference: &RecordHash, version: &str) -> Self {
        Self {
            hash: RecordHash::generate("experiment").to_string(),
            release_reference: release_reference.to_string(),
            version: version.to_string(),
            started_at: Utc::now(),
            fields: BTreeMap::new(),
        }
    }

    pub fn into_record(self) -> StorageResult<ExperimentRecord> {
        Ok(ExperimentRecord {
            hash: parse_hash(self.hash)?,
            release_reference: parse_hash(self.release_reference)?,
            version: self.version,
            started_at: self.started_at,
            fields: self.fields,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SessionRow {
    pub hash: String,
    pub kind: SessionKind,
    pub username: String,
    pub chatbot_version: String,
    pub model_name: String,
    #[serde(with = "surreal_datetime")]
    pub started_at: DateTime<Utc>,
    pub available_tools: Vec<ToolDescriptor>,
    pub release_reference: String,
    pub experiment_reference: Option<String>,
}

impl SessionRow {
    pub fn from_record(record: &SessionRecord) -> Self {
        Self {
            hash: record.hash.to_string(),
            kind: record.kind,
            username: record.username.clone(),
            chatbot_version: record.chatbot_version.clone(),
            model_name: record.model_name.clone(),
            started_at: record.started_at,
            available_tools: record.available_tools.clone(),
            release_reference: record.release_reference.to_string(),
            experiment_reference: record.experiment_reference.as_ref().map(|h| h.to_string()),
        }
    }

    pub fn into_record(self) -> StorageResult<SessionRecord> {
        Ok(SessionRecord {
            hash: parse_hash(self.hash)?,
            kind: self.kind,
            username: self.username,
            chatbot_version: self.chatbot_version,
            model_name: self.model_name,
            started_at: self.started_at,
            available_tools: self.available_tools,
            release_reference: parse_hash(self.release_reference)?,
            experiment_reference: self.experiment_reference.map(parse_hash).transpose()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SessionEventRow {
    pub session: String,
    pub seq: u64,
    pub kind: String,
    pub payload: serde_json::Value,
    #[serde(with = "surreal_datetime")]
    pub timestamp: DateTime<Utc>,
}

impl SessionEventRow {
    pub fn new(session: &RecordHash, event: SessionEvent) -> Self {
        Self {
            session: session.to_string(),
            seq: event.seq,
            kind: event.kind.as_str().to_string(),
            payload: event.payload,
            timestamp: event.timestamp,
        }
    }

    pub fn into_event(self) -> StorageResult<SessionEvent> {
        Ok(SessionEvent {
            seq: self.seq,
            kind: self.kind.parse()?,
            payload: self.payload,
            timestamp: self.timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage_traits::{NewSession, SessionEventKind};

    #[test]
    fn release_row_round_trips_into_record() {
        let row = ReleaseRow::new("1.2.3");
        let hash = row.hash.clone();
        let record = row.into_record().unwrap();
        assert_eq!(record.version, "1.2.3");
        assert_eq!(record.hash.as_str(), hash);
    }

    #[test]
    fn corrupt_reference_is_reported_not_swallowed() {
        let mut row = ExperimentRow::new(&RecordHash::generate("release"), "1.0.0");
        row.release_reference = "garbage".to_string();
        let err = row.into_record().unwrap_err();
        assert!(matches!(err, StorageError::InvalidHash { .. }));
    }

    #[test]
    fn experiment_fields_keep_null_members() {
        #[derive(Serialize, Deserialize)]
        struct Fields {
            #[serde(with = "json_text")]
            fields: BTreeMap<String, serde_json::Value>,
        }

        let llm = serde_json::json!({ "model_name": "m", "max_tokens": null });
        let mut fields = BTreeMap::new();
        fields.insert("llm".to_string(), llm.clone());

        let stored = serde_json::to_value(Fields { fields }).unwrap();
        assert!(stored["fields"].is_string());

        let back: Fields = serde_json::from_value(stored).unwrap();
        assert_eq!(back.fields["llm"], llm);
    }

    #[test]
    fn session_row_preserves_optional_experiment() {
        let record = SessionRecord::from_new(
            NewSession {
                kind: SessionKind::User,
                username: "ada".to_string(),
                chatbot_version: "1.0.0".to_string(),
                model_name: "gpt-3.5-turbo".to_string(),
                available_tools: vec![],
                release_reference: RecordHash::generate("release"),
                experiment_reference: None,
            },
            Utc::now(),
        );
        let back = SessionRow::from_record(&record).into_record().unwrap();
        assert_eq!(back, record);
        assert!(back.experiment_reference.is_none());
    }

    #[test]
    fn unknown_event_kind_fails_conversion() {
        let mut row = SessionEventRow::new(
            &RecordHash::generate("session"),
            SessionEvent {
                seq: 1,
                kind: SessionEventKind::Turn,
                payload: serde_json::json!({}),
                timestamp: Utc::now(),
            },
        );
        row.kind = "mystery".to_string();
        assert!(row.into_event().is_err());
    }
}
