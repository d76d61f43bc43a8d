//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision and a `Z` suffix, so lexical order equals chronological order
//! and range predicates can compare the columns directly. Structured fields
//! (tags, details, payloads, descriptors) are stored as compact JSON. UUIDs
//! are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;
use vigil_core::{
  plugin::{ResultStatus, Severity},
  record::{PendingUpdate, PluginResultRecord},
  resource::{Resource, ResourceDetails, ResourceType, Tag},
};

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Status enums ────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<ResultStatus> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown result status: {s:?}")))
}

pub fn decode_severity(s: &str) -> Result<Severity> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown severity: {s:?}")))
}

// ─── Content hash ────────────────────────────────────────────────────────────

/// A stored hash is only usable if it looks like hex SHA-256.
pub fn usable_hash(stored: Option<String>) -> Option<String> {
  stored.filter(|h| h.len() == 64 && h.bytes().all(|b| b.is_ascii_hexdigit()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const RESOURCE_COLUMNS: &str =
  "resource_id, canonical_name, resource_type, created_at, tags, details, revision";

/// Raw strings read directly from a `resources` row.
pub struct RawResource {
  pub resource_id:    String,
  pub canonical_name: String,
  pub resource_type:  String,
  pub created_at:     String,
  pub tags:           String,
  pub details:        String,
  pub revision:       i64,
}

impl RawResource {
  /// Map a row selected with [`RESOURCE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      resource_id:    row.get(0)?,
      canonical_name: row.get(1)?,
      resource_type:  row.get(2)?,
      created_at:     row.get(3)?,
      tags:           row.get(4)?,
      details:        row.get(5)?,
      revision:       row.get(6)?,
    })
  }

  pub fn into_resource(self) -> Result<Resource> {
    let tags: Vec<Tag> = serde_json::from_str(&self.tags)?;
    let details: ResourceDetails = serde_json::from_str(&self.details)?;
    let revision = u64::try_from(self.revision)
      .map_err(|_| Error::Decode(format!("negative revision {}", self.revision)))?;

    Ok(Resource {
      resource_id: decode_uuid(&self.resource_id)?,
      canonical_name: self.canonical_name,
      resource_type: ResourceType::parse(&self.resource_type)?,
      created_at: decode_dt(&self.created_at)?,
      tags,
      details,
      revision,
    })
  }
}

pub const RESULT_COLUMNS: &str =
  "record_id, resource_id, payload, result_status, recorded_at, timestamp, content_hash";

/// Raw strings read directly from a `results_<plugin>` row.
pub struct RawResult {
  pub record_id:     String,
  pub resource_id:   String,
  pub payload:       String,
  pub result_status: String,
  pub recorded_at:   String,
  pub timestamp:     String,
  pub content_hash:  Option<String>,
}

impl RawResult {
  /// Map a row selected with [`RESULT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:     row.get(0)?,
      resource_id:   row.get(1)?,
      payload:       row.get(2)?,
      result_status: row.get(3)?,
      recorded_at:   row.get(4)?,
      timestamp:     row.get(5)?,
      content_hash:  row.get(6)?,
    })
  }

  pub fn into_record(self, plugin: &str) -> Result<PluginResultRecord> {
    Ok(PluginResultRecord {
      record_id:     decode_uuid(&self.record_id)?,
      resource_id:   decode_uuid(&self.resource_id)?,
      plugin_name:   plugin.to_owned(),
      payload:       serde_json::from_str(&self.payload)?,
      result_status: decode_status(&self.result_status)?,
      recorded_at:   decode_dt(&self.recorded_at)?,
      timestamp:     decode_dt(&self.timestamp)?,
      content_hash:  self.content_hash.unwrap_or_default(),
    })
  }
}

pub const UPDATE_COLUMNS: &str = "update_id, project_id, resource_id, plugin_name, \
                                  message, severity, result_status, timestamp";

/// Raw strings read directly from a `pending_updates` row.
pub struct RawUpdate {
  pub update_id:     String,
  pub project_id:    String,
  pub resource_id:   String,
  pub plugin_name:   String,
  pub message:       String,
  pub severity:      String,
  pub result_status: String,
  pub timestamp:     String,
}

impl RawUpdate {
  /// Map a row selected with [`UPDATE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      update_id:     row.get(0)?,
      project_id:    row.get(1)?,
      resource_id:   row.get(2)?,
      plugin_name:   row.get(3)?,
      message:       row.get(4)?,
      severity:      row.get(5)?,
      result_status: row.get(6)?,
      timestamp:     row.get(7)?,
    })
  }

  pub fn into_update(self) -> Result<PendingUpdate> {
    Ok(PendingUpdate {
      update_id:     decode_uuid(&self.update_id)?,
      project_id:    decode_uuid(&self.project_id)?,
      resource_id:   decode_uuid(&self.resource_id)?,
      plugin_name:   self.plugin_name,
      message:       self.message,
      severity:      decode_severity(&self.severity)?,
      result_status: decode_status(&self.result_status)?,
      timestamp:     decode_dt(&self.timestamp)?,
    })
  }
}
