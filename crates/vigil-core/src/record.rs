//! Stored plugin results and pending-update notifications.
//!
//! Result records are append-only with one exception: when a plugin returns
//! the same payload again, the newest record's `timestamp` is refreshed in
//! place instead of growing the history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plugin::{ResultStatus, Severity};

// ─── Result records ──────────────────────────────────────────────────────────

/// One stored outcome of a plugin run against a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginResultRecord {
  pub record_id:     Uuid,
  pub resource_id:   Uuid,
  pub plugin_name:   String,
  pub payload:       serde_json::Value,
  pub result_status: ResultStatus,
  /// When the record was first written.
  pub recorded_at:   DateTime<Utc>,
  /// Creation time, or the last time an identical result was seen.
  pub timestamp:     DateTime<Utc>,
  /// Hex SHA-256 of the canonical payload.
  pub content_hash:  String,
}

/// The part of the newest record that the dedup comparison needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFingerprint {
  pub record_id:    Uuid,
  /// `None` when the stored row carries no usable hash (legacy or corrupt
  /// payload); such a record always compares as different.
  pub content_hash: Option<String>,
}

/// One step of the time machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub timestamp:     DateTime<Utc>,
  pub result_status: ResultStatus,
}

// ─── Pending updates ─────────────────────────────────────────────────────────

/// A notification that a plugin result was just written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingUpdate {
  pub update_id:     Uuid,
  pub project_id:    Uuid,
  pub resource_id:   Uuid,
  pub plugin_name:   String,
  pub message:       String,
  pub severity:      Severity,
  pub result_status: ResultStatus,
  pub timestamp:     DateTime<Utc>,
}

impl PendingUpdate {
  /// Build the entry for `status` using the fixed message table.
  pub fn for_status(
    project_id: Uuid,
    resource_id: Uuid,
    plugin_name: &str,
    status: ResultStatus,
    timestamp: DateTime<Utc>,
  ) -> Self {
    let (message, severity) = status.notification();
    Self {
      update_id: Uuid::new_v4(),
      project_id,
      resource_id,
      plugin_name: plugin_name.to_owned(),
      message: message.to_owned(),
      severity,
      result_status: status,
      timestamp,
    }
  }
}

/// What a polling client receives per entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateNotice {
  pub resource_id: Uuid,
  pub plugin_name: String,
  pub message:     String,
  pub status:      Severity,
}

impl From<PendingUpdate> for UpdateNotice {
  fn from(u: PendingUpdate) -> Self {
    Self {
      resource_id: u.resource_id,
      plugin_name: u.plugin_name,
      message:     u.message,
      status:      u.severity,
    }
  }
}
