//! The `IntelStore` and `CredentialStore` traits.
//!
//! Storage backends (e.g. `vigil-store-sqlite`) implement these traits; the
//! services in this crate and the higher layers (`vigil-api`,
//! `vigil-server`) depend only on the abstraction.
//!
//! Every method is a single-document operation from the caller's point of
//! view. Multi-step invariants (dedup, tag toggling) are coordinated by the
//! services on top, not by holding locks across calls.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  plugin::PluginDescriptor,
  record::{PendingUpdate, PluginResultRecord, ResultFingerprint},
  resource::{Resource, ResourceType, Tag},
};

// ─── IntelStore ──────────────────────────────────────────────────────────────

/// Abstraction over the document store holding resources, plugin results,
/// the persisted registry and the pending-update log.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait IntelStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Resources ─────────────────────────────────────────────────────────

  /// Insert `resource` unless one with the same `(resource_type,
  /// lookup_key)` already exists. Returns the stored resource and whether
  /// this call created it. Must be atomic with respect to concurrent calls.
  fn insert_resource_if_absent(
    &self,
    resource: Resource,
  ) -> impl Future<Output = Result<(Resource, bool), Self::Error>> + Send + '_;

  /// Retrieve a resource by id. Returns `None` if not found.
  fn get_resource(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Resource>, Self::Error>> + Send + '_;

  /// Point lookup on the `(resource_type, lookup_key)` unique index.
  fn find_resource(
    &self,
    resource_type: ResourceType,
    lookup_key: String,
  ) -> impl Future<Output = Result<Option<Resource>, Self::Error>> + Send + '_;

  /// Case-insensitive substring search over canonical names and lookup keys.
  fn search_resources(
    &self,
    text: String,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Resource>, Self::Error>> + Send + '_;

  /// Replace the tag set if the stored revision still equals
  /// `expected_revision`, bumping the revision. Returns `false` when the
  /// revision moved on (or the resource is gone) and nothing was written.
  fn replace_tags(
    &self,
    id: Uuid,
    expected_revision: u64,
    tags: Vec<Tag>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Plugin results ────────────────────────────────────────────────────

  /// Fingerprint of the most recent record for `(resource_id, plugin)`.
  fn latest_fingerprint(
    &self,
    resource_id: Uuid,
    plugin: String,
  ) -> impl Future<Output = Result<Option<ResultFingerprint>, Self::Error>>
  + Send
  + '_;

  /// Append a new record to the plugin's namespace.
  fn insert_result(
    &self,
    record: PluginResultRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Refresh an existing record's `timestamp`. Returns `false` if the record
  /// no longer exists.
  fn touch_result(
    &self,
    plugin: String,
    record_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// All records for `(resource_id, plugin)`, newest first.
  fn list_results(
    &self,
    resource_id: Uuid,
    plugin: String,
  ) -> impl Future<Output = Result<Vec<PluginResultRecord>, Self::Error>>
  + Send
  + '_;

  /// Store a large sub-result in the plugin's side namespace and return the
  /// id a payload can reference.
  fn put_sub_result(
    &self,
    plugin: String,
    value: serde_json::Value,
  ) -> impl Future<Output = Result<Uuid, Self::Error>> + Send + '_;

  fn get_sub_result(
    &self,
    plugin: String,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<serde_json::Value>, Self::Error>>
  + Send
  + '_;

  /// Decommission a plugin by dropping its whole namespace.
  fn drop_plugin_namespace(
    &self,
    plugin: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Registry ──────────────────────────────────────────────────────────

  /// Atomically replace the persisted registry contents.
  fn replace_plugins(
    &self,
    descriptors: Vec<PluginDescriptor>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_plugins(
    &self,
  ) -> impl Future<Output = Result<Vec<PluginDescriptor>, Self::Error>> + Send + '_;

  // ── Pending updates ───────────────────────────────────────────────────

  fn append_update(
    &self,
    update: PendingUpdate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Entries for `project_id` with `timestamp <= cutoff`, oldest first.
  fn updates_until(
    &self,
    project_id: Uuid,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<PendingUpdate>, Self::Error>> + Send + '_;

  /// Delete every entry (any project) with `timestamp <= threshold`.
  /// Returns the number of deleted entries.
  fn purge_updates_until(
    &self,
    threshold: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Timestamp of the most recent entry in the whole log.
  fn last_update_at(
    &self,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + '_;
}

// ─── CredentialStore ─────────────────────────────────────────────────────────

/// Named API keys used by plugin bodies.
pub trait CredentialStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_api_key(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + '_;

  /// Insert or overwrite a key.
  fn set_api_key(
    &self,
    name: String,
    secret: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Returns `true` if a key was removed.
  fn remove_api_key(
    &self,
    name: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Names of all stored keys, sorted. Secrets are never listed.
  fn api_key_names(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;
}
