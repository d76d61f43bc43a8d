//! SQL schema for the Vigil SQLite store.
//!
//! The shared tables are created once at connection startup. Plugin
//! namespaces are created lazily by [`namespace_ddl`].

use vigil_core::plugin::is_valid_plugin_name;

use crate::{Error, Result};

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS resources (
    resource_id     TEXT PRIMARY KEY,
    canonical_name  TEXT NOT NULL,
    resource_type   TEXT NOT NULL,   -- external form, e.g. 'domain', 'ip'
    lookup_key      TEXT NOT NULL,   -- full digest for hashes, else the name
    created_at      TEXT NOT NULL,
    tags            TEXT NOT NULL DEFAULT '[]',
    details         TEXT NOT NULL,   -- JSON, immutable after insert
    revision        INTEGER NOT NULL DEFAULT 0,
    UNIQUE (resource_type, lookup_key)
);

-- Snapshot of the registry, replaced wholesale on every rebuild.
CREATE TABLE IF NOT EXISTS plugins (
    name        TEXT PRIMARY KEY,
    descriptor  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS pending_updates (
    update_id      TEXT PRIMARY KEY,
    project_id     TEXT NOT NULL,
    resource_id    TEXT NOT NULL,
    plugin_name    TEXT NOT NULL,
    message        TEXT NOT NULL,
    severity       TEXT NOT NULL,
    result_status  TEXT NOT NULL,
    timestamp      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS api_keys (
    name    TEXT PRIMARY KEY,
    secret  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS resources_name_idx        ON resources(canonical_name);
CREATE INDEX IF NOT EXISTS pending_project_time_idx  ON pending_updates(project_id, timestamp);
CREATE INDEX IF NOT EXISTS pending_time_idx          ON pending_updates(timestamp);

PRAGMA user_version = 1;
";

/// Table names backing one plugin.
#[derive(Debug, Clone)]
pub struct Namespace {
  pub results:    String,
  pub subresults: String,
}

impl Namespace {
  /// Validated table names for `plugin`. The name is interpolated into SQL,
  /// so anything beyond `[a-z0-9_]` is refused.
  pub fn for_plugin(plugin: &str) -> Result<Self> {
    if !is_valid_plugin_name(plugin) {
      return Err(Error::InvalidNamespace(plugin.to_owned()));
    }
    Ok(Self {
      results:    format!("results_{plugin}"),
      subresults: format!("subresults_{plugin}"),
    })
  }
}

/// DDL creating both tables of a plugin namespace.
pub fn namespace_ddl(ns: &Namespace) -> String {
  let Namespace {
    results,
    subresults,
  } = ns;
  format!(
    "
CREATE TABLE IF NOT EXISTS {results} (
    record_id      TEXT PRIMARY KEY,
    resource_id    TEXT NOT NULL,
    payload        TEXT NOT NULL,
    result_status  TEXT NOT NULL,
    recorded_at    TEXT NOT NULL,
    timestamp      TEXT NOT NULL,
    content_hash   TEXT            -- NULL for rows written without a hash
);

CREATE INDEX IF NOT EXISTS {results}_resource_idx ON {results}(resource_id, timestamp);

CREATE TABLE IF NOT EXISTS {subresults} (
    sub_id  TEXT PRIMARY KEY,
    value   TEXT NOT NULL
);
"
  )
}

/// DDL removing a plugin namespace.
pub fn drop_namespace_ddl(ns: &Namespace) -> String {
  format!(
    "DROP TABLE IF EXISTS {}; DROP TABLE IF EXISTS {};",
    ns.results, ns.subresults
  )
}

pub fn table_exists(conn: &rusqlite::Connection, name: &str) -> rusqlite::Result<bool> {
  conn.query_row(
    "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
    rusqlite::params![name],
    |row| row.get(0),
  )
}
