//! [`SqliteStore`]: the SQLite implementation of [`IntelStore`] and
//! [`CredentialStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use serde_json::Value;
use uuid::Uuid;
use vigil_core::{
  plugin::PluginDescriptor,
  record::{PendingUpdate, PluginResultRecord, ResultFingerprint},
  resource::{Resource, ResourceType, Tag},
  store::{CredentialStore, IntelStore},
};

use crate::{
  Error, Result,
  encode::{
    RESOURCE_COLUMNS, RESULT_COLUMNS, RawResource, RawResult, RawUpdate, UPDATE_COLUMNS,
    decode_dt, decode_uuid, encode_dt, encode_uuid, usable_hash,
  },
  schema::{Namespace, SCHEMA, drop_namespace_ddl, namespace_ddl, table_exists},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Vigil intel store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Write `record` with an explicit, possibly absent, content hash. Rows
  /// without a hash only arise from imports of older data.
  pub async fn insert_raw_result(
    &self,
    plugin: &str,
    record: PluginResultRecord,
    content_hash: Option<String>,
  ) -> Result<()> {
    let ns = Namespace::for_plugin(plugin)?;
    let ddl = namespace_ddl(&ns);
    let sql = format!(
      "INSERT INTO {} ({RESULT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
      ns.results
    );

    let record_id = encode_uuid(record.record_id);
    let resource_id = encode_uuid(record.resource_id);
    let payload = serde_json::to_string(&record.payload)?;
    let status = record.result_status.as_str();
    let recorded_at = encode_dt(record.recorded_at);
    let timestamp = encode_dt(record.timestamp);

    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&ddl)?;
        conn.execute(
          &sql,
          rusqlite::params![
            record_id,
            resource_id,
            payload,
            status,
            recorded_at,
            timestamp,
            content_hash,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn resource_where(
    &self,
    clause: &'static str,
    a: String,
    b: Option<String>,
  ) -> Result<Option<Resource>> {
    let sql = format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE {clause}");
    let raw: Option<RawResource> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let row = match b {
          Some(b) => stmt
            .query_row(rusqlite::params![a, b], RawResource::from_row)
            .optional()?,
          None => stmt
            .query_row(rusqlite::params![a], RawResource::from_row)
            .optional()?,
        };
        Ok(row)
      })
      .await?;

    raw.map(RawResource::into_resource).transpose()
  }
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 2);
  out.push('%');
  for c in text.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

// ─── IntelStore impl ─────────────────────────────────────────────────────────

impl IntelStore for SqliteStore {
  type Error = Error;

  // ── Resources ─────────────────────────────────────────────────────────────

  async fn insert_resource_if_absent(&self, resource: Resource) -> Result<(Resource, bool)> {
    let id_str = encode_uuid(resource.resource_id);
    let type_str = resource.resource_type.as_str();
    let key = resource.lookup_key().to_owned();
    let name = resource.canonical_name.clone();
    let created_at = encode_dt(resource.created_at);
    let tags = serde_json::to_string(&resource.tags)?;
    let details = serde_json::to_string(&resource.details)?;
    let revision = i64::try_from(resource.revision)
      .map_err(|_| Error::Decode(format!("revision {} out of range", resource.revision)))?;

    // Insert and read back on the connection thread so no other write can
    // interleave between the conflict and the lookup.
    let (inserted, raw): (bool, Option<RawResource>) = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "INSERT INTO resources (
             resource_id, canonical_name, resource_type, lookup_key,
             created_at, tags, details, revision
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT (resource_type, lookup_key) DO NOTHING",
          rusqlite::params![id_str, name, type_str, key, created_at, tags, details, revision],
        )?;

        let raw = conn
          .query_row(
            &format!(
              "SELECT {RESOURCE_COLUMNS} FROM resources
               WHERE resource_type = ?1 AND lookup_key = ?2"
            ),
            rusqlite::params![type_str, key],
            RawResource::from_row,
          )
          .optional()?;
        Ok((changed == 1, raw))
      })
      .await?;

    match raw {
      Some(raw) => Ok((raw.into_resource()?, inserted)),
      // The row just inserted or conflicted with cannot vanish; the core
      // never deletes resources.
      None => Err(Error::Decode(format!(
        "resource {} missing after insert",
        resource.resource_id
      ))),
    }
  }

  async fn get_resource(&self, id: Uuid) -> Result<Option<Resource>> {
    self
      .resource_where("resource_id = ?1", encode_uuid(id), None)
      .await
  }

  async fn find_resource(
    &self,
    resource_type: ResourceType,
    lookup_key: String,
  ) -> Result<Option<Resource>> {
    self
      .resource_where(
        "resource_type = ?1 AND lookup_key = ?2",
        resource_type.as_str().to_owned(),
        Some(lookup_key),
      )
      .await
  }

  async fn search_resources(&self, text: String, limit: usize) -> Result<Vec<Resource>> {
    let pattern = like_pattern(&text);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawResource> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RESOURCE_COLUMNS} FROM resources
           WHERE canonical_name LIKE ?1 ESCAPE '\\'
              OR lookup_key LIKE ?1 ESCAPE '\\'
           ORDER BY created_at, rowid
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![pattern, limit], RawResource::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawResource::into_resource).collect()
  }

  async fn replace_tags(&self, id: Uuid, expected_revision: u64, tags: Vec<Tag>) -> Result<bool> {
    let id_str = encode_uuid(id);
    let tags = serde_json::to_string(&tags)?;
    let Ok(expected) = i64::try_from(expected_revision) else {
      return Ok(false);
    };

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE resources SET tags = ?1, revision = revision + 1
           WHERE resource_id = ?2 AND revision = ?3",
          rusqlite::params![tags, id_str, expected],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  // ── Plugin results ────────────────────────────────────────────────────────

  async fn latest_fingerprint(
    &self,
    resource_id: Uuid,
    plugin: String,
  ) -> Result<Option<ResultFingerprint>> {
    let ns = Namespace::for_plugin(&plugin)?;
    let resource_id = encode_uuid(resource_id);

    let row: Option<(String, Option<String>)> = self
      .conn
      .call(move |conn| {
        if !table_exists(conn, &ns.results)? {
          return Ok(None);
        }
        Ok(conn
          .query_row(
            &format!(
              "SELECT record_id, content_hash FROM {}
               WHERE resource_id = ?1
               ORDER BY timestamp DESC, rowid DESC
               LIMIT 1",
              ns.results
            ),
            rusqlite::params![resource_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?)
      })
      .await?;

    row
      .map(|(id, hash)| {
        Ok(ResultFingerprint {
          record_id:    decode_uuid(&id)?,
          content_hash: usable_hash(hash),
        })
      })
      .transpose()
  }

  async fn insert_result(&self, record: PluginResultRecord) -> Result<()> {
    let plugin = record.plugin_name.clone();
    let hash = Some(record.content_hash.clone());
    self.insert_raw_result(&plugin, record, hash).await
  }

  async fn touch_result(&self, plugin: String, record_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
    let ns = Namespace::for_plugin(&plugin)?;
    let record_id = encode_uuid(record_id);
    let at = encode_dt(at);

    let changed = self
      .conn
      .call(move |conn| {
        if !table_exists(conn, &ns.results)? {
          return Ok(0);
        }
        Ok(conn.execute(
          &format!("UPDATE {} SET timestamp = ?1 WHERE record_id = ?2", ns.results),
          rusqlite::params![at, record_id],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  async fn list_results(&self, resource_id: Uuid, plugin: String) -> Result<Vec<PluginResultRecord>> {
    let ns = Namespace::for_plugin(&plugin)?;
    let resource_id = encode_uuid(resource_id);

    let raws: Vec<RawResult> = self
      .conn
      .call(move |conn| {
        if !table_exists(conn, &ns.results)? {
          return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&format!(
          "SELECT {RESULT_COLUMNS} FROM {}
           WHERE resource_id = ?1
           ORDER BY timestamp DESC, rowid DESC",
          ns.results
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![resource_id], RawResult::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(|r| r.into_record(&plugin)).collect()
  }

  async fn put_sub_result(&self, plugin: String, value: Value) -> Result<Uuid> {
    let ns = Namespace::for_plugin(&plugin)?;
    let ddl = namespace_ddl(&ns);
    let id = Uuid::new_v4();
    let id_str = encode_uuid(id);
    let value = serde_json::to_string(&value)?;

    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&ddl)?;
        conn.execute(
          &format!("INSERT INTO {} (sub_id, value) VALUES (?1, ?2)", ns.subresults),
          rusqlite::params![id_str, value],
        )?;
        Ok(())
      })
      .await?;
    Ok(id)
  }

  async fn get_sub_result(&self, plugin: String, id: Uuid) -> Result<Option<Value>> {
    let ns = Namespace::for_plugin(&plugin)?;
    let id = encode_uuid(id);

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        if !table_exists(conn, &ns.subresults)? {
          return Ok(None);
        }
        Ok(conn
          .query_row(
            &format!("SELECT value FROM {} WHERE sub_id = ?1", ns.subresults),
            rusqlite::params![id],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    Ok(
      raw
        .map(|s| serde_json::from_str::<Value>(&s))
        .transpose()?,
    )
  }

  async fn drop_plugin_namespace(&self, plugin: String) -> Result<()> {
    let ns = Namespace::for_plugin(&plugin)?;
    let ddl = drop_namespace_ddl(&ns);
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&ddl)?;
        Ok(())
      })
      .await?;
    tracing::info!(%plugin, "dropped plugin namespace");
    Ok(())
  }

  // ── Registry ──────────────────────────────────────────────────────────────

  async fn replace_plugins(&self, descriptors: Vec<PluginDescriptor>) -> Result<()> {
    let rows = descriptors
      .iter()
      .map(|d| serde_json::to_string(d).map(|json| (d.name.clone(), json)))
      .collect::<serde_json::Result<Vec<(String, String)>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM plugins", [])?;
        {
          let mut stmt = tx.prepare("INSERT INTO plugins (name, descriptor) VALUES (?1, ?2)")?;
          for (name, json) in &rows {
            stmt.execute(rusqlite::params![name, json])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_plugins(&self) -> Result<Vec<PluginDescriptor>> {
    let raws: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT descriptor FROM plugins ORDER BY name")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .iter()
      .map(|s| serde_json::from_str(s).map_err(Error::from))
      .collect()
  }

  // ── Pending updates ───────────────────────────────────────────────────────

  async fn append_update(&self, update: PendingUpdate) -> Result<()> {
    let update_id = encode_uuid(update.update_id);
    let project_id = encode_uuid(update.project_id);
    let resource_id = encode_uuid(update.resource_id);
    let severity = update.severity.as_str();
    let status = update.result_status.as_str();
    let timestamp = encode_dt(update.timestamp);
    let PendingUpdate {
      plugin_name,
      message,
      ..
    } = update;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!("INSERT INTO pending_updates ({UPDATE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
          rusqlite::params![
            update_id,
            project_id,
            resource_id,
            plugin_name,
            message,
            severity,
            status,
            timestamp,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn updates_until(&self, project_id: Uuid, cutoff: DateTime<Utc>) -> Result<Vec<PendingUpdate>> {
    let project_id = encode_uuid(project_id);
    let cutoff = encode_dt(cutoff);

    let raws: Vec<RawUpdate> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {UPDATE_COLUMNS} FROM pending_updates
           WHERE project_id = ?1 AND timestamp <= ?2
           ORDER BY timestamp ASC, rowid ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![project_id, cutoff], RawUpdate::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUpdate::into_update).collect()
  }

  async fn purge_updates_until(&self, threshold: DateTime<Utc>) -> Result<u64> {
    let threshold = encode_dt(threshold);
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM pending_updates WHERE timestamp <= ?1",
          rusqlite::params![threshold],
        )?)
      })
      .await?;
    Ok(deleted as u64)
  }

  async fn last_update_at(&self) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT MAX(timestamp) FROM pending_updates", [], |row| {
          row.get(0)
        })?)
      })
      .await?;

    raw.as_deref().map(decode_dt).transpose()
  }
}

// ─── CredentialStore impl ────────────────────────────────────────────────────

impl CredentialStore for SqliteStore {
  type Error = Error;

  async fn get_api_key(&self, name: String) -> Result<Option<String>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn
            .query_row(
              "SELECT secret FROM api_keys WHERE name = ?1",
              rusqlite::params![name],
              |row| row.get(0),
            )
            .optional()?)
        })
        .await?,
    )
  }

  async fn set_api_key(&self, name: String, secret: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO api_keys (name, secret) VALUES (?1, ?2)
           ON CONFLICT (name) DO UPDATE SET secret = excluded.secret",
          rusqlite::params![name, secret],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn remove_api_key(&self, name: String) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM api_keys WHERE name = ?1", rusqlite::params![name])?)
      })
      .await?;
    Ok(deleted == 1)
  }

  async fn api_key_names(&self) -> Result<Vec<String>> {
    Ok(
      self
        .conn
        .call(|conn| {
          let mut stmt = conn.prepare("SELECT name FROM api_keys ORDER BY name")?;
          let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }
}
