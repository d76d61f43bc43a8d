//! Resource creation, lookup and tag toggling on top of an [`IntelStore`].

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
  Error, Result,
  resource::{NewResource, Resource, ResourceType, Tag, lookup_key_for, toggle_tag_in},
  store::IntelStore,
};

/// Upper bound on optimistic retries for a single tag toggle.
const TAG_WRITE_ATTEMPTS: usize = 8;

/// Resource operations. Cheap to clone.
pub struct Resources<S> {
  store: Arc<S>,
}

impl<S> Clone for Resources<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

impl<S: IntelStore> Resources<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Validate, derive and persist a new resource.
  ///
  /// If a resource with the same `(type, lookup key)` already exists the
  /// existing one is returned instead of creating a duplicate.
  pub async fn create(&self, name: &str, resource_type: ResourceType) -> Result<Resource> {
    let (resource, _) = self.insert(name, resource_type).await?;
    Ok(resource)
  }

  /// Like [`Self::create`] but takes the type in its external string form.
  pub async fn create_from_str(&self, name: &str, resource_type: &str) -> Result<Resource> {
    self.create(name, ResourceType::parse(resource_type)?).await
  }

  /// Point lookup by name. Hashes are looked up by their full digest.
  pub async fn lookup_by_name(
    &self,
    name: &str,
    resource_type: ResourceType,
  ) -> Result<Option<Resource>> {
    let key = lookup_key_for(name, resource_type);
    if key.is_empty() {
      return Ok(None);
    }
    self
      .store
      .find_resource(resource_type, key)
      .await
      .map_err(Error::storage)
  }

  /// Return the existing resource for `(name, type)` or create it.
  ///
  /// Concurrent callers racing on the same new name all observe one
  /// resource; exactly one of them sees `created == true`. The store's
  /// uniqueness constraint settles the race.
  pub async fn get_or_create(
    &self,
    name: &str,
    resource_type: ResourceType,
  ) -> Result<(Resource, bool)> {
    if let Some(existing) = self.lookup_by_name(name, resource_type).await? {
      return Ok((existing, false));
    }
    self.insert(name, resource_type).await
  }

  pub async fn get(&self, id: Uuid) -> Result<Resource> {
    self
      .store
      .get_resource(id)
      .await
      .map_err(Error::storage)?
      .ok_or(Error::ResourceNotFound(id))
  }

  pub async fn search(&self, text: &str, limit: usize) -> Result<Vec<Resource>> {
    let text = text.trim();
    if text.is_empty() {
      return Err(Error::Validation("search with no query".into()));
    }
    self
      .store
      .search_resources(text.to_owned(), limit)
      .await
      .map_err(Error::storage)
  }

  /// Toggle `tag` on the resource: present is removed, absent is added.
  ///
  /// Each attempt writes only if nobody else wrote the tag set since it was
  /// read; a lost race re-reads and re-applies the toggle.
  pub async fn toggle_tag(&self, id: Uuid, tag: &Tag) -> Result<Resource> {
    if tag.name.trim().is_empty() {
      return Err(Error::Validation("tag name must not be empty".into()));
    }

    for attempt in 1..=TAG_WRITE_ATTEMPTS {
      let mut resource = self.get(id).await?;
      toggle_tag_in(&mut resource.tags, tag);

      let written = self
        .store
        .replace_tags(id, resource.revision, resource.tags.clone())
        .await
        .map_err(Error::storage)?;

      if written {
        resource.revision += 1;
        return Ok(resource);
      }
      tracing::debug!(resource = %id, attempt, "tag write lost a race, retrying");
    }

    Err(Error::storage(TagContention(id)))
  }

  async fn insert(
    &self,
    name: &str,
    resource_type: ResourceType,
  ) -> Result<(Resource, bool)> {
    let resource = NewResource::derive(name, resource_type)?.into_resource(Utc::now());
    let (stored, created) = self
      .store
      .insert_resource_if_absent(resource)
      .await
      .map_err(Error::storage)?;
    if created {
      tracing::info!(
        resource = %stored.resource_id,
        kind = %stored.resource_type,
        name = %stored.canonical_name,
        "created resource"
      );
    }
    Ok((stored, created))
  }
}

/// Raised when a tag toggle keeps losing optimistic-concurrency races.
#[derive(Debug, thiserror::Error)]
#[error("gave up toggling a tag on resource {0} after repeated concurrent writes")]
pub struct TagContention(pub Uuid);
