//! Resources: the indicators Vigil tracks and runs plugins against.
//!
//! A resource owns an identity, a canonical name and a closed
//! [`ResourceType`]. Everything a plugin might want to know about the name
//! (URL components, hash algorithm, e-mail domain) is derived exactly once at
//! creation and never recomputed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use uuid::Uuid;

use crate::{Error, Result};

// ─── ResourceType ────────────────────────────────────────────────────────────

/// The closed set of resource kinds.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum ResourceType {
  #[strum(serialize = "domain")]
  Domain,
  #[strum(serialize = "hash")]
  Hash,
  #[serde(rename = "ip", alias = "ipv4")]
  #[strum(to_string = "ip", serialize = "ipv4")]
  Ipv4,
  #[strum(serialize = "url")]
  Url,
  #[strum(serialize = "username")]
  Username,
  #[strum(serialize = "email")]
  Email,
  #[strum(serialize = "file")]
  File,
}

impl ResourceType {
  /// The external string form, also used as the stored discriminant.
  pub fn as_str(self) -> &'static str { self.into() }

  /// Look up a type from its external representation.
  pub fn parse(s: &str) -> Result<Self> {
    s.trim()
      .parse()
      .map_err(|_| Error::UnknownResourceType(s.to_owned()))
  }
}

// ─── HashType ────────────────────────────────────────────────────────────────

/// Hash algorithm guessed from the length of a hex digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
  Md5,
  Sha1,
  Sha256,
  Sha512,
  Unknown,
}

impl HashType {
  pub fn detect(hash: &str) -> Self {
    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
      return Self::Unknown;
    }
    match hash.len() {
      32 => Self::Md5,
      40 => Self::Sha1,
      64 => Self::Sha256,
      128 => Self::Sha512,
      _ => Self::Unknown,
    }
  }
}

// ─── Details ─────────────────────────────────────────────────────────────────

/// Type-specific fields derived from the canonical name at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceDetails {
  Domain {
    domain: String,
  },
  Hash {
    hash:      String,
    hash_type: HashType,
  },
  Ip {
    address: String,
  },
  /// URL components are `None` when the name does not parse as a URL.
  Url {
    full_url: String,
    scheme:   Option<String>,
    host:     Option<String>,
    port:     Option<u16>,
    path:     Option<String>,
    query:    Option<String>,
    fragment: Option<String>,
  },
  Username {
    username: String,
  },
  Email {
    email:      String,
    local_part: Option<String>,
    /// `None` when the address has no `@`.
    domain:     Option<String>,
  },
  File {
    filename: String,
  },
}

impl ResourceDetails {
  /// Derive the details for `name`. Pure function of its inputs.
  pub fn derive(name: &str, resource_type: ResourceType) -> Self {
    match resource_type {
      ResourceType::Domain => Self::Domain {
        domain: name.to_owned(),
      },
      ResourceType::Hash => {
        let hash = name.to_ascii_lowercase();
        let hash_type = HashType::detect(&hash);
        Self::Hash { hash, hash_type }
      }
      ResourceType::Ipv4 => Self::Ip {
        address: name.to_owned(),
      },
      ResourceType::Url => derive_url(name),
      ResourceType::Username => Self::Username {
        username: name.to_owned(),
      },
      ResourceType::Email => {
        let (local_part, domain) = match name.split_once('@') {
          Some((local, domain)) => {
            (Some(local.to_owned()), Some(domain.to_owned()))
          }
          None => (None, None),
        };
        Self::Email {
          email: name.to_owned(),
          local_part,
          domain,
        }
      }
      ResourceType::File => Self::File {
        filename: name.to_owned(),
      },
    }
  }
}

fn derive_url(name: &str) -> ResourceDetails {
  match url::Url::parse(name) {
    Ok(parsed) => ResourceDetails::Url {
      full_url: name.to_owned(),
      scheme:   Some(parsed.scheme().to_owned()),
      host:     parsed.host_str().map(str::to_owned),
      port:     parsed.port(),
      path:     Some(parsed.path().to_owned()),
      query:    parsed.query().map(str::to_owned),
      fragment: parsed.fragment().map(str::to_owned),
    },
    Err(_) => ResourceDetails::Url {
      full_url: name.to_owned(),
      scheme:   None,
      host:     None,
      port:     None,
      path:     None,
      query:    None,
      fragment: None,
    },
  }
}

// ─── Tags ────────────────────────────────────────────────────────────────────

/// A tag reference attached to a resource. The tag catalogue itself lives
/// outside the core; membership is decided by `name` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
  pub name:  String,
  pub color: Option<String>,
}

/// Toggle `tag` in `tags`: present (by name) is removed, absent is appended.
/// Returns `true` if the tag is present afterwards.
pub fn toggle_tag_in(tags: &mut Vec<Tag>, tag: &Tag) -> bool {
  let before = tags.len();
  tags.retain(|t| t.name != tag.name);
  if tags.len() == before {
    tags.push(tag.clone());
    true
  } else {
    false
  }
}

// ─── Resource ────────────────────────────────────────────────────────────────

/// A tracked indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
  pub resource_id:    Uuid,
  /// Display name. For hashes this is the first eight characters of the
  /// digest; the full digest lives in [`ResourceDetails::Hash`].
  pub canonical_name: String,
  pub resource_type:  ResourceType,
  pub created_at:     DateTime<Utc>,
  pub tags:           Vec<Tag>,
  pub details:        ResourceDetails,
  /// Bumped on every tag write; used for optimistic concurrency.
  pub revision:       u64,
}

impl Resource {
  /// The key uniqueness is enforced on within the resource's type.
  pub fn lookup_key(&self) -> &str {
    match &self.details {
      ResourceDetails::Hash { hash, .. } => hash,
      _ => &self.canonical_name,
    }
  }

  /// The full name plugins should probe (the whole digest for hashes).
  pub fn target(&self) -> &str { self.lookup_key() }
}

// ─── NewResource ─────────────────────────────────────────────────────────────

/// A validated, fully-derived resource that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewResource {
  pub canonical_name: String,
  pub resource_type:  ResourceType,
  pub lookup_key:     String,
  pub details:        ResourceDetails,
}

impl NewResource {
  /// Validate `name` and derive all type-specific fields.
  pub fn derive(name: &str, resource_type: ResourceType) -> Result<Self> {
    let name = name.trim();
    if name.is_empty() {
      return Err(Error::Validation("resource name must not be empty".into()));
    }

    let lookup_key = lookup_key_for(name, resource_type);
    let details = ResourceDetails::derive(name, resource_type);
    let canonical_name = match resource_type {
      ResourceType::Hash => lookup_key.chars().take(8).collect(),
      _ => name.to_owned(),
    };

    Ok(Self {
      canonical_name,
      resource_type,
      lookup_key,
      details,
    })
  }

  /// Assign identity and creation time.
  pub fn into_resource(self, created_at: DateTime<Utc>) -> Resource {
    Resource {
      resource_id: Uuid::new_v4(),
      canonical_name: self.canonical_name,
      resource_type: self.resource_type,
      created_at,
      tags: Vec::new(),
      details: self.details,
      revision: 0,
    }
  }
}

/// The point-lookup key for a raw `name` of the given type.
pub fn lookup_key_for(name: &str, resource_type: ResourceType) -> String {
  let name = name.trim();
  match resource_type {
    ResourceType::Hash => name.to_ascii_lowercase(),
    _ => name.to_owned(),
  }
}
