//! Permission snapshot primitives.
//!
//! # Purpose
//! Defines the permission state of one rendering as returned by the remote
//! authorization service: per-collection action flags, an optional scope
//! filter, the authorized segments, and smart-action grants.
//!
//! # How it fits
//! The snapshot fetcher decodes these types from JSON, the snapshot cache
//! shares them behind an `Arc`, and the resolvers and decision engine read
//! them without ever mutating them.
//!
//! # Key invariants
//! - A snapshot is immutable once decoded; refreshes replace it wholesale.
//! - Every field defaults when absent on the wire. Missing flags read as
//!   `false` and a segment without a `type` reads as smart, so a partially
//!   populated snapshot can only ever deny more, never allow more.
//! - Only manual segments expose a query for matching.
//!
//! # Examples
//! ```rust
//! use rendering_authz::{CollectionAction, RenderingPermissionSnapshot};
//!
//! let snapshot: RenderingPermissionSnapshot = serde_json::from_str(
//!     r#"{"collections": {"books": {"browseEnabled": true}}}"#,
//! )
//! .expect("decode snapshot");
//! let books = snapshot.collection("books").expect("books present");
//! assert!(books.allows(CollectionAction::Browse));
//! assert!(!books.allows(CollectionAction::Delete));
//! ```
use crate::{CollectionAction, CollectionName, ScopeFilter, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Full permission state of a rendering as of one successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderingPermissionSnapshot {
    #[serde(default)]
    pub collections: HashMap<CollectionName, CollectionPermission>,
}

impl RenderingPermissionSnapshot {
    /// Look up a collection's permissions by name.
    pub fn collection(&self, name: &str) -> Option<&CollectionPermission> {
        self.collections.get(name)
    }

    /// Builder-style helper used by fixtures and tests.
    pub fn with_collection(
        mut self,
        name: impl Into<String>,
        permission: CollectionPermission,
    ) -> Self {
        self.collections
            .insert(CollectionName::new(name), permission);
        self
    }
}

/// Permissions granted on one collection within a rendering.
///
/// # Invariants
/// - `segments` keeps the upstream order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectionPermission {
    pub browse_enabled: bool,
    pub read_enabled: bool,
    pub edit_enabled: bool,
    pub add_enabled: bool,
    pub delete_enabled: bool,
    pub export_enabled: bool,
    pub scope: Option<ScopeFilter>,
    pub segments: Vec<Segment>,
    pub actions: HashMap<String, SmartActionPermission>,
}

impl CollectionPermission {
    /// Return the flag backing a collection action.
    pub fn allows(&self, action: CollectionAction) -> bool {
        match action {
            CollectionAction::Browse => self.browse_enabled,
            CollectionAction::Read => self.read_enabled,
            CollectionAction::Edit => self.edit_enabled,
            CollectionAction::Add => self.add_enabled,
            CollectionAction::Delete => self.delete_enabled,
            CollectionAction::Export => self.export_enabled,
        }
    }

    /// Queries of the manual segments, in upstream order.
    pub fn authorized_queries(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::authorized_query)
    }

    /// Permission for the smart action named `name`, if configured.
    pub fn smart_action(&self, name: &str) -> Option<&SmartActionPermission> {
        self.actions.get(name)
    }
}

/// How a segment is defined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    /// Defined by code in the admin backend; never matched by query string.
    #[default]
    Smart,
    /// Defined by an explicit filter query.
    Manual,
}

/// A named subset of a collection's records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Segment {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub query: Option<String>,
}

impl Segment {
    /// Segment defined by a stored query.
    pub fn manual(
        id: impl Into<String>,
        name: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: SegmentKind::Manual,
            query: Some(query.into()),
        }
    }

    /// Segment defined in code; carries no query.
    pub fn smart(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: SegmentKind::Smart,
            query: None,
        }
    }

    /// The query this segment authorizes, if it is a manual segment.
    pub fn authorized_query(&self) -> Option<&str> {
        match self.kind {
            SegmentKind::Manual => self.query.as_deref(),
            SegmentKind::Smart => None,
        }
    }
}

/// Trigger permission for a smart action declared on a collection.
///
/// # Invariants
/// - When `allowed_users` is present the user must be listed in addition to
///   `trigger_enabled` being set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmartActionPermission {
    pub trigger_enabled: bool,
    pub allowed_users: Option<Vec<UserId>>,
}

impl SmartActionPermission {
    /// Whether `user` may trigger the action.
    pub fn allows(&self, user: &UserId) -> bool {
        if !self.trigger_enabled {
            return false;
        }
        match &self.allowed_users {
            Some(users) => users.contains(user),
            None => true,
        }
    }
}
