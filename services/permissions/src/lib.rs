//! Rendering permission runtime.
//!
//! # Purpose
//! Fetches per-rendering permission snapshots from the authorization service,
//! caches them with background refresh, and answers browse, segment, scope,
//! and smart-action checks from the cached state.
//!
//! # Notes
//! Every decision fails closed. Lookups that cannot be resolved deny instead
//! of surfacing errors to the caller.
pub mod cache;
pub mod config;
pub mod decision;
pub mod fetcher;
pub mod observability;
pub mod scope;
pub mod segments;

pub use cache::PermissionSnapshotCache;
pub use config::PermissionsConfig;
pub use decision::{
    AuthorizationDecisionEngine, BrowseRequest, CollectionActionOracle, CollectionActionRequest,
    SegmentRequest, SnapshotActionOracle,
};
pub use fetcher::{FetchError, HttpSnapshotFetcher, SnapshotFetcher};
pub use scope::ScopeResolver;
pub use segments::SegmentPermissionResolver;

#[cfg(test)]
// Scripted fetchers and fixtures for the unit tests.
mod test_support;
