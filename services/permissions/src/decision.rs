//! Browse and smart-action decisions for a rendering.
//!
//! # Purpose
//! Combines the collection-level action check with segment-level query
//! matching to answer "may this user browse this collection, optionally
//! restricted to this segment query?".
//!
//! # Key invariants
//! - Fail closed: a missing snapshot, unknown collection, unresolved
//!   segments, oracle error, or malformed query is a denial.
//! - Decisions depend only on the snapshot and the oracle answer; repeated
//!   calls with unchanged inputs agree.
use crate::cache::PermissionSnapshotCache;
use crate::segments::SegmentPermissionResolver;
use async_trait::async_trait;
use rendering_authz::{
    AuthzResult, CollectionAction, CollectionName, RenderingId, SegmentQueryMatcher, UserId,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionActionRequest {
    pub user: UserId,
    pub rendering: RenderingId,
    pub collection: CollectionName,
    pub action: CollectionAction,
}

/// Collection-level action permission check.
#[async_trait]
pub trait CollectionActionOracle: Send + Sync {
    async fn can_on_collection(&self, request: &CollectionActionRequest) -> AuthzResult<bool>;
}

/// Answers collection-level checks from the cached rendering snapshot.
#[derive(Clone)]
pub struct SnapshotActionOracle {
    cache: PermissionSnapshotCache,
}

impl SnapshotActionOracle {
    pub fn new(cache: PermissionSnapshotCache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl CollectionActionOracle for SnapshotActionOracle {
    async fn can_on_collection(&self, request: &CollectionActionRequest) -> AuthzResult<bool> {
        let snapshot = self.cache.get(request.rendering).await?;
        Ok(snapshot
            .collection(request.collection.as_str())
            .is_some_and(|permission| permission.allows(request.action)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseRequest {
    pub user: UserId,
    pub collection: CollectionName,
    pub rendering: RenderingId,
    pub segment_query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRequest {
    pub rendering: RenderingId,
    pub collection: CollectionName,
    pub segment_query: String,
}

#[derive(Clone)]
pub struct AuthorizationDecisionEngine {
    oracle: Arc<dyn CollectionActionOracle>,
    cache: PermissionSnapshotCache,
    segments: SegmentPermissionResolver,
}

impl AuthorizationDecisionEngine {
    pub fn new(oracle: Arc<dyn CollectionActionOracle>, cache: PermissionSnapshotCache) -> Self {
        Self {
            oracle,
            segments: SegmentPermissionResolver::new(cache.clone()),
            cache,
        }
    }

    /// Engine whose collection-level checks come from the snapshot itself.
    pub fn from_cache(cache: PermissionSnapshotCache) -> Self {
        Self::new(Arc::new(SnapshotActionOracle::new(cache.clone())), cache)
    }

    /// Collection browse permission AND, when a segment query is given,
    /// segment-level permission for that query.
    pub async fn can_browse(&self, request: &BrowseRequest) -> bool {
        let allowed = self.browse_decision(request).await;
        record_decision(allowed);
        allowed
    }

    async fn browse_decision(&self, request: &BrowseRequest) -> bool {
        let action_request = CollectionActionRequest {
            user: request.user.clone(),
            rendering: request.rendering,
            collection: request.collection.clone(),
            action: CollectionAction::Browse,
        };
        match self.oracle.can_on_collection(&action_request).await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(err) => {
                tracing::debug!(
                    rendering = %request.rendering,
                    collection = %request.collection,
                    error = %err,
                    "collection browse check failed; denying"
                );
                return false;
            }
        }

        let Some(query) = request
            .segment_query
            .as_deref()
            .filter(|query| !query.trim().is_empty())
        else {
            return true;
        };
        self.can_browse_segment(&SegmentRequest {
            rendering: request.rendering,
            collection: request.collection.clone(),
            segment_query: query.to_string(),
        })
        .await
    }

    /// Whether `segment_query` is covered by the collection's manual segments.
    /// Combined queries must have every branch covered.
    pub async fn can_browse_segment(&self, request: &SegmentRequest) -> bool {
        let segments = match self
            .segments
            .resolve_segments(request.rendering, &request.collection)
            .await
        {
            Ok(Some(segments)) => segments,
            Ok(None) => {
                tracing::debug!(
                    rendering = %request.rendering,
                    collection = %request.collection,
                    "no segments known for collection; denying"
                );
                return false;
            }
            Err(err) => {
                tracing::debug!(
                    rendering = %request.rendering,
                    collection = %request.collection,
                    error = %err,
                    "segment lookup failed; denying"
                );
                return false;
            }
        };
        SegmentQueryMatcher::from_segments(&segments).allows(&request.segment_query)
    }

    /// Whether `user` may trigger the smart action `action` on `collection`.
    pub async fn can_execute_smart_action(
        &self,
        rendering: RenderingId,
        collection: &CollectionName,
        action: &str,
        user: &UserId,
    ) -> bool {
        let allowed = match self.cache.get(rendering).await {
            Ok(snapshot) => snapshot
                .collection(collection.as_str())
                .and_then(|permission| permission.smart_action(action))
                .is_some_and(|permission| permission.allows(user)),
            Err(err) => {
                tracing::debug!(
                    rendering = %rendering,
                    error = %err,
                    "smart action check failed; denying"
                );
                false
            }
        };
        record_decision(allowed);
        allowed
    }
}

fn record_decision(allowed: bool) {
    let decision = if allowed { "allow" } else { "deny" };
    metrics::counter!("authz_decision_total", "decision" => decision).increment(1);
}
