//! Segment lookup with retry-once reconciliation.
//!
//! A collection that is missing from the snapshot, or present with no
//! segments, is ambiguous: it may have none, or it may have been created
//! after the snapshot was fetched. The resolver reloads the rendering once to
//! tell the two apart and then gives up. A call never performs more than two
//! fetches.
use crate::cache::PermissionSnapshotCache;
use rendering_authz::{
    AuthzResult, CollectionName, RenderingId, RenderingPermissionSnapshot, Segment,
};

enum SegmentLookup {
    Found(Vec<Segment>),
    Ambiguous,
}

impl SegmentLookup {
    fn inspect(snapshot: &RenderingPermissionSnapshot, collection: &CollectionName) -> Self {
        match snapshot.collection(collection.as_str()) {
            Some(permission) if !permission.segments.is_empty() => {
                Self::Found(permission.segments.clone())
            }
            _ => Self::Ambiguous,
        }
    }
}

#[derive(Clone)]
pub struct SegmentPermissionResolver {
    cache: PermissionSnapshotCache,
}

impl SegmentPermissionResolver {
    pub fn new(cache: PermissionSnapshotCache) -> Self {
        Self { cache }
    }

    /// Segments configured on `collection`, or `None` when none are known
    /// even after one forced reload.
    ///
    /// # Errors
    /// - [`rendering_authz::AuthzError::SnapshotUnavailable`] when a
    ///   synchronous fetch fails.
    pub async fn resolve_segments(
        &self,
        rendering: RenderingId,
        collection: &CollectionName,
    ) -> AuthzResult<Option<Vec<Segment>>> {
        let snapshot = self.cache.get(rendering).await?;
        if let SegmentLookup::Found(segments) = SegmentLookup::inspect(&snapshot, collection) {
            return Ok(Some(segments));
        }

        tracing::debug!(
            rendering = %rendering,
            collection = %collection,
            "collection segments unknown; reloading permissions once"
        );
        let snapshot = self.cache.force_reload(rendering).await?;
        match SegmentLookup::inspect(&snapshot, collection) {
            SegmentLookup::Found(segments) => Ok(Some(segments)),
            SegmentLookup::Ambiguous => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{BOOKS_QUERY, ScriptedFetcher, Step, books_snapshot};
    use rendering_authz::{AuthzError, CollectionPermission};
    use std::sync::Arc;
    use std::time::Duration;

    fn resolver(fetcher: &Arc<ScriptedFetcher>) -> SegmentPermissionResolver {
        SegmentPermissionResolver::new(PermissionSnapshotCache::with_settings(
            fetcher.clone(),
            Duration::from_secs(300),
            Duration::from_secs(1),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn known_segments_need_one_fetch() -> AuthzResult<()> {
        let fetcher = Arc::new(ScriptedFetcher::always(books_snapshot()));
        let segments = resolver(&fetcher)
            .resolve_segments(RenderingId::new(1), &CollectionName::new("books"))
            .await?
            .expect("segments");
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].query.as_deref(), Some(BOOKS_QUERY));
        assert_eq!(fetcher.calls(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_collection_retries_once_then_gives_up() -> AuthzResult<()> {
        let fetcher = Arc::new(ScriptedFetcher::always(books_snapshot()));
        let resolver = resolver(&fetcher);
        let result = resolver
            .resolve_segments(RenderingId::new(1), &CollectionName::new("authors"))
            .await?;
        assert!(result.is_none());
        assert_eq!(fetcher.calls(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn empty_segments_are_treated_as_unknown() -> AuthzResult<()> {
        let snapshot = books_snapshot().with_collection(
            "authors",
            CollectionPermission {
                browse_enabled: true,
                ..Default::default()
            },
        );
        let fetcher = Arc::new(ScriptedFetcher::always(snapshot));
        let result = resolver(&fetcher)
            .resolve_segments(RenderingId::new(1), &CollectionName::new("authors"))
            .await?;
        assert!(result.is_none());
        assert_eq!(fetcher.calls(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn collection_created_after_first_fetch_is_found_on_reload() -> AuthzResult<()> {
        let stale = RenderingPermissionSnapshot::default();
        let script = ScriptedFetcher::always(books_snapshot()).then(Step::Ok(stale));
        let fetcher = Arc::new(script);
        let segments = resolver(&fetcher)
            .resolve_segments(RenderingId::new(1), &CollectionName::new("books"))
            .await?;
        assert_eq!(segments.map(|segments| segments.len()), Some(3));
        assert_eq!(fetcher.calls(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_misses_stay_bounded_per_call() -> AuthzResult<()> {
        let fetcher = Arc::new(ScriptedFetcher::always(RenderingPermissionSnapshot::default()));
        let resolver = resolver(&fetcher);
        let books = CollectionName::new("books");
        for round in 1..=3 {
            assert!(resolver.resolve_segments(RenderingId::new(1), &books).await?.is_none());
            assert!(fetcher.calls() <= round * 2);
        }
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reload_keeps_cached_snapshot_readable() -> AuthzResult<()> {
        let fetcher = Arc::new(ScriptedFetcher::failing().then(Step::Ok(books_snapshot())));
        let cache = PermissionSnapshotCache::with_settings(
            fetcher.clone(),
            Duration::from_secs(300),
            Duration::from_secs(1),
        );
        let resolver = SegmentPermissionResolver::new(cache.clone());
        cache.get(RenderingId::new(1)).await?;

        let err = resolver
            .resolve_segments(RenderingId::new(1), &CollectionName::new("authors"))
            .await
            .expect_err("unavailable");
        assert!(matches!(err, AuthzError::SnapshotUnavailable { .. }));

        let snapshot = cache.get(RenderingId::new(1)).await?;
        assert!(snapshot.collection("books").is_some());
        assert_eq!(fetcher.calls(), 2);

        let segments = resolver
            .resolve_segments(RenderingId::new(1), &CollectionName::new("books"))
            .await?;
        assert_eq!(segments.map(|segments| segments.len()), Some(3));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reload_surfaces_unavailable() {
        let fetcher = Arc::new(
            ScriptedFetcher::failing().then(Step::Ok(RenderingPermissionSnapshot::default())),
        );
        let err = resolver(&fetcher)
            .resolve_segments(RenderingId::new(1), &CollectionName::new("books"))
            .await
            .expect_err("unavailable");
        assert!(matches!(err, AuthzError::SnapshotUnavailable { .. }));
        assert_eq!(fetcher.calls(), 2);
    }
}
