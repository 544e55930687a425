// Scope lookup for a collection within a rendering.
// Reads through the snapshot cache; an expired entry is served as-is while a
// background refresh catches up.
use crate::cache::PermissionSnapshotCache;
use rendering_authz::{AuthzResult, CollectionName, ConditionTree, RenderingId, ScopeFilter, UserId};

#[derive(Clone)]
pub struct ScopeResolver {
    cache: PermissionSnapshotCache,
}

impl ScopeResolver {
    pub fn new(cache: PermissionSnapshotCache) -> Self {
        Self { cache }
    }

    /// Scope filter configured on `collection`, or `None` when the collection
    /// is unscoped or unknown to the snapshot.
    pub async fn scope_for(
        &self,
        rendering: RenderingId,
        collection: &CollectionName,
    ) -> AuthzResult<Option<ScopeFilter>> {
        let snapshot = self.cache.get(rendering).await?;
        Ok(snapshot
            .collection(collection.as_str())
            .and_then(|permission| permission.scope.clone()))
    }

    /// Scope filter with `$currentUser` placeholders replaced by `user`'s values.
    pub async fn scope_for_user(
        &self,
        rendering: RenderingId,
        collection: &CollectionName,
        user: &UserId,
    ) -> AuthzResult<Option<ConditionTree>> {
        match self.scope_for(rendering, collection).await? {
            Some(scope) => scope.resolve_for(user).map(Some),
            None => Ok(None),
        }
    }
}
