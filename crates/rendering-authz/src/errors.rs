use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("invalid rendering id: {0}")]
    InvalidRenderingId(String),
    #[error("invalid collection action: {0}")]
    InvalidAction(String),
    #[error("permissions unavailable for rendering {rendering}: {reason}")]
    SnapshotUnavailable { rendering: String, reason: String },
    #[error("malformed union segment query: {0}")]
    MalformedUnionQuery(String),
    #[error("no dynamic scope value {key} for user {user}")]
    UnresolvedScopeValue { user: String, key: String },
}

pub type AuthzResult<T> = Result<T, AuthzError>;
