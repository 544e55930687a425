//! Rendering authorization primitives shared by the permission runtime.
//!
//! # Purpose
//! Centralizes the permission snapshot model, typed identifiers, scope
//! filters, and the segment-query matching used to authorize browse requests
//! within a rendering.
//!
//! # How it fits
//! The remote authorization service publishes one permission snapshot per
//! rendering. The `permissions` service fetches and caches those snapshots
//! and evaluates decisions with the types and matchers from this crate.
//!
//! # Key invariants
//! - Everything here is pure data and pure functions; no I/O.
//! - Matching is deny-by-default: unknown segments, smart segments, empty or
//!   malformed queries never authorize anything.
//!
//! # Examples
//! ```rust
//! use rendering_authz::{Segment, SegmentQueryMatcher, UNION_SENTINEL};
//!
//! let segments = vec![
//!     Segment::manual("1", "Books", "SELECT * FROM books"),
//!     Segment::manual("2", "Authors", "SELECT * FROM authors"),
//! ];
//! let matcher = SegmentQueryMatcher::from_segments(&segments);
//! assert!(matcher.allows("SELECT * FROM books;"));
//! let combined = format!("SELECT * FROM books{UNION_SENTINEL} UNION SELECT * FROM authors");
//! assert!(matcher.allows(&combined));
//! ```
//!
//! # Common pitfalls
//! - Comparing raw query strings without [`normalize_query`] rejects queries
//!   that only differ by a trailing `;`.
//! - Treating a missing collection as "no restriction" instead of a denial.

mod action;
mod errors;
mod matcher;
mod scope;
mod snapshot;
mod types;

pub use action::CollectionAction;
pub use errors::{AuthzError, AuthzResult};
pub use matcher::{
    SegmentQueryMatcher, UNION_SENTINEL, is_union_query, matches_all_branches, normalize_query,
    split_union,
};
pub use scope::{
    Aggregator, CURRENT_USER_PREFIX, Condition, ConditionTree, DynamicScopeValues, ScopeFilter,
};
pub use snapshot::{
    CollectionPermission, RenderingPermissionSnapshot, Segment, SegmentKind,
    SmartActionPermission,
};
pub use types::{CollectionName, RenderingId, UserId};
