use crate::{AuthzError, AuthzResult, Segment};
use std::collections::HashSet;

/// Marker the front-end inserts between segment queries it merges into one
/// combined `UNION` query.
pub const UNION_SENTINEL: &str = "/*MULTI-SEGMENTS-QUERIES-UNION*/";

const UNION_KEYWORD: &str = "UNION";

/// Strip surrounding whitespace and a single trailing `;`.
pub fn normalize_query(query: &str) -> &str {
    let trimmed = query.trim();
    trimmed.strip_suffix(';').unwrap_or(trimmed).trim()
}

/// Whether `query` combines several segment queries.
pub fn is_union_query(query: &str) -> bool {
    query.contains(UNION_SENTINEL)
}

/// Split a combined query into its normalized branches.
///
/// Every branch after the first starts with the `UNION` keyword that joined
/// it to the previous one; that keyword is removed. A query without the
/// sentinel yields a single branch.
///
/// # Errors
/// - [`AuthzError::MalformedUnionQuery`] if any branch is empty once
///   normalized.
pub fn split_union(query: &str) -> AuthzResult<Vec<&str>> {
    let mut branches = Vec::new();
    for (index, raw) in query.split(UNION_SENTINEL).enumerate() {
        let raw = if index == 0 {
            raw
        } else {
            strip_union_keyword(raw)
        };
        let branch = normalize_query(raw);
        if branch.is_empty() {
            return Err(AuthzError::MalformedUnionQuery(query.to_string()));
        }
        branches.push(branch);
    }
    Ok(branches)
}

fn strip_union_keyword(raw: &str) -> &str {
    let trimmed = raw.trim_start();
    match trimmed.get(..UNION_KEYWORD.len()) {
        Some(head) if head.eq_ignore_ascii_case(UNION_KEYWORD) => {
            let rest = &trimmed[UNION_KEYWORD.len()..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                rest
            } else {
                trimmed
            }
        }
        _ => trimmed,
    }
}

/// Set of segment queries a user may browse on one collection.
#[derive(Debug, Clone)]
pub struct SegmentQueryMatcher<'a> {
    authorized: HashSet<&'a str>,
}

impl<'a> SegmentQueryMatcher<'a> {
    /// Collect the non-empty normalized queries of the manual segments.
    pub fn from_segments(segments: &'a [Segment]) -> Self {
        let authorized = segments
            .iter()
            .filter_map(Segment::authorized_query)
            .map(normalize_query)
            .filter(|query| !query.is_empty())
            .collect();
        Self { authorized }
    }

    /// Direct match of a single query.
    pub fn matches(&self, query: &str) -> bool {
        self.authorized.contains(normalize_query(query))
    }

    /// Every branch of a combined query must be individually authorized.
    pub fn matches_all_branches(&self, query: &str) -> bool {
        match split_union(query) {
            Ok(branches) => branches
                .iter()
                .all(|branch| self.authorized.contains(branch)),
            Err(_) => false,
        }
    }

    /// Dispatch on the presence of the union sentinel.
    pub fn allows(&self, query: &str) -> bool {
        if is_union_query(query) {
            self.matches_all_branches(query)
        } else {
            self.matches(query)
        }
    }

    /// `true` when no segment query is authorized.
    pub fn is_empty(&self) -> bool {
        self.authorized.is_empty()
    }
}

/// `true` iff every branch of `segment_query` matches an authorized manual
/// segment in `authorized_segments`.
pub fn matches_all_branches(segment_query: &str, authorized_segments: &[Segment]) -> bool {
    SegmentQueryMatcher::from_segments(authorized_segments).matches_all_branches(segment_query)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOOKS: &str = "SELECT * FROM books";
    const AUTHORS: &str = "SELECT * FROM authors";

    fn segments() -> Vec<Segment> {
        vec![
            Segment::manual("1", "Books", BOOKS),
            Segment::manual("2", "Authors", format!("{AUTHORS};")),
            Segment::smart("3", "Bestsellers"),
        ]
    }

    fn union(branches: &[&str]) -> String {
        branches.join(&format!("{UNION_SENTINEL} UNION "))
    }

    #[test]
    fn normalize_strips_single_terminator() {
        assert_eq!(normalize_query("  SELECT 1;  "), "SELECT 1");
        assert_eq!(normalize_query("SELECT 1 ;"), "SELECT 1");
        assert_eq!(normalize_query("SELECT 1;;"), "SELECT 1;");
        assert_eq!(normalize_query("select 1"), "select 1");
    }

    #[test]
    fn direct_match_ignores_terminator() {
        let segments = segments();
        let matcher = SegmentQueryMatcher::from_segments(&segments);
        assert!(matcher.allows("SELECT * FROM books;"));
        assert!(matcher.allows(AUTHORS));
        assert!(!matcher.allows("select * from books"));
        assert!(!matcher.allows("SELECT * FROM books WHERE 1=1"));
    }

    #[test]
    fn split_without_sentinel_is_single_branch() {
        assert_eq!(split_union("SELECT 1;").expect("split"), vec!["SELECT 1"]);
    }

    #[test]
    fn split_strips_union_keyword() {
        let query = format!("Q1{UNION_SENTINEL} UNION Q2;");
        assert_eq!(split_union(&query).expect("split"), vec!["Q1", "Q2"]);
        let lowercase = format!("Q1{UNION_SENTINEL} union Q2");
        assert_eq!(split_union(&lowercase).expect("split"), vec!["Q1", "Q2"]);
        // Only a whole keyword is stripped.
        let glued = format!("Q1{UNION_SENTINEL}UNIONS");
        assert_eq!(split_union(&glued).expect("split"), vec!["Q1", "UNIONS"]);
    }

    #[test]
    fn split_rejects_empty_branches() {
        for query in [
            UNION_SENTINEL.to_string(),
            format!("Q1{UNION_SENTINEL} UNION "),
            format!("{UNION_SENTINEL} UNION Q2"),
            "  ;".to_string(),
        ] {
            let err = split_union(&query).expect_err("malformed");
            assert!(matches!(err, AuthzError::MalformedUnionQuery(_)));
        }
    }

    #[test]
    fn union_requires_every_branch() {
        let segments = segments();
        assert!(matches_all_branches(&union(&[BOOKS, AUTHORS]), &segments));
        assert!(!matches_all_branches(
            &union(&[BOOKS, "SELECT * FROM users"]),
            &segments
        ));
    }

    #[test]
    fn union_ignores_order_and_duplicates() {
        let segments = segments();
        assert!(matches_all_branches(&union(&[AUTHORS, BOOKS]), &segments));
        assert!(matches_all_branches(
            &union(&[BOOKS, BOOKS, AUTHORS]),
            &segments
        ));
    }

    #[test]
    fn malformed_union_is_denied() {
        let segments = segments();
        let matcher = SegmentQueryMatcher::from_segments(&segments);
        assert!(!matcher.allows(&format!("{BOOKS}{UNION_SENTINEL} UNION ")));
    }

    #[test]
    fn smart_and_empty_segments_authorize_nothing() {
        let segments = vec![
            Segment::smart("3", "Bestsellers"),
            Segment::manual("4", "Blank", " ; "),
        ];
        let matcher = SegmentQueryMatcher::from_segments(&segments);
        assert!(matcher.is_empty());
        assert!(!matcher.allows(""));
        assert!(!matcher.allows(";"));
    }
}
