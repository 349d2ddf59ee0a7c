//! Route matching logic.
//!
//! # Design Decisions
//! - Prefixes match at a path segment boundary: `/api/users` matches
//!   `/api/users` and `/api/users/42`, never `/api/usersx`
//! - Matching is ASCII case-insensitive (`/API/Users` hits `/api/users`)
//! - No regex to guarantee O(n) matching

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. A trailing `/` is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            prefix: if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() },
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Length of the matched prefix in `path`, if it matches.
    fn matched_len(&self, path: &str) -> Option<usize> {
        if self.prefix == "/" {
            return Some(0);
        }

        let len = self.prefix.len();
        let head = path.get(..len)?;
        if !head.eq_ignore_ascii_case(&self.prefix) {
            return None;
        }

        match path.as_bytes().get(len) {
            None | Some(b'/') => Some(len),
            Some(_) => None,
        }
    }

    pub fn matches_path(&self, path: &str) -> bool {
        self.matched_len(path).is_some()
    }

    /// Remove the prefix from `path`, returning the remainder (`/` when empty).
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        let len = self.matched_len(path)?;
        let rest = &path[len..];
        Some(if rest.is_empty() { "/" } else { rest })
    }
}
