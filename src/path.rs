//! Path patterns and prefix handling.
//!
//! Patterns accept both the `matchit` syntax (`/users/{id}`, `/files/{*rest}`)
//! and the colon syntax common in route configuration files
//! (`/users/:id`, `/files/*rest`). Colon syntax is rewritten before it
//! reaches `matchit`, so the two forms are interchangeable.

use std::collections::HashMap;
use std::fmt;

use matchit::Router as MatchitRouter;

use crate::error::Error;

/// A compiled, single-route path matcher.
///
/// ```rust
/// use route_schema::path::{PathPattern, create_prefix};
///
/// let pattern = PathPattern::new(&create_prefix("/api", "/users/:id")).unwrap();
/// let params = pattern.matches("/api/users/42").unwrap();
/// assert_eq!(params["id"], "42");
/// assert!(pattern.matches("/users/42").is_none());
/// ```
pub struct PathPattern {
    pattern: String,
    tree: MatchitRouter<()>,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Result<Self, Error> {
        let mut tree = MatchitRouter::new();
        tree.insert(normalize(pattern), ())
            .map_err(|source| Error::InvalidRoute { route: pattern.to_owned(), source })?;
        Ok(Self { pattern: pattern.to_owned(), tree })
    }

    /// The pattern as given to [`new`](Self::new).
    pub fn as_str(&self) -> &str { &self.pattern }

    /// Tests `path`; on a match returns the extracted parameters, which is
    /// an empty map for a pattern without parameters.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let matched = self.tree.at(path).ok()?;
        Some(
            matched.params.iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        )
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.pattern).finish()
    }
}

/// Rewrites colon-style segments into `matchit` syntax.
///
/// `:id` becomes `{id}` and `*rest` becomes `{*rest}`. Segments that already
/// use braces, and literal segments, pass through untouched.
pub(crate) fn normalize(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':').filter(|n| !n.is_empty()) {
                format!("{{{name}}}")
            } else if let Some(name) = segment.strip_prefix('*').filter(|n| !n.is_empty()) {
                format!("{{*{name}}}")
            } else {
                segment.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins `prefix` and `pattern` into one absolute pattern.
///
/// One leading and one trailing `/` are stripped from each side before
/// joining, and an empty prefix contributes nothing:
///
/// | prefix | pattern | result |
/// |---|---|---|
/// | `""` | `/users/:id` | `/users/:id` |
/// | `/api` | `/users/:id` | `/api/users/:id` |
/// | `/api/` | `users` | `/api/users` |
pub fn create_prefix(prefix: &str, pattern: &str) -> String {
    let path = trim_one_slash(pattern);
    let clean = trim_one_slash(prefix);
    if clean.is_empty() {
        format!("/{path}")
    } else {
        format!("/{clean}/{path}")
    }
}

/// Loose prefix comparison: either prefix contains the other.
///
/// Used to warn, not to refuse, when validation and router prefixes
/// disagree.
pub fn same_prefix(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

fn trim_one_slash(s: &str) -> &str {
    let s = s.strip_prefix('/').unwrap_or(s);
    s.strip_suffix('/').unwrap_or(s)
}
