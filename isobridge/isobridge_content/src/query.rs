//! Query cursors over bundle objects.

use parking_lot::Mutex;
use std::fmt;

/// A cursor over the urls matched by a bundle query.
///
/// A cursor is never empty when created; the engine reports an empty result
/// instead of producing one.
#[derive(Debug)]
pub struct QueryCursor {
    pattern: String,
    urls: Vec<String>,
    position: Mutex<usize>,
}

impl QueryCursor {
    pub(crate) fn new(pattern: String, urls: Vec<String>) -> Self {
        Self {
            pattern,
            urls,
            position: Mutex::new(0),
        }
    }

    /// The url under the cursor, if the cursor is not exhausted.
    pub fn current(&self) -> Option<String> {
        let position = *self.position.lock();
        self.urls.get(position).cloned()
    }

    /// Move past the current url.
    ///
    /// Returns `true` if another url is available.
    pub fn advance(&self) -> bool {
        let mut position = self.position.lock();
        if *position < self.urls.len() {
            *position += 1;
        }
        *position < self.urls.len()
    }

    /// Number of urls not yet consumed, including the current one.
    pub fn remaining(&self) -> usize {
        self.urls.len().saturating_sub(*self.position.lock())
    }

    /// Total number of matched urls.
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Whether the query matched nothing.
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

impl fmt::Display for QueryCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "query '{}' ({} of {} remaining)",
            self.pattern,
            self.remaining(),
            self.urls.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor() {
        let cursor = QueryCursor::new("**".into(), vec!["a".into(), "b".into()]);
        assert_eq!(cursor.current().as_deref(), Some("a"));
        assert!(cursor.advance());
        assert_eq!(cursor.current().as_deref(), Some("b"));
        assert_eq!(cursor.to_string(), "query '**' (1 of 2 remaining)");
        assert!(!cursor.advance());
        assert!(cursor.current().is_none());
        assert!(!cursor.advance());
        assert_eq!(cursor.remaining(), 0);
    }
}
