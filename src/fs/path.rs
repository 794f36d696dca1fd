//! Remote path values and the navigation stack.

use std::fmt;

/// A location in the remote hierarchy.
///
/// Paths are plain values: an operation clones the path it was issued
/// against and never observes later navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemotePath {
    segments: Vec<String>,
}

impl RemotePath {
    /// The root directory (empty segment list).
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from directory names. Empty names are dropped.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    /// Parse a slash separated path ("/", "/docs", "docs//2024/").
    pub fn parse(path: &str) -> Self {
        Self::new(path.split('/'))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Last segment, `None` at the root.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path of a direct child.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    /// Path one level up, `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments })
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl From<&str> for RemotePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

/// The currently displayed location.
#[derive(Debug, Clone, Default)]
pub struct PathStack {
    current: RemotePath,
}

impl PathStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live path. Callers that outlive this borrow must clone it.
    pub fn current(&self) -> &RemotePath {
        &self.current
    }

    /// Enter a subdirectory.
    pub fn push(&mut self, name: &str) {
        self.current.segments.push(name.to_string());
    }

    /// Go up one level. Returns `false` (and does nothing) at the root.
    pub fn pop(&mut self) -> bool {
        self.current.segments.pop().is_some()
    }

    /// Whether `path` is what the user is looking at right now.
    pub fn is_current(&self, path: &RemotePath) -> bool {
        &self.current == path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(RemotePath::parse("/"), RemotePath::root());
        assert_eq!(RemotePath::parse(""), RemotePath::root());
        assert_eq!(RemotePath::parse("/foo/"), RemotePath::new(["foo"]));
        assert_eq!(RemotePath::parse("foo//bar"), RemotePath::new(["foo", "bar"]));
    }

    #[test]
    fn test_display() {
        assert_eq!(RemotePath::root().to_string(), "/");
        assert_eq!(RemotePath::new(["a", "b"]).to_string(), "/a/b");
    }

    #[test]
    fn test_child_and_parent() {
        let docs = RemotePath::root().child("docs");
        assert_eq!(docs.name(), Some("docs"));
        assert_eq!(docs.parent(), Some(RemotePath::root()));
        assert_eq!(RemotePath::root().parent(), None);
        assert_eq!(docs.child("2024").depth(), 2);
    }

    #[test]
    fn test_push_then_pop_restores() {
        let mut stack = PathStack::new();
        stack.push("docs");
        let before = stack.current().clone();

        stack.push("x");
        assert_eq!(stack.current(), &RemotePath::new(["docs", "x"]));
        assert!(stack.pop());
        assert_eq!(stack.current(), &before);
    }

    #[test]
    fn test_pop_at_root_is_noop() {
        let mut stack = PathStack::new();
        assert!(!stack.pop());
        assert!(stack.current().is_root());
    }

    #[test]
    fn test_captured_path_is_independent() {
        let mut stack = PathStack::new();
        stack.push("a");
        let captured = stack.current().clone();
        stack.push("b");
        assert_eq!(captured, RemotePath::new(["a"]));
        assert!(!stack.is_current(&captured));
    }
}
