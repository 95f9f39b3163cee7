use std::collections::VecDeque;
use std::fmt;

use super::RouteError;

/// Remaining path segments of one dispatch, consumed left to right.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePath {
    segments: VecDeque<String>,
}

impl ResourcePath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { segments: segments.into_iter().map(Into::into).collect() }
    }

    /// Split a slash-separated path, dropping empty segments ("/a//b/" -> ["a", "b"]).
    pub fn parse(raw: &str) -> Self {
        Self::new(raw.split('/').filter(|s| !s.is_empty()))
    }

    pub fn pop_front(&mut self) -> Option<String> {
        self.segments.pop_front()
    }

    pub fn peek(&self) -> Option<&str> {
        self.segments.front().map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// A resolved method must leave nothing behind; leftovers are a routing bug.
    pub fn ensure_consumed(&self) -> Result<(), RouteError> {
        if self.segments.is_empty() {
            Ok(())
        } else {
            Err(RouteError::Unconsumed(self.segments.iter().cloned().collect()))
        }
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.segments.iter().map(|s| s.as_str()).collect();
        write!(f, "/{}", joined.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_drops_empty_segments() {
        let p = ResourcePath::parse("/games//alpha/");
        assert_eq!(p.len(), 2);
        assert_eq!(p.peek(), Some("games"));
        assert_eq!(p.to_string(), "/games/alpha");
    }

    #[test]
    fn consumption_is_checked() {
        let mut p = ResourcePath::new(["a", "b"]);
        assert_eq!(p.pop_front().as_deref(), Some("a"));
        assert!(matches!(p.ensure_consumed(), Err(RouteError::Unconsumed(rest)) if rest == vec!["b".to_string()]));
        p.pop_front();
        assert!(p.ensure_consumed().is_ok());
        assert_eq!(p.pop_front(), None);
    }
}
