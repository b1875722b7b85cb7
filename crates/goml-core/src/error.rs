use crate::position::Position;
use serde::Serialize;
use std::fmt;

/// A position-tagged syntax error, from either the host grammar or a markup statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{pos}: {message}")]
pub struct SyntaxError {
    pub pos: Position,
    pub message: String,
}

/// Errors collected while tokenizing and parsing one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ErrorList(Vec<SyntaxError>);

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pos: Position, message: impl Into<String>) {
        self.0.push(SyntaxError {
            pos,
            message: message.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&SyntaxError> {
        self.0.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SyntaxError> {
        self.0.iter()
    }

    /// Sort by filename, then offset, then message.
    pub fn sort(&mut self) {
        self.0
            .sort_by(|a, b| a.pos.cmp(&b.pos).then_with(|| a.message.cmp(&b.message)));
    }

    /// Sort and keep only the first error per source line.
    pub fn remove_multiples(&mut self) {
        self.sort();
        self.0.dedup_by(|b, a| a.pos.filename == b.pos.filename && a.pos.line == b.pos.line);
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.len() {
            0 => write!(f, "no errors"),
            1 => write!(f, "{}", self.0[0]),
            n => write!(f, "{} (and {} more errors)", self.0[0], n - 1),
        }
    }
}

impl std::error::Error for ErrorList {}

impl IntoIterator for ErrorList {
    type Item = SyntaxError;
    type IntoIter = std::vec::IntoIter<SyntaxError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a SyntaxError;
    type IntoIter = std::slice::Iter<'a, SyntaxError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: usize, column: usize) -> Position {
        Position {
            filename: "f.goml".to_string(),
            offset: line * 100 + column,
            line,
            column,
        }
    }

    #[test]
    fn test_sort_by_position() {
        let mut list = ErrorList::new();
        list.add(at(3, 1), "third");
        list.add(at(1, 5), "first");
        list.add(at(2, 9), "second");
        list.sort();
        let messages: Vec<&str> = list.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["first", "second", "third"]);
    }

    #[test]
    fn test_display() {
        let mut list = ErrorList::new();
        assert_eq!(list.to_string(), "no errors");
        list.add(at(1, 2), "expected '>'");
        assert_eq!(list.to_string(), "f.goml:1:2: expected '>'");
        list.add(at(4, 1), "expected ';'");
        assert_eq!(list.to_string(), "f.goml:1:2: expected '>' (and 1 more errors)");
    }

    #[test]
    fn test_remove_multiples_keeps_first_per_line() {
        let mut list = ErrorList::new();
        list.add(at(2, 7), "b");
        list.add(at(2, 3), "a");
        list.add(at(5, 1), "c");
        list.remove_multiples();
        let messages: Vec<&str> = list.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["a", "c"]);
    }
}
