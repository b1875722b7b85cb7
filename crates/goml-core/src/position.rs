use serde::Serialize;
use std::fmt;

/// A compact source position: byte offset + 1, so that `0` can mean "no position".
///
/// Synthesized nodes that have no natural anchor in the source carry `Pos::NONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pos(u32);

impl Pos {
    pub const NONE: Pos = Pos(0);

    pub fn from_offset(offset: usize) -> Self {
        Pos(offset as u32 + 1)
    }

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Byte offset into the source. Only meaningful for valid positions.
    pub fn offset(self) -> usize {
        self.0.saturating_sub(1) as usize
    }

    /// The position `n` bytes further on. `NONE` stays `NONE`.
    pub fn advance(self, n: usize) -> Self {
        if self.is_valid() {
            Pos(self.0 + n as u32)
        } else {
            self
        }
    }
}

/// A resolved, human readable position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
pub struct Position {
    pub filename: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn is_valid(&self) -> bool {
        self.line > 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_valid(), self.filename.is_empty()) {
            (false, true) => write!(f, "-"),
            (false, false) => write!(f, "{}", self.filename),
            (true, true) => write!(f, "{}:{}", self.line, self.column),
            (true, false) => write!(f, "{}:{}:{}", self.filename, self.line, self.column),
        }
    }
}

/// Line table for one source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    len: usize,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, src: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            src.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            name: name.into(),
            len: src.len(),
            line_starts,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self, pos: Pos) -> Position {
        if !pos.is_valid() {
            return Position {
                filename: self.name.clone(),
                ..Position::default()
            };
        }
        let offset = pos.offset().min(self.len);
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Position {
            filename: self.name.clone(),
            offset,
            line: line_idx + 1,
            column: offset - self.line_starts[line_idx] + 1,
        }
    }

    /// 1-based line of `pos`, or 0 for `Pos::NONE`.
    pub fn line(&self, pos: Pos) -> usize {
        self.position(pos).line
    }
}
