use std::fmt;

/// Source span of a token or parse tree node. Lines and columns are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParserPos {
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl ParserPos {
    /// Position used for nodes that do not come from SQL text.
    pub const ZERO: ParserPos = ParserPos {
        line: 0,
        column: 0,
        end_line: 0,
        end_column: 0,
    };

    pub fn new(line: usize, column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            line,
            column,
            end_line,
            end_column,
        }
    }

    /// Smallest span covering both positions. Zero positions are ignored.
    ///
    /// # Arguments
    ///
    /// * `other` - Position to merge with.
    pub fn plus(&self, other: ParserPos) -> ParserPos {
        if *self == ParserPos::ZERO {
            return other;
        }
        if other == ParserPos::ZERO {
            return *self;
        }
        let (line, column) = (self.line, self.column).min((other.line, other.column));
        let (end_line, end_column) =
            (self.end_line, self.end_column).max((other.end_line, other.end_column));
        ParserPos::new(line, column, end_line, end_column)
    }

    /// Smallest span covering this position and all of `others`.
    pub fn plus_all<I: IntoIterator<Item = ParserPos>>(&self, others: I) -> ParserPos {
        others.into_iter().fold(*self, |acc, p| acc.plus(p))
    }
}

impl fmt::Display for ParserPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_plus() {
        let a = ParserPos::new(1, 8, 1, 10);
        let b = ParserPos::new(1, 1, 1, 3);
        let c = ParserPos::new(2, 4, 2, 9);
        assert_eq!(ParserPos::new(1, 1, 1, 10), a.plus(b));
        assert_eq!(ParserPos::new(1, 1, 2, 9), a.plus_all(vec![b, c]));
        assert_eq!(a, ParserPos::ZERO.plus(a));
        assert_eq!("line 1, column 8", a.to_string());
    }
}
