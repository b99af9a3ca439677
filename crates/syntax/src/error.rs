//! Syntax error types

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Parsing result type
pub type SyntaxResult<T> = Result<T, SyntaxError>;

/// Source location in a stylesheet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Byte offset from start
    pub offset: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Syntax errors
///
/// The parser reports the rightmost position it failed to make progress at,
/// described by the character found there.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("Unexpected '{found}'")]
    UnexpectedChar {
        found: char,
        location: SourceLocation,
        file_path: String,
    },

    #[error("Unexpected new line")]
    UnexpectedNewLine {
        location: SourceLocation,
        file_path: String,
    },

    #[error("Unexpected end of file")]
    UnexpectedEof {
        location: SourceLocation,
        file_path: String,
    },
}

impl SyntaxError {
    /// Build the error for whatever was found at the failure position
    pub fn unexpected(found: Option<char>, location: SourceLocation, file_path: impl Into<String>) -> Self {
        let file_path = file_path.into();
        match found {
            Some('\r') | Some('\n') => Self::UnexpectedNewLine { location, file_path },
            Some(found) => Self::UnexpectedChar { found, location, file_path },
            None => Self::UnexpectedEof { location, file_path },
        }
    }

    /// Get the source location of this error
    pub fn location(&self) -> SourceLocation {
        match self {
            Self::UnexpectedChar { location, .. } => *location,
            Self::UnexpectedNewLine { location, .. } => *location,
            Self::UnexpectedEof { location, .. } => *location,
        }
    }

    /// Path of the file being parsed
    pub fn file_path(&self) -> &str {
        match self {
            Self::UnexpectedChar { file_path, .. } => file_path,
            Self::UnexpectedNewLine { file_path, .. } => file_path,
            Self::UnexpectedEof { file_path, .. } => file_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation::new(10, 5, 100);
        assert_eq!(format!("{}", loc), "10:5");
    }

    #[test]
    fn test_error_display() {
        let loc = SourceLocation::new(1, 10, 9);
        let err = SyntaxError::unexpected(Some('@'), loc, "");
        assert_eq!(format!("{}", err), "Unexpected '@'");

        let err = SyntaxError::unexpected(Some('\n'), loc, "");
        assert_eq!(format!("{}", err), "Unexpected new line");

        let err = SyntaxError::unexpected(None, loc, "base.roo");
        assert_eq!(format!("{}", err), "Unexpected end of file");
        assert_eq!(err.file_path(), "base.roo");
        assert_eq!(err.location(), loc);
    }
}
