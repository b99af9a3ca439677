//! Compile error types

use roole_loader::LoadError;
use roole_syntax::{Node, SourceLocation, SyntaxError};
use thiserror::Error;

/// Compile result type
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors raised by any stage of the pipeline
///
/// Every variant except `Runtime` is located, so callers can ask for the
/// line, column and file the error belongs to.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// A string spliced into a selector or media query failed to parse
    #[error("error parsing {context} interpolation: {source}")]
    Interpolation {
        context: &'static str,
        source: SyntaxError,
    },

    #[error("{message}")]
    Semantic {
        message: String,
        location: SourceLocation,
        file_path: String,
    },

    #[error("{source}")]
    Import {
        source: LoadError,
        location: SourceLocation,
        file_path: String,
    },

    /// The blocking runtime could not be started
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),

    /// Error whose message was rewritten to show its source context
    #[error("{message}")]
    Pretty {
        message: String,
        source: Box<CompileError>,
    },
}

impl CompileError {
    /// Error located at `node` inside `file_path`
    pub fn semantic(message: impl Into<String>, node: &Node, file_path: &str) -> Self {
        Self::Semantic {
            message: message.into(),
            location: node.loc,
            file_path: file_path.to_string(),
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Get the source location of this error
    pub fn location(&self) -> SourceLocation {
        match self {
            Self::Syntax(err) => err.location(),
            Self::Interpolation { source, .. } => source.location(),
            Self::Semantic { location, .. } => *location,
            Self::Import { location, .. } => *location,
            Self::Runtime(_) => SourceLocation::default(),
            Self::Pretty { source, .. } => source.location(),
        }
    }

    pub fn line(&self) -> usize {
        self.location().line
    }

    pub fn column(&self) -> usize {
        self.location().column
    }

    pub fn offset(&self) -> usize {
        self.location().offset
    }

    /// Path of the file the error was raised in, empty for the main input
    pub fn file_path(&self) -> &str {
        match self {
            Self::Syntax(err) => err.file_path(),
            Self::Interpolation { source, .. } => source.file_path(),
            Self::Semantic { file_path, .. } => file_path,
            Self::Import { file_path, .. } => file_path,
            Self::Runtime(_) => "",
            Self::Pretty { source, .. } => source.file_path(),
        }
    }
}
