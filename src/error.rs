use std::path::PathBuf;
use thiserror::Error;

/// Compiler result type.
pub type CompilerResult<T> = Result<T, CompilerError>;

/// Errors produced by the compilation phases.
///
/// The lexer and parser variants render in the classic
/// `file:line:col: error: message` shape so driver output matches what the
/// assembler-side tooling expects.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompilerError {
    /// Lexical errors (bad character, unterminated literal or comment)
    #[error("{location}: error: {message}")]
    Lexer {
        location: SourceLocation,
        message: String,
    },

    /// Syntax errors, carrying the offending lexeme
    #[error("{location}: error: {message} at '{lexeme}'")]
    Parser {
        location: SourceLocation,
        message: String,
        lexeme: String,
    },

    /// Semantic errors raised while building the symbol table
    #[error("{message}")]
    Semantic { message: String },

    /// Code generation errors
    #[error("{0}")]
    Codegen(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Aggregate of several phase errors
    #[error("{} compilation error(s) occurred", .0.len())]
    Multiple(Vec<CompilerError>),
}

/// Source code location for error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    /// Create a new source location.
    pub fn new(file: PathBuf, line: usize, column: usize) -> Self {
        Self { file, line, column }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

impl From<std::io::Error> for CompilerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl CompilerError {
    /// Create a lexer error.
    pub fn lexer(location: SourceLocation, message: impl Into<String>) -> Self {
        Self::Lexer {
            location,
            message: message.into(),
        }
    }

    /// Create a parser error.
    pub fn parser(
        location: SourceLocation,
        message: impl Into<String>,
        lexeme: impl Into<String>,
    ) -> Self {
        Self::Parser {
            location,
            message: message.into(),
            lexeme: lexeme.into(),
        }
    }

    /// Create a semantic error.
    pub fn semantic(message: impl Into<String>) -> Self {
        Self::Semantic {
            message: message.into(),
        }
    }

    /// Create a codegen error.
    pub fn codegen(message: impl Into<String>) -> Self {
        Self::Codegen(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation::new(PathBuf::from("test.c"), 10, 5);
        assert_eq!(loc.to_string(), "test.c:10:5");
    }

    #[test]
    fn test_lexer_error_format() {
        let loc = SourceLocation::new(PathBuf::from("main.c"), 3, 7);
        let err = CompilerError::lexer(loc, "Unexpected character: '@'");
        assert_eq!(err.to_string(), "main.c:3:7: error: Unexpected character: '@'");
    }

    #[test]
    fn test_parser_error_format() {
        let loc = SourceLocation::new(PathBuf::from("main.c"), 1, 12);
        let err = CompilerError::parser(loc, "Expected ';' after expression", "}");
        assert_eq!(
            err.to_string(),
            "main.c:1:12: error: Expected ';' after expression at '}'"
        );
    }

    #[test]
    fn test_multiple_errors_count() {
        let errs = CompilerError::Multiple(vec![
            CompilerError::semantic("Symbol 'x' already declared in current scope"),
            CompilerError::codegen("Undefined variable 'y'"),
        ]);
        assert!(errs.to_string().contains("2 compilation error(s)"));
    }
}
