use serde::{Deserialize, Serialize};

/// Why the tokenizer gave up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum LexErrorKind {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("unexpected character {0:?}")]
    InvalidCharacter(char),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

/// A tokenizer failure. Fatal for the document being read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{file}:{line}:{column}: {kind}")]
pub struct LexError {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub kind: LexErrorKind,
}

impl LexError {
    pub fn new(file: &str, line: u32, column: u32, kind: LexErrorKind) -> Self {
        LexError {
            file: file.to_owned(),
            line,
            column,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    /// A block or conditional was opened and never closed. The error line
    /// is the line of the opening construct.
    #[error("'{construct}' is never closed")]
    Unclosed { construct: String },
    #[error("unmatched '{0}'")]
    Unmatched(String),
    #[error("'{keyword}' needs {expected} operand(s) but only {found} available")]
    Arity {
        keyword: String,
        expected: usize,
        found: usize,
    },
    #[error("'{keyword}' expects {expected}, got {found}")]
    OperandType {
        keyword: String,
        expected: String,
        found: String,
    },
    #[error("{0}")]
    Syntax(String),
}

/// A structural failure. Fatal for the document; no partial output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{file}:{line}: {kind}")]
pub struct ParseError {
    pub file: String,
    pub line: u32,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(file: &str, line: u32, kind: ParseErrorKind) -> Self {
        ParseError {
            file: file.to_owned(),
            line,
            kind,
        }
    }

    pub fn syntax(file: &str, line: u32, message: impl Into<String>) -> Self {
        ParseError::new(file, line, ParseErrorKind::Syntax(message.into()))
    }
}

/// The generator reached a state its own rules should have prevented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{file}:{line}: generator invariant violated: {message}")]
pub struct GenerationInvariantError {
    pub file: String,
    pub line: u32,
    pub message: String,
}

impl GenerationInvariantError {
    pub fn new(file: &str, line: u32, message: impl Into<String>) -> Self {
        GenerationInvariantError {
            file: file.to_owned(),
            line,
            message: message.into(),
        }
    }
}

/// Any fatal error raised while translating one main document.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Generation(#[from] GenerationInvariantError),
    #[error("cannot read {path}: {source}")]
    Source {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{file}:{line}: overlay '{name}' cannot be read: {source}")]
    Overlay {
        name: String,
        file: String,
        line: u32,
        #[source]
        source: std::io::Error,
    },
    /// A line-mode job ticket was given where a database-mode main
    /// document was expected.
    #[error("{file}:{line}: '{keyword}' belongs to a line-mode job ticket (JDT), which is not translated")]
    LineMode {
        file: String,
        line: u32,
        keyword: String,
    },
}

impl TranslateError {
    pub fn stage(&self) -> &'static str {
        match self {
            TranslateError::Lex(_) => "lex",
            TranslateError::Parse(_) => "parse",
            TranslateError::Generation(_) => "generate",
            TranslateError::Source { .. }
            | TranslateError::Overlay { .. }
            | TranslateError::LineMode { .. } => "load",
        }
    }

    pub fn file(&self) -> &str {
        match self {
            TranslateError::Lex(e) => &e.file,
            TranslateError::Parse(e) => &e.file,
            TranslateError::Generation(e) => &e.file,
            TranslateError::Source { path, .. } => path,
            TranslateError::Overlay { file, .. } | TranslateError::LineMode { file, .. } => file,
        }
    }

    pub fn line(&self) -> Option<u32> {
        match self {
            TranslateError::Lex(e) => Some(e.line),
            TranslateError::Parse(e) => Some(e.line),
            TranslateError::Generation(e) => Some(e.line),
            TranslateError::Source { .. } => None,
            TranslateError::Overlay { line, .. } | TranslateError::LineMode { line, .. } => {
                Some(*line)
            }
        }
    }

    /// Serialize for the CLI's JSON output mode. Every field is always
    /// present (null when not applicable).
    pub fn to_json_value(&self) -> serde_json::Value {
        let message = match self {
            TranslateError::Lex(e) => e.kind.to_string(),
            TranslateError::Parse(e) => e.kind.to_string(),
            TranslateError::Generation(e) => e.message.clone(),
            other => other.to_string(),
        };
        serde_json::json!({
            "stage":   self.stage(),
            "file":    self.file(),
            "line":    self.line(),
            "message": message,
        })
    }
}
