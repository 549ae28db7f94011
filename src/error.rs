use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed definition at line {line}: {text} ({message})")]
    MalformedDefinition {
        line: usize,
        text: String,
        message: String,
    },

    #[error("Invalid number at line {line}: {text}")]
    InvalidNumber { line: usize, text: String },

    #[error("Unterminated string starting at line {line}: {text}")]
    UnterminatedString { line: usize, text: String },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Invalid command tree: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl ParseError {
    /// Line the error was found on, when it came from script text.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::MalformedDefinition { line, .. }
            | ParseError::InvalidNumber { line, .. }
            | ParseError::UnterminatedString { line, .. } => Some(*line),
            ParseError::Io { .. } | ParseError::Json { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;
