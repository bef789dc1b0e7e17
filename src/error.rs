//! Error types shared by the pipeline stages.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// A raw source could not be fetched or read. Callers degrade to an
    /// empty dataset for that source.
    #[error("Source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },
    /// Too few ranking rows were recovered to trust the table.
    #[error("Ranking extraction incomplete: {rows} rows, {unique} unique countries (need {required})")]
    InsufficientExtraction {
        rows: usize,
        unique: usize,
        required: usize,
    },
    #[error("Invalid preset for {code}: {reason}")]
    InvalidPreset { code: String, reason: String },
}

impl SafetyError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that must abort a run instead of degrading.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InsufficientExtraction { .. })
    }
}

pub type Result<T> = std::result::Result<T, SafetyError>;
