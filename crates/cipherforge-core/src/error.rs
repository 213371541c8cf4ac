use thiserror::Error;

#[derive(Error, Debug)]
pub enum CipherForgeError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Corpus Error: {0}")]
    Corpus(String),

    #[error("Lexicon Error: {0}")]
    Lexicon(String),

    #[error("Translator Backend Error: {0}")]
    Backend(String),
}

pub type CfResult<T> = Result<T, CipherForgeError>;
