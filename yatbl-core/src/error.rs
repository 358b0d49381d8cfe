use thiserror::Error;

#[derive(Error, Debug)]
pub enum YatblError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid shorthand configuration: {0}")]
    InvalidShortHandConfiguration(String),

    #[error("Only HTTPS URLs allowed for webhooks: {0}")]
    InsecureWebhookUrl(String),

    #[error("Telegram API error: {0}")]
    Api(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Handler error: {0}")]
    Handler(#[from] HandlerError),

    #[error("Unknown shorthand: {0}")]
    UnknownShortHand(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Update has no message")]
    NoMessage,

    #[error("No text in message")]
    NoText,

    #[error("Invalid shorthand arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, YatblError>;
