/// Core error type.
///
/// The adapter crate maps its platform errors into this type so the bot core
/// can handle failures consistently (propagate vs swallow).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("gateway error: {0}")]
    Gateway(String),
}

pub type Result<T> = std::result::Result<T, Error>;
