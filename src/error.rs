use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("no face")]
    NoFace,

    #[error("Invalid landmark set: expected 68 points, got {count}")]
    InvalidLandmarks { count: usize },

    #[error("Degenerate landmark geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot {operation} while session is {state}")]
    Usage {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Could not encode image: {0}")]
    Encode(String),
}

impl Error {
    /// Fatal errors stop a whole batch; everything else is local to one image.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
