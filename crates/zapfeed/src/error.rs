/// Engine errors. Decode problems inside the receipt pipeline are not
/// errors: they degrade to zero amounts and anonymous payers.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("relay error: {0}")]
    Relay(#[from] enrelay::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("generic error: {0}")]
    Generic(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}
