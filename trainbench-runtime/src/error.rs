use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Invalid service address: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Could not build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Could not write benchmark result: {0}")]
    Output(#[from] serde_json::Error),
}
