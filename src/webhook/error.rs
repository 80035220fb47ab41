#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("transport failure POSTing to handler: {0}")]
    Transport(#[from] reqwest::Error),
}
