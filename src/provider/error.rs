/// Transport-level failure talking to the provider. Connection refusals,
/// DNS failures, and timeouts all land here; a non-2xx HTTP response is *not*
/// an error at this layer — callers branch on the returned status themselves
/// (see [`super::client::RawResponse`]).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned a body that could not be decoded as JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),
}
