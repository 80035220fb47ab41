mod client;
mod error;
pub mod models;

pub use client::{ProviderClient, RawResponse};
pub use error::ProviderError;
