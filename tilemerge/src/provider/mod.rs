//! Tile transport.
//!
//! Provides the [`AsyncHttpClient`] seam the fetcher issues requests
//! through, its reqwest-backed implementation, and [`UrlTemplate`] for
//! turning a grid position into a request URL.
//!
//! ```ignore
//! use tilemerge::provider::{AsyncReqwestClient, UrlTemplate};
//!
//! let client = AsyncReqwestClient::new()?;
//! let template = UrlTemplate::new("https://{s}.tiles.example/{z}/{x}/{y}.json", "abc")?;
//! let url = template.render(3, 5, 2);
//! let body = client.get(&url).await?;
//! ```

mod http;
mod template;
mod types;

pub use http::{AsyncHttpClient, AsyncReqwestClient, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
pub use template::UrlTemplate;
pub use types::ProviderError;

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
