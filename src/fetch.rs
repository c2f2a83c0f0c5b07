//! Artifact content transport
//!
//! The collection core never talks to the network itself. `add_release`
//! takes a [`Fetcher`] and asks it for the bytes of any artifact the store
//! does not already hold. The default [`HttpFetcher`] (behind the `http`
//! feature) downloads over HTTP(S) with a blocking reqwest client; tests
//! and embedders substitute their own implementations.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Failure to obtain artifact content from a source URL.
///
/// Transport sources are boxed so this type exists unchanged whether or not
/// the `http` feature (and with it reqwest) is compiled in.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client")]
    Client {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    /// Transport-level failure: DNS, connect, timeout, interrupted body
    #[error("Transfer failed for {url}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Fetched bytes did not match the expected checksum
    #[error("Digest mismatch for {url}: expected {expected}, got {actual}")]
    DigestMismatch {
        url: String,
        expected: String,
        actual: String,
    },
}

/// Capability to fetch artifact content from a source locator.
///
/// Called at most once per missing artifact during a rotation; retry and
/// timeout behavior belongs to the implementation.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// Verify fetched bytes against a `sha256:<hex>` digest.
pub fn verify_digest(
    url: &str,
    bytes: &[u8],
    expected: &str,
) -> std::result::Result<(), FetchError> {
    let actual = format!("sha256:{:x}", Sha256::digest(bytes));
    if actual != expected {
        return Err(FetchError::DigestMismatch {
            url: url.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// HTTP(S) transport backed by a blocking reqwest client.
#[cfg(feature = "http")]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    /// Build a client with a 30 second timeout and a versioned user agent.
    pub fn new() -> std::result::Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("larder/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Client {
                source: Box::new(e),
            })?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            source: Box::new(e),
        })?;
        Ok(bytes.to_vec())
    }
}
