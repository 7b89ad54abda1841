use url::Url;

use crate::{document::RawDocument, error::FetchError};

/// Anything that can turn a URL into a [`RawDocument`].
pub trait Fetch {
	/// # Errors
	///
	/// Network errors, timeouts and non-2xx responses all surface as [`FetchError`].
	fn fetch(&self, url: &Url) -> Result<RawDocument, FetchError>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
	fn fetch(&self, url: &Url) -> Result<RawDocument, FetchError> {
		(**self).fetch(url)
	}
}

#[cfg(feature = "fetch")]
pub use http::HttpFetcher;

#[cfg(feature = "fetch")]
mod http {
	use std::time::Duration;

	use chrono::Utc;
	use reqwest::blocking::Client;
	use tracing::{debug, info};
	use url::Url;

	use super::Fetch;
	use crate::{document::RawDocument, error::FetchError};

	// the site serves an empty shell to obvious bots
	const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
		(KHTML, like Gecko) Chrome/124.0 Safari/537.36";

	pub struct HttpFetcher {
		client: Client,
	}

	impl HttpFetcher {
		/// # Errors
		///
		/// Fails if the TLS backend cannot be initialised.
		pub fn new(timeout: Duration) -> Result<Self, FetchError> {
			let client = Client::builder()
				.timeout(timeout)
				.user_agent(USER_AGENT)
				.build()
				.map_err(from_reqwest)?;

			Ok(Self { client })
		}
	}

	impl Fetch for HttpFetcher {
		fn fetch(&self, url: &Url) -> Result<RawDocument, FetchError> {
			info!(%url, "fetching");

			let response = self
				.client
				.get(url.clone())
				.header("Accept", "text/html,application/xhtml+xml")
				.header("Accept-Language", "en-US,en;q=0.9,zh-CN;q=0.8")
				.send()
				.map_err(from_reqwest)?;

			let status = response.status();
			if !status.is_success() {
				return Err(FetchError::Status(status.as_u16()));
			}

			let body = response.text().map_err(from_reqwest)?;
			debug!(bytes = body.len(), "fetched document");

			Ok(RawDocument::new(body, url.clone(), Utc::now()))
		}
	}

	fn from_reqwest(e: reqwest::Error) -> FetchError {
		if e.is_timeout() {
			FetchError::Timeout
		} else if let Some(status) = e.status() {
			FetchError::Status(status.as_u16())
		} else {
			FetchError::Network(e.to_string())
		}
	}
}
