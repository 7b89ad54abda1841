use std::{fs::File, io::Read, path::Path};

use chrono::{DateTime, Utc};
use url::Url;

use crate::error::FetchError;

/// A fetched page body. The pipeline treats `body` as opaque markup.
#[derive(Debug, Clone)]
pub struct RawDocument {
	pub body: String,
	pub url: Url,
	pub fetched: DateTime<Utc>,
}

impl RawDocument {
	#[must_use]
	pub fn new(body: impl Into<String>, url: Url, fetched: DateTime<Utc>) -> Self {
		Self {
			body: body.into(),
			url,
			fetched,
		}
	}

	/// Reads a document from any reader, stamping it with the current time.
	///
	/// # Errors
	///
	/// Fails if the reader errors or yields invalid UTF-8.
	pub fn from_read<R: Read>(mut reader: R, url: Url) -> Result<Self, FetchError> {
		let mut body = String::new();
		reader.read_to_string(&mut body)?;

		Ok(Self::new(body, url, Utc::now()))
	}

	/// # Errors
	///
	/// Fails if the file cannot be opened or read.
	pub fn from_file<P: AsRef<Path>>(path: P, url: Url) -> Result<Self, FetchError> {
		Self::from_read(File::open(path)?, url)
	}

	/// First `chars` characters of the body with whitespace collapsed.
	#[must_use]
	pub fn preview(&self, chars: usize) -> String {
		self.body
			.split_whitespace()
			.collect::<Vec<_>>()
			.join(" ")
			.chars()
			.take(chars)
			.collect()
	}
}
