#![warn(clippy::pedantic)]

use kiaa2ics_core::{RawDocument, RunContext, Site};
use wasm_bindgen::prelude::wasm_bindgen;

/// Builds a calendar from markup the caller already fetched.
#[wasm_bindgen]
#[must_use]
pub fn from_html(html: &str) -> String {
	let site = Site::kiaa();
	let ctx = RunContext::now(&site);
	let document = RawDocument::new(html, site.url.clone(), ctx.generated.to_utc());
	let events = kiaa2ics_core::run(&document, &ctx);

	kiaa2ics_core::create_calendar(&events, &site).to_string()
}
