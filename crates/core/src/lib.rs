#![warn(clippy::pedantic)]

use event::EventRecord;
use icalendar::{Calendar, CalendarDateTime, Component, Event, EventLike};
use select::document::Document;
use tracing::{debug, info, warn};

pub mod document;
pub mod error;
pub mod event;
pub mod extract;
pub mod fetch;
pub mod locate;
pub mod site;
pub mod time;

pub use document::RawDocument;
pub use error::{Error, Result};
pub use fetch::Fetch;
pub use site::{RunContext, Site};

/// Runs the extraction pipeline over an already fetched document.
///
/// Always yields at least one record: a diagnostic event stands in when nothing
/// could be extracted.
#[must_use]
pub fn run(document: &RawDocument, ctx: &RunContext) -> Vec<EventRecord> {
	let html = Document::from(document.body.as_str());
	let page = locate::Page::new(&html, &document.body);
	let strategies = locate::strategies(ctx.site);
	let candidates = locate::locate(&page, &strategies);

	let fields = candidates
		.iter()
		.filter_map(|candidate| match extract::extract(candidate, ctx.site) {
			Ok(fields) => Some(fields),
			Err(e) => {
				debug!(?candidate, error = %e, "dropping candidate");
				None
			}
		})
		.collect::<Vec<_>>();

	let events = event::assemble(fields, ctx);

	info!(
		candidates = candidates.len(),
		events = events.len(),
		"extracted events"
	);

	event::maybe_fallback(events, document, ctx)
}

/// Fetches the site's page and runs the pipeline over it.
///
/// # Errors
///
/// Fails only if the page cannot be fetched.
pub fn try_scrape<F: Fetch>(fetcher: &F, ctx: &RunContext) -> Result<Vec<EventRecord>> {
	let document = fetcher.fetch(&ctx.site.url)?;

	Ok(run(&document, ctx))
}

/// Like [`try_scrape`], but a failed run becomes a single failure event.
#[must_use]
pub fn scrape<F: Fetch>(fetcher: &F, ctx: &RunContext) -> Vec<EventRecord> {
	events_or_failure(try_scrape(fetcher, ctx), ctx)
}

/// Replaces a failed run with a single failure event.
#[must_use]
pub fn events_or_failure(result: Result<Vec<EventRecord>>, ctx: &RunContext) -> Vec<EventRecord> {
	result.unwrap_or_else(|e| {
		warn!(error = %e, "run failed");
		vec![event::failure_event(&e, ctx)]
	})
}

/// Serializes events into a calendar anchored in the site's timezone.
#[must_use]
pub fn create_calendar(events: &[EventRecord], site: &Site) -> Calendar {
	let mut calendar = Calendar::new();
	let tzid = site.tz.name();
	let host = site.base.host_str().unwrap_or("localhost");

	calendar.name(&site.name);
	calendar.timezone(tzid);

	for record in events {
		let mut event = Event::new();

		event
			.uid(&uid(record, host))
			.summary(&record.title)
			.starts(CalendarDateTime::WithTimezone {
				date_time: record.start.naive_local(),
				tzid: tzid.to_string(),
			})
			.ends(CalendarDateTime::WithTimezone {
				date_time: record.end().naive_local(),
				tzid: tzid.to_string(),
			})
			.location(&record.location)
			.description(&record.description);

		if let Some(link) = &record.link {
			event.add_property("URL", link);
		}

		calendar.push(event);
	}

	calendar
}

/// Stable across runs so calendar clients update events in place.
///
/// The slug is lossy, so a digest of the exact title keeps distinct events apart.
fn uid(record: &EventRecord, host: &str) -> String {
	let mut slug = String::new();

	for c in record.title.chars() {
		if c.is_alphanumeric() {
			slug.extend(c.to_lowercase());
		} else if !slug.is_empty() && !slug.ends_with('-') {
			slug.push('-');
		}
	}

	let slug = slug.trim_end_matches('-').chars().take(48).collect::<String>();
	let kind = match record.kind {
		event::EventKind::Regular => "event",
		event::EventKind::Diagnostic => "debug",
		event::EventKind::Failure => "error",
	};

	let digest = blake3::hash(record.title.trim().as_bytes()).to_hex();

	format!(
		"{kind}-{}-{slug}-{}@{host}",
		record.start.to_utc().format("%Y%m%dT%H%M%SZ"),
		&digest.as_str()[..16]
	)
}
