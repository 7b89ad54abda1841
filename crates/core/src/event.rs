use std::{collections::HashSet, fmt};

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::{document::RawDocument, extract::RawEventFields, site::RunContext, time};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
	/// Extracted from the page.
	Regular,
	/// Stands in for an empty result set.
	Diagnostic,
	/// Stands in for a run that failed before extraction.
	Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
	pub kind: EventKind,
	pub title: String,
	pub start: DateTime<Tz>,
	pub duration: TimeDelta,
	pub location: String,
	pub description: String,
	pub link: Option<String>,
}

/// Identity of an event: two records with equal keys are the same event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
	pub start: DateTime<Utc>,
	pub title: String,
}

impl EventKey {
	#[must_use]
	pub fn new(start: &DateTime<Tz>, title: &str) -> Self {
		Self {
			start: start.to_utc(),
			title: title.trim().to_string(),
		}
	}
}

impl EventRecord {
	#[must_use]
	pub fn key(&self) -> EventKey {
		EventKey::new(&self.start, &self.title)
	}

	#[must_use]
	pub fn is_diagnostic(&self) -> bool {
		self.kind == EventKind::Diagnostic
	}

	#[must_use]
	pub fn end(&self) -> DateTime<Tz> {
		self.start + self.duration
	}
}

impl fmt::Display for EventRecord {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{} @ {}", self.title, self.start.format("%Y-%m-%d %H:%M %Z"))
	}
}

/// Normalizes and dedupes extracted fields into events.
///
/// The first record seen for a key wins; later duplicates are dropped whole.
/// Fields whose timestamp does not normalize never become events.
pub fn assemble<I>(fields: I, ctx: &RunContext) -> Vec<EventRecord>
where
	I: IntoIterator<Item = RawEventFields>,
{
	let mut seen = HashSet::new();
	let mut events = Vec::new();

	for raw in fields {
		let start = match time::normalize(&raw.raw_time, ctx.site.tz) {
			Ok(start) => start,
			Err(e) => {
				debug!(strategy = %raw.strategy, error = %e, "dropping candidate");
				continue;
			}
		};

		let title = raw.title.trim().to_string();

		if !seen.insert(EventKey::new(&start, &title)) {
			debug!(strategy = %raw.strategy, %title, %start, "duplicate event");
			continue;
		}

		events.push(EventRecord {
			kind: EventKind::Regular,
			description: format!(
				"Speaker: {}\nRaw Date: {}\nLink: {}\n\n[Updated at {}]",
				raw.speaker,
				raw.raw_time,
				raw.link,
				ctx.stamp()
			),
			title,
			start,
			duration: ctx.site.duration,
			location: raw.location,
			link: Some(raw.link),
		});
	}

	events
}

/// Replaces an empty event set with a single diagnostic event.
#[must_use]
pub fn maybe_fallback(
	events: Vec<EventRecord>,
	document: &RawDocument,
	ctx: &RunContext,
) -> Vec<EventRecord> {
	if !events.is_empty() {
		return events;
	}

	warn!(url = %document.url, bytes = document.body.len(), "no events extracted");

	vec![EventRecord {
		kind: EventKind::Diagnostic,
		title: "[Debug] Page loaded but 0 events".to_string(),
		start: ctx.generated,
		duration: ctx.site.duration,
		location: ctx.site.name.clone(),
		description: format!(
			"No events could be extracted from {}.\nThe site may have changed its markup or be \
			 blocking automated requests.\n\n[Run at {}]\n\nPreview:\n{}",
			document.url,
			ctx.stamp(),
			document.preview(ctx.site.preview)
		),
		link: Some(document.url.to_string()),
	}]
}

/// A single record describing a run that failed outright.
#[must_use]
pub fn failure_event(error: &dyn fmt::Display, ctx: &RunContext) -> EventRecord {
	EventRecord {
		kind: EventKind::Failure,
		title: format!("Error: {error}"),
		start: ctx.generated,
		duration: ctx.site.duration,
		location: ctx.site.name.clone(),
		description: format!(
			"The calendar could not be refreshed from {}.\nError: {error}\n\n[Run at {}]",
			ctx.site.url,
			ctx.stamp()
		),
		link: Some(ctx.site.url.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use chrono::TimeZone;
	use url::Url;

	use super::*;
	use crate::{locate::StrategyTag, site::Site};

	fn raw(strategy: StrategyTag, title: &str, time: &str, speaker: &str) -> RawEventFields {
		RawEventFields {
			strategy,
			title: title.to_string(),
			link: "https://kiaa.pku.edu.cn/events/42.htm".to_string(),
			raw_time: time.to_string(),
			speaker: speaker.to_string(),
			location: "KIAA".to_string(),
		}
	}

	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2025, 11, 30, 2, 0, 0).unwrap()
	}

	#[test]
	fn first_duplicate_wins() {
		let site = Site::kiaa();
		let ctx = RunContext::new(&site, now());
		let events = assemble(
			[
				raw(StrategyTag::Structural, "Colloquium", "2 Dec 2025 - 03:30PM", "Dr. X"),
				raw(
					StrategyTag::Keyword,
					"Colloquium ",
					"2 Dec 2025&nbsp;-&nbsp;03:30PM",
					"Someone else",
				),
				raw(StrategyTag::BruteForce, "Colloquium", "2 Dec 2025 - 3:30 pm", "Nobody"),
			],
			&ctx,
		);

		assert_eq!(events.len(), 1);
		assert!(events[0].description.starts_with("Speaker: Dr. X\n"));
	}

	#[test]
	fn different_titles_or_times_are_distinct() {
		let site = Site::kiaa();
		let ctx = RunContext::new(&site, now());
		let events = assemble(
			[
				raw(StrategyTag::Structural, "Colloquium", "2 Dec 2025 - 03:30PM", "Dr. X"),
				raw(StrategyTag::Structural, "colloquium", "2 Dec 2025 - 03:30PM", "Dr. X"),
				raw(StrategyTag::Structural, "Colloquium", "2 Dec 2025 - 04:30PM", "Dr. X"),
			],
			&ctx,
		);

		assert_eq!(events.len(), 3);
	}

	#[test]
	fn unparseable_fields_never_become_events() {
		let site = Site::kiaa();
		let ctx = RunContext::new(&site, now());
		let events = assemble(
			[raw(StrategyTag::BruteForce, "Broken", "32 Dec 2025 - 03:30PM", "Dr. X")],
			&ctx,
		);

		assert!(events.is_empty());
	}

	#[test]
	fn record_fields() {
		let site = Site::kiaa();
		let ctx = RunContext::new(&site, now());
		let events = assemble(
			[raw(StrategyTag::Structural, "  Colloquium  ", "2 Dec 2025 - 03:30PM", "Dr. X")],
			&ctx,
		);
		let event = &events[0];

		assert_eq!(event.kind, EventKind::Regular);
		assert_eq!(event.title, "Colloquium");
		assert_eq!(event.start, site.tz.with_ymd_and_hms(2025, 12, 2, 15, 30, 0).unwrap());
		assert_eq!(event.end() - event.start, TimeDelta::hours(1));
		assert_eq!(
			event.description,
			"Speaker: Dr. X\nRaw Date: 2 Dec 2025 - 03:30PM\n\
			 Link: https://kiaa.pku.edu.cn/events/42.htm\n\n[Updated at 2025-11-30 10:00:00]"
		);
	}

	#[test]
	fn empty_set_gets_one_diagnostic() {
		let site = Site::kiaa();
		let ctx = RunContext::new(&site, now());
		let document = RawDocument::new("<html>Access denied</html>", site.url.clone(), now());
		let events = maybe_fallback(Vec::new(), &document, &ctx);

		assert_eq!(events.len(), 1);
		assert!(events[0].is_diagnostic());
		assert_eq!(events[0].start, ctx.generated);
		assert!(events[0].description.contains("2025-11-30 10:00:00"));
		assert!(events[0].description.ends_with("<html>Access denied</html>"));
	}

	#[test]
	fn diagnostic_preview_is_bounded() {
		let site = Site::kiaa();
		let ctx = RunContext::new(&site, now());
		let url = Url::parse("https://example.org").unwrap();
		let document = RawDocument::new("x".repeat(10_000), url, now());
		let events = maybe_fallback(Vec::new(), &document, &ctx);

		assert!(events[0].description.ends_with(&format!("Preview:\n{}", "x".repeat(500))));
	}

	#[test]
	fn non_empty_set_passes_through() {
		let site = Site::kiaa();
		let ctx = RunContext::new(&site, now());
		let document = RawDocument::new("", site.url.clone(), now());
		let events = assemble(
			[raw(StrategyTag::Structural, "Colloquium", "2 Dec 2025 - 03:30PM", "Dr. X")],
			&ctx,
		);
		let out = maybe_fallback(events.clone(), &document, &ctx);

		assert_eq!(out, events);
		assert!(out.iter().all(|event| !event.is_diagnostic()));
	}

	#[test]
	fn failure_event_describes_error() {
		let site = Site::kiaa();
		let ctx = RunContext::new(&site, now());
		let event = failure_event(&crate::error::FetchError::Timeout, &ctx);

		assert_eq!(event.kind, EventKind::Failure);
		assert_eq!(event.title, "Error: request timed out");
		assert!(event.description.contains("request timed out"));
	}
}
