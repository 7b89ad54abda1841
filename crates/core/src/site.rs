use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use url::Url;

/// A container element signature, e.g. `div.item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
	pub element: &'static str,
	pub class: &'static str,
}

impl Marker {
	#[must_use]
	pub const fn new(element: &'static str, class: &'static str) -> Self {
		Self { element, class }
	}
}

/// Everything the pipeline knows about the site being scraped.
#[derive(Debug, Clone)]
pub struct Site {
	pub name: String,
	pub url: Url,
	/// Origin that relative event links are resolved against.
	pub base: Url,
	pub tz: Tz,
	pub markers: Vec<Marker>,
	/// Class names of elements holding the venue inside a container.
	pub location_classes: Vec<&'static str>,
	pub keywords: Vec<&'static str>,
	/// Characters of text taken before a timestamp by the brute-force strategy.
	pub lookback: usize,
	/// Characters of the fetched body embedded in a diagnostic event.
	pub preview: usize,
	pub duration: TimeDelta,
}

pub const KIAA_URL: &str = "https://kiaa.pku.edu.cn/Activities/Events_Calendar.htm";
pub const KIAA_ORIGIN: &str = "https://kiaa.pku.edu.cn";

impl Site {
	/// The Kavli Institute for Astronomy and Astrophysics events calendar.
	#[must_use]
	pub fn kiaa() -> Self {
		Self {
			name: "KIAA".to_string(),
			url: Url::parse(KIAA_URL).expect("static url"),
			base: Url::parse(KIAA_ORIGIN).expect("static url"),
			tz: chrono_tz::Asia::Shanghai,
			markers: vec![
				Marker::new("div", "item"),
				Marker::new("li", "event"),
				Marker::new("div", "event-item"),
			],
			location_classes: vec!["location", "venue", "place"],
			keywords: vec!["Speaker", "Seminar", "Colloquium", "Lecture", "Talk"],
			lookback: 400,
			preview: 500,
			duration: TimeDelta::hours(1),
		}
	}

	/// Points the site at another page, keeping its origin in sync.
	#[must_use]
	pub fn with_url(mut self, url: Url) -> Self {
		if let Ok(base) = Url::parse(&url.origin().ascii_serialization()) {
			self.base = base;
		}

		self.url = url;
		self
	}
}

impl Default for Site {
	fn default() -> Self {
		Self::kiaa()
	}
}

/// Immutable values shared by every stage of a single run.
#[derive(Debug, Clone)]
pub struct RunContext<'s> {
	pub site: &'s Site,
	/// Wall-clock time the run started, in the site's timezone.
	pub generated: DateTime<Tz>,
}

impl<'s> RunContext<'s> {
	#[must_use]
	pub fn new(site: &'s Site, now: DateTime<Utc>) -> Self {
		Self {
			site,
			generated: now.with_timezone(&site.tz),
		}
	}

	#[must_use]
	pub fn now(site: &'s Site) -> Self {
		Self::new(site, Utc::now())
	}

	#[must_use]
	pub fn stamp(&self) -> String {
		self.generated.format("%Y-%m-%d %H:%M:%S").to_string()
	}
}
