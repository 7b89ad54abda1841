//! Field extraction from candidate blocks.
//!
//! Every candidate is first flattened to one line whose segments are separated by
//! [`SEPARATOR`]. Each field is then filled by the first of its rules that matches,
//! or by that field's default. Only the timestamp is mandatory.

use std::{ops::Range, sync::LazyLock};

use regex::Regex;
use select::{node::Node, predicate::Class};
use tracing::trace;

use crate::{
	error::ExtractError,
	locate::{CandidateBlock, Region, StrategyTag},
	site::Site,
	time::TIMESTAMP,
};

pub const SEPARATOR: &str = " | ";

pub const UNKNOWN_TITLE: &str = "Unknown Event";
pub const UNKNOWN_SPEAKER: &str = "Unknown";

static TAG: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|<[^>]*>").expect("invalid regex: tag"));

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a\s*>"#)
		.expect("invalid regex: anchor")
});

static SPEAKER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)\bspeakers?\b|报告人|主讲人").expect("invalid regex: speaker label")
});

static VENUE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)\b(?:venue|location|place|room)\s*[:：]|地点")
		.expect("invalid regex: venue label")
});

/// Strings pulled out of one candidate; nothing here has been validated yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEventFields {
	pub strategy: StrategyTag,
	pub title: String,
	pub link: String,
	pub raw_time: String,
	pub speaker: String,
	pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
	pub text: String,
	pub href: String,
}

/// A candidate reduced to a single delimited line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flattened {
	pub line: String,
	pub links: Vec<Link>,
	/// Text of a dedicated venue element, if the candidate is structural.
	pub location: Option<String>,
}

#[must_use]
pub fn flatten(block: &CandidateBlock, site: &Site) -> Flattened {
	match block.region {
		Region::Node(node) => flatten_node(node, site),
		Region::Text(text) => flatten_text(text),
	}
}

fn flatten_node(node: Node, site: &Site) -> Flattened {
	fn walk(node: Node, segments: &mut Vec<String>, links: &mut Vec<Link>) {
		if let Some(text) = node.as_text() {
			let text = collapse(text);

			if !text.is_empty() {
				segments.push(text);
			}

			return;
		}

		match node.name() {
			Some("script" | "style") => return,
			Some("a") => {
				if let Some(href) = node.attr("href") {
					links.push(Link {
						text: collapse(&node.text()),
						href: href.trim().to_string(),
					});
				}
			}
			_ => {}
		}

		for child in node.children() {
			walk(child, segments, links);
		}
	}

	let mut segments = Vec::new();
	let mut links = Vec::new();

	walk(node, &mut segments, &mut links);

	let location = site
		.location_classes
		.iter()
		.filter_map(|class| node.find(Class(*class)).next())
		.map(|found| collapse(&found.text()))
		.find(|text| !text.is_empty());

	Flattened {
		line: segments.join(SEPARATOR),
		links,
		location,
	}
}

fn flatten_text(text: &str) -> Flattened {
	// a window can open in the middle of a tag
	let text = match (text.find('>'), text.find('<')) {
		(Some(close), Some(open)) if close < open => &text[close + 1..],
		(Some(close), None) => &text[close + 1..],
		_ => text,
	};

	let segments = TAG
		.split(text)
		.map(|piece| collapse(&html_escape::decode_html_entities(piece)))
		.filter(|piece| !piece.is_empty())
		.collect::<Vec<_>>();

	// only the anchor nearest the timestamp; earlier ones belong to other content
	let links = ANCHOR
		.captures_iter(text)
		.last()
		.map(|caps| Link {
			text: collapse(&html_escape::decode_html_entities(&TAG.replace_all(&caps[2], " "))),
			href: html_escape::decode_html_entities(caps[1].trim()).into_owned(),
		})
		.into_iter()
		.collect();

	Flattened {
		line: segments.join(SEPARATOR),
		links,
		location: None,
	}
}

fn collapse(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// What a rule gets to look at.
struct Scope<'a> {
	flat: &'a Flattened,
	stamp: Range<usize>,
	site: &'a Site,
	/// Whether the candidate is a raw text window rather than an element.
	windowed: bool,
}

impl Scope<'_> {
	fn before_stamp(&self) -> &str {
		&self.flat.line[..self.stamp.start]
	}

	/// Text after `label` up to the next separator, skipping label punctuation.
	fn labeled(&self, label: &Regex) -> Option<String> {
		let line = &self.flat.line;
		let found = label.find(line)?;

		let rest = if found.end() <= self.stamp.start {
			&line[found.end()..self.stamp.start]
		} else {
			&line[found.end()..]
		};

		let value = rest
			.trim_start_matches(|c: char| matches!(c, ':' | '：' | '|') || c.is_whitespace())
			.split('|')
			.next()?
			.trim();

		(!value.is_empty()).then(|| value.to_string())
	}
}

struct Rule {
	label: &'static str,
	apply: fn(&Scope) -> Option<String>,
}

const TITLE: &[Rule] = &[
	Rule {
		label: "link text",
		apply: title_from_link,
	},
	Rule {
		label: "leading segment",
		apply: title_from_leading_segment,
	},
	Rule {
		label: "nearest segment",
		apply: title_from_nearest_segment,
	},
];

const LINK: &[Rule] = &[Rule {
	label: "anchor",
	apply: link_from_anchor,
}];

const SPEAKER: &[Rule] = &[Rule {
	label: "speaker label",
	apply: speaker_from_label,
}];

const LOCATION: &[Rule] = &[
	Rule {
		label: "location element",
		apply: location_from_element,
	},
	Rule {
		label: "venue label",
		apply: location_from_label,
	},
];

fn title_from_link(scope: &Scope) -> Option<String> {
	scope
		.flat
		.links
		.iter()
		.map(|link| link.text.as_str())
		.find(|text| !text.is_empty() && !TIMESTAMP.is_match(text))
		.map(str::to_string)
}

fn title_from_leading_segment(scope: &Scope) -> Option<String> {
	if scope.windowed {
		return None;
	}

	scope
		.before_stamp()
		.split(SEPARATOR)
		.map(trim_segment)
		.find(|segment| !segment.is_empty())
		.map(str::to_string)
}

/// Windows start at an arbitrary point, so walk back from the timestamp instead,
/// skipping labeled fields.
fn title_from_nearest_segment(scope: &Scope) -> Option<String> {
	if !scope.windowed {
		return None;
	}

	scope
		.before_stamp()
		.rsplit(SEPARATOR)
		.map(trim_segment)
		.find(|segment| {
			!segment.is_empty()
				&& !SPEAKER_LABEL.is_match(segment)
				&& !VENUE_LABEL.is_match(segment)
		})
		.map(str::to_string)
}

fn trim_segment(segment: &str) -> &str {
	segment.trim_matches(|c: char| matches!(c, '|' | '-' | '–' | ':') || c.is_whitespace())
}

fn link_from_anchor(scope: &Scope) -> Option<String> {
	scope
		.flat
		.links
		.iter()
		.map(|link| link.href.as_str())
		.filter(|href| {
			!href.is_empty()
				&& !href.starts_with('#')
				&& !href.starts_with("javascript:")
				&& !href.starts_with("mailto:")
		})
		.find_map(|href| scope.site.base.join(href).ok())
		.map(String::from)
}

fn speaker_from_label(scope: &Scope) -> Option<String> {
	scope.labeled(&SPEAKER_LABEL)
}

fn location_from_element(scope: &Scope) -> Option<String> {
	scope.flat.location.clone()
}

fn location_from_label(scope: &Scope) -> Option<String> {
	scope.labeled(&VENUE_LABEL)
}

fn first_match(field: &'static str, rules: &[Rule], scope: &Scope) -> Option<String> {
	rules.iter().find_map(|rule| {
		let value = (rule.apply)(scope)?;
		trace!(field, rule = rule.label, %value, "field matched");

		Some(value)
	})
}

/// Pulls event fields out of a candidate.
///
/// # Errors
///
/// Returns [`ExtractError::NoTimestampFound`] if the candidate has no recognizable
/// date and time; every other field falls back to a default instead.
pub fn extract(block: &CandidateBlock, site: &Site) -> Result<RawEventFields, ExtractError> {
	let flat = flatten(block, site);
	let stamp = TIMESTAMP
		.find(&flat.line)
		.ok_or(ExtractError::NoTimestampFound)?;

	let scope = Scope {
		flat: &flat,
		stamp: stamp.range(),
		site,
		windowed: matches!(block.region, Region::Text(_)),
	};

	Ok(RawEventFields {
		strategy: block.strategy,
		title: first_match("title", TITLE, &scope).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
		link: first_match("link", LINK, &scope).unwrap_or_else(|| site.url.to_string()),
		raw_time: stamp.as_str().to_string(),
		speaker: first_match("speaker", SPEAKER, &scope)
			.unwrap_or_else(|| UNKNOWN_SPEAKER.to_string()),
		location: first_match("location", LOCATION, &scope).unwrap_or_else(|| site.name.clone()),
	})
}

#[cfg(test)]
mod tests {
	use select::{document::Document, predicate::Name};

	use super::*;

	fn from_node(html: &str, element: &str) -> Result<RawEventFields, ExtractError> {
		let document = Document::from(html);
		let node = document.find(Name(element)).next().unwrap();

		extract(
			&CandidateBlock {
				strategy: StrategyTag::Structural,
				region: Region::Node(node),
			},
			&Site::kiaa(),
		)
	}

	fn from_text(text: &str) -> Result<RawEventFields, ExtractError> {
		extract(
			&CandidateBlock {
				strategy: StrategyTag::BruteForce,
				region: Region::Text(text),
			},
			&Site::kiaa(),
		)
	}

	#[test]
	fn structural_item() {
		let fields = from_node(
			r#"<div class="item">
				<a href="/info/1011/42.htm">Dark Matter Halos</a>
				<span>Speaker: Dr. X (Caltech)</span>
				<span class="location">KIAA Auditorium</span>
				<span>2 Dec 2025 - 03:30PM</span>
			</div>"#,
			"div",
		)
		.unwrap();

		assert_eq!(fields.title, "Dark Matter Halos");
		assert_eq!(fields.link, "https://kiaa.pku.edu.cn/info/1011/42.htm");
		assert_eq!(fields.speaker, "Dr. X (Caltech)");
		assert_eq!(fields.location, "KIAA Auditorium");
		assert_eq!(fields.raw_time, "2 Dec 2025 - 03:30PM");
		assert_eq!(fields.strategy, StrategyTag::Structural);
	}

	#[test]
	fn missing_timestamp_is_rejected() {
		let result = from_node(
			r#"<div class="item"><a href="/a.htm">News</a><span>Speaker: Dr. X</span></div>"#,
			"div",
		);

		assert_eq!(result, Err(ExtractError::NoTimestampFound));
		assert_eq!(from_text("nothing to see here"), Err(ExtractError::NoTimestampFound));
	}

	#[test]
	fn defaults_without_link_speaker_or_venue() {
		let fields =
			from_node("<div><p>Journal Club</p><p>5 Jan 2026 - 10:00AM</p></div>", "div").unwrap();

		assert_eq!(fields.title, "Journal Club");
		assert_eq!(fields.link, "https://kiaa.pku.edu.cn/Activities/Events_Calendar.htm");
		assert_eq!(fields.speaker, UNKNOWN_SPEAKER);
		assert_eq!(fields.location, "KIAA");
	}

	#[test]
	fn title_defaults_when_timestamp_leads() {
		let fields = from_node("<div><p>5 Jan 2026 - 10:00AM</p></div>", "div").unwrap();

		assert_eq!(fields.title, UNKNOWN_TITLE);
	}

	#[test]
	fn absolute_links_are_kept() {
		let fields = from_node(
			r#"<div><a href="https://example.org/talk">Talk</a> 5 Jan 2026 - 10:00AM</div>"#,
			"div",
		)
		.unwrap();

		assert_eq!(fields.link, "https://example.org/talk");
	}

	#[test]
	fn fragment_links_fall_back_to_page() {
		let fields = from_node(
			r##"<div><a href="#top">Back to top</a> 5 Jan 2026 - 10:00AM</div>"##,
			"div",
		)
		.unwrap();

		assert_eq!(fields.title, "Back to top");
		assert_eq!(fields.link, "https://kiaa.pku.edu.cn/Activities/Events_Calendar.htm");
	}

	#[test]
	fn speaker_label_in_its_own_element() {
		let fields = from_node(
			"<div><p>Colloquium</p><b>Speaker:</b><i>Prof. Y</i><p>6 Jan 2026 - 02:00PM</p></div>",
			"div",
		)
		.unwrap();

		assert_eq!(fields.speaker, "Prof. Y");
	}

	#[test]
	fn speaker_after_timestamp() {
		let fields = from_node(
			"<div><p>Lunch Talk</p><p>6 Jan 2026 - 12:00PM</p><p>speaker : Dr. Z</p></div>",
			"div",
		)
		.unwrap();

		assert_eq!(fields.speaker, "Dr. Z");
	}

	#[test]
	fn venue_label() {
		let fields = from_node(
			"<div><p>Seminar</p><p>Venue: Room 1-1</p><p>6 Jan 2026 - 12:00PM</p></div>",
			"div",
		)
		.unwrap();

		assert_eq!(fields.location, "Room 1-1");
	}

	#[test]
	fn text_window_with_partial_tag_and_entities() {
		let fields = from_text(
			r#"ss="x"><a href="/events/42.htm">Stellar &amp; Planetary Dynamics</a></li>
			<li>Speaker: Dr. W</li><li>2 Dec 2025&nbsp;-&nbsp;03:30PM"#,
		)
		.unwrap();

		assert_eq!(fields.title, "Stellar & Planetary Dynamics");
		assert_eq!(fields.link, "https://kiaa.pku.edu.cn/events/42.htm");
		assert_eq!(fields.speaker, "Dr. W");
		assert_eq!(fields.raw_time, "2 Dec 2025 - 03:30PM");
		assert_eq!(fields.strategy, StrategyTag::BruteForce);
	}

	#[test]
	fn text_window_without_link() {
		let fields = from_text("<p>Cosmology Seminar</p><p>7 Jan 2026 - 04:00PM").unwrap();

		assert_eq!(fields.title, "Cosmology Seminar");
		assert_eq!(fields.link, "https://kiaa.pku.edu.cn/Activities/Events_Calendar.htm");
	}

	#[test]
	fn text_window_uses_nearest_anchor() {
		let fields = from_text(concat!(
			r#"<a href="/index.htm">Home</a>"#,
			r#"<div><a href="/events/7.htm">Pulsar Timing</a><p>8 Jan 2026 - 09:30AM"#,
		))
		.unwrap();

		assert_eq!(fields.title, "Pulsar Timing");
		assert_eq!(fields.link, "https://kiaa.pku.edu.cn/events/7.htm");
	}

	#[test]
	fn text_window_title_skips_labeled_segments() {
		let fields = from_text(concat!(
			"</li></ul><h4>Upcoming</h4>",
			"<li><p>Lunch Talk: Exoplanets</p><p>Speaker: Dr. Chen</p><p>9 Dec 2025 - 12:00PM",
		))
		.unwrap();

		assert_eq!(fields.title, "Lunch Talk: Exoplanets");
		assert_eq!(fields.speaker, "Dr. Chen");
	}

	#[test]
	fn flatten_separates_structure() {
		let document =
			Document::from("<div><h3>A</h3><p>B <i>C</i></p><script>var x;</script></div>");
		let node = document.find(Name("div")).next().unwrap();
		let flat = flatten(
			&CandidateBlock {
				strategy: StrategyTag::Keyword,
				region: Region::Node(node),
			},
			&Site::kiaa(),
		);

		assert_eq!(flat.line, "A | B | C");
		assert!(flat.links.is_empty());
		assert_eq!(flat.location, None);
	}
}
