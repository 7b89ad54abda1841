use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use regex::Regex;

use crate::error::ExtractError;

/// `2 Dec 2025 - 03:30PM`, tolerating entity-encoded and repeated spacing.
pub(crate) static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
	const SP: &str = r"(?:\s|&nbsp;|&#160;)";

	let date = format!(r"\d{{1,2}}{SP}+[A-Za-z]{{3}}{SP}+\d{{4}}");
	let clock = format!(r"\d{{1,2}}:\d{{2}}{SP}*[AaPp][Mm]");

	Regex::new(&format!(r"{date}{SP}*[-–—]{SP}*{clock}")).expect("invalid regex: timestamp")
});

static TAG: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("invalid regex: tag"));

static CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^(\d{1,2}) ([A-Za-z]{3}) (\d{4}) ?[-–—] ?(\d{1,2}):(\d{2}) ?([AaPp][Mm])$")
		.expect("invalid regex: canonical timestamp")
});

const FORMAT: &str = "%d %b %Y - %I:%M%p";

/// Parses a raw `day month year - hh:mmAM` string into an instant in `tz`.
///
/// Entities, stray tags and irregular spacing are cleaned up first; anything that
/// still does not fit the fixed format is rejected outright.
///
/// # Errors
///
/// Returns [`ExtractError::UnparseableTimestamp`] if the cleaned string does not
/// describe a valid local time in `tz`.
pub fn normalize(raw: &str, tz: Tz) -> Result<DateTime<Tz>, ExtractError> {
	let unparseable = || ExtractError::UnparseableTimestamp {
		raw: raw.to_string(),
	};

	let cleaned = canonicalize(raw).ok_or_else(unparseable)?;
	let naive = NaiveDateTime::parse_from_str(&cleaned, FORMAT).map_err(|_| unparseable())?;

	tz.from_local_datetime(&naive).earliest().ok_or_else(unparseable)
}

fn canonicalize(raw: &str) -> Option<String> {
	let decoded = html_escape::decode_html_entities(raw);
	let stripped = TAG.replace_all(&decoded, " ");
	let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

	let caps = CANONICAL.captures(&collapsed)?;
	let month = &caps[2];
	let month = format!("{}{}", month[..1].to_ascii_uppercase(), month[1..].to_ascii_lowercase());

	Some(format!(
		"{} {month} {} - {}:{}{}",
		&caps[1],
		&caps[3],
		&caps[4],
		&caps[5],
		caps[6].to_ascii_uppercase()
	))
}
