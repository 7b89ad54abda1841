#![warn(clippy::pedantic)]

use std::{
	fs::File,
	io::{self, Write},
	path::{Path, PathBuf},
	time::Duration,
};

use anyhow::Context;
use clap::Parser;
use kiaa2ics_core::{fetch::HttpFetcher, site::KIAA_URL, RawDocument, RunContext, Site};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[clap(version, about = "Turns the KIAA events calendar into an iCalendar file")]
struct Args {
	/// Parse a saved copy of the page instead of fetching it ("-" reads stdin)
	#[clap(value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
	path: Option<PathBuf>,
	#[clap(short, long, value_hint = clap::ValueHint::FilePath)]
	output: Option<PathBuf>,
	#[clap(long, env = "KIAA2ICS_URL", default_value = KIAA_URL)]
	url: Url,
	/// Seconds to wait for the page before giving up
	#[clap(long, env = "KIAA2ICS_TIMEOUT", default_value_t = 60, value_name = "SECONDS")]
	timeout: u64,
}

fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new("kiaa2ics=info,kiaa2ics_core=info")),
		)
		.with_writer(io::stderr)
		.init();

	let args = Args::parse();
	let site = Site::kiaa().with_url(args.url);
	let ctx = RunContext::now(&site);

	let result = match args.path.as_deref() {
		Some(path) => load(path, &site).map(|document| kiaa2ics_core::run(&document, &ctx)),
		None => HttpFetcher::new(Duration::from_secs(args.timeout))
			.map_err(kiaa2ics_core::Error::from)
			.and_then(|fetcher| kiaa2ics_core::try_scrape(&fetcher, &ctx)),
	};

	// a failed run still produces a calendar describing the failure
	let events = kiaa2ics_core::events_or_failure(result, &ctx);
	let calendar = kiaa2ics_core::create_calendar(&events, &site);

	if let Some(output) = args.output {
		let mut file = File::create(&output)
			.with_context(|| format!("failed to create {}", output.display()))?;
		write!(&mut file, "{calendar}")?;
	} else {
		write!(&mut io::stdout(), "{calendar}")?;
	}

	info!(events = events.len(), "calendar written");

	Ok(())
}

fn load(path: &Path, site: &Site) -> kiaa2ics_core::Result<RawDocument> {
	let document = if path == Path::new("-") {
		RawDocument::from_read(io::stdin(), site.url.clone())?
	} else {
		RawDocument::from_file(path, site.url.clone())?
	};

	Ok(document)
}
