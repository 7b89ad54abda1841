//! Candidate block discovery.
//!
//! The site's markup changes without notice, so several independent strategies look
//! for event-shaped regions and their results are simply concatenated. Overlap
//! between strategies is expected and resolved later by deduplication.

use std::{collections::HashSet, fmt};

use select::{
	document::Document,
	node::Node,
	predicate::{Class, Name, Predicate, Text},
};
use tracing::debug;

use crate::{
	site::{Marker, Site},
	time::TIMESTAMP,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyTag {
	Structural,
	Keyword,
	BruteForce,
}

impl fmt::Display for StrategyTag {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match self {
			Self::Structural => "structural",
			Self::Keyword => "keyword",
			Self::BruteForce => "brute-force",
		})
	}
}

/// The part of the page a candidate covers.
#[derive(Clone, Copy)]
pub enum Region<'d> {
	Node(Node<'d>),
	/// A span of the raw body; may start or end inside markup.
	Text(&'d str),
}

#[derive(Clone, Copy)]
pub struct CandidateBlock<'d> {
	pub strategy: StrategyTag,
	pub region: Region<'d>,
}

impl fmt::Debug for CandidateBlock<'_> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let mut s = f.debug_struct("CandidateBlock");
		s.field("strategy", &self.strategy);

		match self.region {
			Region::Node(node) => s.field("node", &node.index()),
			Region::Text(text) => s.field("text", &text),
		};

		s.finish()
	}
}

/// A parsed page alongside the markup it came from.
pub struct Page<'d> {
	pub document: &'d Document,
	pub body: &'d str,
}

impl<'d> Page<'d> {
	#[must_use]
	pub fn new(document: &'d Document, body: &'d str) -> Self {
		Self { document, body }
	}
}

pub trait ExtractionStrategy {
	fn tag(&self) -> StrategyTag;

	/// Candidates in document order. Finding nothing is not an error.
	fn locate<'d>(&self, page: &Page<'d>) -> Vec<CandidateBlock<'d>>;
}

/// Elements carrying one of the site's known container signatures.
pub struct Structural<'s> {
	pub markers: &'s [Marker],
}

impl ExtractionStrategy for Structural<'_> {
	fn tag(&self) -> StrategyTag {
		StrategyTag::Structural
	}

	fn locate<'d>(&self, page: &Page<'d>) -> Vec<CandidateBlock<'d>> {
		let nodes = self.markers.iter().flat_map(|marker| {
			page.document
				.find(Name(marker.element).and(Class(marker.class)))
		});

		blocks(self.tag(), nodes)
	}
}

/// The smallest element around a keyword that contains exactly one timestamp.
pub struct Keyword<'s> {
	pub keywords: &'s [&'static str],
}

impl Keyword<'_> {
	fn mentions_keyword(&self, text: &str) -> bool {
		let text = text.to_lowercase();

		self.keywords
			.iter()
			.any(|keyword| text.contains(&keyword.to_lowercase()))
	}
}

impl ExtractionStrategy for Keyword<'_> {
	fn tag(&self) -> StrategyTag {
		StrategyTag::Keyword
	}

	fn locate<'d>(&self, page: &Page<'d>) -> Vec<CandidateBlock<'d>> {
		let nodes = page
			.document
			.find(Text)
			.filter(|node| node.as_text().is_some_and(|text| self.mentions_keyword(text)))
			.filter_map(|node| {
				let parent = node.parent()?;

				// page-level and non-content text is never an event
				if matches!(
					parent.name(),
					Some("html" | "head" | "body" | "script" | "style" | "title")
				) {
					return None;
				}

				enclosing_event(parent)
			});

		blocks(self.tag(), nodes)
	}
}

/// Climbs from `from` to the first element holding exactly one timestamp.
///
/// Gives up at page level, at an element with several timestamps, and at
/// navigation or heading markup that has no timestamp of its own.
fn enclosing_event(from: Node) -> Option<Node> {
	let mut node = Some(from);

	while let Some(current) = node {
		if matches!(current.name(), Some("body" | "html")) {
			return None;
		}

		match TIMESTAMP.find_iter(&current.text()).count() {
			0 if is_chrome(current) => return None,
			0 => node = current.parent(),
			1 => return Some(current),
			_ => return None,
		}
	}

	None
}

fn is_chrome(node: Node) -> bool {
	let named = matches!(
		node.name(),
		Some("a" | "nav" | "header" | "footer" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
	);

	named
		|| node.attr("class").is_some_and(|class| {
			class
				.split_whitespace()
				.any(|class| class.contains("nav") || class.contains("menu"))
		})
}

/// Raw text windows ending at each timestamp, ignoring structure entirely.
pub struct BruteForce {
	/// Characters taken before the timestamp.
	pub lookback: usize,
}

impl ExtractionStrategy for BruteForce {
	fn tag(&self) -> StrategyTag {
		StrategyTag::BruteForce
	}

	fn locate<'d>(&self, page: &Page<'d>) -> Vec<CandidateBlock<'d>> {
		let body = page.body;
		let mut previous_end = 0;

		TIMESTAMP
			.find_iter(body)
			.map(|found| {
				// never reach back past the previous timestamp
				let start = back_chars(body, found.start(), self.lookback).max(previous_end);
				previous_end = found.end();

				CandidateBlock {
					strategy: self.tag(),
					region: Region::Text(&body[start..found.end()]),
				}
			})
			.collect()
	}
}

/// Byte offset `n` characters before `end`, or 0.
fn back_chars(s: &str, end: usize, n: usize) -> usize {
	if n == 0 {
		return end;
	}

	s[..end]
		.char_indices()
		.rev()
		.take(n)
		.last()
		.map_or(end, |(i, _)| i)
}

/// Dedupes nodes that matched more than once and restores document order.
fn blocks<'d>(
	strategy: StrategyTag,
	nodes: impl Iterator<Item = Node<'d>>,
) -> Vec<CandidateBlock<'d>> {
	let mut seen = HashSet::new();
	let mut nodes = nodes
		.filter(|node| seen.insert(node.index()))
		.collect::<Vec<_>>();

	nodes.sort_by_key(Node::index);

	nodes
		.into_iter()
		.map(|node| CandidateBlock {
			strategy,
			region: Region::Node(node),
		})
		.collect()
}

/// The fixed strategy order: structural, keyword-anchored, brute-force.
#[must_use]
pub fn strategies(site: &Site) -> Vec<Box<dyn ExtractionStrategy + '_>> {
	vec![
		Box::new(Structural {
			markers: &site.markers,
		}),
		Box::new(Keyword {
			keywords: &site.keywords,
		}),
		Box::new(BruteForce {
			lookback: site.lookback,
		}),
	]
}

/// Runs every strategy in order and concatenates their candidates.
#[must_use]
pub fn locate<'d>(
	page: &Page<'d>,
	strategies: &[Box<dyn ExtractionStrategy + '_>],
) -> Vec<CandidateBlock<'d>> {
	strategies
		.iter()
		.flat_map(|strategy| {
			let found = strategy.locate(page);
			debug!(strategy = %strategy.tag(), candidates = found.len(), "located candidates");

			found
		})
		.collect()
}
