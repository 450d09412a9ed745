//! Region-wise replacement of live drawer content from server-rendered markup.
//!
//! Each region's content is swapped in a single assignment, so a region is either fully updated or left as it was.
//! Nothing outside the named regions is touched, which keeps listeners and nodes elsewhere on the page intact.
//! Listeners *inside* a replaced region are gone afterwards and must be rebound by the caller.

use crate::error::{CartError, PatchSide};
use tracing::{debug, instrument, trace, warn};
use web_sys::{Document, DomParser, Element, SupportedType};

/// Outcome of [`apply_fragment`].
#[derive(Debug, Default)]
pub struct PatchReport {
	/// Selectors whose live content was replaced, in patch order.
	pub applied: Vec<String>,
	/// Regions that were skipped: [`CartError::PatchTargetMissing`], or [`CartError::Dom`] for an invalid selector.
	pub skipped: Vec<CartError>,
	/// The fragment arrived out of order and was dropped without touching the DOM.
	pub stale: bool,
}

impl PatchReport {
	pub(crate) fn stale() -> Self {
		Self { stale: true, ..Self::default() }
	}
}

/// Parses `raw_markup` into a detached document. Scripts in it don't run.
///
/// # Errors
///
/// [`CartError::Dom`] if the browser's parser is unavailable.
pub fn parse_fragment(raw_markup: &str) -> Result<Document, CartError> {
	let parser = DomParser::new().map_err(|error| CartError::dom(&error))?;
	parser.parse_from_string(raw_markup, SupportedType::TextHtml).map_err(|error| CartError::dom(&error))
}

/// Replaces the content of every region present in both `live_root` (descendants only) and `raw_markup`.
///
/// Missing regions and invalid selectors are reported per region in [`PatchReport::skipped`], not as an error.
///
/// # Errors
///
/// [`CartError::Dom`] if the markup can't be parsed. Nothing is patched in that case.
#[instrument(skip(live_root, raw_markup), fields(len = raw_markup.len()))]
pub fn apply_fragment<S: AsRef<str> + core::fmt::Debug>(live_root: &Element, raw_markup: &str, region_selectors: &[S]) -> Result<PatchReport, CartError> {
	let fragment = parse_fragment(raw_markup)?;
	let mut report = PatchReport::default();

	for selector in region_selectors {
		let selector = selector.as_ref();
		let (target, source) = match (live_root.query_selector(selector), fragment.query_selector(selector)) {
			(Ok(target), Ok(source)) => (target, source),
			(Err(error), _) | (_, Err(error)) => {
				let skipped = CartError::dom(&error);
				warn!(selector, "Skipping region with invalid selector: {}", skipped);
				report.skipped.push(skipped);
				continue;
			}
		};

		match (target, source) {
			(Some(target), Some(source)) => {
				target.set_inner_html(&source.inner_html());
				trace!(selector, "Patched region.");
				report.applied.push(selector.to_owned());
			}
			(target, source) => {
				let side = match (target.is_some(), source.is_some()) {
					(false, true) => PatchSide::LiveDrawer,
					(true, false) => PatchSide::Fragment,
					_ => PatchSide::Both,
				};
				let skipped = CartError::PatchTargetMissing {
					selector: selector.to_owned(),
					side,
				};
				debug!("Skipping region: {}", skipped);
				report.skipped.push(skipped);
			}
		}
	}

	Ok(report)
}

/// Coarse fallback: swaps `target_selector`'s content in `live_root` for the first `source_selector` match in `raw_markup`.
///
/// Returns whether anything was replaced.
///
/// # Errors
///
/// [`CartError::Dom`] if the markup can't be parsed or a selector is invalid.
#[instrument(skip(live_root, raw_markup))]
pub fn splice_container(live_root: &Element, raw_markup: &str, source_selector: &str, target_selector: &str) -> Result<bool, CartError> {
	let fragment = parse_fragment(raw_markup)?;
	let source = fragment.query_selector(source_selector).map_err(|error| CartError::dom(&error))?;
	let target = live_root.query_selector(target_selector).map_err(|error| CartError::dom(&error))?;
	match (source, target) {
		(Some(source), Some(target)) => {
			target.set_inner_html(&source.inner_html());
			Ok(true)
		}
		_ => {
			debug!("Fallback container missing; nothing spliced.");
			Ok(false)
		}
	}
}
