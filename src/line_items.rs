//! Remove buttons and quantity inputs inside the patched regions.
//!
//! Patching replaces these nodes, so controls are bound again after every patch.
//! The previous [`LineItemControls`] is dropped first, which unsubscribes whatever of it is still attached.

use crate::{
	config::Config,
	fetch::{LineRef, MutationRequest},
};
use gloo_events::{EventListener, EventListenerOptions};
use std::rc::Rc;
use tracing::{debug, instrument, trace, warn};
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlInputElement};

/// Listeners bound by one [`bind_item_controls`] pass. Dropping this unbinds them.
#[derive(Default)]
#[must_use]
pub struct LineItemControls {
	listeners: Vec<EventListener>,
}

impl core::fmt::Debug for LineItemControls {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("LineItemControls").field("listeners", &self.listeners.len()).finish()
	}
}

impl LineItemControls {
	#[must_use]
	pub fn len(&self) -> usize {
		self.listeners.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.listeners.is_empty()
	}
}

/// Binds every remove affordance and quantity input under `root` to `on_mutation`.
///
/// Controls without a line reference are skipped.
#[instrument(skip(root, config, on_mutation))]
pub fn bind_item_controls(root: &Element, config: &Config, on_mutation: Rc<dyn Fn(MutationRequest)>) -> LineItemControls {
	let mut listeners = Vec::new();

	for remove in query_all(root, &config.remove_selector) {
		let line = match line_ref(&remove, &config.line_ref_attribute) {
			Some(line) => line,
			None => continue,
		};
		let on_mutation = Rc::clone(&on_mutation);
		listeners.push(EventListener::new_with_options(&remove, "click", EventListenerOptions::enable_prevent_default(), move |event| {
			event.prevent_default();
			trace!(line = line.as_str(), "Remove clicked.");
			on_mutation(MutationRequest::removal(line.clone()));
		}));
	}

	for input in query_all(root, &config.quantity_selector) {
		let line = match line_ref(&input, &config.line_ref_attribute) {
			Some(line) => line,
			None => continue,
		};
		let input = match input.dyn_into::<HtmlInputElement>() {
			Ok(input) => input,
			Err(element) => {
				warn!(tag = %element.tag_name(), "Quantity control is not an <input>.");
				continue;
			}
		};
		let on_mutation = Rc::clone(&on_mutation);
		let target = input.clone();
		listeners.push(EventListener::new(&target, "change", move |_| {
			let value = input.value();
			match value.trim().parse::<u32>() {
				Ok(quantity) => on_mutation(MutationRequest { line: line.clone(), quantity }),
				Err(error) => warn!(line = line.as_str(), %value, %error, "Ignoring unparsable quantity."),
			}
		}));
	}

	debug!(count = listeners.len(), "Bound line-item controls.");
	LineItemControls { listeners }
}

fn line_ref(element: &Element, attribute: &str) -> Option<LineRef> {
	let line = element.get_attribute(attribute).map(LineRef::new);
	if line.is_none() {
		warn!(attribute, "Line-item control without a line reference.");
	}
	line
}

fn query_all(root: &Element, selector: &str) -> Vec<Element> {
	let nodes = match root.query_selector_all(selector) {
		Ok(nodes) => nodes,
		Err(error) => {
			warn!(selector, ?error, "Invalid line-item selector.");
			return Vec::new();
		}
	};
	(0..nodes.length()).filter_map(|i| nodes.item(i)).filter_map(|node| node.dyn_into::<Element>().ok()).collect()
}
