//! Construction-time configuration.
//!
//! Every field has a default matching the stock theme markup, so hosts only need to pass what differs.

use crate::error::CartError;
use serde::Deserialize;
use tracing::{debug, instrument};
use wasm_bindgen::JsValue;

/// Injected into every component at construction time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	/// Request target prefix. Read from the storefront's route globals when absent.
	pub api_base_path: Option<String>,
	/// Locates the drawer root when mounting from JavaScript.
	pub drawer_selector: String,
	/// Name of the server-rendered section holding the drawer.
	pub section_id: String,
	/// Regions replaced wholesale on every refresh.
	pub region_selectors: Vec<String>,
	/// Milliseconds between `close()` and the `hidden` attribute being applied.
	pub close_delay_ms: u32,
	pub active_class: String,
	/// Classes put on `<body>` while the drawer is open. Locks background scrolling.
	pub body_open_classes: Vec<String>,
	pub overlay_selector: String,
	pub close_button_selector: String,
	pub remove_selector: String,
	pub quantity_selector: String,
	/// Attribute carrying the server's line reference on line-item controls.
	pub line_ref_attribute: String,
	/// Marker of the third-party widget's add affordance.
	pub add_button_selector: String,
	/// Control inside the product form whose text shows the busy label.
	pub busy_control_selector: String,
	pub busy_label: String,
	/// Where the fallback path looks for new content in the broader section markup.
	pub fallback_source_selector: String,
	/// The coarse container the fallback path swaps.
	pub fallback_target_selector: String,
	/// Drop fragment responses older than the last applied one instead of letting the last to complete win.
	pub discard_stale_fragments: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			api_base_path: None,
			drawer_selector: "cart-drawer".to_owned(),
			section_id: "cart-drawer".to_owned(),
			region_selectors: ["#CartDrawer", "#CartDrawer-count", "#CartDrawer-items", ".drawer__header", ".drawer__body", ".drawer__footer"]
				.iter()
				.map(|&selector| selector.to_owned())
				.collect(),
			close_delay_ms: 300,
			active_class: "active".to_owned(),
			body_open_classes: vec!["cart-drawer-open".to_owned(), "overflow-hidden".to_owned()],
			overlay_selector: ".drawer__overlay".to_owned(),
			close_button_selector: ".drawer__close-btn".to_owned(),
			remove_selector: ".cart-item__remove".to_owned(),
			quantity_selector: r#"input[data-index][name="updates[]"]"#.to_owned(),
			line_ref_attribute: "data-index".to_owned(),
			add_button_selector: ".x-product-buy-button".to_owned(),
			busy_control_selector: r#"[name="add"]"#.to_owned(),
			busy_label: "Adding...".to_owned(),
			fallback_source_selector: ".drawer__inner-empty, .drawer__inner".to_owned(),
			fallback_target_selector: ".drawer__inner".to_owned(),
			discard_stale_fragments: false,
		}
	}
}

impl Config {
	/// Parses a (possibly partial) JSON object. Missing fields keep their defaults.
	///
	/// # Errors
	///
	/// [`CartError::Config`] if the JSON is malformed or names an unknown field.
	pub fn from_json(json: &str) -> Result<Self, CartError> {
		serde_json::from_str(json).map_err(|error| CartError::Config(error.to_string()))
	}

	/// Fills in [`Config::api_base_path`] from `window.Shopify.routes.root` if it wasn't set explicitly.
	#[must_use]
	#[instrument(skip(self))]
	pub fn with_storefront_routes(mut self) -> Self {
		if self.api_base_path.is_none() {
			self.api_base_path = storefront_routes_root();
			debug!(api_base_path = ?self.api_base_path, "Resolved API base path from storefront globals.");
		}
		self
	}

	/// The request prefix, always ending in `/`.
	#[must_use]
	pub fn api_root(&self) -> String {
		let base = self.api_base_path.as_deref().unwrap_or("/");
		if base.ends_with('/') {
			base.to_owned()
		} else {
			format!("{}/", base)
		}
	}

	#[must_use]
	pub fn endpoints(&self) -> Endpoints {
		Endpoints::new(&self.api_root(), &self.section_id)
	}
}

fn storefront_routes_root() -> Option<String> {
	let window = web_sys::window()?;
	let shopify = js_sys::Reflect::get(&window, &JsValue::from_str("Shopify")).ok()?;
	if shopify.is_undefined() || shopify.is_null() {
		return None;
	}
	let routes = js_sys::Reflect::get(&shopify, &JsValue::from_str("routes")).ok()?;
	if routes.is_undefined() || routes.is_null() {
		return None;
	}
	js_sys::Reflect::get(&routes, &JsValue::from_str("root")).ok()?.as_string()
}

/// Request targets, all under the same API root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
	/// `GET`: the drawer section's rendered markup.
	pub cart_fragment: String,
	/// `POST`: change a line's quantity.
	pub change: String,
	/// `POST`: add form-encoded items.
	pub add: String,
	/// `GET`: JSON mapping of section name to markup.
	pub sections: String,
}

impl Endpoints {
	/// `root` must end in `/`. The section id is used verbatim.
	#[must_use]
	pub fn new(root: &str, section_id: &str) -> Self {
		Self {
			cart_fragment: format!("{}cart?section_id={}", root, section_id),
			change: format!("{}cart/change.js", root),
			add: format!("{}cart/add.js", root),
			sections: format!("{}?sections={}", root, section_id),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_stock_drawer_markup() {
		let config = Config::default();
		assert_eq!(config.section_id, "cart-drawer");
		assert_eq!(config.region_selectors.len(), 6);
		assert_eq!(config.close_delay_ms, 300);
		assert!(!config.discard_stale_fragments);
		assert_eq!(config.api_root(), "/");
	}

	#[test]
	fn partial_json_keeps_defaults() {
		let config = Config::from_json(r#"{ "api_base_path": "/en-ca", "close_delay_ms": 150 }"#).unwrap();
		assert_eq!(config.api_root(), "/en-ca/");
		assert_eq!(config.close_delay_ms, 150);
		assert_eq!(config.active_class, "active");
	}

	#[test]
	fn unknown_fields_are_rejected() {
		let error = Config::from_json(r#"{ "close_delay": 150 }"#).unwrap_err();
		assert!(matches!(error, CartError::Config(_)));
	}

	#[test]
	fn endpoints_share_the_api_root() {
		let endpoints = Config {
			api_base_path: Some("/fr/".to_owned()),
			..Config::default()
		}
		.endpoints();
		assert_eq!(
			endpoints,
			Endpoints {
				cart_fragment: "/fr/cart?section_id=cart-drawer".to_owned(),
				change: "/fr/cart/change.js".to_owned(),
				add: "/fr/cart/add.js".to_owned(),
				sections: "/fr/?sections=cart-drawer".to_owned(),
			}
		);
	}
}
