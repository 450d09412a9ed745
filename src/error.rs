use core::fmt::{self, Display, Formatter};
use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

/// Everything that can go wrong while keeping the drawer in sync.
///
/// None of these are fatal to the page. Callers log them and leave the prior UI state in place.
#[derive(Debug, Error)]
pub enum CartError {
	/// Transport failure or a non-success response on any request.
	#[error("{method} {url} failed{}: {reason}", status_suffix(.status))]
	Network {
		method: &'static str,
		url: String,
		status: Option<u16>,
		reason: String,
	},

	/// A patch region is absent from the live drawer or from the fetched fragment. The region is skipped.
	#[error("patch region `{selector}` is missing from the {side}")]
	PatchTargetMissing { selector: String, side: PatchSide },

	/// An add-to-cart click happened outside of any `<form>`.
	#[error("add-to-cart click outside of any form")]
	BridgeContextMissing,

	#[error("DOM operation failed: {0}")]
	Dom(String),

	#[error("malformed response: {0}")]
	Decode(String),

	#[error("invalid configuration: {0}")]
	Config(String),
}

/// Which side of a patch lacked a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchSide {
	LiveDrawer,
	Fragment,
	Both,
}

impl Display for PatchSide {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			PatchSide::LiveDrawer => "live drawer",
			PatchSide::Fragment => "fetched fragment",
			PatchSide::Both => "live drawer and fetched fragment",
		})
	}
}

impl CartError {
	pub(crate) fn network(method: &'static str, url: &str, status: Option<u16>, reason: impl Into<String>) -> Self {
		Self::Network {
			method,
			url: url.to_owned(),
			status,
			reason: reason.into(),
		}
	}

	pub(crate) fn dom(value: &JsValue) -> Self {
		Self::Dom(describe_js(value))
	}

	/// Whether this is a [`CartError::Network`].
	#[must_use]
	pub fn is_network(&self) -> bool {
		matches!(self, Self::Network { .. })
	}
}

impl From<CartError> for JsValue {
	fn from(error: CartError) -> Self {
		js_sys::Error::new(&error.to_string()).into()
	}
}

#[allow(clippy::trivially_copy_pass_by_ref, clippy::ref_option)]
fn status_suffix(status: &Option<u16>) -> String {
	status.map(|status| format!(" with status {}", status)).unwrap_or_default()
}

/// Extracts a readable message from a thrown JavaScript value.
pub(crate) fn describe_js(value: &JsValue) -> String {
	if let Some(error) = value.dyn_ref::<js_sys::Error>() {
		String::from(error.message())
	} else if let Some(string) = value.as_string() {
		string
	} else {
		format!("{:?}", value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn network_display_includes_status_when_known() {
		let error = CartError::network("POST", "/cart/add.js", Some(422), "Sold out");
		assert_eq!(error.to_string(), "POST /cart/add.js failed with status 422: Sold out");

		let error = CartError::network("GET", "/cart?section_id=cart-drawer", None, "offline");
		assert_eq!(error.to_string(), "GET /cart?section_id=cart-drawer failed: offline");
		assert!(error.is_network());
	}

	#[test]
	fn patch_target_missing_names_side() {
		let error = CartError::PatchTargetMissing {
			selector: ".drawer__footer".to_owned(),
			side: PatchSide::Fragment,
		};
		assert_eq!(error.to_string(), "patch region `.drawer__footer` is missing from the fetched fragment");
		assert!(!error.is_network());
	}
}
