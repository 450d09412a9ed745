//! Network access: the rendered cart section, line mutations, adds and the broader section mapping.

use crate::{
	config::Endpoints,
	error::{describe_js, CartError},
};
use core::cell::Cell;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{FormData, Headers, HtmlFormElement, Request, RequestInit, Response, UrlSearchParams};

/// Server-assigned line identifier, sent back exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LineRef(String);

impl LineRef {
	#[must_use]
	pub fn new(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

/// Sent once, never retried. A quantity of `0` removes the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRequest {
	pub line: LineRef,
	pub quantity: u32,
}

impl MutationRequest {
	#[must_use]
	pub fn removal(line: LineRef) -> Self {
		Self { line, quantity: 0 }
	}
}

#[derive(Serialize)]
struct ChangeBody<'a> {
	line: &'a LineRef,
	quantity: u32,
	sections: [&'a str; 1],
}

/// Serializes the `cart/change.js` request body, declaring which section the server should render alongside.
///
/// # Errors
///
/// [`CartError::Decode`] if serialization fails.
pub fn change_body(request: &MutationRequest, section_id: &str) -> Result<String, CartError> {
	serde_json::to_string(&ChangeBody {
		line: &request.line,
		quantity: request.quantity,
		sections: [section_id],
	})
	.map_err(|error| CartError::Decode(error.to_string()))
}

/// Opaque product form fields, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddPayload(Vec<(String, String)>);

impl AddPayload {
	#[must_use]
	pub fn new(fields: Vec<(String, String)>) -> Self {
		Self(fields)
	}

	/// Collects a form's successful controls. File inputs are skipped.
	///
	/// # Errors
	///
	/// [`CartError::Dom`] if the browser refuses to read the form.
	#[instrument(skip(form))]
	pub fn from_form(form: &HtmlFormElement) -> Result<Self, CartError> {
		let form_data = FormData::new_with_form(form).map_err(|error| CartError::dom(&error))?;
		let entries = js_sys::try_iter(&form_data)
			.map_err(|error| CartError::dom(&error))?
			.ok_or_else(|| CartError::Dom("FormData is not iterable".to_owned()))?;

		let mut fields = Vec::new();
		for entry in entries {
			let entry: js_sys::Array = entry.map_err(|error| CartError::dom(&error))?.unchecked_into();
			match (entry.get(0).as_string(), entry.get(1).as_string()) {
				(Some(name), Some(value)) => fields.push((name, value)),
				(name, _) => warn!(?name, "Skipping non-text form field."),
			}
		}
		trace!(count = fields.len(), "Collected add-to-cart fields.");
		Ok(Self(fields))
	}

	#[must_use]
	pub fn fields(&self) -> &[(String, String)] {
		&self.0
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
	}
}

/// Error body of the add endpoint, e.g. `{"status":422,"message":"Cart Error","description":"Sold out"}`.
#[derive(Debug, Deserialize)]
struct AddErrorBody {
	#[serde(default)]
	message: Option<String>,
	#[serde(default)]
	description: Option<String>,
}

/// Best human-readable reason from a failed response body.
#[must_use]
pub fn failure_reason(body: &str) -> String {
	match serde_json::from_str::<AddErrorBody>(body) {
		Ok(AddErrorBody { description: Some(description), .. }) => description,
		Ok(AddErrorBody { message: Some(message), .. }) => message,
		_ if body.trim().is_empty() => "empty response".to_owned(),
		_ => body.trim().chars().take(200).collect(),
	}
}

/// Decodes the broader section endpoint's `{ name: markup }` mapping. Non-string values are dropped.
///
/// # Errors
///
/// [`CartError::Decode`] if `body` isn't a JSON object.
pub fn parse_sections(body: &str) -> Result<HashMap<String, String>, CartError> {
	let raw: HashMap<String, Option<String>> = serde_json::from_str(body).map_err(|error| CartError::Decode(error.to_string()))?;
	Ok(raw.into_iter().filter_map(|(name, markup)| markup.map(|markup| (name, markup))).collect())
}

/// Everything the drawer and bridge need from the storefront backend.
///
/// All methods suspend only on the network. Timeouts are left to the transport.
#[allow(async_fn_in_trait)]
pub trait CartClient {
	/// Current rendered drawer section.
	async fn fetch_cart_fragment(&self) -> Result<String, CartError>;

	/// Changes a line's quantity. Returns the raw response body.
	async fn request_mutation(&self, request: &MutationRequest) -> Result<String, CartError>;

	/// Submits product form fields. Returns the raw response body on success.
	async fn request_add(&self, payload: &AddPayload) -> Result<String, CartError>;

	/// Broader section refetch used by the fallback path.
	async fn fetch_sections(&self) -> Result<HashMap<String, String>, CartError>;
}

/// [`CartClient`] over the browser's Fetch API.
#[derive(Debug, Clone)]
pub struct HttpCartClient {
	endpoints: Endpoints,
	section_id: String,
}

impl HttpCartClient {
	#[must_use]
	pub fn new(endpoints: Endpoints, section_id: impl Into<String>) -> Self {
		Self {
			endpoints,
			section_id: section_id.into(),
		}
	}

	#[must_use]
	pub fn endpoints(&self) -> &Endpoints {
		&self.endpoints
	}

	#[instrument(skip(self, body))]
	async fn send(&self, method: &'static str, url: &str, body: Option<&JsValue>, content_type: Option<&str>) -> Result<String, CartError> {
		let init = RequestInit::new();
		init.set_method(method);
		let headers = Headers::new().map_err(|error| CartError::dom(&error))?;
		headers.set("Accept", "application/json, text/html").map_err(|error| CartError::dom(&error))?;
		if let Some(content_type) = content_type {
			headers.set("Content-Type", content_type).map_err(|error| CartError::dom(&error))?;
		}
		init.set_headers(&headers);
		if let Some(body) = body {
			init.set_body(body);
		}

		let request = Request::new_with_str_and_init(url, &init).map_err(|error| CartError::network(method, url, None, describe_js(&error)))?;
		let window = web_sys::window().ok_or_else(|| CartError::Dom("no `window`".to_owned()))?;
		let response: Response = JsFuture::from(window.fetch_with_request(&request))
			.await
			.map_err(|error| CartError::network(method, url, None, describe_js(&error)))?
			.dyn_into()
			.map_err(|error| CartError::dom(&error))?;

		let text = response.text().map_err(|error| CartError::network(method, url, Some(response.status()), describe_js(&error)))?;
		let text = JsFuture::from(text)
			.await
			.map_err(|error| CartError::network(method, url, Some(response.status()), describe_js(&error)))?
			.as_string()
			.unwrap_or_default();

		if response.ok() {
			debug!(status = response.status(), len = text.len(), "Request succeeded.");
			Ok(text)
		} else {
			Err(CartError::network(method, url, Some(response.status()), failure_reason(&text)))
		}
	}
}

impl CartClient for HttpCartClient {
	async fn fetch_cart_fragment(&self) -> Result<String, CartError> {
		self.send("GET", &self.endpoints.cart_fragment, None, None).await
	}

	async fn request_mutation(&self, request: &MutationRequest) -> Result<String, CartError> {
		let body = change_body(request, &self.section_id)?;
		self.send("POST", &self.endpoints.change, Some(&JsValue::from_str(&body)), Some("application/json")).await
	}

	async fn request_add(&self, payload: &AddPayload) -> Result<String, CartError> {
		let params = UrlSearchParams::new().map_err(|error| CartError::dom(&error))?;
		for (name, value) in payload.fields() {
			params.append(name, value);
		}
		// The browser sets the form-encoded content type for `URLSearchParams` bodies.
		let body: &JsValue = &params;
		self.send("POST", &self.endpoints.add, Some(body), None).await
	}

	async fn fetch_sections(&self) -> Result<HashMap<String, String>, CartError> {
		let body = self.send("GET", &self.endpoints.sections, None, None).await?;
		parse_sections(&body)
	}
}

/// Orders refresh cycles of one drawer.
///
/// Every fetch takes a ticket. With `discard_stale` set, a response is only applied if no newer one was applied before it.
#[derive(Debug, Default)]
pub struct FetchSequence {
	issued: Cell<u64>,
	applied: Cell<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

impl FetchSequence {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn issue(&self) -> FetchTicket {
		let next = self.issued.get() + 1;
		self.issued.set(next);
		FetchTicket(next)
	}

	/// Whether the response for `ticket` should be applied. Records it as applied if so.
	pub fn accept(&self, ticket: FetchTicket, discard_stale: bool) -> bool {
		if discard_stale && ticket.0 < self.applied.get() {
			return false;
		}
		self.applied.set(self.applied.get().max(ticket.0));
		true
	}

	/// Number of fetches issued so far.
	#[must_use]
	pub fn issued(&self) -> u64 {
		self.issued.get()
	}
}
