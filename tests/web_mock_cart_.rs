#![cfg(target_arch = "wasm32")]
#![allow(dead_code)]

use cart_drawer::{fetch::AddPayload, CartClient, CartError, MutationRequest};
use gloo_timers::future::TimeoutFuture;
use hashbrown::HashMap;
use std::{
	cell::{Cell, RefCell},
	collections::VecDeque,
	sync::Once,
};
use wasm_bindgen::JsCast;
use web_sys::{window, Document, Element, HtmlElement};

static LOG_INITIALIZED: Once = Once::new();

pub fn init_logging() {
	LOG_INITIALIZED.call_once(tracing_wasm::set_as_global_default);
}

pub fn document() -> Document {
	window().unwrap().document().unwrap()
}

/// Lets spawned tasks and zero-delay mock responses run to completion.
pub async fn settle() {
	for _ in 0..3 {
		TimeoutFuture::new(0).await;
	}
}

pub struct Line {
	pub key: String,
	pub title: String,
	pub quantity: u32,
}

/// In-memory storefront cart rendering the drawer section the way the theme does.
#[derive(Default)]
pub struct MockCart {
	pub lines: RefCell<Vec<Line>>,
	pub fragment_fetches: Cell<u32>,
	pub section_fetches: Cell<u32>,
	pub mutations: RefCell<Vec<MutationRequest>>,
	pub adds: RefCell<Vec<AddPayload>>,
	pub fail_fetch: Cell<bool>,
	pub fail_mutation: Cell<bool>,
	pub fail_add: Cell<bool>,
	pub add_delay_ms: Cell<u32>,
	/// Per-call delays of fragment responses, consumed in call order. The markup is rendered before the delay.
	pub fragment_delays_ms: RefCell<VecDeque<u32>>,
	pub sections_delay_ms: Cell<u32>,
}

impl MockCart {
	pub fn with_lines(lines: &[(&str, &str, u32)]) -> Self {
		let cart = Self::default();
		cart.lines.borrow_mut().extend(lines.iter().map(|&(key, title, quantity)| Line {
			key: key.to_owned(),
			title: title.to_owned(),
			quantity,
		}));
		cart
	}

	pub fn item_count(&self) -> u32 {
		self.lines.borrow().iter().map(|line| line.quantity).sum()
	}

	/// The drawer section as the server would render it. The footer is omitted for an empty cart.
	pub fn render(&self) -> String {
		let lines = self.lines.borrow();
		let items: String = lines
			.iter()
			.map(|line| {
				format!(
					r#"<li class="cart-item" data-line="{key}">{title} <button class="cart-item__remove" data-index="{key}">Remove</button><input data-index="{key}" name="updates[]" value="{quantity}"></li>"#,
					key = line.key,
					title = line.title,
					quantity = line.quantity,
				)
			})
			.collect();
		let footer = if lines.is_empty() {
			String::new()
		} else {
			format!(r#"<div class="drawer__footer">Total items: {}</div>"#, self.item_count())
		};
		format!(
			r#"<div id="shopify-section-cart-drawer"><cart-drawer><div class="drawer__inner"><div class="drawer__header"><h2>Cart (<span id="CartDrawer-count">{count}</span>)</h2><button class="drawer__close-btn">Close</button></div><div id="CartDrawer-items"><ul>{items}</ul></div>{footer}</div></cart-drawer></div>"#,
			count = self.item_count(),
			items = items,
			footer = footer,
		)
	}
}

fn failure(method: &'static str, url: &str, status: u16) -> CartError {
	CartError::Network {
		method,
		url: url.to_owned(),
		status: Some(status),
		reason: "simulated failure".to_owned(),
	}
}

impl CartClient for MockCart {
	async fn fetch_cart_fragment(&self) -> Result<String, CartError> {
		self.fragment_fetches.set(self.fragment_fetches.get() + 1);
		if self.fail_fetch.get() {
			return Err(failure("GET", "/cart?section_id=cart-drawer", 503));
		}
		let markup = self.render();
		let delay = self.fragment_delays_ms.borrow_mut().pop_front();
		if let Some(delay) = delay {
			TimeoutFuture::new(delay).await;
		}
		Ok(markup)
	}

	async fn request_mutation(&self, request: &MutationRequest) -> Result<String, CartError> {
		self.mutations.borrow_mut().push(request.clone());
		if self.fail_mutation.get() {
			return Err(failure("POST", "/cart/change.js", 500));
		}
		let mut lines = self.lines.borrow_mut();
		if request.quantity == 0 {
			lines.retain(|line| line.key != request.line.as_str());
		} else if let Some(line) = lines.iter_mut().find(|line| line.key == request.line.as_str()) {
			line.quantity = request.quantity;
		}
		Ok("{}".to_owned())
	}

	async fn request_add(&self, payload: &AddPayload) -> Result<String, CartError> {
		self.adds.borrow_mut().push(payload.clone());
		if self.add_delay_ms.get() > 0 {
			TimeoutFuture::new(self.add_delay_ms.get()).await;
		}
		if self.fail_add.get() {
			return Err(failure("POST", "/cart/add.js", 500));
		}
		let key = payload.get("id").unwrap_or("unknown").to_owned();
		let quantity = payload.get("quantity").and_then(|quantity| quantity.parse().ok()).unwrap_or(1);
		let mut lines = self.lines.borrow_mut();
		match lines.iter_mut().find(|line| line.key == key) {
			Some(line) => line.quantity += quantity,
			None => lines.push(Line {
				title: format!("Variant {}", key),
				key,
				quantity,
			}),
		}
		Ok(r#"{"items":[]}"#.to_owned())
	}

	async fn fetch_sections(&self) -> Result<HashMap<String, String>, CartError> {
		self.section_fetches.set(self.section_fetches.get() + 1);
		if self.sections_delay_ms.get() > 0 {
			TimeoutFuture::new(self.sections_delay_ms.get()).await;
		}
		let mut sections = HashMap::new();
		sections.insert("cart-drawer".to_owned(), self.render());
		Ok(sections)
	}
}

/// Page markup mounted below `<body>` for one test. Removed on drop.
pub struct Fixture {
	pub container: HtmlElement,
}

pub const DRAWER_MARKUP: &str = r#"<cart-drawer class="drawer" hidden><div class="drawer__overlay"></div><div class="drawer__inner"><div class="drawer__header"><h2>Cart (<span id="CartDrawer-count">0</span>)</h2><button class="drawer__close-btn">Close</button></div><div id="CartDrawer-items"><ul></ul></div><div class="drawer__footer">Total items: 0</div></div></cart-drawer>"#;

pub const PRODUCT_FORM_MARKUP: &str = r#"<div class="x-product"><form class="x-product-form" action="/cart/add" method="post"><input type="hidden" name="id" value="40001"><input type="number" name="quantity" value="2"><button type="submit" name="add" class="x-product-buy-button"><span class="label">Add to cart</span></button></form></div><div class="x-orphan"><button class="x-product-buy-button">Add to cart</button></div>"#;

impl Fixture {
	pub fn new(markup: &str) -> Self {
		let document = document();
		let container: HtmlElement = document.create_element("div").unwrap().dyn_into().unwrap();
		container.set_inner_html(markup);
		document.body().unwrap().append_child(&container).unwrap();
		Self { container }
	}

	pub fn drawer_page() -> Self {
		Self::new(&format!("{}{}", DRAWER_MARKUP, PRODUCT_FORM_MARKUP))
	}

	pub fn query(&self, selector: &str) -> Element {
		self.container.query_selector(selector).unwrap().unwrap_or_else(|| panic!("missing `{}`", selector))
	}

	pub fn query_html(&self, selector: &str) -> HtmlElement {
		self.query(selector).dyn_into().unwrap()
	}

	pub fn drawer_root(&self) -> Element {
		self.query("cart-drawer")
	}
}

impl Drop for Fixture {
	fn drop(&mut self) {
		self.container.remove();
	}
}
