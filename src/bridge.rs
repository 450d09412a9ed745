//! Turns clicks on a third-party product form's add button into cart adds that open the drawer.
//!
//! The widget re-renders its buttons at will, so clicks are observed once at a stable ancestor
//! instead of being bound to the buttons themselves. Nothing else about the widget is assumed.

use crate::{
	config::Config,
	drawer::DrawerHandle,
	error::CartError,
	fetch::{AddPayload, CartClient},
};
use gloo_events::{EventListener, EventListenerOptions};
use std::rc::Rc;
use tracing::{debug, error, info, instrument, trace, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, EventTarget, HtmlButtonElement, HtmlElement, HtmlFormElement, Node};

/// How a successful add was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
	/// The drawer was opened and refreshes itself.
	Opened,
	/// The drawer can't refresh, so the broader section markup was spliced in.
	Spliced,
	/// The drawer was opened but the fallback markup had no usable container.
	OpenedWithoutContent,
}

/// Swaps a control's content for a busy label until dropped.
///
/// The original child nodes are kept aside and put back as they were. A control that is already busy
/// can't be acquired again, so overlapping adds restore the label exactly once.
#[derive(Debug)]
#[must_use]
pub struct BusyIndicator {
	control: HtmlElement,
	original_children: Vec<Node>,
}

const BUSY_ATTRIBUTE: &str = "aria-busy";

impl BusyIndicator {
	/// Returns [`None`] if `control` is already showing a busy label.
	pub fn acquire(control: HtmlElement, label: &str) -> Option<Self> {
		if control.get_attribute(BUSY_ATTRIBUTE).as_deref() == Some("true") {
			trace!("Control already busy.");
			return None;
		}

		let mut original_children = Vec::new();
		while let Some(child) = control.first_child() {
			match control.remove_child(&child) {
				Ok(child) => original_children.push(child),
				Err(error) => {
					warn!(?error, "Failed to set aside busy control content.");
					break;
				}
			}
		}
		control.set_text_content(Some(label));
		if let Err(error) = control.set_attribute(BUSY_ATTRIBUTE, "true") {
			warn!(?error, "Failed to mark control busy.");
		}
		Some(Self { control, original_children })
	}
}

impl Drop for BusyIndicator {
	fn drop(&mut self) {
		self.control.set_text_content(None);
		for child in self.original_children.drain(..) {
			if let Err(error) = self.control.append_child(&child) {
				warn!(?error, "Failed to restore busy control content.");
			}
		}
		if let Err(error) = self.control.remove_attribute(BUSY_ATTRIBUTE) {
			warn!(?error, "Failed to clear busy marker.");
		}
	}
}

/// Subscription at the page boundary. Dropping it stops intercepting.
pub struct AddToCartBridge<C: CartClient + 'static, D: DrawerHandle + 'static> {
	inner: Rc<Inner<C, D>>,
	_listener: EventListener,
}

struct Inner<C, D> {
	client: Rc<C>,
	drawer: D,
	config: Rc<Config>,
}

impl<C: CartClient + 'static, D: DrawerHandle + 'static> core::fmt::Debug for AddToCartBridge<C, D> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("AddToCartBridge")
			.field("add_button_selector", &self.inner.config.add_button_selector)
			.finish_non_exhaustive()
	}
}

impl<C: CartClient + 'static, D: DrawerHandle + 'static> AddToCartBridge<C, D> {
	/// Observes all clicks bubbling through `boundary`.
	#[instrument(skip(boundary, client, drawer, config))]
	pub fn install(boundary: &EventTarget, client: Rc<C>, drawer: D, config: Rc<Config>) -> Self {
		let inner = Rc::new(Inner { client, drawer, config });

		let weak = Rc::downgrade(&inner);
		let listener = EventListener::new_with_options(boundary, "click", EventListenerOptions::enable_prevent_default(), move |event| {
			let inner = match weak.upgrade() {
				Some(inner) => inner,
				None => return,
			};
			let target = match event.target().and_then(|target| target.dyn_into::<Element>().ok()) {
				Some(target) => target,
				None => return,
			};
			let button = match target.closest(&inner.config.add_button_selector) {
				Ok(Some(button)) => button,
				Ok(None) => return,
				Err(error) => return warn!(?error, "Invalid add button selector."),
			};
			if is_disabled(&button) {
				return trace!("Ignoring click on disabled add button.");
			}

			let form = match enclosing_form(&target) {
				Ok(form) => form,
				Err(error) => return debug!("Not an add-to-cart context: {}", error),
			};

			// Keep the widget from submitting on its own as well.
			event.prevent_default();
			event.stop_propagation();

			let trigger = button.dyn_into::<HtmlElement>().ok();
			spawn_local(async move {
				let bridge = BridgeRef { inner };
				if let Err(error) = bridge.add_from_form(&form, trigger.as_ref()).await {
					error!("Add to cart failed: {}", error);
				}
			});
		});

		Self { inner, _listener: listener }
	}

	/// Submits `form`'s fields and shows the result in the drawer.
	///
	/// `trigger` receives the busy label if the form has no dedicated add control.
	///
	/// # Errors
	///
	/// [`CartError::Network`] if the add failed. The drawer is left untouched in that case.
	pub async fn add_from_form(&self, form: &HtmlFormElement, trigger: Option<&HtmlElement>) -> Result<AddOutcome, CartError> {
		BridgeRef { inner: Rc::clone(&self.inner) }.add_from_form(form, trigger).await
	}

	#[must_use]
	pub fn drawer(&self) -> &D {
		&self.inner.drawer
	}
}

/// Borrow of the bridge state usable from spawned tasks.
struct BridgeRef<C, D> {
	inner: Rc<Inner<C, D>>,
}

impl<C: CartClient + 'static, D: DrawerHandle + 'static> BridgeRef<C, D> {
	#[instrument(skip(self, form, trigger))]
	async fn add_from_form(&self, form: &HtmlFormElement, trigger: Option<&HtmlElement>) -> Result<AddOutcome, CartError> {
		let payload = AddPayload::from_form(form)?;
		let added = {
			let _busy = busy_control(form, &self.inner.config.busy_control_selector, trigger).and_then(|control| BusyIndicator::acquire(control, &self.inner.config.busy_label));
			self.inner.client.request_add(&payload).await
		};
		added?;
		let outcome = self.show_added().await;
		info!(?outcome, "Added to cart.");
		Ok(outcome)
	}

	/// Opens the drawer, which refreshes itself, or falls back to a coarse splice.
	async fn show_added(&self) -> AddOutcome {
		let drawer = &self.inner.drawer;
		drawer.open();
		if drawer.can_refresh() {
			return AddOutcome::Opened;
		}

		debug!("Drawer can't refresh itself; splicing broader section markup.");
		let config = &self.inner.config;
		let spliced = match self.inner.client.fetch_sections().await {
			Ok(sections) => match sections.get(&config.section_id) {
				Some(markup) => drawer.replace_container(markup, &config.fallback_source_selector, &config.fallback_target_selector),
				None => Ok(false),
			},
			Err(error) => Err(error),
		};
		match spliced {
			Ok(true) => AddOutcome::Spliced,
			Ok(false) => AddOutcome::OpenedWithoutContent,
			Err(error) => {
				error!("Fallback section refresh failed: {}", error);
				AddOutcome::OpenedWithoutContent
			}
		}
	}
}

fn busy_control(form: &HtmlFormElement, selector: &str, trigger: Option<&HtmlElement>) -> Option<HtmlElement> {
	form.query_selector(selector)
		.ok()
		.flatten()
		.and_then(|control| control.dyn_into::<HtmlElement>().ok())
		.or_else(|| trigger.cloned())
}

fn enclosing_form(target: &Element) -> Result<HtmlFormElement, CartError> {
	target
		.closest("form")
		.map_err(|error| CartError::dom(&error))?
		.and_then(|form| form.dyn_into::<HtmlFormElement>().ok())
		.ok_or(CartError::BridgeContextMissing)
}

fn is_disabled(button: &Element) -> bool {
	match button.dyn_ref::<HtmlButtonElement>() {
		Some(button) => button.disabled(),
		None => button.has_attribute("disabled"),
	}
}
