//! The drawer component: visibility lifecycle plus the fetch → patch → rebind refresh cycle.

use crate::{
	config::Config,
	error::CartError,
	fetch::{CartClient, FetchSequence, MutationRequest},
	line_items::{bind_item_controls, LineItemControls},
	patch::{self, PatchReport},
	state::{DrawerVisibility, PendingClose, Transition, VisibilityMachine},
};
use core::cell::RefCell;
use gloo_events::EventListener;
use gloo_timers::callback::Timeout;
use std::rc::{Rc, Weak};
use tracing::{debug, error, info, instrument, trace, warn};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::spawn_local;
use web_sys::{Element, HtmlElement, KeyboardEvent, Node};

/// What collaborators such as the add-to-cart bridge hold on to.
pub trait DrawerHandle {
	fn open(&self);
	fn close(&self);

	/// Whether [`DrawerHandle::open`] resynchronizes the contents by itself.
	fn can_refresh(&self) -> bool;

	fn root(&self) -> &Element;

	/// Coarse content swap for drawers that can't refresh themselves.
	///
	/// # Errors
	///
	/// [`CartError::Dom`] if the markup can't be parsed or a selector is invalid.
	fn replace_container(&self, raw_markup: &str, source_selector: &str, target_selector: &str) -> Result<bool, CartError> {
		patch::splice_container(self.root(), raw_markup, source_selector, target_selector)
	}
}

/// The cart drawer. Cloning yields another handle to the same drawer.
///
/// Sole writer of the DOM under its root element.
pub struct CartDrawer<C: CartClient + 'static> {
	inner: Rc<Inner<C>>,
}

struct Inner<C: CartClient + 'static> {
	root: Element,
	body: Option<HtmlElement>,
	client: Rc<C>,
	config: Rc<Config>,
	machine: RefCell<VisibilityMachine>,
	close_timer: RefCell<Option<Timeout>>,
	sequence: FetchSequence,
	item_controls: RefCell<LineItemControls>,
	focus_return: RefCell<Option<HtmlElement>>,
	observers: RefCell<Vec<Rc<dyn Fn(Transition)>>>,
	listeners: RefCell<Vec<EventListener>>,
}

impl<C: CartClient + 'static> Clone for CartDrawer<C> {
	fn clone(&self) -> Self {
		Self { inner: Rc::clone(&self.inner) }
	}
}

impl<C: CartClient + 'static> core::fmt::Debug for CartDrawer<C> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("CartDrawer")
			.field("root", &self.inner.root)
			.field("visibility", &self.visibility())
			.field("fetches_issued", &self.inner.sequence.issued())
			.finish()
	}
}

impl<C: CartClient + 'static> CartDrawer<C> {
	/// Takes over `root`, forcing it into the closed state.
	///
	/// Escape key-ups anywhere inside the drawer and clicks on its overlay or close button close it.
	///
	/// # Errors
	///
	/// [`CartError::Dom`] if `root` isn't attached to a document.
	#[instrument(skip(client, config))]
	pub fn new(root: Element, client: Rc<C>, config: Rc<Config>) -> Result<Self, CartError> {
		let document = root.owner_document().ok_or_else(|| CartError::Dom("drawer root has no owner document".to_owned()))?;
		let drawer = Self {
			inner: Rc::new(Inner {
				root,
				body: document.body(),
				client,
				config,
				machine: RefCell::new(VisibilityMachine::new()),
				close_timer: RefCell::new(None),
				sequence: FetchSequence::new(),
				item_controls: RefCell::new(LineItemControls::default()),
				focus_return: RefCell::new(None),
				observers: RefCell::new(Vec::new()),
				listeners: RefCell::new(Vec::new()),
			}),
		};

		drawer.render_visibility(DrawerVisibility::Closed);
		drawer.listen();
		drawer.rebind_items();
		Ok(drawer)
	}

	fn listen(&self) {
		let root = &self.inner.root;

		let weak = Rc::downgrade(&self.inner);
		let keyup = EventListener::new(root, "keyup", move |event| {
			let is_escape = event.dyn_ref::<KeyboardEvent>().map_or(false, |event| event.code() == "Escape" || event.key() == "Escape");
			if is_escape {
				if let Some(drawer) = upgrade(&weak) {
					drawer.close();
				}
			}
		});

		// Delegated, since the close button may live inside a patched region.
		let weak = Rc::downgrade(&self.inner);
		let click = EventListener::new(root, "click", move |event| {
			let drawer = match upgrade(&weak) {
				Some(drawer) => drawer,
				None => return,
			};
			let target = match event.target().and_then(|target| target.dyn_into::<Element>().ok()) {
				Some(target) => target,
				None => return,
			};
			let config = &drawer.inner.config;
			for selector in [&config.overlay_selector, &config.close_button_selector] {
				match target.closest(selector) {
					Ok(Some(dismiss)) if contains(&drawer.inner.root, &dismiss) => return drawer.close(),
					Ok(_) => (),
					Err(error) => warn!(selector = selector.as_str(), ?error, "Invalid dismiss selector."),
				}
			}
		});

		self.inner.listeners.borrow_mut().extend([keyup, click]);
	}

	#[must_use]
	pub fn visibility(&self) -> DrawerVisibility {
		self.inner.machine.borrow().state()
	}

	#[must_use]
	pub fn config(&self) -> &Config {
		&self.inner.config
	}

	#[must_use]
	pub fn client(&self) -> &Rc<C> {
		&self.inner.client
	}

	/// Number of fragment fetches issued so far.
	#[must_use]
	pub fn fetches_issued(&self) -> u64 {
		self.inner.sequence.issued()
	}

	/// Number of listeners currently bound to line-item controls.
	#[must_use]
	pub fn bound_item_controls(&self) -> usize {
		self.inner.item_controls.borrow().len()
	}

	/// Calls `observer` after every visibility transition, once the DOM reflects it.
	pub fn on_transition(&self, observer: impl Fn(Transition) + 'static) {
		self.inner.observers.borrow_mut().push(Rc::new(observer));
	}

	/// Shows the drawer and always refreshes its contents, even if it was open already.
	#[instrument(skip(self))]
	pub fn open(&self) {
		// Cancels a pending `Closing → Closed`.
		drop(self.inner.close_timer.borrow_mut().take());

		let began = self.inner.machine.borrow_mut().begin_open();
		match began {
			Some(transition) => {
				if transition.from == DrawerVisibility::Closed {
					self.remember_focus();
				}
				self.enter(transition);
				let finished = self.inner.machine.borrow_mut().finish_open();
				if let Some(transition) = finished {
					self.enter(transition);
				}
			}
			None => trace!("Drawer already open."),
		}

		self.refresh_in_background();
	}

	/// Starts hiding the drawer. `hidden` is applied once the closing transition had time to finish.
	#[instrument(skip(self))]
	pub fn close(&self) {
		let began = self.inner.machine.borrow_mut().begin_close();
		let (transition, pending) = match began {
			Some(began) => began,
			None => return trace!("Drawer already closed or closing."),
		};
		self.enter(transition);
		self.return_focus();

		let weak = Rc::downgrade(&self.inner);
		let timer = Timeout::new(self.inner.config.close_delay_ms, move || {
			if let Some(drawer) = upgrade(&weak) {
				drawer.finish_close(pending);
			}
		});
		*self.inner.close_timer.borrow_mut() = Some(timer);
	}

	fn finish_close(&self, pending: PendingClose) {
		let finished = self.inner.machine.borrow_mut().finish_close(pending);
		match finished {
			Some(transition) => self.enter(transition),
			None => trace!("Close was superseded."),
		}
	}

	fn enter(&self, transition: Transition) {
		self.render_visibility(transition.to);
		debug!(from = %transition.from, to = %transition.to, "Drawer transition.");
		let observers = self.inner.observers.borrow().clone();
		for observer in observers {
			observer(transition);
		}
	}

	/// Brings attributes and classes in line with `state`.
	fn render_visibility(&self, state: DrawerVisibility) {
		let root = &self.inner.root;
		let config = &self.inner.config;

		if state.is_hidden() {
			log_dom("set `hidden`", root.set_attribute("hidden", ""));
		} else {
			log_dom("remove `hidden`", root.remove_attribute("hidden"));
		}
		log_dom("toggle active class", root.class_list().toggle_with_force(&config.active_class, state.is_active()).map(drop));
		log_dom("set drawer state", root.set_attribute("data-drawer-state", state.as_str()));

		if let Some(body) = &self.inner.body {
			let classes = body.class_list();
			for class in &config.body_open_classes {
				log_dom("toggle body class", classes.toggle_with_force(class, state.is_active()).map(drop));
			}
		}
	}

	fn remember_focus(&self) {
		let focused = self
			.inner
			.root
			.owner_document()
			.and_then(|document| document.active_element())
			.filter(|focused| !contains(&self.inner.root, focused))
			.and_then(|focused| focused.dyn_into::<HtmlElement>().ok());
		*self.inner.focus_return.borrow_mut() = focused;
	}

	fn return_focus(&self) {
		let focused = self.inner.focus_return.borrow_mut().take();
		if let Some(focused) = focused {
			log_dom("return focus", focused.focus());
		}
	}

	/// One fetch → patch → rebind cycle.
	///
	/// # Errors
	///
	/// [`CartError::Network`] if the fragment couldn't be fetched, [`CartError::Dom`] if it couldn't be parsed.
	/// The drawer's contents are left as they were in both cases.
	#[instrument(skip(self))]
	pub async fn refresh(&self) -> Result<PatchReport, CartError> {
		let ticket = self.inner.sequence.issue();
		let markup = self.inner.client.fetch_cart_fragment().await?;

		if !self.inner.sequence.accept(ticket, self.inner.config.discard_stale_fragments) {
			debug!(?ticket, "Dropping stale cart fragment.");
			return Ok(PatchReport::stale());
		}

		// Fails only before the first region is touched, so there is nothing to rebind then.
		let report = patch::apply_fragment(&self.inner.root, &markup, &self.inner.config.region_selectors)?;
		self.rebind_items();
		info!(applied = report.applied.len(), skipped = report.skipped.len(), "Drawer contents refreshed.");
		Ok(report)
	}

	/// Spawns [`CartDrawer::refresh`], logging failures.
	pub fn refresh_in_background(&self) {
		let drawer = self.clone();
		spawn_local(async move {
			if let Err(error) = drawer.refresh().await {
				error!("Cart drawer refresh failed, leaving contents as they are: {}", error);
			}
		});
	}

	/// Sends `request`, then refreshes whether or not it succeeded.
	///
	/// # Errors
	///
	/// The mutation's error if it failed, otherwise the refresh's.
	#[instrument(skip(self))]
	pub async fn mutate(&self, request: MutationRequest) -> Result<PatchReport, CartError> {
		let mutation = self.inner.client.request_mutation(&request).await;
		if let Err(error) = &mutation {
			error!("Cart line change failed, resynchronizing anyway: {}", error);
		}
		let refresh = self.refresh().await;
		mutation.and(refresh)
	}

	fn rebind_items(&self) {
		let weak = Rc::downgrade(&self.inner);
		let on_mutation: Rc<dyn Fn(MutationRequest)> = Rc::new(move |request: MutationRequest| {
			if let Some(drawer) = upgrade(&weak) {
				spawn_local(async move {
					if let Err(error) = drawer.mutate(request).await {
						error!("Cart line update incomplete: {}", error);
					}
				});
			}
		});

		drop(self.inner.item_controls.replace(LineItemControls::default()));
		let controls = bind_item_controls(&self.inner.root, &self.inner.config, on_mutation);
		*self.inner.item_controls.borrow_mut() = controls;
	}
}

impl<C: CartClient + 'static> DrawerHandle for CartDrawer<C> {
	fn open(&self) {
		CartDrawer::open(self);
	}

	fn close(&self) {
		CartDrawer::close(self);
	}

	fn can_refresh(&self) -> bool {
		true
	}

	fn root(&self) -> &Element {
		&self.inner.root
	}
}

fn upgrade<C: CartClient + 'static>(weak: &Weak<Inner<C>>) -> Option<CartDrawer<C>> {
	weak.upgrade().map(|inner| CartDrawer { inner })
}

fn contains(root: &Element, node: &Node) -> bool {
	root.contains(Some(node))
}

fn log_dom(what: &str, result: Result<(), JsValue>) {
	if let Err(error) = result {
		warn!(?error, "Failed to {}.", what);
	}
}

/// A drawer that only toggles its visual state and can't resynchronize itself.
///
/// The add-to-cart bridge splices broader section markup into it instead.
#[derive(Debug, Clone)]
pub struct ClassToggleDrawer {
	root: Element,
	body: Option<HtmlElement>,
	config: Rc<Config>,
}

impl ClassToggleDrawer {
	#[must_use]
	pub fn new(root: Element, config: Rc<Config>) -> Self {
		let body = root.owner_document().and_then(|document| document.body());
		Self { root, body, config }
	}

	fn toggle(&self, active: bool) {
		log_dom("toggle active class", self.root.class_list().toggle_with_force(&self.config.active_class, active).map(drop));
		if active {
			log_dom("remove `hidden`", self.root.remove_attribute("hidden"));
		}
		if let Some(body) = &self.body {
			for class in &self.config.body_open_classes {
				log_dom("toggle body class", body.class_list().toggle_with_force(class, active).map(drop));
			}
		}
	}
}

impl DrawerHandle for ClassToggleDrawer {
	fn open(&self) {
		self.toggle(true);
	}

	fn close(&self) {
		self.toggle(false);
	}

	fn can_refresh(&self) -> bool {
		false
	}

	fn root(&self) -> &Element {
		&self.root
	}
}
