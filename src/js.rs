//! JavaScript entry point for storefront pages.

use crate::{
	bridge::AddToCartBridge,
	config::Config,
	drawer::CartDrawer,
	error::CartError,
	fetch::HttpCartClient,
	patch::PatchReport,
};
use core::convert::TryFrom;
use js_sys::{Function, Promise, Reflect};
use std::rc::Rc;
use tracing::{info, warn};
use wasm_bindgen::{closure::Closure, prelude::wasm_bindgen, JsCast, JsValue};
use wasm_bindgen_futures::future_to_promise;

const RENDER_CONTENTS: &str = "renderContents";

/// The drawer and add-to-cart bridge of one page.
///
/// The drawer root also gets a callable `renderContents` property for collaborators that only know the element.
/// It is removed again when this is freed.
#[wasm_bindgen]
pub struct StorefrontCart {
	drawer: CartDrawer<HttpCartClient>,
	_bridge: AddToCartBridge<HttpCartClient, CartDrawer<HttpCartClient>>,
	_render_contents: Closure<dyn Fn() -> Promise>,
}

#[wasm_bindgen]
impl StorefrontCart {
	/// Mounts onto the page's drawer element and starts intercepting add-to-cart clicks below `<body>`.
	///
	/// `config_json` may override any [`Config`] field.
	///
	/// # Errors
	///
	/// Throws if the configuration is invalid or the page lacks a drawer element or `<body>`.
	pub fn mount(config_json: Option<String>) -> Result<StorefrontCart, JsValue> {
		let config = match config_json {
			Some(json) => Config::from_json(&json)?,
			None => Config::default(),
		}
		.with_storefront_routes();
		let config = Rc::new(config);

		let document = web_sys::window()
			.and_then(|window| window.document())
			.ok_or_else(|| CartError::Dom("no document".to_owned()))?;
		let root = document
			.query_selector(&config.drawer_selector)
			.map_err(|error| CartError::dom(&error))?
			.ok_or_else(|| CartError::Dom(format!("no element matches `{}`", config.drawer_selector)))?;
		let body = document.body().ok_or_else(|| CartError::Dom("no <body>".to_owned()))?;

		let client = Rc::new(HttpCartClient::new(config.endpoints(), config.section_id.clone()));
		let drawer = CartDrawer::new(root, Rc::clone(&client), Rc::clone(&config))?;
		let bridge = AddToCartBridge::install(&body, client, drawer.clone(), config);

		let render_contents = {
			let drawer = drawer.clone();
			Closure::wrap(Box::new(move || {
				let drawer = drawer.clone();
				future_to_promise(async move {
					let report = drawer.refresh().await?;
					Ok::<_, JsValue>(applied_count(&report))
				})
			}) as Box<dyn Fn() -> Promise>)
		};
		let function: &Function = render_contents.as_ref().unchecked_ref();
		Reflect::set(crate::drawer::DrawerHandle::root(&drawer), &JsValue::from_str(RENDER_CONTENTS), function)?;

		info!("Cart drawer mounted.");
		Ok(StorefrontCart {
			drawer,
			_bridge: bridge,
			_render_contents: render_contents,
		})
	}

	pub fn open(&self) {
		self.drawer.open();
	}

	pub fn close(&self) {
		self.drawer.close();
	}

	/// Resolves with the number of regions replaced.
	pub fn refresh(&self) -> Promise {
		let drawer = self.drawer.clone();
		future_to_promise(async move {
			let report = drawer.refresh().await?;
			Ok::<_, JsValue>(applied_count(&report))
		})
	}

	/// `closed`, `opening`, `open` or `closing`.
	#[wasm_bindgen(getter)]
	pub fn state(&self) -> String {
		self.drawer.visibility().as_str().to_owned()
	}
}

impl Drop for StorefrontCart {
	fn drop(&mut self) {
		let root = crate::drawer::DrawerHandle::root(&self.drawer);
		if let Err(error) = Reflect::delete_property(root, &JsValue::from_str(RENDER_CONTENTS)) {
			warn!(?error, "Failed to remove `renderContents`.");
		}
	}
}

fn applied_count(report: &PatchReport) -> JsValue {
	JsValue::from(u32::try_from(report.applied.len()).unwrap_or(u32::MAX))
}
