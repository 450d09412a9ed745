//! A storefront cart drawer for the browser.
//!
//! [`CartDrawer`] keeps server-rendered cart sections in sync with the cart on the server,
//! and [`AddToCartBridge`] opens it after adds made through a third-party product form.
//!
//! Every refresh is a full fetch → patch → rebind cycle. Overlapping cycles aren't ordered by default:
//! whichever completes last determines what is shown (see [`Config::discard_stale_fragments`]).

#![doc(html_root_url = "https://docs.rs/cart-drawer/0.0.1")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod bridge;
pub mod config;
pub mod drawer;
pub mod error;
pub mod fetch;
pub mod js;
pub mod line_items;
pub mod patch;
pub mod state;

pub use bridge::{AddOutcome, AddToCartBridge};
pub use config::Config;
pub use drawer::{CartDrawer, ClassToggleDrawer, DrawerHandle};
pub use error::CartError;
pub use fetch::{AddPayload, CartClient, HttpCartClient, LineRef, MutationRequest};
pub use state::DrawerVisibility;
