//! Feature flag client for Rust.
//!
//! The [`Client`] downloads the boolean feature flags of a project into a local cache,
//! then keeps that cache in sync through a WebSocket channel.

#![warn(missing_docs)]

mod builder;
mod cache;
mod client;
mod constants;
mod errors;
mod events;
mod fetch;
mod model;
mod modes;
mod utils;

pub use builder::ClientBuilder;
pub use client::Client;
pub use constants::PKG_VERSION;
pub use errors::{ClientError, ErrorKind};
pub use events::Event;
pub use model::enums::ChannelState;
pub use modes::ReconnectPolicy;
