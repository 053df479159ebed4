#![doc(html_root_url = "https://docs.rs/phx-reconcile/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Client-resident reconciliation for server-rendered views.
//!
//! A [`Reconciler`] tracks interaction round trips in a [`Ledger`](`ledger::Ledger`), shows their progress as
//! loading classes, runs optimistic [`CommandQueue`](`command::CommandQueue`)s and gates incoming server diffs
//! so that they never clobber nodes with a round trip or optimistic effect still in flight.
//!
//! The document is reached only through the [`Dom`](`dom::Dom`) trait. [`memory::MemoryDom`] is always available;
//! `web::WebDom` needs the `"web"` feature.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod claims;
pub mod command;
pub mod config;
pub mod counts;
pub mod dom;
pub mod error;
pub mod gate;
pub mod interpreter;
pub mod ledger;
pub mod loading;
pub mod memory;
pub mod navigation;
pub mod node;
pub mod push;
mod reconciler;

#[cfg(feature = "web")]
pub mod web;

pub use config::Config;
pub use error::{CommandError, DomError, LedgerError, ProtocolError};
pub use gate::{Diff, GateReport, PatchTree};
pub use node::{Kind, NodeId, Ref};
pub use push::{OutboundPush, Resolution, Transport};
pub use reconciler::Reconciler;
