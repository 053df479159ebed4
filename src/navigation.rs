//! Page-transition notifications for host code such as progress bars.
//!
//! Each navigation attempt moves `idle → navigating → idle` and is bracketed by a
//! `phx:page-loading-start`/`phx:page-loading-stop` pair carrying the same metadata.
//! `phx:navigate` is independent and purely observational.

use crate::{
	dom::{Dom, EventTarget},
	error::ProtocolError,
	node::NodeId,
};
use core::fmt;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, instrument, warn};

pub const PAGE_LOADING_START: &str = "phx:page-loading-start";
pub const PAGE_LOADING_STOP: &str = "phx:page-loading-stop";
pub const NAVIGATE: &str = "phx:navigate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationKind {
	Redirect,
	Patch,
	Initial,
	Element,
	Error,
}

/// Metadata shared by the start and stop events of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageLoading {
	pub kind: NavigationKind,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub to: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub target: Option<NodeId>,
}
impl PageLoading {
	/// For every kind except [`NavigationKind::Element`].
	pub fn to(kind: NavigationKind, href: impl Into<String>) -> Self {
		debug_assert_ne!(kind, NavigationKind::Element, "Element navigations carry a target instead of `to`");
		Self {
			kind,
			to: Some(href.into()),
			target: None,
		}
	}

	#[must_use]
	pub fn element(target: NodeId) -> Self {
		Self {
			kind: NavigationKind::Element,
			to: None,
			target: Some(target),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
	Start(PageLoading),
	Stop(PageLoading),
	/// A committed URL-bar change.
	Navigate {
		href: String,
		patch: bool,
		/// Caused by back/forward history navigation.
		pop: bool,
	},
}
impl NavigationEvent {
	#[must_use]
	pub fn name(&self) -> &'static str {
		match self {
			NavigationEvent::Start(_) => PAGE_LOADING_START,
			NavigationEvent::Stop(_) => PAGE_LOADING_STOP,
			NavigationEvent::Navigate { .. } => NAVIGATE,
		}
	}

	#[must_use]
	pub fn detail(&self) -> Value {
		match self {
			NavigationEvent::Start(loading) | NavigationEvent::Stop(loading) => serde_json::to_value(loading).unwrap_or_else(|error| {
				error!("phx-reconcile bug: Failed to serialize page loading metadata: {}", error);
				Value::Null
			}),
			NavigationEvent::Navigate { href, patch, pop } => json!({ "href": href, "patch": patch, "pop": pop }),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NavigationId(u64);
impl NavigationId {
	#[must_use]
	pub fn get(self) -> u64 {
		self.0
	}
}
impl fmt::Display for NavigationId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug, Default)]
pub struct NavigationDispatcher {
	next_id: u64,
	/// In start order.
	active: Vec<(NavigationId, PageLoading)>,
}
impl NavigationDispatcher {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn is_navigating(&self) -> bool {
		!self.active.is_empty()
	}

	pub fn active(&self) -> impl Iterator<Item = (NavigationId, &PageLoading)> + '_ {
		self.active.iter().map(|(id, loading)| (*id, loading))
	}

	/// Enters `navigating` for a new attempt and emits its start event.
	#[instrument(skip(self, dom))]
	pub fn start(&mut self, dom: &mut impl Dom, loading: PageLoading) -> NavigationId {
		self.next_id += 1;
		let id = NavigationId(self.next_id);
		emit(dom, &NavigationEvent::Start(loading.clone()));
		self.active.push((id, loading));
		debug!(%id, "Navigation started.");
		id
	}

	/// Leaves `navigating` for `id`, emitting a stop event with the start metadata.
	///
	/// # Errors
	///
	/// [`ProtocolError::UnknownNavigation`] if `id` isn't active. Nothing is emitted in that case.
	#[instrument(skip(self, dom))]
	pub fn stop(&mut self, dom: &mut impl Dom, id: NavigationId) -> Result<(), ProtocolError> {
		let loading = self.take(id)?;
		emit(dom, &NavigationEvent::Stop(loading));
		debug!(%id, "Navigation stopped.");
		Ok(())
	}

	/// Like [`stop`](`NavigationDispatcher::stop`), but the stop event reports [`NavigationKind::Error`].
	#[instrument(skip(self, dom))]
	pub fn fail(&mut self, dom: &mut impl Dom, id: NavigationId) -> Result<(), ProtocolError> {
		let mut loading = self.take(id)?;
		loading.kind = NavigationKind::Error;
		emit(dom, &NavigationEvent::Stop(loading));
		debug!(%id, "Navigation failed.");
		Ok(())
	}

	/// Reports a committed URL change. Doesn't affect navigation state.
	#[instrument(skip(self, dom))]
	pub fn navigate(&mut self, dom: &mut impl Dom, href: &str, patch: bool, pop: bool) {
		emit(
			dom,
			&NavigationEvent::Navigate {
				href: href.to_owned(),
				patch,
				pop,
			},
		);
	}

	fn take(&mut self, id: NavigationId) -> Result<PageLoading, ProtocolError> {
		match self.active.iter().position(|(active, _)| *active == id) {
			Some(index) => Ok(self.active.remove(index).1),
			None => {
				error!(%id, "Stop for a navigation that isn't active.");
				Err(ProtocolError::UnknownNavigation(id.0))
			}
		}
	}
}

fn emit(dom: &mut impl Dom, event: &NavigationEvent) {
	if let Err(error) = dom.dispatch(&EventTarget::Global, event.name(), &event.detail(), false) {
		warn!("Failed to dispatch {}: {}", event.name(), error);
	}
}
