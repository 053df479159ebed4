//! Loading classes derived from the [`Ledger`].
//!
//! Nothing here keeps state of its own: every call recomputes class membership from the current counts,
//! so calling [`refresh`] more often than needed is harmless.

use crate::{
	dom::Dom,
	ledger::Ledger,
	node::{Kind, NodeId},
};
use tracing::{instrument, trace, warn};

pub const CONNECTED_CLASS: &str = "phx-connected";
pub const LOADING_CLASS: &str = "phx-loading";
pub const ERROR_CLASS: &str = "phx-error";

/// Whether `node` should carry `kind`'s loading class right now.
#[must_use]
pub fn is_loading(ledger: &Ledger, node: &NodeId, kind: Kind) -> bool {
	ledger.count(node, kind) > 0 || (kind.is_form_kind() && ledger.owned_by(node).any(|record| record.count(kind) > 0))
}

/// Re-evaluates `node` and its owner form after a Ledger mutation.
#[instrument(skip(dom, ledger))]
pub fn refresh(dom: &mut impl Dom, ledger: &mut Ledger, node: &NodeId) {
	apply_classes(dom, ledger, node);
	apply_submit_label(dom, ledger, node);
	if let Some(form) = ledger.record(node).and_then(|record| record.owner_form.clone()) {
		apply_classes(dom, ledger, &form);
	}
}

fn apply_classes(dom: &mut impl Dom, ledger: &Ledger, node: &NodeId) {
	if !dom.contains(node) {
		return trace!("{:?} left the document; Skipping loading classes.", node);
	}
	for kind in Kind::ALL {
		let class = kind.loading_class();
		let result = if is_loading(ledger, node, kind) {
			if dom.has_class(node, class) {
				continue;
			}
			dom.add_class(node, class)
		} else {
			if !dom.has_class(node, class) {
				continue;
			}
			dom.remove_class(node, class)
		};
		if let Err(error) = result {
			warn!("Failed to update {} on {:?}: {}", class, node, error);
		}
	}
}

fn apply_submit_label(dom: &mut impl Dom, ledger: &mut Ledger, node: &NodeId) {
	let submitting = ledger.count(node, Kind::Submit) > 0;
	let label = match ledger.record_mut(node).and_then(|record| record.submit_label.as_mut()) {
		Some(label) => label,
		None => return,
	};
	if !dom.contains(node) {
		return;
	}
	match (submitting, label.original_text.is_some()) {
		(true, false) => {
			label.original_text = Some(dom.text(node).unwrap_or_default());
			let swapped = dom.set_text(node, &label.disable_with).and_then(|()| dom.set_attribute(node, "disabled", ""));
			if let Err(error) = swapped {
				warn!("Failed to swap submit label on {:?}: {}", node, error);
			}
		}
		(false, true) => {
			let original_text = label.original_text.take().unwrap_or_default();
			let restored = dom.set_text(node, &original_text).and_then(|()| dom.remove_attribute(node, "disabled"));
			if let Err(error) = restored {
				warn!("Failed to restore submit label on {:?}: {}", node, error);
			}
		}
		_ => (),
	}
}

/// Container-level connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
	Connecting,
	Connected,
	/// The transport was lost. Shows both `phx-error` and `phx-loading`.
	Disconnected,
}

/// Sets the container classes for `connection`.
#[instrument(skip(dom))]
pub fn apply_connection(dom: &mut impl Dom, container: &NodeId, connection: Connection) {
	let (connected, loading, error) = match connection {
		Connection::Connecting => (false, true, false),
		Connection::Connected => (true, false, false),
		Connection::Disconnected => (false, true, true),
	};
	for (class, present) in [(CONNECTED_CLASS, connected), (LOADING_CLASS, loading), (ERROR_CLASS, error)] {
		let result = if present { dom.add_class(container, class) } else { dom.remove_class(container, class) };
		if let Err(error) = result {
			warn!("Failed to update {} on container {:?}: {}", class, container, error);
		}
	}
}
