//! The host document, as far as the reconciliation core needs to see it.

use crate::{error::DomError, node::NodeId};
use core::time::Duration;
use serde_json::Value;

/// Where a custom event is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTarget {
	Node(NodeId),
	/// The global scope (`window` in browsers).
	Global,
}

/// A document backend.
///
/// Node arguments that aren't in the document yield [`DomError::NodeNotFound`] from mutators and [`None`] or `false` from accessors.
pub trait Dom {
	/// The backend's diff payload for a single node. Opaque to the gate.
	type Patch;

	fn contains(&self, node: &NodeId) -> bool;
	fn parent(&self, node: &NodeId) -> Option<NodeId>;
	/// Upper-case for HTML elements, like `Element.tagName`.
	fn tag_name(&self, node: &NodeId) -> Option<String>;

	/// Document order.
	fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError>;
	/// Descendants of `root` only, document order.
	fn query_within(&self, root: &NodeId, selector: &str) -> Result<Vec<NodeId>, DomError>;
	/// `node` itself or its nearest matching ancestor.
	fn closest(&self, node: &NodeId, selector: &str) -> Result<Option<NodeId>, DomError>;

	fn attribute(&self, node: &NodeId, name: &str) -> Option<String>;
	fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), DomError>;
	fn remove_attribute(&mut self, node: &NodeId, name: &str) -> Result<(), DomError>;

	fn has_class(&self, node: &NodeId, class: &str) -> bool;
	fn add_class(&mut self, node: &NodeId, class: &str) -> Result<(), DomError>;
	fn remove_class(&mut self, node: &NodeId, class: &str) -> Result<(), DomError>;

	fn text(&self, node: &NodeId) -> Option<String>;
	fn set_text(&mut self, node: &NodeId, text: &str) -> Result<(), DomError>;

	fn is_visible(&self, node: &NodeId) -> bool;
	/// `display` is the CSS `display` value used when showing.
	fn set_visible(&mut self, node: &NodeId, visible: bool, display: &str) -> Result<(), DomError>;

	/// Emits a custom event carrying `detail`.
	fn dispatch(&mut self, target: &EventTarget, name: &str, detail: &Value, bubbles: bool) -> Result<(), DomError>;

	/// Monotonic time since an arbitrary origin.
	fn now(&self) -> Duration;

	fn apply(&mut self, node: &NodeId, patch: &Self::Patch) -> Result<(), DomError>;

	/// Number of ancestors of `node`.
	fn depth(&self, node: &NodeId) -> usize {
		let mut depth = 0;
		let mut current = self.parent(node);
		while let Some(parent) = current {
			depth += 1;
			current = self.parent(&parent);
		}
		depth
	}

	/// Whether `ancestor` is `node` or one of its ancestors.
	fn is_inclusive_ancestor(&self, ancestor: &NodeId, node: &NodeId) -> bool {
		let mut current = Some(node.clone());
		while let Some(candidate) = current {
			if &candidate == ancestor {
				return true;
			}
			current = self.parent(&candidate);
		}
		false
	}
}
