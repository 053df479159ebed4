//! [`Dom`] over a live [***Document***](https://developer.mozilla.org/en-US/docs/Web/API/Document).
//!
//! Node identities are element [***id***](https://developer.mozilla.org/en-US/docs/Web/API/Element/id)s.
//! Elements matched by a selector that don't have one are assigned a synthetic `phx-node-<n>` id.

use crate::{
	dom::{Dom, EventTarget},
	error::DomError,
	node::NodeId,
};
use core::{cell::Cell, time::Duration};
use serde_json::Value;
use tracing::{instrument, trace};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CustomEvent, CustomEventInit, Document, Element, HtmlElement, NodeList, Window};

/// Patches understood by [`WebDom`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebPatch {
	SetInnerHtml(String),
	/// Replaces the element itself. The replacement should carry the same `id`.
	SetOuterHtml(String),
	SetAttribute(String, String),
	RemoveAttribute(String),
	SetText(String),
	Remove,
}

#[derive(Debug)]
pub struct WebDom {
	window: Window,
	document: Document,
	synthetic_ids: Cell<u64>,
}
impl WebDom {
	/// Attaches to the current window's document.
	///
	/// # Errors
	///
	/// [`DomError::Backend`] outside of a browsing context.
	pub fn new() -> Result<Self, DomError> {
		let window = web_sys::window().ok_or_else(|| DomError::Backend("no `window`".into()))?;
		let document = window.document().ok_or_else(|| DomError::Backend("no `document`".into()))?;
		Ok(Self::with_document(window, document))
	}

	#[must_use]
	pub fn with_document(window: Window, document: Document) -> Self {
		Self {
			window,
			document,
			synthetic_ids: Cell::new(0),
		}
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}

	/// The live element for `node`.
	///
	/// # Errors
	///
	/// [`DomError::NodeNotFound`] if no connected element has this id.
	pub fn element(&self, node: &NodeId) -> Result<Element, DomError> {
		self.document.get_element_by_id(node.as_str()).ok_or_else(|| DomError::NodeNotFound(node.clone()))
	}

	fn identify(&self, element: &Element) -> NodeId {
		let id = element.id();
		if !id.is_empty() {
			return NodeId::from(id);
		}
		let n = self.synthetic_ids.get() + 1;
		self.synthetic_ids.set(n);
		let id = format!("phx-node-{}", n);
		element.set_id(&id);
		trace!(%id, "Assigned synthetic id.");
		NodeId::from(id)
	}

	fn identify_all(&self, list: &NodeList) -> Vec<NodeId> {
		(0..list.length())
			.filter_map(|i| list.item(i))
			.filter_map(|node| node.dyn_into::<Element>().ok())
			.map(|element| self.identify(&element))
			.collect()
	}

	fn html_element(&self, node: &NodeId) -> Result<HtmlElement, DomError> {
		self.element(node)?.dyn_into::<HtmlElement>().map_err(|element| DomError::Backend(format!("{:?} is not an HTML element", element.tag_name())))
	}
}

fn backend(error: JsValue) -> DomError {
	DomError::Backend(format!("{:?}", error))
}

impl Dom for WebDom {
	type Patch = WebPatch;

	fn contains(&self, node: &NodeId) -> bool {
		self.document.get_element_by_id(node.as_str()).is_some()
	}

	fn parent(&self, node: &NodeId) -> Option<NodeId> {
		let parent = self.element(node).ok()?.parent_element()?;
		Some(self.identify(&parent))
	}

	fn tag_name(&self, node: &NodeId) -> Option<String> {
		self.element(node).ok().map(|element| element.tag_name())
	}

	fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
		let list = self.document.query_selector_all(selector).map_err(|_| DomError::InvalidSelector(selector.to_owned()))?;
		Ok(self.identify_all(&list))
	}

	fn query_within(&self, root: &NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
		let list = self.element(root)?.query_selector_all(selector).map_err(|_| DomError::InvalidSelector(selector.to_owned()))?;
		Ok(self.identify_all(&list))
	}

	fn closest(&self, node: &NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
		let element = match self.element(node) {
			Ok(element) => element,
			Err(_) => return Ok(None),
		};
		let closest = element.closest(selector).map_err(|_| DomError::InvalidSelector(selector.to_owned()))?;
		Ok(closest.map(|closest| self.identify(&closest)))
	}

	fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
		self.element(node).ok()?.get_attribute(name)
	}

	fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), DomError> {
		self.element(node)?.set_attribute(name, value).map_err(backend)
	}

	fn remove_attribute(&mut self, node: &NodeId, name: &str) -> Result<(), DomError> {
		self.element(node)?.remove_attribute(name).map_err(backend)
	}

	fn has_class(&self, node: &NodeId, class: &str) -> bool {
		self.element(node).map_or(false, |element| element.class_list().contains(class))
	}

	fn add_class(&mut self, node: &NodeId, class: &str) -> Result<(), DomError> {
		self.element(node)?.class_list().add_1(class).map_err(backend)
	}

	fn remove_class(&mut self, node: &NodeId, class: &str) -> Result<(), DomError> {
		self.element(node)?.class_list().remove_1(class).map_err(backend)
	}

	fn text(&self, node: &NodeId) -> Option<String> {
		self.element(node).ok()?.text_content()
	}

	fn set_text(&mut self, node: &NodeId, text: &str) -> Result<(), DomError> {
		self.element(node)?.set_text_content(Some(text));
		Ok(())
	}

	fn is_visible(&self, node: &NodeId) -> bool {
		match self.html_element(node) {
			Ok(element) => element.style().get_property_value("display").map_or(true, |display| display != "none"),
			Err(_) => false,
		}
	}

	fn set_visible(&mut self, node: &NodeId, visible: bool, display: &str) -> Result<(), DomError> {
		let value = if visible { display } else { "none" };
		self.html_element(node)?.style().set_property("display", value).map_err(backend)
	}

	#[instrument(skip(self, detail))]
	fn dispatch(&mut self, target: &EventTarget, name: &str, detail: &Value, bubbles: bool) -> Result<(), DomError> {
		let detail = serde_json::to_string(detail).map_err(|error| DomError::Backend(error.to_string()))?;
		let detail = js_sys::JSON::parse(&detail).map_err(backend)?;
		let init = CustomEventInit::new();
		init.set_bubbles(bubbles);
		init.set_detail(&detail);
		let event = CustomEvent::new_with_event_init_dict(name, &init).map_err(backend)?;
		let dispatched = match target {
			EventTarget::Global => self.window.dispatch_event(&event),
			EventTarget::Node(node) => self.element(node)?.dispatch_event(&event),
		};
		dispatched.map(|_| ()).map_err(backend)
	}

	fn now(&self) -> Duration {
		let millis = self.window.performance().map_or(0.0, |performance| performance.now());
		Duration::from_secs_f64(millis.max(0.0) / 1000.0)
	}

	fn apply(&mut self, node: &NodeId, patch: &WebPatch) -> Result<(), DomError> {
		let element = self.element(node)?;
		match patch {
			WebPatch::SetInnerHtml(html) => element.set_inner_html(html),
			WebPatch::SetOuterHtml(html) => element.set_outer_html(html),
			WebPatch::SetAttribute(name, value) => element.set_attribute(name, value).map_err(backend)?,
			WebPatch::RemoveAttribute(name) => element.remove_attribute(name).map_err(backend)?,
			WebPatch::SetText(text) => element.set_text_content(Some(text)),
			WebPatch::Remove => element.remove(),
		}
		Ok(())
	}

	fn depth(&self, node: &NodeId) -> usize {
		let mut depth = 0;
		let mut current = self.element(node).ok().and_then(|element| element.parent_element());
		while let Some(parent) = current {
			depth += 1;
			current = parent.parent_element();
		}
		depth
	}

	fn is_inclusive_ancestor(&self, ancestor: &NodeId, node: &NodeId) -> bool {
		match (self.element(ancestor), self.element(node)) {
			(Ok(ancestor), Ok(node)) => ancestor.contains(Some(node.as_ref())),
			_ => false,
		}
	}
}
