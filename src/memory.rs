//! A deterministic in-memory [`Dom`], for headless hosts and tests.
//!
//! Every element is addressed by its `id`. Selectors support comma-separated lists of compound selectors
//! (`tag`, `*`, `#id`, `.class`, `[attr]`, `[attr=value]`) joined by descendant combinators.

use crate::{
	dom::{Dom, EventTarget},
	error::DomError,
	node::NodeId,
};
use core::time::Duration;
use hashbrown::HashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::trace;

/// Description of an element subtree to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryElement {
	pub tag: String,
	pub id: String,
	pub attributes: BTreeMap<String, String>,
	pub classes: Vec<String>,
	pub text: String,
	pub children: Vec<MemoryElement>,
}
impl MemoryElement {
	/// `tag` is stored upper-case.
	#[must_use]
	pub fn new(tag: &str, id: &str) -> Self {
		Self {
			tag: tag.to_ascii_uppercase(),
			id: id.to_owned(),
			attributes: BTreeMap::new(),
			classes: Vec::new(),
			text: String::new(),
			children: Vec::new(),
		}
	}

	#[must_use]
	pub fn attr(mut self, name: &str, value: &str) -> Self {
		self.attributes.insert(name.to_owned(), value.to_owned());
		self
	}

	#[must_use]
	pub fn class(mut self, class: &str) -> Self {
		self.classes.push(class.to_owned());
		self
	}

	#[must_use]
	pub fn text(mut self, text: &str) -> Self {
		self.text = text.to_owned();
		self
	}

	#[must_use]
	pub fn child(mut self, child: MemoryElement) -> Self {
		self.children.push(child);
		self
	}
}

/// Patches understood by [`MemoryDom`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryPatch {
	SetText(String),
	SetAttribute(String, String),
	RemoveAttribute(String),
	AddClass(String),
	RemoveClass(String),
	Show,
	Hide,
	Append(MemoryElement),
	Remove,
}

/// A custom event as it was dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedEvent {
	pub target: EventTarget,
	pub name: String,
	pub detail: Value,
	pub bubbles: bool,
}

#[derive(Debug, Clone)]
struct Element {
	tag: String,
	attributes: BTreeMap<String, String>,
	classes: Vec<String>,
	text: String,
	display: Option<String>,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct MemoryDom {
	root: NodeId,
	elements: HashMap<NodeId, Element>,
	events: Vec<DispatchedEvent>,
	now: Duration,
}
impl MemoryDom {
	/// # Errors
	///
	/// [`DomError::Backend`] if ids within `root` aren't unique.
	pub fn new(root: MemoryElement) -> Result<Self, DomError> {
		let mut dom = Self {
			root: NodeId::new(&root.id),
			elements: HashMap::new(),
			events: Vec::new(),
			now: Duration::default(),
		};
		dom.insert(None, root)?;
		Ok(dom)
	}

	#[must_use]
	pub fn root(&self) -> &NodeId {
		&self.root
	}

	/// Inserts `element` as last child of `parent`.
	pub fn append(&mut self, parent: &NodeId, element: MemoryElement) -> Result<(), DomError> {
		if !self.elements.contains_key(parent) {
			return Err(DomError::NodeNotFound(parent.clone()));
		}
		self.insert(Some(parent.clone()), element)
	}

	/// Removes `node` and its subtree.
	pub fn remove(&mut self, node: &NodeId) -> Result<(), DomError> {
		let element = self.elements.remove(node).ok_or_else(|| DomError::NodeNotFound(node.clone()))?;
		if let Some(parent) = element.parent.as_ref().and_then(|parent| self.elements.get_mut(parent)) {
			parent.children.retain(|child| child != node);
		}
		let mut pending = element.children;
		while let Some(child) = pending.pop() {
			if let Some(child) = self.elements.remove(&child) {
				pending.extend(child.children);
			}
		}
		trace!(?node, "Removed.");
		Ok(())
	}

	#[must_use]
	pub fn events(&self) -> &[DispatchedEvent] {
		&self.events
	}

	pub fn take_events(&mut self) -> Vec<DispatchedEvent> {
		core::mem::take(&mut self.events)
	}

	/// Events of this name, in dispatch order.
	pub fn events_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DispatchedEvent> + 'a {
		self.events.iter().filter(move |event| event.name == name)
	}

	pub fn advance(&mut self, by: Duration) {
		self.now += by;
	}

	/// Classes of `node` in insertion order.
	#[must_use]
	pub fn classes(&self, node: &NodeId) -> Vec<&str> {
		self.elements.get(node).map_or_else(Vec::new, |element| element.classes.iter().map(String::as_str).collect())
	}

	#[must_use]
	pub fn children(&self, node: &NodeId) -> Vec<NodeId> {
		self.elements.get(node).map_or_else(Vec::new, |element| element.children.clone())
	}

	fn insert(&mut self, parent: Option<NodeId>, element: MemoryElement) -> Result<(), DomError> {
		let MemoryElement { tag, id, attributes, classes, text, children } = element;
		let node = NodeId::new(&id);
		if self.elements.contains_key(&node) {
			return Err(DomError::Backend(format!("duplicate id {:?}", id)));
		}
		if let Some(parent) = parent.as_ref().and_then(|parent| self.elements.get_mut(parent)) {
			parent.children.push(node.clone());
		}
		self.elements.insert(
			node.clone(),
			Element {
				tag,
				attributes,
				classes,
				text,
				display: None,
				parent,
				children: Vec::new(),
			},
		);
		for child in children {
			self.insert(Some(node.clone()), child)?;
		}
		Ok(())
	}

	fn element(&self, node: &NodeId) -> Result<&Element, DomError> {
		self.elements.get(node).ok_or_else(|| DomError::NodeNotFound(node.clone()))
	}

	fn element_mut(&mut self, node: &NodeId) -> Result<&mut Element, DomError> {
		self.elements.get_mut(node).ok_or_else(|| DomError::NodeNotFound(node.clone()))
	}

	/// Pre-order, starting at (and including) `from`.
	fn document_order(&self, from: &NodeId) -> Vec<NodeId> {
		let mut order = Vec::new();
		let mut stack = vec![from.clone()];
		while let Some(node) = stack.pop() {
			if let Some(element) = self.elements.get(&node) {
				stack.extend(element.children.iter().rev().cloned());
				order.push(node);
			}
		}
		order
	}

	fn matches(&self, node: &NodeId, selector: &SelectorList) -> bool {
		selector.0.iter().any(|complex| self.matches_complex(node, complex))
	}

	fn matches_complex(&self, node: &NodeId, complex: &[Compound]) -> bool {
		let (last, ancestors) = match complex.split_last() {
			Some(split) => split,
			None => return false,
		};
		if !self.matches_compound(node, last) {
			return false;
		}
		let mut remaining = ancestors;
		let mut current = self.parent(node);
		while let Some((compound, rest)) = remaining.split_last() {
			match current {
				Some(ancestor) => {
					if self.matches_compound(&ancestor, compound) {
						remaining = rest;
					}
					current = self.parent(&ancestor);
				}
				None => return false,
			}
		}
		true
	}

	fn matches_compound(&self, node: &NodeId, compound: &Compound) -> bool {
		let element = match self.elements.get(node) {
			Some(element) => element,
			None => return false,
		};
		compound.tag.as_ref().map_or(true, |tag| tag.eq_ignore_ascii_case(&element.tag))
			&& compound.id.as_ref().map_or(true, |id| id == node.as_str())
			&& compound.classes.iter().all(|class| element.classes.contains(class))
			&& compound.attributes.iter().all(|(name, value)| match (element.attributes.get(name), value) {
				(Some(_), None) => true,
				(Some(actual), Some(expected)) => actual == expected,
				(None, _) => name == "id" && value.as_ref().map_or(true, |expected| expected == node.as_str()),
			})
	}
}

impl Dom for MemoryDom {
	type Patch = MemoryPatch;

	fn contains(&self, node: &NodeId) -> bool {
		self.elements.contains_key(node)
	}

	fn parent(&self, node: &NodeId) -> Option<NodeId> {
		self.elements.get(node).and_then(|element| element.parent.clone())
	}

	fn tag_name(&self, node: &NodeId) -> Option<String> {
		self.elements.get(node).map(|element| element.tag.clone())
	}

	fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
		let selector = SelectorList::parse(selector)?;
		let root = self.root.clone();
		Ok(self.document_order(&root).into_iter().filter(|node| self.matches(node, &selector)).collect())
	}

	fn query_within(&self, root: &NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
		let selector = SelectorList::parse(selector)?;
		self.element(root)?;
		Ok(self.document_order(root).into_iter().skip(1).filter(|node| self.matches(node, &selector)).collect())
	}

	fn closest(&self, node: &NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
		let selector = SelectorList::parse(selector)?;
		let mut current = Some(node.clone()).filter(|node| self.contains(node));
		while let Some(candidate) = current {
			if self.matches(&candidate, &selector) {
				return Ok(Some(candidate));
			}
			current = self.parent(&candidate);
		}
		Ok(None)
	}

	fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
		let element = self.elements.get(node)?;
		match name {
			"id" => Some(node.to_string()),
			"class" if !element.classes.is_empty() => Some(element.classes.join(" ")),
			_ => element.attributes.get(name).cloned(),
		}
	}

	fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), DomError> {
		let element = self.element_mut(node)?;
		if name == "class" {
			element.classes = value.split_whitespace().map(str::to_owned).collect();
		} else {
			element.attributes.insert(name.to_owned(), value.to_owned());
		}
		Ok(())
	}

	fn remove_attribute(&mut self, node: &NodeId, name: &str) -> Result<(), DomError> {
		let element = self.element_mut(node)?;
		if name == "class" {
			element.classes.clear();
		} else {
			element.attributes.remove(name);
		}
		Ok(())
	}

	fn has_class(&self, node: &NodeId, class: &str) -> bool {
		self.elements.get(node).map_or(false, |element| element.classes.iter().any(|c| c == class))
	}

	fn add_class(&mut self, node: &NodeId, class: &str) -> Result<(), DomError> {
		let element = self.element_mut(node)?;
		if !element.classes.iter().any(|c| c == class) {
			element.classes.push(class.to_owned());
		}
		Ok(())
	}

	fn remove_class(&mut self, node: &NodeId, class: &str) -> Result<(), DomError> {
		self.element_mut(node)?.classes.retain(|c| c != class);
		Ok(())
	}

	fn text(&self, node: &NodeId) -> Option<String> {
		self.elements.get(node).map(|element| element.text.clone())
	}

	fn set_text(&mut self, node: &NodeId, text: &str) -> Result<(), DomError> {
		self.element_mut(node)?.text = text.to_owned();
		Ok(())
	}

	fn is_visible(&self, node: &NodeId) -> bool {
		self.elements.get(node).map_or(false, |element| element.display.as_deref() != Some("none"))
	}

	fn set_visible(&mut self, node: &NodeId, visible: bool, display: &str) -> Result<(), DomError> {
		self.element_mut(node)?.display = Some(if visible { display.to_owned() } else { "none".to_owned() });
		Ok(())
	}

	fn dispatch(&mut self, target: &EventTarget, name: &str, detail: &Value, bubbles: bool) -> Result<(), DomError> {
		if let EventTarget::Node(node) = target {
			self.element(node)?;
		}
		self.events.push(DispatchedEvent {
			target: target.clone(),
			name: name.to_owned(),
			detail: detail.clone(),
			bubbles,
		});
		Ok(())
	}

	fn now(&self) -> Duration {
		self.now
	}

	fn apply(&mut self, node: &NodeId, patch: &MemoryPatch) -> Result<(), DomError> {
		match patch {
			MemoryPatch::SetText(text) => self.set_text(node, text),
			MemoryPatch::SetAttribute(name, value) => self.set_attribute(node, name, value),
			MemoryPatch::RemoveAttribute(name) => self.remove_attribute(node, name),
			MemoryPatch::AddClass(class) => self.add_class(node, class),
			MemoryPatch::RemoveClass(class) => self.remove_class(node, class),
			MemoryPatch::Show => self.element_mut(node).map(|element| element.display = None),
			MemoryPatch::Hide => self.set_visible(node, false, ""),
			MemoryPatch::Append(element) => self.append(node, element.clone()),
			MemoryPatch::Remove => self.remove(node),
		}
	}
}

#[derive(Debug, Default)]
struct Compound {
	tag: Option<String>,
	id: Option<String>,
	classes: Vec<String>,
	attributes: Vec<(String, Option<String>)>,
}

#[derive(Debug)]
struct SelectorList(Vec<Vec<Compound>>);
impl SelectorList {
	fn parse(selector: &str) -> Result<Self, DomError> {
		let invalid = || DomError::InvalidSelector(selector.to_owned());
		let mut list = Vec::new();
		for complex in selector.split(',') {
			let compounds = complex.split_whitespace().map(|compound| Compound::parse(compound).ok_or_else(invalid)).collect::<Result<Vec<_>, _>>()?;
			if compounds.is_empty() {
				return Err(invalid());
			}
			list.push(compounds);
		}
		Ok(Self(list))
	}
}

fn is_ident_char(c: char) -> bool {
	c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

impl Compound {
	fn parse(compound: &str) -> Option<Self> {
		let mut parsed = Compound::default();
		let mut rest = compound;

		let tag_len = rest.find(|c: char| !is_ident_char(c) && c != '*').unwrap_or_else(|| rest.len());
		if tag_len > 0 {
			let tag = &rest[..tag_len];
			if tag != "*" {
				if tag.contains('*') {
					return None;
				}
				parsed.tag = Some(tag.to_owned());
			}
			rest = &rest[tag_len..];
		}

		while let Some(c) = rest.chars().next() {
			match c {
				'#' | '.' => {
					let ident_len = rest[1..].find(|c: char| !is_ident_char(c)).unwrap_or_else(|| rest.len() - 1);
					if ident_len == 0 {
						return None;
					}
					let ident = rest[1..=ident_len].to_owned();
					if c == '#' {
						parsed.id = Some(ident);
					} else {
						parsed.classes.push(ident);
					}
					rest = &rest[1 + ident_len..];
				}
				'[' => {
					let end = rest.find(']')?;
					let inner = &rest[1..end];
					let (name, value) = match inner.find('=') {
						Some(eq) => {
							let value = inner[eq + 1..].trim_matches(|c: char| c == '"' || c == '\'');
							(&inner[..eq], Some(value.to_owned()))
						}
						None => (inner, None),
					};
					if name.is_empty() || !name.chars().all(is_ident_char) {
						return None;
					}
					parsed.attributes.push((name.to_owned(), value));
					rest = &rest[end + 1..];
				}
				_ => return None,
			}
		}
		Some(parsed)
	}
}
