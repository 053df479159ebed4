//! Per-element counts of outstanding round trips.

use crate::{
	config::Config,
	counts::{CountSaturatedError, KindCounts},
	dom::Dom,
	error::LedgerError,
	node::{Kind, NodeId},
};
use hashbrown::HashMap;
use tracing::{error, instrument, trace};

/// Label swap state of a submit-capable element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitLabel {
	pub disable_with: String,
	/// Captured when the label is swapped, restored when the submit count returns to zero.
	pub original_text: Option<String>,
}

/// One per DOM node that carries at least one interaction attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingRecord {
	pub node: NodeId,
	pending: KindCounts<u32>,
	/// Lookup relation only. The form's own record may be gone.
	pub owner_form: Option<NodeId>,
	pub submit_label: Option<SubmitLabel>,
}
impl BindingRecord {
	#[must_use]
	pub fn new(node: NodeId) -> Self {
		Self {
			node,
			pending: KindCounts::new(),
			owner_form: None,
			submit_label: None,
		}
	}

	/// Reads the authoring attributes of `node`.
	pub fn observe(dom: &impl Dom, node: &NodeId, config: &Config) -> Self {
		let mut record = Self::new(node.clone());
		record.owner_form = match dom.parent(node) {
			Some(parent) => dom.closest(&parent, "form").unwrap_or_else(|error| {
				error!("phx-reconcile bug: `form` rejected as selector: {}", error);
				None
			}),
			None => None,
		};
		if is_submit_capable(dom, node) {
			record.submit_label = dom.attribute(node, &config.attributes.disable_with).map(|disable_with| SubmitLabel { disable_with, original_text: None });
		}
		record
	}

	#[must_use]
	pub fn count(&self, kind: Kind) -> u32 {
		self.pending.get(kind)
	}

	#[must_use]
	pub fn is_idle(&self) -> bool {
		self.pending.is_zero()
	}

	pub fn active_kinds(&self) -> impl Iterator<Item = Kind> + '_ {
		self.pending.active()
	}
}

fn is_submit_capable(dom: &impl Dom, node: &NodeId) -> bool {
	match dom.tag_name(node).as_deref() {
		Some("BUTTON") => !matches!(dom.attribute(node, "type").as_deref(), Some("button" | "reset")),
		Some("INPUT") => matches!(dom.attribute(node, "type").as_deref(), Some("submit" | "image")),
		_ => false,
	}
}

/// Owns all [`BindingRecord`]s, keyed by node identity.
#[derive(Debug, Default)]
pub struct Ledger {
	records: HashMap<NodeId, BindingRecord>,
}
impl Ledger {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `record` unless its node is already bound.
	pub fn bind(&mut self, record: BindingRecord) -> &mut BindingRecord {
		self.records.entry(record.node.clone()).or_insert(record)
	}

	#[must_use]
	pub fn record(&self, node: &NodeId) -> Option<&BindingRecord> {
		self.records.get(node)
	}

	pub fn record_mut(&mut self, node: &NodeId) -> Option<&mut BindingRecord> {
		self.records.get_mut(node)
	}

	/// Returns the new count. Unbound nodes are bound without form or label.
	#[instrument(skip(self))]
	pub fn increment(&mut self, node: &NodeId, kind: Kind) -> Result<u32, LedgerError> {
		let record = self.records.entry(node.clone()).or_insert_with(|| BindingRecord::new(node.clone()));
		let count = record.pending.increment(kind).map_err(|_| LedgerError::Saturated { node: node.clone(), kind })?;
		trace!(count, "Incremented.");
		Ok(count)
	}

	/// Returns the new count.
	///
	/// # Errors
	///
	/// [`LedgerError::Underflow`] if there's no outstanding push of `kind` on `node`. Counts are unchanged in that case.
	#[instrument(skip(self))]
	pub fn decrement(&mut self, node: &NodeId, kind: Kind) -> Result<u32, LedgerError> {
		let underflow = || LedgerError::Underflow { node: node.clone(), kind };
		let record = self.records.get_mut(node).ok_or_else(underflow)?;
		match record.pending.decrement(kind) {
			Ok(count) => {
				trace!(count, "Decremented.");
				Ok(count)
			}
			Err(CountSaturatedError::Underflow | CountSaturatedError::Overflow) => Err(underflow()),
		}
	}

	#[must_use]
	pub fn count(&self, node: &NodeId, kind: Kind) -> u32 {
		self.records.get(node).map_or(0, |record| record.count(kind))
	}

	/// True iff all kinds are zero. Unbound nodes are idle.
	#[must_use]
	pub fn is_idle(&self, node: &NodeId) -> bool {
		self.records.get(node).map_or(true, BindingRecord::is_idle)
	}

	/// Records whose owner form is `form`.
	pub fn owned_by<'a>(&'a self, form: &'a NodeId) -> impl Iterator<Item = &'a BindingRecord> + 'a {
		self.records.values().filter(move |record| record.owner_form.as_ref() == Some(form))
	}

	/// Drops records for which `keep` returns `false`, returning their nodes.
	pub fn prune(&mut self, mut keep: impl FnMut(&NodeId) -> bool) -> Vec<NodeId> {
		let mut pruned = Vec::new();
		self.records.retain(|node, _| {
			let keep = keep(node);
			if !keep {
				pruned.push(node.clone());
			}
			keep
		});
		pruned
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.records.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}
