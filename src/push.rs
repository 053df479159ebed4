//! In-flight round trips and the outbound transport seam.

use crate::{
	command::CommandQueue,
	navigation::NavigationId,
	node::{Kind, NodeId, Ref},
};
use hashbrown::HashMap;
use serde::Serialize;
use serde_json::Value;

/// What is handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundPush {
	#[serde(rename = "ref")]
	pub reference: Ref,
	pub kind: Kind,
	pub event: String,
	pub payload: Value,
	#[serde(rename = "source")]
	pub source_node: NodeId,
}

/// Delivers pushes to the server. Must not block; the resolution arrives later through
/// [`Reconciler::resolve`](`crate::Reconciler::resolve`).
pub trait Transport {
	fn send(&mut self, push: OutboundPush);
}

impl Transport for Vec<OutboundPush> {
	fn send(&mut self, push: OutboundPush) {
		self.push(push);
	}
}

/// One per in-flight round trip. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct PushRecord {
	pub reference: Ref,
	pub kind: Kind,
	pub source_node: NodeId,
	pub loading_target_selector: Option<String>,
	/// The nodes whose Ledger counts this push holds, resolved at dispatch.
	pub loading_targets: Vec<NodeId>,
	/// Snapshot of the queue this push was dispatched from.
	pub command_queue: CommandQueue,
	pub navigation: Option<NavigationId>,
}

/// How a push ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<D> {
	Ack(Option<D>),
	/// Definitive failure reported by the transport. No diff is applied.
	Error(String),
}

/// Push records by correlation ref.
#[derive(Debug, Default)]
pub struct PushTable {
	records: HashMap<Ref, PushRecord>,
}
impl PushTable {
	pub fn insert(&mut self, record: PushRecord) {
		self.records.insert(record.reference, record);
	}

	pub fn take(&mut self, reference: Ref) -> Option<PushRecord> {
		self.records.remove(&reference)
	}

	#[must_use]
	pub fn get(&self, reference: Ref) -> Option<&PushRecord> {
		self.records.get(&reference)
	}

	#[must_use]
	pub fn contains(&self, reference: Ref) -> bool {
		self.records.contains_key(&reference)
	}

	/// Loading targets of all in-flight pushes. A node appears once per push holding it.
	pub fn loading_targets(&self) -> impl Iterator<Item = &NodeId> {
		self.records.values().flat_map(|record| record.loading_targets.iter())
	}

	#[must_use]
	pub fn is_loading_target(&self, node: &NodeId) -> bool {
		self.loading_targets().any(|target| target == node)
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
