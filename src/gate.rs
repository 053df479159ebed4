//! Decides whether, and which parts of, an incoming diff may be applied right now.
//!
//! A node is protected while its Ledger entry isn't idle or while an active claim covers it (claims owned by
//! the push a diff resolves don't count against that diff). Protected nodes' patch subtrees are held in a
//! per-node buffer where the latest diff wins, and flushed once the node is neither pending nor claimed.

use crate::{
	dom::Dom,
	interpreter::Interpreter,
	ledger::Ledger,
	node::{NodeId, Ref},
};
use core::ops::AddAssign;
use hashbrown::HashMap;
use tracing::{debug, instrument, trace, trace_span, warn};

/// A tree-shaped set of mutations keyed by node identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchTree<P> {
	pub node: NodeId,
	/// Applied verbatim through [`Dom::apply`].
	pub patch: Option<P>,
	pub children: Vec<PatchTree<P>>,
}
impl<P> PatchTree<P> {
	#[must_use]
	pub fn new(node: NodeId, patch: P) -> Self {
		Self {
			node,
			patch: Some(patch),
			children: Vec::new(),
		}
	}

	/// A tree node that only groups `children`.
	#[must_use]
	pub fn grouping(node: NodeId, children: Vec<PatchTree<P>>) -> Self {
		Self { node, patch: None, children }
	}

	#[must_use]
	pub fn with_child(mut self, child: PatchTree<P>) -> Self {
		self.children.push(child);
		self
	}

	/// Number of patches in this tree.
	#[must_use]
	pub fn len(&self) -> usize {
		usize::from(self.patch.is_some()) + self.children.iter().map(PatchTree::len).sum::<usize>()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// An incoming server diff, optionally correlated with the push it resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff<P> {
	pub reference: Option<Ref>,
	pub root: PatchTree<P>,
}
impl<P> Diff<P> {
	#[must_use]
	pub fn new(root: PatchTree<P>) -> Self {
		Self { reference: None, root }
	}

	#[must_use]
	pub fn resolving(reference: Ref, root: PatchTree<P>) -> Self {
		Self { reference: Some(reference), root }
	}
}

/// Counts of what happened to the patches of one or more diffs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GateReport {
	pub applied: usize,
	/// Subtrees withheld.
	pub buffered: usize,
	/// Malformed or failed patches.
	pub dropped: usize,
	/// Buffered subtrees discarded because a newer patch for the same node arrived.
	pub superseded: usize,
}
impl AddAssign for GateReport {
	fn add_assign(&mut self, rhs: Self) {
		self.applied += rhs.applied;
		self.buffered += rhs.buffered;
		self.dropped += rhs.dropped;
		self.superseded += rhs.superseded;
	}
}

#[derive(Debug)]
struct Buffered<P> {
	tree: PatchTree<P>,
	sequence: u64,
}

/// Per-node buffer of withheld patch subtrees.
///
/// Every incoming diff is numbered. A patch is never applied or buffered over one from a later diff, also
/// when an older buffered ancestor subtree is replayed after a newer diff already reached its descendants.
#[derive(Debug)]
pub struct Gate<P> {
	buffered: HashMap<NodeId, Buffered<P>>,
	/// Number of the newest diff that patched or buffered each node.
	latest: HashMap<NodeId, u64>,
	sequence: u64,
}
impl<P> Default for Gate<P> {
	fn default() -> Self {
		Self {
			buffered: HashMap::new(),
			latest: HashMap::new(),
			sequence: 0,
		}
	}
}
impl<P> Gate<P> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn is_buffered(&self, node: &NodeId) -> bool {
		self.buffered.contains_key(node)
	}

	#[must_use]
	pub fn buffered_tree(&self, node: &NodeId) -> Option<&PatchTree<P>> {
		self.buffered.get(node).map(|buffered| &buffered.tree)
	}

	pub fn buffered_nodes(&self) -> impl Iterator<Item = &NodeId> {
		self.buffered.keys()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.buffered.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.buffered.is_empty()
	}

	/// Whether `node` may not be mutated by a diff correlated with `reference` right now.
	#[must_use]
	pub fn is_protected(ledger: &Ledger, interpreter: &Interpreter, node: &NodeId, reference: Option<Ref>) -> bool {
		!ledger.is_idle(node) || interpreter.is_claimed_except(node, reference)
	}

	/// Applies unprotected parts of `tree` immediately and buffers the rest.
	///
	/// Any Ledger decrement and claim release for `reference` must have happened before this is called.
	#[instrument(skip(self, dom, ledger, interpreter, tree), fields(root = ?tree.node))]
	pub fn apply<D: Dom<Patch = P>>(&mut self, dom: &mut D, ledger: &Ledger, interpreter: &Interpreter, tree: PatchTree<P>, reference: Option<Ref>) -> GateReport {
		let mut report = GateReport::default();
		self.sequence += 1;
		let sequence = self.sequence;
		self.walk(dom, ledger, interpreter, tree, sequence, reference, &mut report);
		report
	}

	fn is_stale(&self, node: &NodeId, sequence: u64) -> bool {
		self.latest.get(node).map_or(false, |&latest| latest > sequence)
	}

	#[allow(clippy::too_many_arguments)]
	fn walk<D: Dom<Patch = P>>(&mut self, dom: &mut D, ledger: &Ledger, interpreter: &Interpreter, tree: PatchTree<P>, sequence: u64, reference: Option<Ref>, report: &mut GateReport) {
		let span = trace_span!("Gating", node = ?tree.node, sequence);
		let _enter = span.enter();

		let PatchTree { node, patch, children } = tree;
		if !dom.contains(&node) {
			if patch.is_some() {
				warn!("Dropping patch for unknown node {:?}.", node);
				report.dropped += 1;
			}
		} else if Self::is_protected(ledger, interpreter, &node, reference) {
			trace!("Protected; Buffering subtree.");
			self.buffer(PatchTree { node, patch, children }, sequence, report);
			return;
		} else if let Some(patch) = patch {
			if self.is_stale(&node, sequence) {
				debug!(?node, "Skipping patch older than one already gated for this node.");
				report.superseded += 1;
			} else {
				if self.buffered.remove(&node).is_some() {
					debug!(?node, "Buffered patch superseded by a newer one.");
					report.superseded += 1;
				}
				self.latest.insert(node.clone(), sequence);
				match dom.apply(&node, &patch) {
					Ok(()) => {
						report.applied += 1;
						if dom.contains(&node) {
							interpreter.reassert_sticky(dom, &node);
						}
					}
					Err(error) => {
						warn!("Dropping patch for {:?}: {}", node, error);
						report.dropped += 1;
					}
				}
			}
		}

		for child in children {
			self.walk(dom, ledger, interpreter, child, sequence, reference, report);
		}
	}

	/// Holds `tree` back unless a later diff's subtree is already buffered for the same node.
	fn buffer(&mut self, tree: PatchTree<P>, sequence: u64, report: &mut GateReport) {
		if let Some(newer) = self.buffered.get(&tree.node).filter(|buffered| buffered.sequence > sequence) {
			debug!(node = ?tree.node, newer = newer.sequence, "Discarding subtree older than the buffered one.");
			report.superseded += 1;
			return;
		}
		mark(&mut self.latest, &tree, sequence);
		let node = tree.node.clone();
		if self.buffered.insert(node, Buffered { tree, sequence }).is_some() {
			trace!("Replaced an older buffered subtree.");
			report.superseded += 1;
		}
		report.buffered += 1;
	}

	/// Applies buffered subtrees whose nodes are neither pending nor claimed, deepest node first.
	#[instrument(skip(self, dom, ledger, interpreter))]
	pub fn flush<D: Dom<Patch = P>>(&mut self, dom: &mut D, ledger: &Ledger, interpreter: &Interpreter) -> GateReport {
		let mut report = GateReport::default();
		let mut ready: Vec<(usize, u64, NodeId)> = self
			.buffered
			.iter()
			.filter(|(node, _)| !Self::is_protected(ledger, interpreter, node, None))
			.map(|(node, buffered)| (dom.depth(node), buffered.sequence, node.clone()))
			.collect();
		ready.sort_by(|(depth_a, sequence_a, _), (depth_b, sequence_b, _)| depth_b.cmp(depth_a).then(sequence_a.cmp(sequence_b)));

		for (_, _, node) in ready {
			// Earlier flushes in this pass may have removed it.
			let Buffered { tree, sequence } = match self.buffered.remove(&node) {
				Some(buffered) => buffered,
				None => continue,
			};
			debug!(?node, sequence, "Flushing buffered subtree.");
			self.walk(dom, ledger, interpreter, tree, sequence, None, &mut report);
		}
		self.prune(&*dom);
		report
	}

	/// Forgets buffered subtrees for nodes that left the document.
	pub fn prune(&mut self, dom: &impl Dom) {
		let before = self.buffered.len();
		self.buffered.retain(|node, _| dom.contains(node));
		self.latest.retain(|node, _| dom.contains(node));
		if self.buffered.len() != before {
			trace!("Pruned {} buffered subtree(s).", before - self.buffered.len());
		}
	}
}

/// Records `sequence` for every patched node in `tree` that doesn't carry a later one.
fn mark<P>(latest: &mut HashMap<NodeId, u64>, tree: &PatchTree<P>, sequence: u64) {
	if tree.patch.is_some() {
		let entry = latest.entry(tree.node.clone()).or_insert(sequence);
		*entry = (*entry).max(sequence);
	}
	for child in &tree.children {
		mark(latest, child, sequence);
	}
}
