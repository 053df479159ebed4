//! Push-scoped protections against incoming diffs, and client-owned visibility.

use crate::{
	dom::Dom,
	node::{NodeId, Ref},
};
use core::time::Duration;
use hashbrown::HashMap;
use tracing::{instrument, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
	/// As written in the command, for diagnostics.
	pub selector: String,
	/// What `selector` matched when the claim was registered.
	pub targets: Vec<NodeId>,
	pub owner: Ref,
	/// The claim outlives its owner's resolution until this point in time.
	pub until: Option<Duration>,
	owner_resolved: bool,
}
impl Claim {
	#[must_use]
	pub fn new(selector: String, targets: Vec<NodeId>, owner: Ref, until: Option<Duration>) -> Self {
		Self {
			selector,
			targets,
			owner,
			until,
			owner_resolved: false,
		}
	}

	#[must_use]
	pub fn owner_resolved(&self) -> bool {
		self.owner_resolved
	}

	fn expired(&self, now: Duration) -> bool {
		self.until.map_or(true, |until| now >= until)
	}
}

/// All active claims. Only the resolution of an owning push (plus, for timed claims, the passing of time) releases them.
#[derive(Debug, Default)]
pub struct ClaimSet {
	claims: Vec<Claim>,
}
impl ClaimSet {
	#[instrument(skip(self))]
	pub fn register(&mut self, claim: Claim) {
		trace!("Claim registered.");
		self.claims.push(claim);
	}

	/// Whether an active claim not owned by `except` covers `node`.
	#[must_use]
	pub fn is_claimed_except(&self, node: &NodeId, except: Option<Ref>) -> bool {
		self.claims.iter().any(|claim| Some(claim.owner) != except && claim.targets.contains(node))
	}

	#[must_use]
	pub fn is_claimed(&self, node: &NodeId) -> bool {
		self.is_claimed_except(node, None)
	}

	/// Processes claims owned by `owner` for release. Timed claims that haven't run out yet are kept until [`expire`](`ClaimSet::expire`).
	///
	/// Returns the nodes of released claims.
	#[instrument(skip(self))]
	pub fn release_owned(&mut self, owner: Ref, now: Duration) -> Vec<NodeId> {
		let mut released = Vec::new();
		self.claims.retain(|claim| {
			if claim.owner != owner {
				return true;
			}
			if claim.expired(now) {
				released.extend(claim.targets.iter().cloned());
				false
			} else {
				true
			}
		});
		for claim in self.claims.iter_mut().filter(|claim| claim.owner == owner) {
			trace!(selector = %claim.selector, "Claim outlives its owner.");
			claim.owner_resolved = true;
		}
		released
	}

	/// Releases timed claims whose owner resolved and whose time ran out.
	#[instrument(skip(self))]
	pub fn expire(&mut self, now: Duration) -> Vec<NodeId> {
		let mut released = Vec::new();
		self.claims.retain(|claim| {
			if claim.owner_resolved && claim.expired(now) {
				released.extend(claim.targets.iter().cloned());
				false
			} else {
				true
			}
		});
		released
	}

	/// Forgets targets that left the document, and claims left without targets.
	pub fn prune(&mut self, mut keep: impl FnMut(&NodeId) -> bool) {
		for claim in &mut self.claims {
			claim.targets.retain(|node| keep(node));
		}
		self.claims.retain(|claim| !claim.targets.is_empty());
	}

	pub fn iter(&self) -> impl Iterator<Item = &Claim> {
		self.claims.iter()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.claims.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.claims.is_empty()
	}
}

/// Visibility last set by a `show` or `hide` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
	pub visible: bool,
	pub display: String,
}

/// Client-owned visibility, reasserted over any diff that touches the node.
#[derive(Debug, Default)]
pub struct StickyVisibility(HashMap<NodeId, Visibility>);
impl StickyVisibility {
	pub fn set(&mut self, node: NodeId, visibility: Visibility) {
		self.0.insert(node, visibility);
	}

	#[must_use]
	pub fn get(&self, node: &NodeId) -> Option<&Visibility> {
		self.0.get(node)
	}

	/// Re-applies sticky visibility within the subtree rooted at `root`.
	#[instrument(skip(self, dom))]
	pub fn reassert(&self, dom: &mut impl Dom, root: &NodeId) {
		for (node, visibility) in &self.0 {
			if !dom.contains(node) || !dom.is_inclusive_ancestor(root, node) || dom.is_visible(node) == visibility.visible {
				continue;
			}
			trace!(?node, visible = visibility.visible, "Reasserting client visibility.");
			if let Err(error) = dom.set_visible(node, visibility.visible, &visibility.display) {
				warn!("Failed to reassert visibility of {:?}: {}", node, error);
			}
		}
	}

	pub fn prune(&mut self, mut keep: impl FnMut(&NodeId) -> bool) {
		self.0.retain(|node, _| keep(node));
	}
}
