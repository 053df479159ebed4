//! Executes [`CommandQueue`]s against a [`Dom`].

use crate::{
	claims::{Claim, ClaimSet, StickyVisibility, Visibility},
	command::{Command, CommandQueue, PushOptions, Target},
	config::Config,
	dom::{Dom, EventTarget},
	error::CommandError,
	node::{Kind, NodeId, Ref},
};
use core::time::Duration;
use tracing::{debug, instrument, trace, trace_span, warn};

/// Dispatches the `push` effects of a queue. The round trip itself is not awaited.
pub trait PushDispatcher<D: Dom> {
	fn push(&mut self, dom: &mut D, source: &NodeId, kind: Kind, options: &PushOptions, queue: &CommandQueue) -> Ref;
}

/// Where a queue runs.
#[derive(Debug, Clone, Copy)]
pub struct ExecContext<'a> {
	/// The element the interaction originated from. Default target of every effect.
	pub source: &'a NodeId,
	/// Kind of pushes dispatched from the queue.
	pub kind: Kind,
	/// Push that owns claims registered before the queue dispatches one of its own.
	pub owner: Option<Ref>,
}

/// Result of one queue execution.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecOutcome {
	/// Refs of dispatched pushes, in order.
	pub pushes: Vec<Ref>,
	/// Number of skipped effects.
	pub failed: usize,
}

/// A claim still waiting for an owning push.
struct Unowned {
	selector: String,
	targets: Vec<NodeId>,
	until: Option<Duration>,
}

#[derive(Debug)]
struct RunningTransition {
	node: NodeId,
	classes: Vec<String>,
	until: Duration,
}

#[derive(Debug, Default)]
pub struct Interpreter {
	claims: ClaimSet,
	sticky: StickyVisibility,
	transitions: Vec<RunningTransition>,
}
impl Interpreter {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn claims(&self) -> &ClaimSet {
		&self.claims
	}

	#[must_use]
	pub fn sticky(&self) -> &StickyVisibility {
		&self.sticky
	}

	/// Runs `queue` in declared order. Effect errors are logged and skipped.
	#[instrument(skip(self, dom, pushes, queue, config), fields(commands = queue.commands().len()))]
	pub fn execute<D: Dom>(&mut self, dom: &mut D, pushes: &mut impl PushDispatcher<D>, queue: &CommandQueue, context: ExecContext<'_>, config: &Config) -> ExecOutcome {
		let mut outcome = ExecOutcome::default();
		let mut owner = context.owner;
		let mut unowned = Vec::new();
		for command in queue {
			let span = trace_span!("Running command", name = command.name());
			let _enter = span.enter();
			if let Command::Push(options) = command {
				let reference = pushes.push(dom, context.source, context.kind, options, queue);
				outcome.pushes.push(reference);
				for Unowned { selector, targets, until } in unowned.drain(..) {
					self.claims.register(Claim::new(selector, targets, reference, until));
				}
				owner = Some(reference);
				continue;
			}
			match self.run_effect(dom, context.source, command, config) {
				Ok(claim) => {
					debug_assert_eq!(claim.is_some(), command.claims(), "phx-reconcile bug: claim mismatch for {}", command.name());
					match (claim, owner) {
						(Some(claim), Some(owner)) => self.claims.register(Claim::new(claim.selector, claim.targets, owner, claim.until)),
						(Some(claim), None) => unowned.push(claim),
						(None, _) => (),
					}
				}
				Err(error) => {
					warn!("Skipping {}: {}", command.name(), error);
					outcome.failed += 1;
				}
			}
		}
		if !unowned.is_empty() {
			debug!("{} effect(s) ran without an owning push and are unprotected.", unowned.len());
		}
		outcome
	}

	fn run_effect<D: Dom>(&mut self, dom: &mut D, source: &NodeId, command: &Command, config: &Config) -> Result<Option<Unowned>, CommandError> {
		Ok(match command {
			Command::Push(_) => None,
			Command::Hide { to } => {
				let (selector, targets) = resolve(&*dom, source, to)?;
				for node in &targets {
					let display = config.default_display.clone();
					dom.set_visible(node, false, &display)?;
					self.sticky.set(node.clone(), Visibility { visible: false, display });
				}
				Some(Unowned { selector, targets, until: None })
			}
			Command::Show { to, display } => {
				let (selector, targets) = resolve(&*dom, source, to)?;
				let display = display.clone().unwrap_or_else(|| config.default_display.clone());
				for node in &targets {
					dom.set_visible(node, true, &display)?;
					self.sticky.set(node.clone(), Visibility { visible: true, display: display.clone() });
				}
				Some(Unowned { selector, targets, until: None })
			}
			Command::Transition { to, classes, time } => {
				let (selector, targets) = resolve(&*dom, source, to)?;
				let until = dom.now() + time.unwrap_or(config.default_transition);
				for node in &targets {
					for class in classes {
						dom.add_class(node, class)?;
					}
					self.transitions.push(RunningTransition {
						node: node.clone(),
						classes: classes.clone(),
						until,
					});
				}
				Some(Unowned { selector, targets, until: Some(until) })
			}
			Command::ToggleClass { to, classes } => {
				for node in resolve(&*dom, source, to)?.1 {
					for class in classes {
						if dom.has_class(&node, class) {
							dom.remove_class(&node, class)?;
						} else {
							dom.add_class(&node, class)?;
						}
					}
				}
				None
			}
			Command::ToggleAttribute { to, attr, values } => {
				for node in resolve(&*dom, source, to)?.1 {
					let current = dom.attribute(&node, attr);
					match (values, current) {
						(None, Some(_)) => dom.remove_attribute(&node, attr)?,
						(None, None) => dom.set_attribute(&node, attr, "")?,
						(Some((first, second)), current) => {
							let next = if current.as_deref() == Some(first.as_str()) { second } else { first };
							dom.set_attribute(&node, attr, next)?;
						}
					}
				}
				None
			}
			Command::AddClass { to, classes } => {
				for node in resolve(&*dom, source, to)?.1 {
					for class in classes {
						dom.add_class(&node, class)?;
					}
				}
				None
			}
			Command::RemoveClass { to, classes } => {
				for node in resolve(&*dom, source, to)?.1 {
					for class in classes {
						dom.remove_class(&node, class)?;
					}
				}
				None
			}
			Command::SetAttribute { to, attr, value } => {
				for node in resolve(&*dom, source, to)?.1 {
					dom.set_attribute(&node, attr, value)?;
				}
				None
			}
			Command::RemoveAttribute { to, attr } => {
				for node in resolve(&*dom, source, to)?.1 {
					dom.remove_attribute(&node, attr)?;
				}
				None
			}
			Command::Dispatch { to, event, detail, bubbles } => {
				for node in resolve(&*dom, source, to)?.1 {
					dom.dispatch(&EventTarget::Node(node), event, detail, *bubbles)?;
				}
				None
			}
		})
	}

	/// Whether `node` is covered by a claim not owned by `except`.
	#[must_use]
	pub fn is_claimed_except(&self, node: &NodeId, except: Option<Ref>) -> bool {
		self.claims.is_claimed_except(node, except)
	}

	/// Processes the claims of a resolved push. Returns the nodes that were released.
	pub fn release(&mut self, owner: Ref, now: Duration) -> Vec<NodeId> {
		self.claims.release_owned(owner, now)
	}

	/// Finishes transitions that ran out and releases timed claims accordingly.
	#[instrument(skip(self, dom))]
	pub fn tick(&mut self, dom: &mut impl Dom, now: Duration) -> Vec<NodeId> {
		let (finished, running): (Vec<_>, Vec<_>) = self.transitions.drain(..).partition(|transition| now >= transition.until);
		self.transitions = running;
		for RunningTransition { node, classes, .. } in finished {
			if !dom.contains(&node) {
				continue;
			}
			trace!(?node, "Transition finished.");
			for class in &classes {
				if let Err(error) = dom.remove_class(&node, class) {
					warn!("Failed to remove transition class {} from {:?}: {}", class, node, error);
				}
			}
		}
		self.claims.expire(now)
	}

	/// Re-applies client-owned visibility below `root` after a diff.
	pub fn reassert_sticky(&self, dom: &mut impl Dom, root: &NodeId) {
		self.sticky.reassert(dom, root);
	}

	/// Forgets everything about nodes that left the document.
	pub fn prune(&mut self, dom: &impl Dom) {
		self.claims.prune(|node| dom.contains(node));
		self.sticky.prune(|node| dom.contains(node));
		self.transitions.retain(|transition| dom.contains(&transition.node));
	}
}

fn resolve(dom: &impl Dom, source: &NodeId, target: &Target) -> Result<(String, Vec<NodeId>), CommandError> {
	let (selector, nodes) = match target {
		Target::Source => (format!("#{}", source), if dom.contains(source) { vec![source.clone()] } else { Vec::new() }),
		Target::Selector(selector) => (selector.clone(), dom.query_all(selector)?),
		Target::Inner(selector) => (selector.clone(), dom.query_within(source, selector)?),
		Target::Closest(selector) => (selector.clone(), dom.closest(source, selector)?.into_iter().collect()),
	};
	if nodes.is_empty() {
		return Err(CommandError::NoTarget(selector));
	}
	Ok((selector, nodes))
}
