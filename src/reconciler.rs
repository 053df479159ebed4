use crate::{
	command::{Command, CommandQueue, PushOptions},
	config::Config,
	dom::Dom,
	error::{DomError, ProtocolError},
	gate::{Diff, Gate, GateReport, PatchTree},
	interpreter::{ExecContext, ExecOutcome, Interpreter, PushDispatcher},
	ledger::{BindingRecord, Ledger},
	loading::{self, Connection},
	navigation::{NavigationDispatcher, NavigationId, NavigationKind, PageLoading},
	node::{Kind, NodeId, Ref, RefCounter},
	push::{OutboundPush, PushRecord, PushTable, Resolution, Transport},
};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

/// The reconciliation core for one server-rendered view.
///
/// Owns the registry (Ledger, push records, claims, diff buffers) and passes it explicitly to each component.
/// All operations run to completion. Call them from one thread, in event order.
pub struct Reconciler<D: Dom, T: Transport> {
	dom: D,
	transport: T,
	config: Config,
	container: NodeId,
	ledger: Ledger,
	pushes: PushTable,
	refs: RefCounter,
	interpreter: Interpreter,
	gate: Gate<D::Patch>,
	navigation: NavigationDispatcher,
	connection_navigation: Option<NavigationId>,
}
impl<D: Dom, T: Transport> Reconciler<D, T> {
	#[instrument(skip(dom, transport, config))]
	pub fn new(dom: D, transport: T, container: NodeId, config: Config) -> Self {
		if !dom.contains(&container) {
			warn!("The container {:?} is not in the document (yet).", container);
		}
		Self {
			dom,
			transport,
			config,
			container,
			ledger: Ledger::new(),
			pushes: PushTable::default(),
			refs: RefCounter::default(),
			interpreter: Interpreter::new(),
			gate: Gate::new(),
			navigation: NavigationDispatcher::new(),
			connection_navigation: None,
		}
	}

	pub fn dom(&self) -> &D {
		&self.dom
	}

	pub fn dom_mut(&mut self) -> &mut D {
		&mut self.dom
	}

	pub fn transport(&self) -> &T {
		&self.transport
	}

	pub fn transport_mut(&mut self) -> &mut T {
		&mut self.transport
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn container(&self) -> &NodeId {
		&self.container
	}

	pub fn ledger(&self) -> &Ledger {
		&self.ledger
	}

	pub fn pushes(&self) -> &PushTable {
		&self.pushes
	}

	pub fn interpreter(&self) -> &Interpreter {
		&self.interpreter
	}

	pub fn gate(&self) -> &Gate<D::Patch> {
		&self.gate
	}

	pub fn navigation(&self) -> &NavigationDispatcher {
		&self.navigation
	}

	/// Creates the binding record for `node` from its authoring attributes, unless it already has one.
	///
	/// # Errors
	///
	/// [`DomError::NodeNotFound`] if `node` isn't in the document.
	#[instrument(skip(self))]
	pub fn bind(&mut self, node: &NodeId) -> Result<(), DomError> {
		if !self.dom.contains(node) {
			return Err(DomError::NodeNotFound(node.clone()));
		}
		if self.ledger.record(node).is_none() {
			self.ledger.bind(BindingRecord::observe(&self.dom, node, &self.config));
		}
		Ok(())
	}

	/// Runs `queue` optimistically for an interaction of `kind` on `source`.
	#[instrument(skip(self, queue))]
	pub fn interact(&mut self, source: &NodeId, kind: Kind, queue: &CommandQueue) -> ExecOutcome {
		if let Err(error) = self.bind(source) {
			warn!("Interaction source is unbindable: {}", error);
		}
		self.execute(source, kind, queue, None)
	}

	/// Shorthand for an interaction whose queue is a single push.
	pub fn push_event(&mut self, source: &NodeId, kind: Kind, event: &str, value: Value) -> Ref {
		let queue = CommandQueue::new(vec![Command::Push(PushOptions::new(event).with_value(value))]);
		let outcome = self.interact(source, kind, &queue);
		debug_assert_eq!(outcome.pushes.len(), 1);
		outcome.pushes[0]
	}

	/// Runs `queue`, for example on instruction from the server. Claims registered before the queue's own
	/// first push belong to `owner` while it is in flight.
	///
	/// An `owner` that already resolved (or never existed) can't release claims anymore, so effects run
	/// unprotected in that case, as if no owner was given.
	#[instrument(skip(self, queue))]
	pub fn execute(&mut self, source: &NodeId, kind: Kind, queue: &CommandQueue, owner: Option<Ref>) -> ExecOutcome {
		let owner = owner.filter(|&owner| {
			let in_flight = self.pushes.contains(owner);
			if !in_flight {
				debug!(%owner, "Owner isn't in flight; Effects run unprotected.");
			}
			in_flight
		});
		let mut dispatcher = Dispatcher {
			ledger: &mut self.ledger,
			pushes: &mut self.pushes,
			refs: &mut self.refs,
			transport: &mut self.transport,
			navigation: &mut self.navigation,
			config: &self.config,
		};
		let outcome = self.interpreter.execute(&mut self.dom, &mut dispatcher, queue, ExecContext { source, kind, owner }, &self.config);
		debug!(pushes = outcome.pushes.len(), failed = outcome.failed, "Queue executed.");
		outcome
	}

	/// Applies an incoming diff. A diff carrying a ref is the acknowledgement of that push.
	///
	/// A diff whose ref isn't in flight is logged as an error and then gated like an uncorrelated diff,
	/// so the server state it carries isn't lost.
	///
	/// # Errors
	///
	/// See [`resolve`](`Reconciler::resolve`). The [`ProtocolError::UnknownRef`] case doesn't occur here.
	pub fn apply_diff(&mut self, diff: Diff<D::Patch>) -> Result<GateReport, ProtocolError> {
		match diff.reference {
			Some(reference) if self.pushes.contains(reference) => self.resolve(reference, Resolution::Ack(Some(diff.root))),
			Some(reference) => {
				error!("Diff for unknown ref {}; Applying it as uncorrelated.", reference);
				Ok(self.apply_uncorrelated(diff.root))
			}
			None => Ok(self.apply_uncorrelated(diff.root)),
		}
	}

	#[instrument(skip(self, tree), fields(root = ?tree.node))]
	fn apply_uncorrelated(&mut self, tree: PatchTree<D::Patch>) -> GateReport {
		let mut report = self.gate.apply(&mut self.dom, &self.ledger, &self.interpreter, tree, None);
		self.prune();
		report += self.gate.flush(&mut self.dom, &self.ledger, &self.interpreter);
		self.refresh_pending();
		report
	}

	/// Resolves the push `reference`: Ledger decrement, then claim release, then the acknowledgement's own diff
	/// (if any), then flushing of buffered diffs that became unprotected.
	///
	/// An error resolution is treated like an acknowledgement without diff, and marks the container with `phx-error`.
	///
	/// # Errors
	///
	/// [`ProtocolError::UnknownRef`] if `reference` isn't in flight. Nothing is applied in that case.
	///
	/// [`ProtocolError::Ledger`] if a count of the push was already zero. The remaining steps still ran.
	#[instrument(skip(self, resolution))]
	pub fn resolve(&mut self, reference: Ref, resolution: Resolution<PatchTree<D::Patch>>) -> Result<GateReport, ProtocolError> {
		let record = match self.pushes.take(reference) {
			Some(record) => record,
			None => {
				error!("Resolution for unknown ref {}.", reference);
				return Err(ProtocolError::UnknownRef(reference));
			}
		};

		let mut ledger_error = None;
		for node in &record.loading_targets {
			match self.ledger.decrement(node, record.kind) {
				Ok(_) => loading::refresh(&mut self.dom, &mut self.ledger, node),
				Err(error) => {
					error!("{}", error);
					ledger_error.get_or_insert(error);
				}
			}
		}

		let released = self.interpreter.release(reference, self.dom.now());
		debug!(released = released.len(), "Claims released.");

		let failed = matches!(resolution, Resolution::Error(_));
		if let Some(navigation) = record.navigation {
			let result = if failed {
				self.navigation.fail(&mut self.dom, navigation)
			} else {
				self.navigation.stop(&mut self.dom, navigation)
			};
			if let Err(error) = result {
				error!("phx-reconcile bug: {}", error);
			}
		}

		let mut report = match resolution {
			Resolution::Ack(Some(tree)) => self.gate.apply(&mut self.dom, &self.ledger, &self.interpreter, tree, Some(reference)),
			Resolution::Ack(None) => GateReport::default(),
			Resolution::Error(reason) => {
				warn!(%reference, "Push failed: {}", reason);
				if let Err(error) = self.dom.add_class(&self.container, loading::ERROR_CLASS) {
					warn!("Failed to mark container as errored: {}", error);
				}
				GateReport::default()
			}
		};
		self.prune();
		report += self.gate.flush(&mut self.dom, &self.ledger, &self.interpreter);
		self.refresh_pending();

		match ledger_error {
			Some(error) => Err(error.into()),
			None => Ok(report),
		}
	}

	/// Lets time-bounded effects finish, releasing expired claims and flushing what they held back.
	#[instrument(skip(self))]
	pub fn tick(&mut self) -> GateReport {
		let now = self.dom.now();
		let released = self.interpreter.tick(&mut self.dom, now);
		if released.is_empty() {
			return GateReport::default();
		}
		debug!(released = released.len(), "Timed claims released.");
		self.gate.flush(&mut self.dom, &self.ledger, &self.interpreter)
	}

	/// Drops all state about nodes that left the document.
	///
	/// Binding records of loading targets stay while their push is in flight, since the same id may be re-rendered
	/// before the resolution arrives.
	pub fn prune(&mut self) {
		let (dom, pushes) = (&self.dom, &self.pushes);
		let pruned = self.ledger.prune(|node| dom.contains(node) || pushes.is_loading_target(node));
		if !pruned.is_empty() {
			debug!("Pruned {} binding record(s).", pruned.len());
		}
		self.interpreter.prune(dom);
		self.gate.prune(dom);
	}

	/// Restores loading state on in-flight loading targets that a diff re-rendered.
	fn refresh_pending(&mut self) {
		let dom = &self.dom;
		let targets: Vec<NodeId> = self.pushes.loading_targets().filter(|node| dom.contains(node)).cloned().collect();
		for node in &targets {
			loading::refresh(&mut self.dom, &mut self.ledger, node);
		}
	}

	pub fn start_navigation(&mut self, loading: PageLoading) -> NavigationId {
		self.navigation.start(&mut self.dom, loading)
	}

	/// # Errors
	///
	/// [`ProtocolError::UnknownNavigation`] if `id` isn't active.
	pub fn stop_navigation(&mut self, id: NavigationId) -> Result<(), ProtocolError> {
		self.navigation.stop(&mut self.dom, id)
	}

	/// # Errors
	///
	/// [`ProtocolError::UnknownNavigation`] if `id` isn't active.
	pub fn fail_navigation(&mut self, id: NavigationId) -> Result<(), ProtocolError> {
		self.navigation.fail(&mut self.dom, id)
	}

	/// Reports a committed URL-bar change.
	pub fn navigated(&mut self, href: &str, patch: bool, pop: bool) {
		self.navigation.navigate(&mut self.dom, href, patch, pop);
	}

	pub fn connecting(&mut self) {
		loading::apply_connection(&mut self.dom, &self.container, Connection::Connecting);
	}

	#[instrument(skip(self))]
	pub fn connected(&mut self) {
		loading::apply_connection(&mut self.dom, &self.container, Connection::Connected);
		if let Some(id) = self.connection_navigation.take() {
			if let Err(error) = self.navigation.stop(&mut self.dom, id) {
				error!("phx-reconcile bug: {}", error);
			}
		}
		info!("Connected.");
	}

	/// The transport was lost. `href` is the current location.
	#[instrument(skip(self))]
	pub fn disconnected(&mut self, href: &str) {
		loading::apply_connection(&mut self.dom, &self.container, Connection::Disconnected);
		if self.connection_navigation.is_none() {
			self.connection_navigation = Some(self.navigation.start(&mut self.dom, PageLoading::to(NavigationKind::Error, href)));
		}
		warn!("Disconnected.");
	}
}

struct Dispatcher<'a, T> {
	ledger: &'a mut Ledger,
	pushes: &'a mut PushTable,
	refs: &'a mut RefCounter,
	transport: &'a mut T,
	navigation: &'a mut NavigationDispatcher,
	config: &'a Config,
}
impl<'a, T: Transport> Dispatcher<'a, T> {
	fn loading_targets<D: Dom>(&mut self, dom: &D, source: &NodeId, kind: Kind, selector: Option<&str>) -> Vec<NodeId> {
		if let Some(selector) = selector {
			match dom.query_all(selector) {
				Ok(nodes) if !nodes.is_empty() => return nodes,
				Ok(_) => warn!("Loading target {:?} matched no node; Using the source.", selector),
				Err(error) => warn!("Ignoring loading target: {}", error),
			}
		}
		let mut targets = vec![source.clone()];
		if kind.is_form_kind() {
			if let Some(form) = self.ledger.record(source).and_then(|record| record.owner_form.clone()) {
				if dom.contains(&form) {
					targets.push(form);
				}
			}
		}
		targets
	}
}
impl<'a, D: Dom, T: Transport> PushDispatcher<D> for Dispatcher<'a, T> {
	#[instrument(skip(self, dom, options, queue), fields(event = %options.event))]
	fn push(&mut self, dom: &mut D, source: &NodeId, kind: Kind, options: &PushOptions, queue: &CommandQueue) -> Ref {
		let reference = self.refs.next();
		let config = self.config;
		let loading_target_selector = options.loading.clone().or_else(|| dom.attribute(source, &config.attributes.loading_target));
		let page_loading = options.page_loading || dom.attribute(source, &config.attributes.page_loading).is_some();

		let mut loading_targets = self.loading_targets(&*dom, source, kind, loading_target_selector.as_deref());
		loading_targets.retain(|node| {
			if self.ledger.record(node).is_none() && dom.contains(node) {
				self.ledger.bind(BindingRecord::observe(&*dom, node, config));
			}
			match self.ledger.increment(node, kind) {
				Ok(_) => true,
				Err(error) => {
					error!("{}", error);
					false
				}
			}
		});
		for node in &loading_targets {
			loading::refresh(dom, self.ledger, node);
		}

		let navigation = if page_loading { Some(self.navigation.start(dom, PageLoading::element(source.clone()))) } else { None };

		self.pushes.insert(PushRecord {
			reference,
			kind,
			source_node: source.clone(),
			loading_target_selector,
			loading_targets,
			command_queue: queue.clone(),
			navigation,
		});
		#[cfg(feature = "dangerous-logging")]
		tracing::trace!(payload = %options.value, "Sending push.");
		self.transport.send(OutboundPush {
			reference,
			kind,
			event: options.event.clone(),
			payload: options.value.clone(),
			source_node: source.clone(),
		});
		debug!(%reference, "Push dispatched.");
		reference
	}
}
