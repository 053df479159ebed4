use crate::node::{Kind, NodeId, Ref};
use thiserror::Error;

/// A Ledger mutation that would have driven a count out of range.
///
/// Counts are left unchanged when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
	#[error("decrement of {kind} on {node:?} without a matching increment")]
	Underflow { node: NodeId, kind: Kind },
	#[error("too many concurrent {kind} pushes on {node:?}")]
	Saturated { node: NodeId, kind: Kind },
}

/// Correlation bugs upstream of the reconciliation core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
	#[error("resolution for unknown ref {0}")]
	UnknownRef(Ref),
	#[error(transparent)]
	Ledger(#[from] LedgerError),
	#[error("navigation attempt {0} is not active")]
	UnknownNavigation(u64),
}

/// Failures of a single command effect. These never abort the rest of a queue.
#[derive(Debug, Error)]
pub enum CommandError {
	#[error("target {0:?} matched no node")]
	NoTarget(String),
	#[error("malformed command queue: {0}")]
	Decode(#[from] serde_json::Error),
	#[error("unknown command {0:?}")]
	UnknownCommand(String),
	#[error(transparent)]
	Dom(#[from] DomError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
	#[error("node {0:?} is not in the document")]
	NodeNotFound(NodeId),
	#[error("invalid selector {0:?}")]
	InvalidSelector(String),
	#[error("{0}")]
	Backend(String),
}
