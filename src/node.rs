//! Identity types shared by all components.

use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Identity of a DOM element, stable across re-renders of the same logical element.
///
/// This is the element's `id`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Rc<str>);
impl NodeId {
	#[must_use]
	pub fn new(id: &str) -> Self {
		Self(id.into())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl From<&str> for NodeId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}
impl From<String> for NodeId {
	fn from(id: String) -> Self {
		Self(id.into())
	}
}
impl fmt::Debug for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}
impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Interaction kinds that are tracked per element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
	Click,
	Change,
	Submit,
	Focus,
	Blur,
	Keydown,
	Keyup,
}
impl Kind {
	pub const COUNT: usize = 7;
	pub const ALL: [Kind; Kind::COUNT] = [Kind::Click, Kind::Change, Kind::Submit, Kind::Focus, Kind::Blur, Kind::Keydown, Kind::Keyup];

	#[must_use]
	pub fn index(self) -> usize {
		self as usize
	}

	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Kind::Click => "click",
			Kind::Change => "change",
			Kind::Submit => "submit",
			Kind::Focus => "focus",
			Kind::Blur => "blur",
			Kind::Keydown => "keydown",
			Kind::Keyup => "keyup",
		}
	}

	/// The loading class an element carries while pushes of this kind are in flight.
	#[must_use]
	pub fn loading_class(self) -> &'static str {
		match self {
			Kind::Click => "phx-click-loading",
			Kind::Change => "phx-change-loading",
			Kind::Submit => "phx-submit-loading",
			Kind::Focus => "phx-focus-loading",
			Kind::Blur => "phx-blur-loading",
			Kind::Keydown => "phx-keydown-loading",
			Kind::Keyup => "phx-keyup-loading",
		}
	}

	/// Whether pushes of this kind also count against the source's enclosing form.
	#[must_use]
	pub fn is_form_kind(self) -> bool {
		matches!(self, Kind::Change | Kind::Submit)
	}
}
impl fmt::Display for Kind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interaction kind {0:?}")]
pub struct UnknownKind(pub String);

impl FromStr for Kind {
	type Err = UnknownKind;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Kind::ALL.iter().copied().find(|kind| kind.as_str() == s).ok_or_else(|| UnknownKind(s.to_owned()))
	}
}

/// Correlation token linking a push to its eventual resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ref(pub u64);
impl fmt::Display for Ref {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Hands out unique [`Ref`]s, starting at 1.
#[derive(Debug, Default)]
pub struct RefCounter(u64);
impl RefCounter {
	pub fn next(&mut self) -> Ref {
		self.0 += 1;
		Ref(self.0)
	}
}
