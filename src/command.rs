//! Client-side effects and their encoded form.
//!
//! The encoded form is a JSON list of `[name, options]` pairs:
//!
//! ```
//! use phx_reconcile::command::{Command, CommandQueue, Target};
//!
//! let queue = CommandQueue::from_json(r##"[["push",{"event":"delete"}],["hide",{"to":"#row-13"}]]"##).unwrap();
//! assert_eq!(queue.commands()[1], Command::Hide { to: Target::selector("#row-13") });
//! ```

use crate::{config::millis, error::CommandError, node::NodeId};
use core::time::Duration;
use serde::Deserialize;
use serde_json::Value;

/// Which node(s) an effect applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
	/// The element the interaction originated from.
	Source,
	/// Document-wide selector.
	Selector(String),
	/// Matching descendants of the source.
	Inner(String),
	/// The source or its nearest matching ancestor.
	Closest(String),
}
impl Default for Target {
	fn default() -> Self {
		Target::Source
	}
}
impl Target {
	pub fn selector(selector: impl Into<String>) -> Self {
		Target::Selector(selector.into())
	}

	#[must_use]
	pub fn node(node: &NodeId) -> Self {
		Target::Selector(format!("#{}", node))
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushOptions {
	pub event: String,
	pub value: Value,
	/// Selector overriding which node(s) receive loading-class treatment.
	pub loading: Option<String>,
	/// Treat this push as an element-triggered navigation.
	pub page_loading: bool,
}
impl PushOptions {
	pub fn new(event: impl Into<String>) -> Self {
		Self {
			event: event.into(),
			value: Value::Null,
			loading: None,
			page_loading: false,
		}
	}

	#[must_use]
	pub fn with_value(mut self, value: Value) -> Self {
		self.value = value;
		self
	}

	pub fn with_loading(mut self, selector: impl Into<String>) -> Self {
		self.loading = Some(selector.into());
		self
	}

	#[must_use]
	pub fn with_page_loading(mut self) -> Self {
		self.page_loading = true;
		self
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
	Push(PushOptions),
	Hide {
		to: Target,
	},
	Show {
		to: Target,
		display: Option<String>,
	},
	Transition {
		to: Target,
		classes: Vec<String>,
		time: Option<Duration>,
	},
	ToggleClass {
		to: Target,
		classes: Vec<String>,
	},
	ToggleAttribute {
		to: Target,
		attr: String,
		/// Alternates between these two values instead of presence and absence.
		values: Option<(String, String)>,
	},
	AddClass {
		to: Target,
		classes: Vec<String>,
	},
	RemoveClass {
		to: Target,
		classes: Vec<String>,
	},
	SetAttribute {
		to: Target,
		attr: String,
		value: String,
	},
	RemoveAttribute {
		to: Target,
		attr: String,
	},
	Dispatch {
		to: Target,
		event: String,
		detail: Value,
		bubbles: bool,
	},
}
impl Command {
	pub fn push(event: impl Into<String>) -> Self {
		Command::Push(PushOptions::new(event))
	}

	#[must_use]
	pub fn hide(to: Target) -> Self {
		Command::Hide { to }
	}

	#[must_use]
	pub fn show(to: Target) -> Self {
		Command::Show { to, display: None }
	}

	#[must_use]
	pub fn name(&self) -> &'static str {
		match self {
			Command::Push(_) => "push",
			Command::Hide { .. } => "hide",
			Command::Show { .. } => "show",
			Command::Transition { .. } => "transition",
			Command::ToggleClass { .. } => "toggle_class",
			Command::ToggleAttribute { .. } => "toggle_attr",
			Command::AddClass { .. } => "add_class",
			Command::RemoveClass { .. } => "remove_class",
			Command::SetAttribute { .. } => "set_attr",
			Command::RemoveAttribute { .. } => "remove_attr",
			Command::Dispatch { .. } => "dispatch",
		}
	}

	/// Whether running this effect registers a claim.
	#[must_use]
	pub fn claims(&self) -> bool {
		matches!(self, Command::Hide { .. } | Command::Show { .. } | Command::Transition { .. })
	}
}

/// An ordered effect list. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandQueue(Vec<Command>);
impl CommandQueue {
	#[must_use]
	pub fn new(commands: Vec<Command>) -> Self {
		Self(commands)
	}

	#[must_use]
	pub fn commands(&self) -> &[Command] {
		&self.0
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Decodes the `[[name, options], …]` form.
	///
	/// # Errors
	///
	/// Malformed JSON or options, and unknown command names, fail the whole queue.
	pub fn from_json(json: &str) -> Result<Self, CommandError> {
		let raw: Vec<(String, Value)> = serde_json::from_str(json)?;
		raw.into_iter().map(|(name, options)| decode(&name, options)).collect::<Result<Vec<_>, _>>().map(Self)
	}
}
impl From<Vec<Command>> for CommandQueue {
	fn from(commands: Vec<Command>) -> Self {
		Self(commands)
	}
}
impl<'a> IntoIterator for &'a CommandQueue {
	type Item = &'a Command;
	type IntoIter = core::slice::Iter<'a, Command>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTarget {
	Selector(String),
	Inner { inner: String },
	Closest { closest: String },
}
fn target(raw: Option<RawTarget>) -> Target {
	match raw {
		None => Target::Source,
		Some(RawTarget::Selector(selector)) => Target::Selector(selector),
		Some(RawTarget::Inner { inner }) => Target::Inner(inner),
		Some(RawTarget::Closest { closest }) => Target::Closest(closest),
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassList {
	Spaced(String),
	List(Vec<String>),
}
impl ClassList {
	fn into_vec(self) -> Vec<String> {
		match self {
			ClassList::Spaced(spaced) => spaced.split_whitespace().map(str::to_owned).collect(),
			ClassList::List(list) => list,
		}
	}
}

#[derive(Deserialize)]
struct PushArgs {
	event: String,
	#[serde(default)]
	value: Value,
	#[serde(default)]
	loading: Option<String>,
	#[serde(default)]
	page_loading: bool,
}

#[derive(Deserialize)]
struct ToArgs {
	#[serde(default)]
	to: Option<RawTarget>,
}

#[derive(Deserialize)]
struct ShowArgs {
	#[serde(default)]
	to: Option<RawTarget>,
	#[serde(default)]
	display: Option<String>,
}

#[derive(Deserialize)]
struct TransitionArgs {
	#[serde(default)]
	to: Option<RawTarget>,
	transition: ClassList,
	#[serde(default, deserialize_with = "millis::deserialize_option")]
	time: Option<Duration>,
}

#[derive(Deserialize)]
struct ClassArgs {
	#[serde(default)]
	to: Option<RawTarget>,
	names: ClassList,
}

#[derive(Deserialize)]
struct ToggleAttrArgs {
	#[serde(default)]
	to: Option<RawTarget>,
	attr: AttrSpec,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AttrSpec {
	Name(String),
	Alternating(String, String, String),
}

#[derive(Deserialize)]
struct SetAttrArgs {
	#[serde(default)]
	to: Option<RawTarget>,
	attr: (String, String),
}

#[derive(Deserialize)]
struct RemoveAttrArgs {
	#[serde(default)]
	to: Option<RawTarget>,
	attr: String,
}

#[derive(Deserialize)]
struct DispatchArgs {
	#[serde(default)]
	to: Option<RawTarget>,
	event: String,
	#[serde(default)]
	detail: Value,
	#[serde(default = "default_bubbles")]
	bubbles: bool,
}

fn default_bubbles() -> bool {
	true
}

fn decode(name: &str, options: Value) -> Result<Command, CommandError> {
	Ok(match name {
		"push" => {
			let PushArgs { event, value, loading, page_loading } = serde_json::from_value(options)?;
			Command::Push(PushOptions { event, value, loading, page_loading })
		}
		"hide" => {
			let ToArgs { to } = serde_json::from_value(options)?;
			Command::Hide { to: target(to) }
		}
		"show" => {
			let ShowArgs { to, display } = serde_json::from_value(options)?;
			Command::Show { to: target(to), display }
		}
		"transition" => {
			let TransitionArgs { to, transition, time } = serde_json::from_value(options)?;
			Command::Transition {
				to: target(to),
				classes: transition.into_vec(),
				time,
			}
		}
		"toggle_class" => {
			let ClassArgs { to, names } = serde_json::from_value(options)?;
			Command::ToggleClass {
				to: target(to),
				classes: names.into_vec(),
			}
		}
		"toggle_attr" => {
			let ToggleAttrArgs { to, attr } = serde_json::from_value(options)?;
			match attr {
				AttrSpec::Name(attr) => Command::ToggleAttribute { to: target(to), attr, values: None },
				AttrSpec::Alternating(attr, first, second) => Command::ToggleAttribute {
					to: target(to),
					attr,
					values: Some((first, second)),
				},
			}
		}
		"add_class" | "remove_class" => {
			let ClassArgs { to, names } = serde_json::from_value(options)?;
			let (to, classes) = (target(to), names.into_vec());
			if name == "add_class" {
				Command::AddClass { to, classes }
			} else {
				Command::RemoveClass { to, classes }
			}
		}
		"set_attr" => {
			let SetAttrArgs { to, attr: (attr, value) } = serde_json::from_value(options)?;
			Command::SetAttribute { to: target(to), attr, value }
		}
		"remove_attr" => {
			let RemoveAttrArgs { to, attr } = serde_json::from_value(options)?;
			Command::RemoveAttribute { to: target(to), attr }
		}
		"dispatch" => {
			let DispatchArgs { to, event, detail, bubbles } = serde_json::from_value(options)?;
			Command::Dispatch {
				to: target(to),
				event,
				detail,
				bubbles,
			}
		}
		unknown => return Err(CommandError::UnknownCommand(unknown.to_owned())),
	})
}
