use core::time::Duration;
use serde::Deserialize;

/// Authoring attribute names read from bound elements.
///
/// These belong to the binding layer and are only read here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Attributes {
	pub disable_with: String,
	pub page_loading: String,
	pub loading_target: String,
}
impl Default for Attributes {
	fn default() -> Self {
		Self {
			disable_with: "phx-disable-with".into(),
			page_loading: "phx-page-loading".into(),
			loading_target: "phx-loading-target".into(),
		}
	}
}

/// Tunables of a [`Reconciler`](`crate::Reconciler`).
///
/// CSS class names are fixed and not part of this.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
	pub attributes: Attributes,
	/// Used by `transition` commands that don't specify a time.
	#[serde(with = "millis")]
	pub default_transition: Duration,
	/// CSS `display` value used by `show` commands that don't specify one.
	pub default_display: String,
}
impl Default for Config {
	fn default() -> Self {
		Self {
			attributes: Attributes::default(),
			default_transition: Duration::from_millis(200),
			default_display: "block".into(),
		}
	}
}
impl Config {
	#[must_use]
	pub fn with_attributes(mut self, attributes: Attributes) -> Self {
		self.attributes = attributes;
		self
	}

	#[must_use]
	pub fn with_default_transition(mut self, default_transition: Duration) -> Self {
		self.default_transition = default_transition;
		self
	}

	#[must_use]
	pub fn with_default_display(mut self, default_display: impl Into<String>) -> Self {
		self.default_display = default_display.into();
		self
	}
}

pub(crate) mod millis {
	use core::time::Duration;
	use serde::{Deserialize, Deserializer};

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}

	pub fn deserialize_option<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
		Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
	}
}
