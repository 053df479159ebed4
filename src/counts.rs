use crate::node::Kind;
use core::fmt::Debug;
use num_traits::{CheckedAdd, CheckedSub, One, Zero};

/// Per-[`Kind`] reference counts that refuse to wrap in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindCounts<C = u32>([C; Kind::COUNT])
where
	C: Copy + CheckedAdd + CheckedSub + One + Zero;
impl<C> Default for KindCounts<C>
where
	C: Copy + CheckedAdd + CheckedSub + One + Zero,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<C> KindCounts<C>
where
	C: Copy + CheckedAdd + CheckedSub + One + Zero,
{
	#[must_use]
	pub fn new() -> Self {
		Self([C::zero(); Kind::COUNT])
	}

	#[must_use]
	pub fn get(&self, kind: Kind) -> C {
		self.0[kind.index()]
	}

	/// Returns the new count.
	pub fn increment(&mut self, kind: Kind) -> Result<C, CountSaturatedError> {
		let c = &mut self.0[kind.index()];
		*c = c.checked_add(&C::one()).ok_or(CountSaturatedError::Overflow)?;
		Ok(*c)
	}

	/// Returns the new count. A count of zero is left unchanged.
	pub fn decrement(&mut self, kind: Kind) -> Result<C, CountSaturatedError> {
		let c = &mut self.0[kind.index()];
		*c = c.checked_sub(&C::one()).ok_or(CountSaturatedError::Underflow)?;
		Ok(*c)
	}

	#[must_use]
	pub fn is_zero(&self) -> bool {
		self.0.iter().all(Zero::is_zero)
	}

	/// Kinds with a nonzero count.
	pub fn active(&self) -> impl Iterator<Item = Kind> + '_ {
		Kind::ALL.iter().copied().filter(move |kind| !self.get(*kind).is_zero())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountSaturatedError {
	Overflow,
	Underflow,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn u8_counts_saturate_instead_of_wrapping() {
		let mut counts = KindCounts::<u8>::new();
		for _ in 0..u8::MAX {
			counts.increment(Kind::Click).unwrap();
		}
		assert_eq!(counts.increment(Kind::Click), Err(CountSaturatedError::Overflow));
		assert_eq!(counts.get(Kind::Click), u8::MAX);
	}

	#[test]
	fn underflow_leaves_zero() {
		let mut counts = KindCounts::<u32>::new();
		assert_eq!(counts.decrement(Kind::Blur), Err(CountSaturatedError::Underflow));
		assert_eq!(counts.get(Kind::Blur), 0);
		assert!(counts.is_zero());
	}

	#[test]
	fn active_lists_nonzero_kinds_only() {
		let mut counts = KindCounts::<u32>::new();
		counts.increment(Kind::Submit).unwrap();
		counts.increment(Kind::Keyup).unwrap();
		counts.increment(Kind::Keyup).unwrap();
		counts.decrement(Kind::Keyup).unwrap();
		assert_eq!(counts.active().collect::<Vec<_>>(), vec![Kind::Submit, Kind::Keyup]);
	}
}
