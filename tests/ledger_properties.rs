mod common;

use common::{node, reconciler};
use phx_reconcile::{dom::Dom, Kind, ProtocolError, Ref, Resolution};
use proptest::prelude::*;
use serde_json::json;

const NODES: [&str; 4] = ["row-1", "row-2", "list", "modal"];

#[derive(Debug, Clone)]
enum Step {
	Push { node: usize, kind: Kind },
	Resolve(prop::sample::Index),
	Fail(prop::sample::Index),
	/// Resolves an already resolved ref again.
	Replay(prop::sample::Index),
}

fn arb_step() -> impl Strategy<Value = Step> {
	prop_oneof![
		3 => (0..NODES.len(), prop::sample::select(Kind::ALL.to_vec())).prop_map(|(node, kind)| Step::Push { node, kind }),
		2 => any::<prop::sample::Index>().prop_map(Step::Resolve),
		1 => any::<prop::sample::Index>().prop_map(Step::Fail),
		1 => any::<prop::sample::Index>().prop_map(Step::Replay),
	]
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(64))]

	#[test]
	fn counts_follow_pushes_and_resolutions(steps in prop::collection::vec(arb_step(), 1..40)) {
		let mut reconciler = reconciler();
		let mut counts = [[0_u32; Kind::COUNT]; NODES.len()];
		let mut in_flight: Vec<(Ref, usize, Kind)> = Vec::new();
		let mut resolved: Vec<Ref> = Vec::new();

		for step in steps {
			match step {
				Step::Push { node: n, kind } => {
					let reference = reconciler.push_event(&node(NODES[n]), kind, "step", json!({}));
					counts[n][kind.index()] += 1;
					in_flight.push((reference, n, kind));
				}
				Step::Resolve(index) | Step::Fail(index) => {
					if in_flight.is_empty() {
						continue;
					}
					let (reference, n, kind) = in_flight.remove(index.index(in_flight.len()));
					let resolution = if matches!(step, Step::Fail(_)) { Resolution::Error("lost".into()) } else { Resolution::Ack(None) };
					let result = reconciler.resolve(reference, resolution);
					prop_assert!(result.is_ok(), "{:?}", result);
					counts[n][kind.index()] -= 1;
					resolved.push(reference);
				}
				Step::Replay(index) => {
					if resolved.is_empty() {
						continue;
					}
					let reference = resolved[index.index(resolved.len())];
					prop_assert_eq!(reconciler.resolve(reference, Resolution::Ack(None)), Err(ProtocolError::UnknownRef(reference)));
				}
			}

			for (n, id) in NODES.iter().enumerate() {
				let id = node(id);
				for kind in Kind::ALL {
					let expected = counts[n][kind.index()];
					prop_assert_eq!(reconciler.ledger().count(&id, kind), expected);
					prop_assert_eq!(reconciler.dom().has_class(&id, kind.loading_class()), expected > 0);
				}
				prop_assert_eq!(reconciler.ledger().is_idle(&id), counts[n].iter().all(|&count| count == 0));
			}
		}
		prop_assert_eq!(reconciler.pushes().len(), in_flight.len());
	}
}
