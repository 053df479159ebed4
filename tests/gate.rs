mod common;

use common::{node, reconciler, TestReconciler};
use core::time::Duration;
use phx_reconcile::{
	command::{Command, CommandQueue, Target},
	dom::Dom,
	memory::{MemoryElement, MemoryPatch},
	Diff, GateReport, Kind, PatchTree, Ref, Resolution,
};
use serde_json::json;

fn set_text(id: &str, text: &str) -> PatchTree<MemoryPatch> {
	PatchTree::new(node(id), MemoryPatch::SetText(text.into()))
}

#[test]
fn idle_nodes_are_patched_immediately() {
	let mut reconciler = reconciler();
	let report = reconciler.apply_diff(Diff::new(set_text("row-2", "zwei"))).unwrap();
	assert_eq!(report, GateReport { applied: 1, ..GateReport::default() });
	assert_eq!(reconciler.dom().text(&node("row-2")).as_deref(), Some("zwei"));
	assert!(reconciler.gate().is_empty());
}

#[test]
fn pending_nodes_buffer_and_the_latest_wins() {
	let mut reconciler = reconciler();
	let row = node("row-1");
	let reference = reconciler.push_event(&row, Kind::Click, "select", json!({}));

	let report = reconciler.apply_diff(Diff::new(set_text("row-1", "first"))).unwrap();
	assert_eq!(report.buffered, 1);
	reconciler.apply_diff(Diff::new(set_text("row-1", "second"))).unwrap();
	assert_eq!(reconciler.dom().text(&row).as_deref(), Some("one"));
	assert_eq!(reconciler.gate().len(), 1);
	assert_eq!(reconciler.gate().buffered_tree(&row).and_then(|tree| tree.patch.clone()), Some(MemoryPatch::SetText("second".into())));

	let report = reconciler.resolve(reference, Resolution::Ack(None)).unwrap();
	assert_eq!(report.applied, 1);
	assert_eq!(reconciler.dom().text(&row).as_deref(), Some("second"));
	assert!(reconciler.gate().is_empty());
}

#[test]
fn an_acknowledgement_applies_to_its_own_source() {
	let mut reconciler = reconciler();
	let row = node("row-1");
	let reference = reconciler.push_event(&row, Kind::Click, "select", json!({}));
	let report = reconciler.apply_diff(Diff::resolving(reference, set_text("row-1", "selected"))).unwrap();
	assert_eq!(report.applied, 1);
	assert_eq!(reconciler.dom().text(&row).as_deref(), Some("selected"));
}

#[test]
fn acknowledgements_wait_for_other_pending_pushes() {
	let mut reconciler = reconciler();
	let row = node("row-1");
	let first = reconciler.push_event(&row, Kind::Click, "select", json!({}));
	let second = reconciler.push_event(&row, Kind::Click, "select", json!({}));

	reconciler.apply_diff(Diff::new(set_text("row-1", "uncorrelated"))).unwrap();
	let report = reconciler.resolve(first, Resolution::Ack(Some(set_text("row-1", "first ack")))).unwrap();
	assert_eq!(report.buffered, 1);
	assert_eq!(reconciler.dom().text(&row).as_deref(), Some("one"));

	reconciler.resolve(second, Resolution::Ack(None)).unwrap();
	assert_eq!(reconciler.dom().text(&row).as_deref(), Some("first ack"));
}

#[test]
fn only_the_protected_subtree_is_held_back() {
	let mut reconciler = reconciler();
	let reference = reconciler.push_event(&node("row-1"), Kind::Click, "select", json!({}));

	let tree = PatchTree::new(node("list"), MemoryPatch::AddClass("sorted".into()))
		.with_child(set_text("row-1", "held"))
		.with_child(set_text("row-2", "applied"));
	let report = reconciler.apply_diff(Diff::new(tree)).unwrap();
	assert_eq!(report, GateReport { applied: 2, buffered: 1, ..GateReport::default() });
	assert!(reconciler.dom().has_class(&node("list"), "sorted"));
	assert_eq!(reconciler.dom().text(&node("row-2")).as_deref(), Some("applied"));
	assert!(reconciler.gate().is_buffered(&node("row-1")));

	reconciler.resolve(reference, Resolution::Ack(None)).unwrap();
	assert_eq!(reconciler.dom().text(&node("row-1")).as_deref(), Some("held"));
}

#[test]
fn unknown_nodes_are_dropped_without_affecting_siblings() {
	let mut reconciler = reconciler();
	let tree = PatchTree::grouping(node("list"), vec![set_text("ghost", "boo"), set_text("row-2", "still applied")]);
	let report = reconciler.apply_diff(Diff::new(tree)).unwrap();
	assert_eq!(report, GateReport { applied: 1, dropped: 1, ..GateReport::default() });
	assert_eq!(reconciler.dom().text(&node("row-2")).as_deref(), Some("still applied"));
}

#[test]
fn a_direct_patch_supersedes_a_buffered_one() {
	let mut reconciler = reconciler();
	let row = node("row-2");
	let reference = reconciler.push_event(&row, Kind::Click, "select", json!({}));
	reconciler.apply_diff(Diff::new(set_text("row-2", "stale"))).unwrap();

	// The acknowledgement's own patch lands before anything is flushed.
	let report = reconciler.resolve(reference, Resolution::Ack(Some(set_text("row-2", "fresh")))).unwrap();
	assert_eq!(report.superseded, 1);
	assert_eq!(reconciler.dom().text(&row).as_deref(), Some("fresh"));
	assert!(reconciler.gate().is_empty());
}

#[test]
fn flush_goes_deepest_first() {
	let mut reconciler = reconciler();
	let queue = CommandQueue::new(vec![Command::push("refresh"), Command::show(Target::selector("#list, #row-1"))]);
	let outcome = reconciler.interact(&node("row-2"), Kind::Click, &queue);

	reconciler.apply_diff(Diff::new(PatchTree::new(node("list"), MemoryPatch::Remove))).unwrap();
	reconciler.apply_diff(Diff::new(set_text("row-1", "last words"))).unwrap();
	assert_eq!(reconciler.gate().len(), 2);

	let report = reconciler.resolve(outcome.pushes[0], Resolution::Ack(None)).unwrap();
	assert_eq!(report, GateReport { applied: 2, ..GateReport::default() });
	assert!(!reconciler.dom().contains(&node("list")));
}

#[test]
fn delete_then_hide_keeps_the_row_hidden_until_the_server_removes_it() {
	let mut reconciler = reconciler();
	let row = node("row-1");
	let queue = CommandQueue::from_json(r##"[["push", {"event": "delete", "value": {"id": 1}}], ["hide", {"to": "#row-1"}]]"##).unwrap();
	let outcome = reconciler.interact(&node("delete-1"), Kind::Click, &queue);
	assert!(!reconciler.dom().is_visible(&row));

	// An unrelated broadcast re-renders the row in the meantime.
	let report = reconciler.apply_diff(Diff::new(PatchTree::new(row.clone(), MemoryPatch::Show).with_child(set_text("delete-1", "Delete!")))).unwrap();
	assert_eq!(report.buffered, 1);
	assert!(!reconciler.dom().is_visible(&row));

	let report = reconciler.resolve(outcome.pushes[0], Resolution::Ack(Some(PatchTree::new(row.clone(), MemoryPatch::Remove)))).unwrap();
	assert_eq!(report.applied, 1);
	assert!(!reconciler.dom().contains(&row));
	assert!(reconciler.gate().is_empty());
	assert!(reconciler.interpreter().claims().is_empty());
	assert!(reconciler.ledger().record(&node("delete-1")).is_none());
}

#[test]
fn client_visibility_outlasts_a_buffered_rerender() {
	let mut reconciler = reconciler();
	let row = node("row-1");
	let queue = CommandQueue::from_json(r##"[["push", {"event": "archive"}], ["hide", {"to": "#row-1"}]]"##).unwrap();
	let outcome = reconciler.interact(&node("delete-1"), Kind::Click, &queue);
	reconciler.apply_diff(Diff::new(PatchTree::new(row.clone(), MemoryPatch::Show).with_child(set_text("delete-1", "Restore")))).unwrap();

	let report = reconciler.resolve(outcome.pushes[0], Resolution::Ack(None)).unwrap();
	assert_eq!(report.applied, 2);
	assert_eq!(reconciler.dom().text(&node("delete-1")).as_deref(), Some("Restore"));
	assert!(!reconciler.dom().is_visible(&row));
}

#[test]
fn transition_claims_outlive_their_push_until_time_runs_out() {
	let mut reconciler = reconciler();
	let modal = node("modal");
	let queue = CommandQueue::from_json(r##"[["push", {"event": "close"}], ["transition", {"to": "#modal", "transition": "fade-out", "time": 100}]]"##).unwrap();
	let outcome = reconciler.interact(&node("row-2"), Kind::Click, &queue);
	assert!(reconciler.dom().has_class(&modal, "fade-out"));

	reconciler.apply_diff(Diff::new(PatchTree::new(modal.clone(), MemoryPatch::AddClass("closed".into())))).unwrap();
	let report = reconciler.resolve(outcome.pushes[0], Resolution::Ack(None)).unwrap();
	assert_eq!(report.applied, 0);
	assert!(reconciler.gate().is_buffered(&modal));
	assert!(reconciler.interpreter().claims().iter().all(|claim| claim.owner_resolved()));

	reconciler.dom_mut().advance(Duration::from_millis(50));
	assert_eq!(reconciler.tick(), GateReport::default());
	assert!(reconciler.dom().has_class(&modal, "fade-out"));

	reconciler.dom_mut().advance(Duration::from_millis(50));
	assert_eq!(reconciler.tick().applied, 1);
	assert!(!reconciler.dom().has_class(&modal, "fade-out"));
	assert!(reconciler.dom().has_class(&modal, "closed"));
}

#[test]
fn failed_pushes_release_claims_and_flush() {
	let mut reconciler = reconciler();
	let row = node("row-1");
	let queue = CommandQueue::from_json(r##"[["push", {"event": "delete", "value": {"id": 1}}], ["hide", {"to": "#row-1"}]]"##).unwrap();
	let outcome = reconciler.interact(&node("delete-1"), Kind::Click, &queue);
	reconciler.apply_diff(Diff::new(PatchTree::new(row.clone(), MemoryPatch::AddClass("edited".into())).with_child(set_text("delete-1", "Undo")))).unwrap();
	assert!(reconciler.gate().is_buffered(&row));

	let report = reconciler.resolve(outcome.pushes[0], Resolution::Error("timeout".into())).unwrap();
	assert_eq!(report, GateReport { applied: 2, ..GateReport::default() });
	assert!(reconciler.interpreter().claims().is_empty());
	assert!(reconciler.gate().is_empty());
	assert!(reconciler.dom().has_class(&row, "edited"));
	assert_eq!(reconciler.dom().text(&node("delete-1")).as_deref(), Some("Undo"));
	assert!(!reconciler.dom().is_visible(&row));
	assert!(reconciler.dom().has_class(&node("container"), "phx-error"));
}

#[test]
fn transition_claims_also_wait_for_their_push() {
	let mut reconciler = reconciler();
	let modal = node("modal");
	let queue = CommandQueue::from_json(r##"[["push", {"event": "open"}], ["transition", {"to": "#modal", "transition": "fade-in"}]]"##).unwrap();
	let outcome = reconciler.interact(&node("row-2"), Kind::Click, &queue);
	reconciler.apply_diff(Diff::new(PatchTree::new(modal.clone(), MemoryPatch::AddClass("open".into())))).unwrap();

	reconciler.dom_mut().advance(Duration::from_secs(1));
	assert_eq!(reconciler.tick(), GateReport::default());
	assert!(!reconciler.dom().has_class(&modal, "fade-in"));
	assert!(reconciler.gate().is_buffered(&modal));

	assert_eq!(reconciler.resolve(outcome.pushes[0], Resolution::Ack(None)).unwrap().applied, 1);
	assert!(reconciler.dom().has_class(&modal, "open"));
}

#[test]
fn state_of_removed_nodes_is_pruned() {
	let mut reconciler = reconciler();
	let reference = reconciler.push_event(&node("row-2"), Kind::Click, "select", json!({}));
	reconciler.apply_diff(Diff::new(set_text("row-2", "never"))).unwrap();
	assert!(reconciler.gate().is_buffered(&node("row-2")));

	reconciler.apply_diff(Diff::new(PatchTree::new(node("list"), MemoryPatch::Remove))).unwrap();
	assert!(reconciler.gate().is_empty());
	// Still counted by the push in flight.
	assert_eq!(reconciler.ledger().count(&node("row-2"), Kind::Click), 1);

	// The ack for the removed source still resolves cleanly.
	assert_eq!(reconciler.resolve(reference, Resolution::Ack(None)), Ok(GateReport::default()));
	assert!(reconciler.ledger().record(&node("row-2")).is_none());
}

#[test]
fn rerendered_loading_targets_keep_their_class() {
	let mut reconciler = reconciler();
	let row = node("row-2");
	let reference = reconciler.push_event(&row, Kind::Click, "select", json!({}));

	reconciler.apply_diff(Diff::new(PatchTree::new(node("list"), MemoryPatch::Remove))).unwrap();
	let list = MemoryElement::new("ul", "list").child(MemoryElement::new("li", "row-2").text("two"));
	reconciler.apply_diff(Diff::new(PatchTree::new(node("container"), MemoryPatch::Append(list)))).unwrap();
	assert!(reconciler.dom().has_class(&row, "phx-click-loading"));
	assert!(!reconciler.ledger().is_idle(&row));

	assert_eq!(reconciler.resolve(reference, Resolution::Ack(None)), Ok(GateReport::default()));
	assert!(!reconciler.dom().has_class(&row, "phx-click-loading"));
	assert!(reconciler.ledger().is_idle(&row));
}

#[test]
fn appended_nodes_are_visible_to_later_diffs() {
	let mut reconciler = reconciler();
	let tree = PatchTree::new(node("list"), MemoryPatch::Append(MemoryElement::new("li", "row-3"))).with_child(set_text("row-3", "three"));
	assert_eq!(reconciler.apply_diff(Diff::new(tree)).unwrap().applied, 2);
	assert_eq!(reconciler.dom().children(&node("list")), vec![node("row-1"), node("row-2"), node("row-3")]);
	assert_eq!(reconciler.dom().text(&node("row-3")).as_deref(), Some("three"));
}

fn claim(reconciler: &mut TestReconciler, source: &str, selector: &str) -> Ref {
	let queue = CommandQueue::new(vec![Command::push("expand"), Command::show(Target::selector(selector))]);
	reconciler.interact(&node(source), Kind::Click, &queue).pushes[0]
}

fn nested_diffs(reconciler: &mut TestReconciler) {
	let older = PatchTree::new(node("list"), MemoryPatch::AddClass("sorted".into())).with_child(set_text("row-1", "old"));
	reconciler.apply_diff(Diff::new(older)).unwrap();
	reconciler.apply_diff(Diff::new(set_text("row-1", "new"))).unwrap();
	assert!(reconciler.gate().is_buffered(&node("list")));
	assert!(reconciler.gate().is_buffered(&node("row-1")));
}

#[test]
fn replaying_an_ancestor_keeps_a_newer_buffered_descendant() {
	let mut reconciler = reconciler();
	let list_claim = claim(&mut reconciler, "row-2", "#list");
	let row_claim = claim(&mut reconciler, "modal-title", "#row-1");
	nested_diffs(&mut reconciler);

	let report = reconciler.resolve(list_claim, Resolution::Ack(None)).unwrap();
	assert_eq!(report, GateReport { applied: 1, superseded: 1, ..GateReport::default() });
	assert!(reconciler.dom().has_class(&node("list"), "sorted"));
	assert_eq!(reconciler.gate().buffered_tree(&node("row-1")).and_then(|tree| tree.patch.clone()), Some(MemoryPatch::SetText("new".into())));

	reconciler.resolve(row_claim, Resolution::Ack(None)).unwrap();
	assert_eq!(reconciler.dom().text(&node("row-1")).as_deref(), Some("new"));
	assert!(reconciler.gate().is_empty());
}

#[test]
fn replaying_an_ancestor_skips_a_descendant_patched_since() {
	let mut reconciler = reconciler();
	let list_claim = claim(&mut reconciler, "row-2", "#list");
	let row_claim = claim(&mut reconciler, "modal-title", "#row-1");
	nested_diffs(&mut reconciler);

	reconciler.resolve(row_claim, Resolution::Ack(None)).unwrap();
	assert_eq!(reconciler.dom().text(&node("row-1")).as_deref(), Some("new"));

	let report = reconciler.resolve(list_claim, Resolution::Ack(None)).unwrap();
	assert_eq!(report, GateReport { applied: 1, superseded: 1, ..GateReport::default() });
	assert!(reconciler.dom().has_class(&node("list"), "sorted"));
	assert_eq!(reconciler.dom().text(&node("row-1")).as_deref(), Some("new"));
}

#[test]
fn diffs_for_unknown_refs_are_gated_as_uncorrelated() {
	let mut reconciler = reconciler();
	let pending = reconciler.push_event(&node("row-1"), Kind::Click, "select", json!({}));

	let tree = PatchTree::grouping(node("list"), vec![set_text("row-1", "held"), set_text("row-2", "applied")]);
	let report = reconciler.apply_diff(Diff::resolving(Ref(99), tree)).unwrap();
	assert_eq!(report, GateReport { applied: 1, buffered: 1, ..GateReport::default() });
	assert_eq!(reconciler.dom().text(&node("row-2")).as_deref(), Some("applied"));
	assert_eq!(reconciler.ledger().count(&node("row-1"), Kind::Click), 1);

	reconciler.resolve(pending, Resolution::Ack(None)).unwrap();
	assert_eq!(reconciler.dom().text(&node("row-1")).as_deref(), Some("held"));
}
