#![cfg(all(target_arch = "wasm32", feature = "web"))]

use phx_reconcile::{
	command::CommandQueue,
	dom::Dom,
	web::{WebDom, WebPatch},
	Config, Diff, Kind, NodeId, OutboundPush, PatchTree, Reconciler, Resolution,
};
use serde_json::json;
use std::sync::Once;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::window;

wasm_bindgen_test_configure!(run_in_browser);

static LOG_INIT: Once = Once::new();

fn reconciler(html: &str) -> Reconciler<WebDom, Vec<OutboundPush>> {
	LOG_INIT.call_once(tracing_wasm::set_as_global_default);
	let document = window().unwrap().document().unwrap();
	document.body().unwrap().set_inner_html(html);
	Reconciler::new(WebDom::new().unwrap(), Vec::new(), "container".into(), Config::default())
}

#[wasm_bindgen_test]
fn loading_class_and_gated_text() {
	let mut reconciler = reconciler(r#"<div id="container"><button id="go">Go</button></div>"#);
	let go = NodeId::from("go");
	let reference = reconciler.push_event(&go, Kind::Click, "go", json!({}));
	assert!(reconciler.dom().has_class(&go, "phx-click-loading"));

	let report = reconciler.apply_diff(Diff::new(PatchTree::new(go.clone(), WebPatch::SetText("Gone".into())))).unwrap();
	assert_eq!(report.buffered, 1);
	assert_eq!(reconciler.dom().text(&go).as_deref(), Some("Go"));

	reconciler.resolve(reference, Resolution::Ack(None)).unwrap();
	assert!(!reconciler.dom().has_class(&go, "phx-click-loading"));
	assert_eq!(reconciler.dom().text(&go).as_deref(), Some("Gone"));
}

#[wasm_bindgen_test]
fn hide_sets_display_and_unnamed_targets_get_ids() {
	let mut reconciler = reconciler(r#"<div id="container"><ul id="list"><li>a</li><li>b</li></ul></div>"#);
	let list = NodeId::from("list");
	let queue = CommandQueue::from_json(r#"[["hide", {"to": {"inner": "li"}}]]"#).unwrap();
	let outcome = reconciler.interact(&list, Kind::Click, &queue);
	assert_eq!(outcome.failed, 0);

	let items = reconciler.dom().query_within(&list, "li").unwrap();
	assert_eq!(items.len(), 2);
	for item in &items {
		assert!(item.as_str().starts_with("phx-node-"));
		assert!(!reconciler.dom().is_visible(item));
	}
}

#[wasm_bindgen_test]
fn submit_label_swaps_on_a_live_form() {
	let mut reconciler = reconciler(r#"<div id="container"><form id="form"><button id="save" phx-disable-with="Saving...">Save</button></form></div>"#);
	let save = NodeId::from("save");
	let reference = reconciler.push_event(&save, Kind::Submit, "save", json!({}));
	assert_eq!(reconciler.dom().text(&save).as_deref(), Some("Saving..."));
	assert!(reconciler.dom().has_class(&NodeId::from("form"), "phx-submit-loading"));

	reconciler.resolve(reference, Resolution::Ack(None)).unwrap();
	assert_eq!(reconciler.dom().text(&save).as_deref(), Some("Save"));
	assert_eq!(reconciler.dom().attribute(&save, "disabled"), None);
}
