#![allow(dead_code)]

use phx_reconcile::{
	memory::{MemoryDom, MemoryElement},
	Config, NodeId, OutboundPush, Reconciler,
};
use tracing_subscriber::EnvFilter;

pub type TestReconciler = Reconciler<MemoryDom, Vec<OutboundPush>>;

pub fn init() {
	let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_test_writer().try_init();
}

pub fn node(id: &str) -> NodeId {
	NodeId::from(id)
}

/// ```text
/// div#container
///   form#form
///     input#name
///     button#save[phx-disable-with]
///   ul#list
///     li#row-1 > button#delete-1
///     li#row-2
///   div#modal.modal > span#modal-title
/// ```
pub fn document() -> MemoryDom {
	MemoryDom::new(
		MemoryElement::new("div", "container")
			.child(
				MemoryElement::new("form", "form")
					.child(MemoryElement::new("input", "name").attr("type", "text"))
					.child(MemoryElement::new("button", "save").attr("type", "submit").attr("phx-disable-with", "Saving...").text("Save")),
			)
			.child(
				MemoryElement::new("ul", "list")
					.child(MemoryElement::new("li", "row-1").text("one").child(MemoryElement::new("button", "delete-1").attr("type", "button").text("Delete")))
					.child(MemoryElement::new("li", "row-2").text("two")),
			)
			.child(MemoryElement::new("div", "modal").class("modal").child(MemoryElement::new("span", "modal-title").text("Title"))),
	)
	.unwrap()
}

pub fn reconciler() -> TestReconciler {
	init();
	Reconciler::new(document(), Vec::new(), node("container"), Config::default())
}
