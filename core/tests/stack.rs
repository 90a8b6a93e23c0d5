#![cfg(all(feature = "mind", feature = "bridge", feature = "router"))]

use kore_stack::{
    Bridge, CallableLLM, Experiment, LLMProvider, Memory, MemoryType, Mind, SCRouterProvider,
    Subsystem, Tool, ToolCatalog, load_aggregator, route,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn catalog() -> ToolCatalog {
    ToolCatalog::new()
        .with_tool(
            Tool::new("web_search", "Search the web")
                .with_keywords(["search", "look up"])
                .with_outputs(["urls"]),
        )
        .with_tool(
            Tool::new("fetch_page", "Download a page")
                .with_keywords(["fetch", "download"])
                .with_inputs(["urls"])
                .with_outputs(["html"]),
        )
}

#[test]
fn aggregator_loads_with_all_subsystems() {
    let ns = load_aggregator().unwrap();
    assert_eq!(ns.version(), "0.1.0");
    assert_eq!(ns.exports(), kore_stack::EXPORTS.to_vec());
    for subsystem in Subsystem::ALL {
        assert_eq!(ns.subsystem_version(subsystem), Some("0.1.0"));
    }
}

#[test]
fn names_come_from_their_subsystems() {
    let ns = load_aggregator().unwrap();
    assert_eq!(ns.names_from(Subsystem::Mind).len(), 6);
    assert_eq!(ns.names_from(Subsystem::Bridge).len(), 8);
    assert_eq!(ns.names_from(Subsystem::Router), vec!["ToolCatalog", "Tool", "route"]);
}

#[test]
fn reexports_are_the_subsystem_items() {
    let mind: Mind = kore_mind::Mind::in_memory().unwrap();
    let memory: Memory = mind.experience("rust is fun", MemoryType::Semantic).unwrap();
    assert_eq!(memory.memory_type, kore_mind::MemoryType::Semantic);

    let routing = route("search for rust crates", &catalog());
    assert_eq!(routing, sc_router::route("search for rust crates", &catalog()));
}

#[tokio::test]
async fn bridge_through_the_facade() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let provider = CallableLLM::from_prompt_fn(move |prompt| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("echo: {prompt}"))
    });

    let mind = Arc::new(Mind::in_memory().unwrap());
    let bridge = Bridge::new(mind.clone(), Arc::new(provider));

    assert_eq!(bridge.think("hello").await.unwrap(), "echo: hello");
    assert_eq!(bridge.think("hello").await.unwrap(), "echo: hello");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(mind.count().unwrap(), 1);
}

#[tokio::test]
async fn sc_router_and_experiment_compose() {
    let simple: Arc<dyn LLMProvider> =
        Arc::new(CallableLLM::from_prompt_fn(|_| Ok("simple".into())).with_model("small"));
    let complex: Arc<dyn LLMProvider> =
        Arc::new(CallableLLM::from_prompt_fn(|_| Ok("complex".into())).with_model("large"));
    let routed: Arc<dyn LLMProvider> =
        Arc::new(SCRouterProvider::new(catalog(), simple.clone(), complex));

    let experiment = Experiment::new("routing")
        .variant("direct", simple)
        .variant("routed", routed);
    let result = experiment
        .run(
            "subject",
            &[kore_bridge::ChatMessage::user("search the web")],
            0.0,
        )
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.response.as_deref(), Some("simple"));
}
