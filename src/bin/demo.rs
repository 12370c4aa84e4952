//! Thin runnable demo: wires a couple of in-memory fake providers and the
//! free chat backend to run one research question end to end and print the
//! resulting Event stream. Not a product surface — just enough to have
//! something runnable in this crate.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use litloop_core::chat::factory::{build_chat_client, ChatBackendSettings};
use litloop_core::config::OrchestratorConfig;
use litloop_core::error::CoreError;
use litloop_core::model::{Citation, Evidence, SourceKind};
use litloop_core::orchestrator::Orchestrator;
use litloop_core::search::SearchProvider;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "litloop-demo", about = "Run one research question through the orchestration core")]
struct Args {
    /// The research question to investigate.
    #[arg(default_value = "does metformin reduce cardiovascular risk in type 2 diabetes?")]
    question: String,
}

/// Deterministic stand-in for a real literature provider, so the demo runs
/// without any network access or API key.
struct DemoProvider;

#[async_trait]
impl SearchProvider for DemoProvider {
    fn name(&self) -> &str {
        "demo"
    }

    async fn search(&self, query: &str, _max_results: u32) -> Result<Vec<Evidence>, CoreError> {
        let citation = Citation::new(
            SourceKind::Pubmed,
            format!("A study related to: {query}"),
            "https://pubmed.ncbi.nlm.nih.gov/00000000/",
            Some("2024-01-01".to_string()),
            vec!["Demo Author".to_string()],
        );
        let mut evidence = Evidence::new(
            format!("Demo evidence body discussing {query} in a placeholder study."),
            citation,
            0.6,
        );
        evidence.metadata.insert("pmid".into(), serde_json::Value::String("00000000".into()));
        Ok(vec![evidence])
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    let chat = build_chat_client(&ChatBackendSettings::default());
    let providers: Vec<Arc<dyn SearchProvider>> = vec![Arc::new(DemoProvider)];
    let orchestrator = Arc::new(Orchestrator::new(OrchestratorConfig::default(), providers, chat, None));

    let (mut events, _cancel) = orchestrator.run(args.question);
    while let Some(event) = events.next().await {
        println!("{event:#?}");
    }
}
