use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, info_span, warn, Instrument};
use tracing_ctx_attrs::{
    attr::Attr,
    context::LogContext,
    init::{init_tracing_with_config, LayerConfig},
    record::LogRecord,
    sink::LogSink,
};

/// Prints each composed record as one JSON line.
struct JsonLinesSink;

#[async_trait]
impl LogSink for JsonLinesSink {
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        println!("{}", serde_json::to_string(record)?);
        Ok(())
    }
}

async fn handle_request(id: u64, path: &'static str) {
    let ctx = LogContext::current()
        .add([Attr::new("request_id", format!("req-{id}"))])
        .add_to_group("http", [Attr::new("route", path)]);

    ctx.scope(
        async move {
            info!(bytes = 512u64, "request handled");
            warn!("slow downstream call");
        }
        .instrument(info_span!("http", method = "GET", path)),
    )
    .await;
}

#[tokio::main]
async fn main() {
    let config = LayerConfig {
        enable_stdout: false,
        span_groups: true,
        ..LayerConfig::from_env()
    };
    let task = match init_tracing_with_config(Arc::new(JsonLinesSink), config) {
        Ok(task) => task,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let process = LogContext::new().propagate([Attr::new("service", "demo")]);
    process
        .scope(async {
            info!("starting");
            handle_request(1, "/users").await;
            handle_request(2, "/orders").await;
        })
        .await;

    if let Err(e) = task.shutdown().await {
        eprintln!("log sink task failed: {e}");
    }
}
