//! docflow-server - standalone REST server for the workflow engine.
//!
//! Configuration: see [`docflow_server::config`]. State is in memory; the
//! directory, documents and template seeds come from config.

use std::sync::Arc;

use anyhow::{Context, Result};
use docflow_core::compliance::sweep::ComplianceSweep;
use docflow_core::ports::{LogNotifier, MemoryDocumentStore, StaticDirectory};
use docflow_core::store_memory::MemoryStore;
use docflow_core::template::load_template_dir;
use docflow_core::WorkflowEngine;
use docflow_server::config::ServerConfig;
use docflow_server::router::build_router;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,docflow_core=debug,docflow_server=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = ServerConfig::load()?;

    let documents = Arc::new(MemoryDocumentStore::new());
    for doc in &config.documents {
        documents.insert(doc.clone())?;
    }
    let engine = Arc::new(WorkflowEngine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(StaticDirectory::new(config.directory.departments.clone())),
        documents,
        Arc::new(LogNotifier),
    ));
    tracing::info!(
        departments = config.directory.departments.len(),
        documents = config.documents.len(),
        "engine ready"
    );

    if let Some(dir) = &config.templates_dir {
        for draft in load_template_dir(dir)? {
            let saved = engine
                .save_template(&draft)
                .await
                .with_context(|| format!("seeding template '{}'", draft.name))?;
            for w in &saved.warnings {
                tracing::warn!(template = %draft.name, "{w}");
            }
        }
        tracing::info!(dir = %dir.display(), "templates seeded");
    }

    let sweep = config.compliance.enabled.then(|| {
        ComplianceSweep::new(
            engine.compliance(),
            config.compliance.interval(),
            config.compliance.auto_enforce,
        )
        .spawn()
    });

    let app = build_router(engine);
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;
    tracing::info!("docflow-server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(sweep) = sweep {
        sweep.stop().await;
    }
    tracing::info!("docflow-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
