mod api;
mod config;
mod error;
mod insights;
mod ml;
mod normalize;
mod service;
mod store;
mod summarize;
mod table;

use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, StoreBackend};
use crate::ml::SentimentClassifier;
use crate::service::CommentService;
use crate::store::{github::GithubContents, memory::MemoryBlob, BlobApi, CommentStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    info!(?config, "configuration loaded");

    let classifier = SentimentClassifier::load(&config.vectorizer_path, &config.classifier_path)
        .context("failed to load sentiment model")?;

    let blob: Arc<dyn BlobApi> = match &config.store {
        StoreBackend::Github(settings) => Arc::new(
            GithubContents::new(settings, config.store_timeout).context("failed to build github client")?,
        ),
        StoreBackend::Memory => {
            info!("using in-memory comment store; submissions are lost on restart");
            Arc::new(MemoryBlob::empty_table()?)
        }
    };

    let service = CommentService::new(Arc::new(classifier), CommentStore::new(blob), config.summary_strategy);
    let app = api::router(Arc::new(api::AppState { service }));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
