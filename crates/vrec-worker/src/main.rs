//! Recognition worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vrec_db::{DbConfig, PgJobRepository};
use vrec_media::VideoFrameSource;
use vrec_ocr::TesseractEngine;
use vrec_recognition::Recognizer;
use vrec_storage::StorageRouter;
use vrec_worker::{metrics, JobProcessor, JobScheduler, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vrec=info".parse().unwrap())
        .add_directive("sqlx=warn".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vrec-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        match metrics::init_metrics(port) {
            Ok(()) => info!(port, "Prometheus exporter listening"),
            Err(e) => error!("Failed to start metrics exporter: {}", e),
        }
    }

    let scheduler = match build_scheduler(config).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to start worker: {:#}", e);
            std::process::exit(1);
        }
    };

    let signal_scheduler = Arc::clone(&scheduler);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_scheduler.shutdown();
    });

    if let Err(e) = scheduler.run().await {
        error!("Scheduler error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

async fn build_scheduler(config: WorkerConfig) -> anyhow::Result<JobScheduler> {
    let db_config = DbConfig::from_env()?;
    let repo = PgJobRepository::connect(&db_config)
        .await
        .context("connecting to job store")?;
    repo.migrate().await.context("running migrations")?;

    let store = StorageRouter::from_env().context("configuring video storage")?;
    let source = VideoFrameSource::new().context("locating ffmpeg")?;
    let ocr = TesseractEngine::from_env().context("locating tesseract")?;
    let recognizer = Recognizer::new(source, Arc::new(ocr))
        .with_default_concurrency(config.recognition_concurrency);

    let repo = Arc::new(repo);
    let processor = JobProcessor::new(repo.clone(), Arc::new(store), Arc::new(recognizer), &config);
    Ok(JobScheduler::new(config, repo, Arc::new(processor)))
}
