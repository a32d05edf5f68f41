//! Scheduler daemon: runs a full collection sweep across firms and
//! portfolio companies on the cron schedule in [`Settings::scheduler_cron`],
//! persisting whatever each sweep collects before the next one fires.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use pe_core::config::Settings;
use pe_core::error::AppResult;
use pe_core::model::{CollectionConfig, CollectionMode, EntityType, Source};

use pe_collector::wiring::{self, Runtime};

const FIRM_SOURCES: &[Source] = &[
    Source::SecAdv,
    Source::SecFormD,
    Source::Sec13d,
    Source::FirmWebsite,
    Source::BioExtractor,
    Source::PressRelease,
    Source::NewsApi,
];

const COMPANY_SOURCES: &[Source] = &[Source::PublicComps, Source::ValuationEstimator];

fn sweep_config(settings: &Settings, entity_type: EntityType, sources: &[Source]) -> CollectionConfig {
    CollectionConfig {
        entity_type,
        sources: sources.to_vec(),
        mode: CollectionMode::Incremental,
        max_age_days: 30,
        max_concurrent: settings.max_concurrency as usize,
        rate_limit_delay: Duration::from_secs_f64(1.0 / settings.max_requests_per_second),
        max_retries: settings.max_retries,
        firm_id: None,
        firm_ids: None,
        company_id: None,
        company_ids: None,
        person_id: None,
        person_ids: None,
        firm_types: None,
        sectors: None,
    }
}

async fn run_sweep(runtime: &Runtime, config: &CollectionConfig) {
    let (results, _progress) = match runtime.orchestrator.run(config).await {
        Ok(run) => run,
        Err(err) => {
            err.log_with_context("orchestrator sweep");
            return;
        }
    };

    info!(
        entity_type = ?config.entity_type,
        runs = results.len(),
        successful = results.iter().filter(|r| r.success).count(),
        "collection sweep complete"
    );

    match runtime.persister.persist_results(&results).await {
        Ok(stats) => info!(
            persisted = stats.persisted,
            updated = stats.updated,
            skipped = stats.skipped,
            failed = stats.failed,
            "persisted sweep results"
        ),
        Err(err) => err.log_with_context("persisting sweep results"),
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    info!(
        "starting PE alternative-data collector v{}",
        env!("CARGO_PKG_VERSION")
    );

    let settings = Settings::from_env().map_err(|e| {
        e.log_with_context("loading configuration at startup");
        e
    })?;

    let runtime = Arc::new(wiring::build(&settings).await.map_err(|e| {
        e.log_with_context("building runtime at startup");
        e
    })?);

    info!(cron = %settings.scheduler_cron, "scheduling collection sweeps");

    let mut scheduler = JobScheduler::new().await.map_err(|e| {
        pe_core::error::AppError::config(format!("failed to start job scheduler: {e}"))
    })?;

    let job_settings = settings.clone();
    let job_runtime = Arc::clone(&runtime);
    let job = Job::new_async(settings.scheduler_cron.as_str(), move |_uuid, _lock| {
        let settings = job_settings.clone();
        let runtime = Arc::clone(&job_runtime);
        Box::pin(async move {
            info!("cron fired, starting collection sweep");
            run_sweep(&runtime, &sweep_config(&settings, EntityType::Firm, FIRM_SOURCES)).await;
            run_sweep(&runtime, &sweep_config(&settings, EntityType::Company, COMPANY_SOURCES)).await;
        })
    })
    .map_err(|e| pe_core::error::AppError::config(format!("invalid scheduler_cron: {e}")))?;

    scheduler
        .add(job)
        .await
        .map_err(|e| pe_core::error::AppError::config(format!("failed to register cron job: {e}")))?;

    scheduler
        .start()
        .await
        .map_err(|e| pe_core::error::AppError::config(format!("failed to start job scheduler: {e}")))?;

    info!("scheduler running, waiting for shutdown signal");
    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal, stopping scheduler");

    if let Err(e) = scheduler.shutdown().await {
        error!("error shutting down scheduler: {e}");
    }

    Ok(())
}
