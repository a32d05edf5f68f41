//! On-demand collection run for a single entity type, outside the cron
//! schedule — for backfills, re-running a failed sweep, or collecting one
//! firm/company by id during development.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::info;

use pe_core::config::Settings;
use pe_core::error::AppResult;
use pe_core::model::{CollectionConfig, CollectionMode, EntityType, Source};

use pe_collector::wiring;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EntityArg {
    Firm,
    Company,
}

impl From<EntityArg> for EntityType {
    fn from(arg: EntityArg) -> Self {
        match arg {
            EntityArg::Firm => EntityType::Firm,
            EntityArg::Company => EntityType::Company,
        }
    }
}

/// Run collection for one entity type against every source registered for
/// it, optionally narrowed to a single entity id.
#[derive(Parser, Debug)]
#[command(name = "pe-collect", version)]
struct Cli {
    #[arg(value_enum)]
    entity_type: EntityArg,

    /// Collect just this firm or company id instead of every active one.
    #[arg(long)]
    id: Option<i32>,

    /// Skip the age check and re-collect even recently-refreshed entities.
    #[arg(long)]
    full: bool,
}

fn sources_for(entity_type: EntityType) -> Vec<Source> {
    match entity_type {
        EntityType::Firm => vec![
            Source::SecAdv,
            Source::SecFormD,
            Source::Sec13d,
            Source::FirmWebsite,
            Source::BioExtractor,
            Source::PressRelease,
            Source::NewsApi,
        ],
        EntityType::Company => vec![Source::PublicComps, Source::ValuationEstimator],
        EntityType::Fund | EntityType::Person | EntityType::Deal => Vec::new(),
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let runtime = wiring::build(&settings).await?;

    let entity_type: EntityType = cli.entity_type.into();
    let config = CollectionConfig {
        entity_type,
        sources: sources_for(entity_type),
        mode: if cli.full { CollectionMode::Full } else { CollectionMode::Incremental },
        max_age_days: 30,
        max_concurrent: settings.max_concurrency as usize,
        rate_limit_delay: Duration::from_secs_f64(1.0 / settings.max_requests_per_second),
        max_retries: settings.max_retries,
        firm_id: if matches!(entity_type, EntityType::Firm) { cli.id } else { None },
        firm_ids: None,
        company_id: if matches!(entity_type, EntityType::Company) { cli.id } else { None },
        company_ids: None,
        person_id: None,
        person_ids: None,
        firm_types: None,
        sectors: None,
    };

    info!(?entity_type, id = ?cli.id, "starting on-demand collection run");
    let (results, _progress) = runtime.orchestrator.run(&config).await?;

    info!(
        runs = results.len(),
        successful = results.iter().filter(|r| r.success).count(),
        failed = results.iter().filter(|r| !r.success).count(),
        "collection run complete"
    );

    let stats = runtime.persister.persist_results(&results).await?;
    info!(
        persisted = stats.persisted,
        updated = stats.updated,
        skipped = stats.skipped,
        failed = stats.failed,
        "persisted run results"
    );

    for error in &stats.errors {
        tracing::warn!(%error, "item persistence failure");
    }

    Ok(())
}
