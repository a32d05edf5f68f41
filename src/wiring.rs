//! Builds the shared runtime — database pool, HTTP substrate, collector
//! registry, orchestrator, and persister — from a validated [`Settings`].
//! Both the scheduler daemon and the on-demand CLI assemble the same
//! wiring, so this is the one place that construction logic lives.

use std::sync::Arc;

use pe_core::config::Settings;
use pe_core::database::{create_pool, run_migrations, DatabasePool};
use pe_core::error::AppResult;

use pe_collectors::financial::{PublicCompsCollector, ValuationEstimatorCollector};
use pe_collectors::llm::{InMemoryCostObserver, LlmClient};
use pe_collectors::sec::{Sec13fCollector, SecAdvCollector, SecFormDCollector};
use pe_collectors::{
    BioExtractorCollector, CollectorRegistry, FirmWebsiteCollector, NewsCollector, OpenAiClient,
    PressReleaseCollector,
};
use pe_http::HttpSubstrate;
use pe_orchestrator::Orchestrator;
use pe_persister::Persister;

pub struct Runtime {
    pub db: Arc<DatabasePool>,
    pub orchestrator: Orchestrator,
    pub persister: Persister,
    /// Per-`Source` token totals accumulated by the LLM client this run
    /// wired up, if one was configured.
    pub llm_cost_observer: Option<Arc<InMemoryCostObserver>>,
}

/// Opens the pool, runs pending migrations, builds the HTTP substrate and
/// every collector the current configuration has credentials for, and
/// wires an [`Orchestrator`] and [`Persister`] on top.
pub async fn build(settings: &Settings) -> AppResult<Runtime> {
    let pool = create_pool(&settings.database_url).await?;
    run_migrations(&settings.database_url).await?;
    let db = Arc::new(pool);

    let http = Arc::new(
        HttpSubstrate::new(
            &settings.pe_user_agent,
            &settings.pe_sec_user_agent,
            settings.max_requests_per_second,
            settings.max_retries,
            settings.retry_backoff_factor,
        )?,
    );

    let llm_cost_observer = Arc::new(InMemoryCostObserver::new());
    let llm: Option<Arc<dyn LlmClient>> = match settings.api_key_for("openai") {
        Some(key) => {
            let client = OpenAiClient::with_cost_observer(
                key.to_string(),
                "gpt-4o-mini".to_string(),
                Arc::clone(&llm_cost_observer) as Arc<dyn pe_collectors::llm::CostObserver>,
            )?;
            Some(Arc::new(client) as Arc<dyn LlmClient>)
        }
        None => None,
    };

    let mut builder = CollectorRegistry::builder()
        .register(Arc::new(SecAdvCollector::new(Arc::clone(&http))))?
        .register(Arc::new(SecFormDCollector::new(Arc::clone(&http))))?
        .register(Arc::new(Sec13fCollector::new(Arc::clone(&http))))?
        .register(Arc::new(FirmWebsiteCollector::new(Arc::clone(&http))))?
        .register(Arc::new(PublicCompsCollector::new(Arc::clone(&http))))?
        .register(Arc::new(NewsCollector::new(Arc::clone(&http), llm.clone())))?
        .register(Arc::new(PressReleaseCollector::new(Arc::clone(&http), llm.clone())))?;

    if let Some(llm) = &llm {
        builder = builder
            .register(Arc::new(BioExtractorCollector::new(Arc::clone(&http), Arc::clone(llm))))?
            .register(Arc::new(ValuationEstimatorCollector::new(Arc::clone(&db), Arc::clone(llm))))?;
    } else {
        tracing::warn!(
            "no OPENAI_API_KEY configured; bio extraction and valuation estimation are disabled"
        );
    }

    let registry = Arc::new(builder.build());
    let orchestrator = Orchestrator::new(Arc::clone(&db), registry);
    let persister = Persister::new(Arc::clone(&db));

    let llm_cost_observer = llm.as_ref().map(|_| llm_cost_observer);

    Ok(Runtime {
        db,
        orchestrator,
        persister,
        llm_cost_observer,
    })
}
