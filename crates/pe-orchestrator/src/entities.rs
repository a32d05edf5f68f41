//! Resolves the entities a `CollectionConfig` fans out over (§4.8 step 1).

use diesel_async::AsyncPgConnection;

use pe_core::error::AppResult;
use pe_core::model::{CollectionConfig, EntityType};
use pe_core::models::company::PePortfolioCompany;
use pe_core::models::firm::PeFirm;

/// Just the fields a [`crate::CollectArgs`] needs from an entity row,
/// independent of whether it backs a firm or a portfolio company.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: i32,
    pub name: String,
    pub website_url: Option<String>,
    pub cik: Option<String>,
    pub ticker: Option<String>,
    pub crd_number: Option<String>,
}

impl From<PeFirm> for Entity {
    fn from(firm: PeFirm) -> Self {
        Self {
            id: firm.id,
            name: firm.name,
            website_url: firm.website,
            cik: firm.cik,
            ticker: None,
            crd_number: firm.crd_number,
        }
    }
}

impl From<PePortfolioCompany> for Entity {
    fn from(company: PePortfolioCompany) -> Self {
        Self {
            id: company.id,
            name: company.name,
            website_url: company.website,
            cik: None,
            ticker: company.ticker,
            crd_number: None,
        }
    }
}

/// Explicit ids in `config` take precedence over the active-entity scan; no
/// registered collector targets `Fund`, `Person`, or `Deal` entities today,
/// so those resolve to an empty list rather than querying tables the
/// orchestrator has no fan-out use for yet.
pub async fn load_entities(conn: &mut AsyncPgConnection, config: &CollectionConfig) -> AppResult<Vec<Entity>> {
    match config.entity_type {
        EntityType::Firm => {
            if let Some(ids) = &config.firm_ids {
                return Ok(PeFirm::find_by_ids(conn, ids).await?.into_iter().map(Entity::from).collect());
            }
            if let Some(id) = config.firm_id {
                return Ok(PeFirm::find_by_ids(conn, &[id]).await?.into_iter().map(Entity::from).collect());
            }
            Ok(PeFirm::find_active(conn, config.firm_types.as_deref())
                .await?
                .into_iter()
                .map(Entity::from)
                .collect())
        }
        EntityType::Company => {
            if let Some(ids) = &config.company_ids {
                return Ok(PePortfolioCompany::find_by_ids(conn, ids).await?.into_iter().map(Entity::from).collect());
            }
            if let Some(id) = config.company_id {
                return Ok(PePortfolioCompany::find_by_ids(conn, &[id]).await?.into_iter().map(Entity::from).collect());
            }
            Ok(PePortfolioCompany::find_active_by_sector(conn, config.sectors.as_deref())
                .await?
                .into_iter()
                .map(Entity::from)
                .collect())
        }
        EntityType::Fund | EntityType::Person | EntityType::Deal => Ok(Vec::new()),
    }
}
