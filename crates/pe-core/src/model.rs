//! Cross-cutting runtime types shared by `pe-collectors`, `pe-orchestrator`,
//! and `pe-persister` (§3.1, §3.2): the enumerations that govern collector
//! registration and confidence-based merging, plus the `Item` algebra that
//! flows from a collector's `collect()` call through to the persister.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One value per registered collector (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    SecAdv,
    SecFormD,
    Sec13d,
    FirmWebsite,
    BioExtractor,
    PublicComps,
    PressRelease,
    NewsApi,
    ValuationEstimator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Firm,
    Fund,
    Company,
    Person,
    Deal,
}

/// Ordered by declaration: `Low < LlmExtracted < Medium < High`. Governs
/// whether a new value may overwrite a non-null existing field (§3.1,
/// §4.9's `_null_preserving_update` port).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    LlmExtracted,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::LlmExtracted => "llm_extracted",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Confidence> {
        match s {
            "low" => Some(Confidence::Low),
            "llm_extracted" => Some(Confidence::LlmExtracted),
            "medium" => Some(Confidence::Medium),
            "high" => Some(Confidence::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionMode {
    Incremental,
    Full,
}

/// Which entities the orchestrator fans out over, and how (§3.2, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub entity_type: EntityType,
    pub sources: Vec<Source>,
    pub mode: CollectionMode,
    pub max_age_days: i64,
    pub max_concurrent: usize,
    pub rate_limit_delay: std::time::Duration,
    pub max_retries: u32,

    pub firm_id: Option<i32>,
    pub firm_ids: Option<Vec<i32>>,
    pub company_id: Option<i32>,
    pub company_ids: Option<Vec<i32>>,
    pub person_id: Option<i32>,
    pub person_ids: Option<Vec<i32>>,
    pub firm_types: Option<Vec<String>>,
    pub sectors: Option<Vec<String>>,
}

/// The outcome of one collector run against one entity (§3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionResult {
    pub entity_id: i32,
    pub entity_name: String,
    pub entity_type: EntityType,
    pub source: Source,
    pub success: bool,
    pub error_message: Option<String>,
    pub warnings: Vec<String>,
    pub items: Vec<Item>,
    pub requests_made: u32,
    pub bytes_downloaded: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl CollectionResult {
    pub fn empty(
        entity_id: i32,
        entity_name: String,
        entity_type: EntityType,
        source: Source,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id,
            entity_name,
            entity_type,
            source,
            success: true,
            error_message: None,
            warnings: Vec::new(),
            items: Vec::new(),
            requests_made: 0,
            bytes_downloaded: 0,
            started_at,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(
        entity_id: i32,
        entity_name: String,
        entity_type: EntityType,
        source: Source,
        started_at: DateTime<Utc>,
        error_message: String,
    ) -> Self {
        Self {
            success: false,
            error_message: Some(error_message),
            ..Self::empty(entity_id, entity_name, entity_type, source, started_at)
        }
    }
}

/// Fields every item carries regardless of its payload (§3.2, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemEnvelope<T> {
    pub source_url: Option<String>,
    pub confidence: Confidence,
    pub is_new: bool,
    pub payload: T,
}

impl<T> ItemEnvelope<T> {
    pub fn new(payload: T, source_url: Option<String>, confidence: Confidence, is_new: bool) -> Self {
        Self {
            source_url,
            confidence,
            is_new,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmUpdatePayload {
    pub entity_id: i32,
    pub entity_name: String,
    pub headquarters_city: Option<String>,
    pub headquarters_state: Option<String>,
    pub headquarters_country: Option<String>,
    pub cik: Option<String>,
    pub linkedin_url: Option<String>,
    pub twitter_url: Option<String>,
    pub contact_email: Option<String>,
    pub is_sec_registered: Option<bool>,
    pub source_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormAdvFilingPayload {
    pub entity_id: i32,
    pub form_type: String,
    pub filing_date: Option<NaiveDate>,
    pub document_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioCompanyPayload {
    pub entity_id: i32,
    pub entity_name: String,
    pub name: String,
    pub website: Option<String>,
    pub description: Option<String>,
    pub ownership_status: Option<String>,
    pub industry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemberPayload {
    pub entity_id: i32,
    pub full_name: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationEntry {
    pub institution: String,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub graduation_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub company: String,
    pub title: String,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonPayload {
    pub entity_id: i32,
    pub entity_name: String,
    pub full_name: String,
    pub linkedin_url: Option<String>,
    pub current_title: Option<String>,
    pub current_company: Option<String>,
    pub bio: Option<String>,
    pub firm_id: Option<i32>,
    pub education: Vec<EducationEntry>,
    pub experience: Vec<ExperienceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedPersonPayload {
    pub entity_id: i32,
    pub full_name: String,
    pub relationship: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyUpdatePayload {
    pub entity_id: i32,
    pub company_id: Option<i32>,
    pub industry: Option<String>,
    pub sector: Option<String>,
    pub description: Option<String>,
    pub employee_count: Option<i32>,
    pub headquarters_city: Option<String>,
    pub headquarters_state: Option<String>,
    pub headquarters_country: Option<String>,
    pub website: Option<String>,
    pub ticker: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThirteenFHoldingPayload {
    pub entity_id: i32,
    pub firm_id: Option<i32>,
    pub firm_name: String,
    pub issuer_name: Option<String>,
    pub security_class: Option<String>,
    pub cusip: Option<String>,
    pub shares: Option<i64>,
    pub invested_amount_usd: Option<bigdecimal::BigDecimal>,
    pub put_call: Option<String>,
    pub investment_discretion: Option<String>,
    pub report_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThirteenDStakePayload {
    pub entity_id: i32,
    pub firm_id: Option<i32>,
    pub firm_name: String,
    pub issuer_name: Option<String>,
    pub report_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormDFilingPayload {
    pub entity_id: i32,
    pub entity_name: String,
    pub issuer_name: Option<String>,
    pub exemption: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealFrom8kPayload {
    pub entity_id: i32,
    pub entity_name: String,
    pub company_name: Option<String>,
    pub title: Option<String>,
    pub firm_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealPressReleasePayload {
    pub entity_id: i32,
    pub entity_name: String,
    pub firm_name: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealCoInvestor {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealPayload {
    pub entity_id: i32,
    pub entity_name: String,
    pub deal_type: Option<String>,
    pub target_company: Option<String>,
    pub enterprise_value_usd: Option<bigdecimal::BigDecimal>,
    pub announced_date: Option<NaiveDate>,
    pub closed_date: Option<NaiveDate>,
    pub seller: Option<String>,
    pub co_investors: Vec<DealCoInvestor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirmNewsPayload {
    pub entity_id: i32,
    pub title: String,
    pub source_name: Option<String>,
    pub summary: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub news_type: Option<String>,
    pub sentiment: Option<String>,
    pub relevance_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyFinancialPayload {
    pub entity_id: i32,
    pub company_id: i32,
    pub revenue: Option<bigdecimal::BigDecimal>,
    pub ebitda: Option<bigdecimal::BigDecimal>,
    pub gross_profit: Option<bigdecimal::BigDecimal>,
    pub operating_income: Option<bigdecimal::BigDecimal>,
    pub net_income: Option<bigdecimal::BigDecimal>,
    pub total_assets: Option<bigdecimal::BigDecimal>,
    pub total_debt: Option<bigdecimal::BigDecimal>,
    pub total_cash: Option<bigdecimal::BigDecimal>,
    pub total_stockholder_equity: Option<bigdecimal::BigDecimal>,
    pub free_cash_flow: Option<bigdecimal::BigDecimal>,
    pub operating_cash_flow: Option<bigdecimal::BigDecimal>,
    pub gross_margin: Option<bigdecimal::BigDecimal>,
    pub operating_margin: Option<bigdecimal::BigDecimal>,
    pub revenue_growth: Option<bigdecimal::BigDecimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyValuationPayload {
    pub entity_id: i32,
    pub company_id: i32,
    pub valuation_date: NaiveDate,
    pub enterprise_value: Option<bigdecimal::BigDecimal>,
    pub estimated_enterprise_value_usd: Option<bigdecimal::BigDecimal>,
    pub market_cap: Option<bigdecimal::BigDecimal>,
    pub estimated_equity_value_usd: Option<bigdecimal::BigDecimal>,
    pub ev_to_revenue: Option<bigdecimal::BigDecimal>,
    pub ev_to_revenue_multiple: Option<bigdecimal::BigDecimal>,
    pub ev_to_ebitda: Option<bigdecimal::BigDecimal>,
    pub ev_to_ebitda_multiple: Option<bigdecimal::BigDecimal>,
    pub trailing_pe: Option<bigdecimal::BigDecimal>,
    pub valuation_method: Option<String>,
}

/// One constructor per `item_type` (§9 Design Notes, §4.7). Carrying the
/// envelope fields inside each payload (rather than a generic wrapper type)
/// lets the persister's `match` bind fields directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Item {
    FirmUpdate(ItemEnvelope<FirmUpdatePayload>),
    FormAdvFiling(ItemEnvelope<FormAdvFilingPayload>),
    PortfolioCompany(ItemEnvelope<PortfolioCompanyPayload>),
    TeamMember(ItemEnvelope<TeamMemberPayload>),
    Person(ItemEnvelope<PersonPayload>),
    RelatedPerson(ItemEnvelope<RelatedPersonPayload>),
    CompanyUpdate(ItemEnvelope<CompanyUpdatePayload>),
    ThirteenFHolding(ItemEnvelope<ThirteenFHoldingPayload>),
    ThirteenDStake(ItemEnvelope<ThirteenDStakePayload>),
    FormDFiling(ItemEnvelope<FormDFilingPayload>),
    DealFrom8k(ItemEnvelope<DealFrom8kPayload>),
    DealPressRelease(ItemEnvelope<DealPressReleasePayload>),
    Deal(ItemEnvelope<DealPayload>),
    FirmNews(ItemEnvelope<FirmNewsPayload>),
    CompanyFinancial(ItemEnvelope<CompanyFinancialPayload>),
    CompanyValuation(ItemEnvelope<CompanyValuationPayload>),
}

impl Item {
    /// `true` for the seven Phase 1 (entity) item types (§4.9).
    pub fn is_phase_one(&self) -> bool {
        matches!(
            self,
            Item::FirmUpdate(_)
                | Item::FormAdvFiling(_)
                | Item::PortfolioCompany(_)
                | Item::TeamMember(_)
                | Item::Person(_)
                | Item::RelatedPerson(_)
                | Item::CompanyUpdate(_)
        )
    }
}
