//! FK-resolution caches, warmed once per persist run and updated as new
//! rows are created (§4.9).

use std::collections::HashMap;

use diesel_async::AsyncPgConnection;

use pe_core::error::AppResult;
use pe_core::models::company::PePortfolioCompany;
use pe_core::models::firm::{PeFirm, PeFund};
use pe_core::models::person::PePerson;

/// `firm_name_lower -> firm_id`, `company_name_lower -> company_id`,
/// `person_key -> person_id` (`linkedin_url` when present, else
/// `full_name_lower`), and `firm_id -> synthetic 13F/13D holdings fund_id`.
#[derive(Debug, Default)]
pub struct FkCaches {
    pub firms: HashMap<String, i32>,
    pub companies: HashMap<String, i32>,
    pub people: HashMap<String, i32>,
    pub holdings_funds: HashMap<i32, i32>,
}

impl FkCaches {
    pub async fn warm(conn: &mut AsyncPgConnection) -> AppResult<Self> {
        let mut firms = HashMap::new();
        for (id, name) in PeFirm::list_id_name(conn).await? {
            firms.insert(name.to_lowercase(), id);
        }

        let mut companies = HashMap::new();
        for (id, name) in PePortfolioCompany::list_id_name(conn).await? {
            companies.insert(name.to_lowercase(), id);
        }

        let mut people = HashMap::new();
        for (id, full_name, linkedin_url) in PePerson::list_id_name_linkedin(conn).await? {
            let key = linkedin_url.unwrap_or_else(|| full_name.to_lowercase());
            people.insert(key, id);
        }

        let mut holdings_funds = HashMap::new();
        for (firm_id, fund_id) in PeFund::list_holdings_funds(conn).await? {
            holdings_funds.insert(firm_id, fund_id);
        }

        Ok(Self {
            firms,
            companies,
            people,
            holdings_funds,
        })
    }

    /// Dropped on a failed item, matching the original exactly: the firm
    /// cache is never cleared, only company/person/fund.
    pub fn clear_non_firm(&mut self) {
        self.companies.clear();
        self.people.clear();
        self.holdings_funds.clear();
    }

    pub fn person_key(full_name: &str, linkedin_url: Option<&str>) -> String {
        linkedin_url
            .map(str::to_string)
            .unwrap_or_else(|| full_name.to_lowercase())
    }
}
