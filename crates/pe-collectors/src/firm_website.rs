//! Firm website collector (§4.4), grounded in
//! `original_source/.../firm_collectors/firm_website_collector.py`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use scraper::{Html, Selector};
use url::Url;

use pe_core::model::{
    Confidence, EntityType, FirmUpdatePayload, Item, ItemEnvelope, PortfolioCompanyPayload, Source,
    TeamMemberPayload,
};
use pe_http::HttpSubstrate;

use crate::registry::Collector;
use crate::CollectArgs;

const PORTFOLIO_PATTERNS: &[&str] = &[
    "/portfolio",
    "/companies",
    "/investments",
    "/our-portfolio",
    "/portfolio-companies",
];

const TEAM_PATTERNS: &[&str] = &["/team", "/people", "/leadership", "/our-team", "/about/team", "/professionals"];

const MAX_PORTFOLIO_COMPANIES: usize = 50;
const MAX_TEAM_MEMBERS: usize = 100;

pub struct FirmWebsiteCollector {
    http: Arc<HttpSubstrate>,
}

impl FirmWebsiteCollector {
    pub fn new(http: Arc<HttpSubstrate>) -> Self {
        Self { http }
    }

    fn find_section_url(&self, html: &Html, base_url: &str, patterns: &[&str]) -> Option<String> {
        let link_selector = Selector::parse("a[href]").ok()?;
        for pattern in patterns {
            for link in html.select(&link_selector) {
                if let Some(href) = link.value().attr("href") {
                    if href.to_lowercase().contains(pattern) {
                        return resolve_url(base_url, href);
                    }
                }
            }
        }
        None
    }

    fn extract_main_page_data(&self, html: &Html, entity_id: i32, entity_name: String) -> FirmUpdatePayload {
        let title_selector = Selector::parse("title").unwrap();
        let meta_selector = Selector::parse(r#"meta[name="description"]"#).unwrap();
        let link_selector = Selector::parse("a[href]").unwrap();

        let mut linkedin_url = None;
        let mut twitter_url = None;
        let mut contact_email = None;

        for link in html.select(&link_selector) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let href_lower = href.to_lowercase();
            if linkedin_url.is_none() && href_lower.contains("linkedin.com/company/") {
                linkedin_url = Some(href.to_string());
            } else if twitter_url.is_none()
                && (href_lower.contains("twitter.com/") || href_lower.contains("x.com/"))
            {
                twitter_url = Some(href.to_string());
            } else if contact_email.is_none() && href_lower.starts_with("mailto:") {
                contact_email = href.strip_prefix("mailto:").map(str::to_string);
            }
        }

        let _page_title = html
            .select(&title_selector)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string());
        let _meta_description = html
            .select(&meta_selector)
            .next()
            .and_then(|m| m.value().attr("content"))
            .map(str::to_string);

        FirmUpdatePayload {
            entity_id,
            entity_name,
            headquarters_city: None,
            headquarters_state: None,
            headquarters_country: None,
            cik: None,
            linkedin_url,
            twitter_url,
            contact_email,
            is_sec_registered: None,
            source_label: "firm_website".to_string(),
        }
    }

    async fn scrape_portfolio_page(&self, url: &str, entity_id: i32, entity_name: &str) -> Vec<PortfolioCompanyPayload> {
        let Ok(bytes) = self.http.get_bytes(url).await else {
            return Vec::new();
        };
        let html = Html::parse_document(&String::from_utf8_lossy(&bytes));
        let link_selector = Selector::parse("a[href]").unwrap();

        let mut seen = std::collections::HashSet::new();
        let mut companies = Vec::new();

        for link in html.select(&link_selector) {
            if companies.len() >= MAX_PORTFOLIO_COMPANIES {
                break;
            }
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if !href.starts_with("http") {
                continue;
            }
            let name = link.text().collect::<String>().trim().to_string();
            if name.is_empty() || seen.contains(&name) {
                continue;
            }
            seen.insert(name.clone());
            companies.push(PortfolioCompanyPayload {
                entity_id,
                entity_name: entity_name.to_string(),
                name,
                website: Some(href.to_string()),
                description: None,
                ownership_status: None,
                industry: None,
            });
        }

        companies
    }

    async fn scrape_team_page(&self, url: &str) -> Vec<TeamMemberPayload> {
        let Ok(bytes) = self.http.get_bytes(url).await else {
            return Vec::new();
        };
        let html = Html::parse_document(&String::from_utf8_lossy(&bytes));
        let heading_selector = Selector::parse("h2, h3, h4, h5").unwrap();

        let mut seen = std::collections::HashSet::new();
        let mut people = Vec::new();

        for heading in html.select(&heading_selector) {
            if people.len() >= MAX_TEAM_MEMBERS {
                break;
            }
            let name = heading.text().collect::<String>().trim().to_string();
            if !looks_like_name(&name) || seen.contains(&name) {
                continue;
            }
            seen.insert(name.clone());
            people.push(TeamMemberPayload {
                entity_id: 0,
                full_name: name,
                title: None,
            });
        }

        people
    }
}

#[async_trait]
impl Collector for FirmWebsiteCollector {
    fn source_type(&self) -> Source {
        Source::FirmWebsite
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Firm
    }

    async fn collect(&self, args: &CollectArgs) -> pe_core::model::CollectionResult {
        let started_at = Utc::now();

        let Some(raw_url) = args.website_url.as_deref() else {
            return pe_core::model::CollectionResult::failed(
                args.entity_id,
                args.entity_name.clone(),
                EntityType::Firm,
                Source::FirmWebsite,
                started_at,
                "no website URL provided".to_string(),
            );
        };

        let website_url = normalize_url(raw_url);

        let main_bytes = match self.http.get_bytes(&website_url).await {
            Ok(b) => b,
            Err(e) => {
                return pe_core::model::CollectionResult::failed(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Firm,
                    Source::FirmWebsite,
                    started_at,
                    format!("failed to fetch website {website_url}: {e}"),
                )
            }
        };
        let main_html = Html::parse_document(&String::from_utf8_lossy(&main_bytes));

        let mut items = Vec::new();

        items.push(Item::FirmUpdate(ItemEnvelope::new(
            self.extract_main_page_data(&main_html, args.entity_id, args.entity_name.clone()),
            Some(website_url.clone()),
            Confidence::Medium,
            false,
        )));

        if let Some(portfolio_url) = self.find_section_url(&main_html, &website_url, PORTFOLIO_PATTERNS) {
            for company in self
                .scrape_portfolio_page(&portfolio_url, args.entity_id, &args.entity_name)
                .await
            {
                items.push(Item::PortfolioCompany(ItemEnvelope::new(
                    company,
                    Some(portfolio_url.clone()),
                    Confidence::Medium,
                    false,
                )));
            }
        }

        if let Some(team_url) = self.find_section_url(&main_html, &website_url, TEAM_PATTERNS) {
            for mut person in self.scrape_team_page(&team_url).await {
                person.entity_id = args.entity_id;
                items.push(Item::TeamMember(ItemEnvelope::new(
                    person,
                    Some(team_url.clone()),
                    Confidence::Medium,
                    false,
                )));
            }
        }

        pe_core::model::CollectionResult {
            items,
            completed_at: Utc::now(),
            ..pe_core::model::CollectionResult::empty(
                args.entity_id,
                args.entity_name.clone(),
                EntityType::Firm,
                Source::FirmWebsite,
                started_at,
            )
        }
    }
}

fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

fn resolve_url(base: &str, href: &str) -> Option<String> {
    let base_url = Url::parse(base).ok()?;
    base_url.join(href).ok().map(|u| u.to_string())
}

/// 2-4 capitalized words, both the first and last starting uppercase, under
/// 60 characters, and none of the common non-name marketing words (§4.4).
fn looks_like_name(text: &str) -> bool {
    if text.is_empty() || text.len() > 60 || text.len() < 3 {
        return false;
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 2 || words.len() > 5 {
        return false;
    }
    let first_upper = words.first().and_then(|w| w.chars().next()).map(|c| c.is_uppercase()).unwrap_or(false);
    let last_upper = words.last().and_then(|w| w.chars().next()).map(|c| c.is_uppercase()).unwrap_or(false);
    if !first_upper || !last_upper {
        return false;
    }
    let lower = text.to_lowercase();
    const NON_NAME: &[&str] = &["about", "team", "our", "the", "view", "read", "more", "contact", "learn"];
    !NON_NAME.iter().any(|w| lower.contains(w))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_domain() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn rejects_marketing_phrases_as_names() {
        assert!(!looks_like_name("About Our Team"));
        assert!(!looks_like_name("Read More"));
    }

    #[test]
    fn accepts_plausible_person_name() {
        assert!(looks_like_name("Jane Doe"));
        assert!(looks_like_name("Jane A. Doe"));
    }
}
