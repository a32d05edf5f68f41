//! Press-release deal collector (§4.6), grounded in
//! `original_source/.../deal_collectors/press_release_collector.py`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use scraper::{Html, Selector};
use serde::Deserialize;

use pe_core::model::{
    Confidence, DealCoInvestor, DealFrom8kPayload, DealPayload, DealPressReleasePayload,
    EntityType, Item, ItemEnvelope, PortfolioCompanyPayload, Source,
};
use pe_http::HttpSubstrate;

use crate::llm::{parse_json_array_with_repair, LlmClient, LlmRequest};
use crate::registry::Collector;
use crate::CollectArgs;

const MAX_PR_TO_PROCESS: usize = 15;
const MAX_PER_SOURCE: usize = 15;

const DEAL_KEYWORDS: &[&str] = &[
    "acquisition", "acquire", "acquired", "investment", "invest", "portfolio company",
    "completes", "completed", "merger", "merge", "recapitalization", "buyout", "buy-out",
    "majority stake", "minority stake", "strategic partnership", "capital investment",
    "growth equity", "add-on", "bolt-on", "platform investment", "exit", "divest",
    "divestiture", "ipo", "public offering",
];

const DEAL_EXTRACTION_PROMPT: &str = r#"Extract deal information from this press release about {firm_name}. Return ONLY valid JSON:
{{
  "is_deal": true or false,
  "deal_type": "LBO|Growth|Add-on|Exit|Recap|Merger|IPO|Other",
  "target_company": "company name or null",
  "target_description": "1-sentence description of the target company or null",
  "enterprise_value_usd": number or null,
  "announced_date": "YYYY-MM-DD or null",
  "closed_date": "YYYY-MM-DD or null",
  "co_investors": ["list of co-investors"] or [],
  "seller": "seller name or null",
  "description": "1-2 sentence deal summary"
}}

If this is not about a PE/VC deal by {firm_name}, set is_deal to false.

Press release text:
{text}"#;

#[derive(Debug, Clone)]
struct CandidateRelease {
    url: String,
    title: String,
    source: &'static str,
    company_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DealExtraction {
    is_deal: Option<bool>,
    deal_type: Option<String>,
    target_company: Option<String>,
    target_description: Option<String>,
    enterprise_value_usd: Option<f64>,
    announced_date: Option<String>,
    closed_date: Option<String>,
    #[serde(default)]
    co_investors: Vec<String>,
    seller: Option<String>,
    description: Option<String>,
}

pub struct PressReleaseCollector {
    http: Arc<HttpSubstrate>,
    llm: Option<Arc<dyn LlmClient>>,
}

impl PressReleaseCollector {
    pub fn new(http: Arc<HttpSubstrate>, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self { http, llm }
    }

    async fn search_all_sources(&self, firm_name: &str) -> Vec<CandidateRelease> {
        let mut all = Vec::new();
        all.extend(self.search_sec_efts(firm_name).await);
        all.extend(self.search_pr_newswire(firm_name).await);
        all.extend(self.search_business_wire(firm_name).await);
        all.extend(self.search_globenewswire(firm_name).await);

        let filtered = filter_deal_related(all, firm_name);

        let mut seen = HashSet::new();
        filtered.into_iter().filter(|pr| seen.insert(pr.url.clone())).collect()
    }

    async fn search_sec_efts(&self, firm_name: &str) -> Vec<CandidateRelease> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let url = format!(
            "https://efts.sec.gov/LATEST/search-index?q={}&forms=8-K&dateRange=custom&startdt=2023-01-01&enddt={}",
            url_encode(&format!("\"{firm_name}\" acquisition")),
            today
        );

        let response: EftsResponse = match self.http.get_json(&url).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(firm_name, error = %e, "SEC EFTS search failed");
                return Vec::new();
            }
        };

        let hits = response.hits.and_then(|h| h.hits).unwrap_or_default();
        hits.into_iter()
            .take(MAX_PER_SOURCE)
            .filter_map(|hit| {
                let adsh = hit.source.adsh?;
                let cik = hit.source.ciks.and_then(|c| c.into_iter().next())?;
                let cik = cik.trim_start_matches('0').to_string();
                let accession_clean = adsh.replace('-', "");
                let company_name = hit
                    .source
                    .display_names
                    .and_then(|names| names.into_iter().next())
                    .map(|n| n.split('(').next().unwrap_or(&n).trim().to_string());
                let title = company_name
                    .clone()
                    .map(|n| format!("8-K: {n}"))
                    .unwrap_or_else(|| format!("8-K filing {}", hit.source.file_date.clone().unwrap_or_default()));

                Some(CandidateRelease {
                    url: format!("https://www.sec.gov/Archives/edgar/data/{cik}/{accession_clean}/"),
                    title,
                    source: "sec_8k",
                    company_name,
                })
            })
            .collect()
    }

    async fn search_pr_newswire(&self, firm_name: &str) -> Vec<CandidateRelease> {
        let query = format!("\"{firm_name}\" acquisition OR investment OR portfolio OR completes");
        let url = format!("https://www.prnewswire.com/search/news/?keyword={}&page=1&pagesize=25", url_encode(&query));
        let Ok(bytes) = self.http.get_bytes(&url).await else {
            return Vec::new();
        };
        let html = Html::parse_document(&String::from_utf8_lossy(&bytes));
        let item_selector = Selector::parse("div.search-result-item").unwrap();
        let link_selector = Selector::parse("a[href]").unwrap();

        html.select(&item_selector)
            .filter_map(|item| {
                let link = item.select(&link_selector).next()?;
                let href = link.value().attr("href")?;
                if !href.contains("/news-releases/") {
                    return None;
                }
                let title = link.text().collect::<String>().trim().to_string();
                if title.is_empty() {
                    return None;
                }
                Some(CandidateRelease {
                    url: resolve("https://www.prnewswire.com", href),
                    title,
                    source: "pr_newswire",
                    company_name: None,
                })
            })
            .take(MAX_PER_SOURCE)
            .collect()
    }

    async fn search_business_wire(&self, firm_name: &str) -> Vec<CandidateRelease> {
        let query = format!("\"{firm_name}\" acquisition OR investment OR portfolio OR completes");
        let url = format!(
            "https://www.businesswire.com/portal/site/home/search/?searchType=news&searchTerm={}",
            url_encode(&query)
        );
        let Ok(bytes) = self.http.get_bytes(&url).await else {
            return Vec::new();
        };
        let html = Html::parse_document(&String::from_utf8_lossy(&bytes));
        let link_selector = Selector::parse("a[href]").unwrap();

        html.select(&link_selector)
            .filter_map(|link| {
                let href = link.value().attr("href")?;
                let title = link.text().collect::<String>().trim().to_string();
                if title.is_empty() || href.is_empty() {
                    return None;
                }
                Some(CandidateRelease {
                    url: resolve("https://www.businesswire.com", href),
                    title,
                    source: "business_wire",
                    company_name: None,
                })
            })
            .take(MAX_PER_SOURCE)
            .collect()
    }

    async fn search_globenewswire(&self, firm_name: &str) -> Vec<CandidateRelease> {
        let query = format!("{firm_name} acquisition investment");
        let url = format!("https://www.globenewswire.com/search?keyword={}&pageSize=25", url_encode(&query));
        let Ok(bytes) = self.http.get_bytes(&url).await else {
            return Vec::new();
        };
        let html = Html::parse_document(&String::from_utf8_lossy(&bytes));
        let link_selector = Selector::parse("a[href]").unwrap();

        html.select(&link_selector)
            .filter_map(|link| {
                let href = link.value().attr("href")?;
                if !href.contains("/news-release/") {
                    return None;
                }
                let title = link.text().collect::<String>().trim().to_string();
                if title.len() <= 15 {
                    return None;
                }
                Some(CandidateRelease {
                    url: resolve("https://www.globenewswire.com", href),
                    title,
                    source: "globenewswire",
                    company_name: None,
                })
            })
            .take(MAX_PER_SOURCE)
            .collect()
    }

    async fn fetch_pr_text(&self, url: &str) -> Option<String> {
        if url.contains("sec.gov/Archives/edgar/data/") {
            return self.fetch_sec_8k_text(url).await;
        }
        let bytes = self.http.get_bytes(url).await.ok()?;
        Some(extract_article_text(&String::from_utf8_lossy(&bytes)))
    }

    async fn fetch_sec_8k_text(&self, index_url: &str) -> Option<String> {
        let bytes = self.http.get_bytes(index_url).await.ok()?;
        let html = Html::parse_document(&String::from_utf8_lossy(&bytes));
        let link_selector = Selector::parse("a[href]").ok()?;

        let doc_href = html.select(&link_selector).find_map(|link| {
            let href = link.value().attr("href")?;
            let lower = href.to_lowercase();
            if (lower.ends_with(".htm") || lower.ends_with(".html") || lower.ends_with(".txt"))
                && !lower.contains("primary_doc")
            {
                Some(href.to_string())
            } else {
                None
            }
        })?;

        let doc_url = if doc_href.starts_with("http") {
            doc_href
        } else {
            format!("https://www.sec.gov{doc_href}")
        };

        let doc_bytes = self.http.get_bytes(&doc_url).await.ok()?;
        Some(extract_article_text(&String::from_utf8_lossy(&doc_bytes)))
    }

    async fn extract_deal_with_llm(&self, llm: &Arc<dyn LlmClient>, text: &str, firm_name: &str) -> Option<DealExtraction> {
        let prompt = DEAL_EXTRACTION_PROMPT
            .replace("{firm_name}", firm_name)
            .replace("{text}", text);
        let response = llm
            .complete(LlmRequest {
                system: "You are a deal-extraction assistant. Respond with only valid JSON, no prose.".to_string(),
                user: prompt,
                max_tokens: 800,
                temperature: 0.0,
                json_mode: true,
                purpose: Source::PressRelease,
            })
            .await
            .map_err(|e| tracing::warn!(error = %e, "LLM deal extraction failed"))
            .ok()?;

        let wrapped = format!("[{}]", response.content.trim());
        let mut extracted: Vec<DealExtraction> = parse_json_array_with_repair(&wrapped)
            .map_err(|e| tracing::warn!(error = %e, "could not parse deal extraction"))
            .ok()?;
        if extracted.is_empty() {
            None
        } else {
            Some(extracted.remove(0))
        }
    }
}

#[async_trait]
impl Collector for PressReleaseCollector {
    fn source_type(&self) -> Source {
        Source::PressRelease
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Firm
    }

    async fn collect(&self, args: &CollectArgs) -> pe_core::model::CollectionResult {
        let started_at = Utc::now();

        let candidates = self.search_all_sources(&args.entity_name).await;
        if candidates.is_empty() {
            return pe_core::model::CollectionResult {
                warnings: vec!["no deal-related press releases found".to_string()],
                completed_at: Utc::now(),
                ..pe_core::model::CollectionResult::empty(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Firm,
                    Source::PressRelease,
                    started_at,
                )
            };
        }

        let mut items = Vec::new();

        let (sec_items, pr_items): (Vec<_>, Vec<_>) = candidates.into_iter().partition(|c| c.source == "sec_8k");

        for sec in sec_items.into_iter().take(MAX_PER_SOURCE) {
            items.push(Item::DealFrom8k(ItemEnvelope::new(
                DealFrom8kPayload {
                    entity_id: args.entity_id,
                    entity_name: args.entity_name.clone(),
                    company_name: sec.company_name,
                    title: Some(sec.title),
                    firm_name: Some(args.entity_name.clone()),
                },
                Some(sec.url),
                Confidence::High,
                false,
            )));
        }

        let mut processed = 0;
        for pr in pr_items {
            if processed >= MAX_PR_TO_PROCESS {
                break;
            }

            let Some(llm) = &self.llm else {
                items.push(Item::DealPressRelease(ItemEnvelope::new(
                    DealPressReleasePayload {
                        entity_id: args.entity_id,
                        entity_name: args.entity_name.clone(),
                        firm_name: Some(args.entity_name.clone()),
                        source: Some(pr.source.to_string()),
                    },
                    Some(pr.url),
                    Confidence::Low,
                    false,
                )));
                continue;
            };

            let Some(text) = self.fetch_pr_text(&pr.url).await else {
                continue;
            };
            if text.len() < 100 {
                continue;
            }
            let text: String = text.chars().take(8000).collect();
            processed += 1;

            let Some(deal_data) = self.extract_deal_with_llm(llm, &text, &args.entity_name).await else {
                continue;
            };
            if !deal_data.is_deal.unwrap_or(false) {
                continue;
            }

            let deal_type = deal_data.deal_type.clone().unwrap_or_else(|| "Other".to_string());
            items.push(Item::Deal(ItemEnvelope::new(
                DealPayload {
                    entity_id: args.entity_id,
                    entity_name: args.entity_name.clone(),
                    deal_type: Some(deal_type.clone()),
                    target_company: deal_data.target_company.clone(),
                    enterprise_value_usd: deal_data
                        .enterprise_value_usd
                        .and_then(|v| BigDecimal::try_from(v).ok()),
                    announced_date: deal_data
                        .announced_date
                        .as_deref()
                        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
                    closed_date: deal_data
                        .closed_date
                        .as_deref()
                        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
                    seller: deal_data.seller.clone(),
                    co_investors: deal_data.co_investors.iter().map(|name| DealCoInvestor { name: name.clone() }).collect(),
                },
                Some(pr.url.clone()),
                Confidence::LlmExtracted,
                false,
            )));

            if let Some(target) = deal_data.target_company {
                if deal_type != "Exit" {
                    items.push(Item::PortfolioCompany(ItemEnvelope::new(
                        PortfolioCompanyPayload {
                            entity_id: args.entity_id,
                            entity_name: args.entity_name.clone(),
                            name: target,
                            website: None,
                            description: deal_data.target_description,
                            ownership_status: Some("PE-Backed".to_string()),
                            industry: None,
                        },
                        Some(pr.url),
                        Confidence::LlmExtracted,
                        false,
                    )));
                }
            }
        }

        pe_core::model::CollectionResult {
            items,
            completed_at: Utc::now(),
            ..pe_core::model::CollectionResult::empty(
                args.entity_id,
                args.entity_name.clone(),
                EntityType::Firm,
                Source::PressRelease,
                started_at,
            )
        }
    }
}

fn filter_deal_related(releases: Vec<CandidateRelease>, firm_name: &str) -> Vec<CandidateRelease> {
    let firm_words: Vec<String> = firm_name.to_lowercase().split_whitespace().map(str::to_string).collect();
    let mut scored: Vec<(i32, CandidateRelease)> = releases
        .into_iter()
        .filter_map(|pr| {
            if pr.source == "sec_8k" {
                return Some((2, pr));
            }
            let title = pr.title.to_lowercase();
            let firm_match = firm_words.iter().any(|w| w.len() > 3 && title.contains(w.as_str()));
            let deal_match = DEAL_KEYWORDS.iter().any(|kw| title.contains(kw));
            match (firm_match, deal_match) {
                (true, true) => Some((3, pr)),
                (false, true) => Some((1, pr)),
                (true, false) => Some((0, pr)),
                (false, false) => None,
            }
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().map(|(_, pr)| pr).collect()
}

fn extract_article_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    for selector_str in ["article", "div[class*=release]", "div[class*=article]", "main"] {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(el) = doc.select(&selector).next() {
                let text = el.text().collect::<Vec<_>>().join(" ");
                if !text.trim().is_empty() {
                    return text;
                }
            }
        }
    }
    doc.root_element().text().collect::<Vec<_>>().join(" ")
}

fn resolve(base: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{base}{href}")
    }
}

fn url_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[derive(Debug, Deserialize)]
struct EftsResponse {
    hits: Option<EftsHits>,
}

#[derive(Debug, Deserialize)]
struct EftsHits {
    hits: Option<Vec<EftsHit>>,
}

#[derive(Debug, Deserialize)]
struct EftsHit {
    #[serde(rename = "_source")]
    source: EftsSource,
}

#[derive(Debug, Default, Deserialize)]
struct EftsSource {
    adsh: Option<String>,
    ciks: Option<Vec<String>>,
    display_names: Option<Vec<String>>,
    file_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sec_hits_always_rank_above_everything_else() {
        let releases = vec![
            CandidateRelease { url: "a".to_string(), title: "KKR acquisition".to_string(), source: "pr_newswire", company_name: None },
            CandidateRelease { url: "b".to_string(), title: "8-K: Target Co".to_string(), source: "sec_8k", company_name: None },
        ];
        let filtered = filter_deal_related(releases, "KKR");
        assert_eq!(filtered[0].source, "sec_8k");
    }

    #[test]
    fn drops_releases_matching_neither_firm_nor_deal_keywords() {
        let releases = vec![CandidateRelease {
            url: "a".to_string(),
            title: "Weather forecast for tomorrow".to_string(),
            source: "pr_newswire",
            company_name: None,
        }];
        assert!(filter_deal_related(releases, "KKR").is_empty());
    }
}
