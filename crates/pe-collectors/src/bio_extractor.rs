//! Bio extractor collector (§4.4), grounded in
//! `original_source/.../people_collectors/bio_extractor.py`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use pe_core::error::{AppError, AppResult};
use pe_core::model::{Confidence, EntityType, Item, ItemEnvelope, PersonPayload, Source};
use pe_http::HttpSubstrate;

use crate::llm::{parse_json_array_with_repair, LlmClient, LlmRequest};
use crate::registry::Collector;
use crate::CollectArgs;

const TEAM_PATTERNS: &[&str] = &[
    "/people",
    "/professionals",
    "/our-people",
    "/about/people",
    "/leadership",
    "/about/leadership",
    "/about/professionals",
    "/team",
    "/our-team",
    "/about/team",
    "/about-us/team",
    "/who-we-are/team",
];

const MAX_PEOPLE_PER_FIRM: usize = 50;
const MAX_TEXT_CHARS: usize = 12_000;
const MAX_PROFILE_PAGES: usize = 10;

/// Renders a page through a headless browser so JS-rendered team pages
/// still yield text. No real implementation ships with this crate — bringing
/// in a full browser-automation dependency is out of scope here — but the
/// seam exists so one can be plugged in without touching the collector.
#[async_trait]
pub trait HeadlessRenderer: Send + Sync {
    async fn render(&self, url: &str) -> AppResult<String>;
}

pub struct NullHeadlessRenderer;

#[async_trait]
impl HeadlessRenderer for NullHeadlessRenderer {
    async fn render(&self, _url: &str) -> AppResult<String> {
        Err(AppError::fatal("headless rendering not configured"))
    }
}

#[derive(Debug, serde::Deserialize)]
struct ExtractedEducation {
    institution: String,
    #[serde(default)]
    degree: Option<String>,
    #[serde(default)]
    field: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ExtractedExperience {
    company: String,
    title: String,
}

#[derive(Debug, serde::Deserialize)]
struct ExtractedPerson {
    full_name: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    education: Vec<ExtractedEducation>,
    #[serde(default)]
    experience: Vec<ExtractedExperience>,
}

pub struct BioExtractorCollector {
    http: Arc<HttpSubstrate>,
    llm: Arc<dyn LlmClient>,
    renderer: Arc<dyn HeadlessRenderer>,
}

impl BioExtractorCollector {
    pub fn new(http: Arc<HttpSubstrate>, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            http,
            llm,
            renderer: Arc::new(NullHeadlessRenderer),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn HeadlessRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    async fn find_team_page(&self, website_url: &str) -> Option<(String, String)> {
        let mut best: Option<(String, String, usize)> = None;

        for pattern in TEAM_PATTERNS {
            let Some(url) = join_path(website_url, pattern) else {
                continue;
            };
            let Ok(bytes) = self.http.get_bytes(&url).await else {
                continue;
            };
            let body = String::from_utf8_lossy(&bytes).to_string();
            let lower = body.to_lowercase();
            if !["team", "people", "professional", "leadership", "managing"]
                .iter()
                .any(|kw| lower.contains(kw))
            {
                continue;
            }

            let text = extract_text_from_html(&body);
            let count = count_name_lines(&text);
            if count >= 10 {
                return Some((url, text));
            }
            if best.as_ref().map(|(_, _, c)| count > *c).unwrap_or(true) {
                best = Some((url, text, count));
            }
        }

        if let Some((url, text, _)) = best {
            return Some((url, text));
        }

        let bytes = self.http.get_bytes(website_url).await.ok()?;
        let html = String::from_utf8_lossy(&bytes).to_string();
        let link = find_team_link(&html, website_url)?;
        let linked_bytes = self.http.get_bytes(&link).await.ok()?;
        let text = extract_text_from_html(&String::from_utf8_lossy(&linked_bytes));
        Some((link, text))
    }

    async fn fetch_page_text(&self, url: &str) -> Option<String> {
        let httpx_text = match self.http.get_bytes(url).await {
            Ok(bytes) => {
                let text = extract_text_from_html(&String::from_utf8_lossy(&bytes));
                if has_people_content(&text) {
                    return Some(text);
                }
                Some(text)
            }
            Err(_) => None,
        };

        if let Ok(rendered_html) = self.renderer.render(url).await {
            let text = extract_text_from_html(&rendered_html);
            if !text.is_empty() {
                return Some(text);
            }
        }

        httpx_text
    }

    async fn fetch_profile_pages(&self, team_url: &str) -> Vec<String> {
        let Ok(bytes) = self.http.get_bytes(team_url).await else {
            return Vec::new();
        };
        let html = Html::parse_document(&String::from_utf8_lossy(&bytes));
        let link_selector = Selector::parse("a[href]").unwrap();

        let mut profile_urls = Vec::new();
        for link in html.select(&link_selector) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let lower = href.to_lowercase();
            if ["/team/", "/people/", "/professionals/", "/bio/", "/staff/"]
                .iter()
                .any(|p| lower.contains(p))
            {
                if let Some(full) = resolve_url(team_url, href) {
                    if full != team_url && !profile_urls.contains(&full) {
                        profile_urls.push(full);
                    }
                }
            }
        }

        let mut texts = Vec::new();
        for url in profile_urls.into_iter().take(MAX_PROFILE_PAGES) {
            if let Some(text) = self.fetch_page_text(&url).await {
                if text.len() > 100 {
                    texts.push(text.chars().take(3000).collect::<String>());
                }
            }
        }
        texts
    }

    async fn extract_bios(&self, text: &str, firm_name: &str) -> Vec<ExtractedPerson> {
        let truncated: String = text.chars().take(MAX_TEXT_CHARS).collect();
        let prompt = format!(
            "Extract biographical information for each person mentioned on this PE firm team page.\n\
             Firm name: {firm_name}\n\n\
             Return ONLY valid JSON — an array of person objects with full_name, title, bio, \
             education[] ({{institution, degree, field}}), and experience[] ({{company, title}}).\n\n\
             Page text:\n{truncated}"
        );

        let response = match self
            .llm
            .complete(LlmRequest {
                system: "You are a data extraction assistant. Respond with only valid JSON, no prose.".to_string(),
                user: prompt,
                max_tokens: 2000,
                temperature: 0.0,
                json_mode: true,
                purpose: Source::BioExtractor,
            })
            .await
        {
            Ok(r) => r,
            Err(_) => return Vec::new(),
        };

        parse_json_array_with_repair(&response.content).unwrap_or_default()
    }
}

#[async_trait]
impl Collector for BioExtractorCollector {
    fn source_type(&self) -> Source {
        Source::BioExtractor
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
                Source::BioExtractor,
                started_at,
                "no website URL provided — cannot discover team page".to_string(),
            );
        };
        let website_url = normalize_url(raw_url);

        let Some((team_url, mut page_text)) = self.find_team_page(&website_url).await else {
            return pe_core::model::CollectionResult {
                warnings: vec!["could not find team/people page on website".to_string()],
                completed_at: Utc::now(),
                ..pe_core::model::CollectionResult::empty(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Firm,
                    Source::BioExtractor,
                    started_at,
                )
            };
        };

        let profile_texts = self.fetch_profile_pages(&team_url).await;
        if !profile_texts.is_empty() {
            page_text.push_str("\n\n--- Individual Profiles ---\n\n");
            page_text.push_str(&profile_texts.join("\n\n"));
        }

        let people = self.extract_bios(&page_text, &args.entity_name).await;
        if people.is_empty() {
            return pe_core::model::CollectionResult {
                warnings: vec!["LLM extraction returned no people".to_string()],
                completed_at: Utc::now(),
                ..pe_core::model::CollectionResult::empty(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Firm,
                    Source::BioExtractor,
                    started_at,
                )
            };
        }

        let items = people
            .into_iter()
            .take(MAX_PEOPLE_PER_FIRM)
            .filter(|p| !p.full_name.trim().is_empty())
            .map(|p| {
                Item::Person(ItemEnvelope::new(
                    PersonPayload {
                        entity_id: args.entity_id,
                        entity_name: args.entity_name.clone(),
                        full_name: p.full_name,
                        linkedin_url: None,
                        current_title: p.title,
                        current_company: Some(args.entity_name.clone()),
                        bio: p.bio,
                        firm_id: Some(args.entity_id),
                        education: p
                            .education
                            .into_iter()
                            .map(|e| pe_core::model::EducationEntry {
                                institution: e.institution,
                                degree: e.degree,
                                field_of_study: e.field,
                                graduation_year: None,
                            })
                            .collect(),
                        experience: p
                            .experience
                            .into_iter()
                            .map(|e| pe_core::model::ExperienceEntry {
                                company: e.company,
                                title: e.title,
                                start_year: None,
                                end_year: None,
                            })
                            .collect(),
                    },
                    Some(team_url.clone()),
                    Confidence::LlmExtracted,
                    false,
                ))
            })
            .collect();

        pe_core::model::CollectionResult {
            items,
            completed_at: Utc::now(),
            ..pe_core::model::CollectionResult::empty(
                args.entity_id,
                args.entity_name.clone(),
                EntityType::Firm,
                Source::BioExtractor,
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

fn join_path(base: &str, path: &str) -> Option<String> {
    let base_url = Url::parse(base).ok()?;
    base_url.join(path.trim_start_matches('/')).ok().map(|u| u.to_string())
}

fn resolve_url(base: &str, href: &str) -> Option<String> {
    let base_url = Url::parse(base).ok()?;
    base_url.join(href).ok().map(|u| u.to_string())
}

fn extract_text_from_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let main_selector = Selector::parse("main, article").unwrap();
    if let Some(main) = document.select(&main_selector).next() {
        return main.text().collect::<Vec<_>>().join("\n");
    }
    let body_selector = Selector::parse("body").unwrap();
    document
        .select(&body_selector)
        .next()
        .map(|b| b.text().collect::<Vec<_>>().join("\n"))
        .unwrap_or_default()
}

fn name_line_regex() -> Regex {
    Regex::new(r"^[A-Z][a-z]+ [A-Z][a-z]+( [A-Z][a-z]+)?$").unwrap()
}

fn count_name_lines(text: &str) -> usize {
    let re = name_line_regex();
    text.lines()
        .filter(|line| {
            let trimmed = line.trim();
            trimmed.len() < 40 && re.is_match(trimmed)
        })
        .count()
}

/// A real team page has multiple `Firstname Lastname` lines; a JS-rendered
/// shell returns mostly nav/footer boilerplate with few or none (§4.4 step 2).
fn has_people_content(text: &str) -> bool {
    if text.len() < 500 {
        return false;
    }
    let re = Regex::new(r"^[A-Z][a-z]+ [A-Z][a-z]+").unwrap();
    let count = text
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            trimmed.len() < 60 && re.is_match(trimmed)
        })
        .count();
    count >= 3
}

fn find_team_link(html: &str, base_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a[href]").ok()?;
    const KEYWORDS: &[&str] = &["team", "people", "leadership", "professionals", "who we are"];

    for link in document.select(&link_selector) {
        let href = link.value().attr("href")?;
        let text = link.text().collect::<String>().to_lowercase();
        let href_lower = href.to_lowercase();
        if KEYWORDS.iter().any(|kw| text.contains(kw) || href_lower.contains(kw)) {
            return resolve_url(base_url, href);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_name_like_lines() {
        let text = "Jane Doe\nManaging Director\nJohn Smith\nPartner\nAbout Us";
        assert_eq!(count_name_lines(text), 2);
    }

    #[test]
    fn sparse_text_lacks_people_content() {
        assert!(!has_people_content("short"));
    }

    #[test]
    fn null_renderer_returns_fatal_error() {
        let renderer = NullHeadlessRenderer;
        let result = tokio_test::block_on(renderer.render("https://example.com"));
        assert!(matches!(result, Err(AppError::Fatal(_))));
    }
}
