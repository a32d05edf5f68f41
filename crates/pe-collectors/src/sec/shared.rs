//! SEC EDGAR submissions JSON shape and the URL conventions all three SEC
//! collectors share (§4.3): CIK zero-padded to 10 digits for
//! `data.sec.gov/submissions`, unpadded for `Archives/edgar/data`.

use serde::Deserialize;

pub const SEC_SUBMISSIONS_BASE: &str = "https://data.sec.gov/submissions";
pub const SEC_ARCHIVES_BASE: &str = "https://www.sec.gov/Archives/edgar/data";
pub const SEC_BROWSE_EDGAR: &str = "https://www.sec.gov/cgi-bin/browse-edgar";

pub fn pad_cik(cik: &str) -> String {
    format!("{:0>10}", cik.trim_start_matches('0'))
}

pub fn submissions_url(cik: &str) -> String {
    format!("{SEC_SUBMISSIONS_BASE}/CIK{}.json", pad_cik(cik))
}

/// Unpadded CIK directory, as SEC's Archives tree expects.
pub fn filing_index_url(cik: &str, accession_no_dashes: &str) -> String {
    format!(
        "{SEC_ARCHIVES_BASE}/{}/{}/",
        cik.trim_start_matches('0'),
        accession_no_dashes
    )
}

pub fn filing_document_url(cik: &str, accession_no_dashes: &str, document: &str) -> String {
    format!(
        "{SEC_ARCHIVES_BASE}/{}/{}/{}",
        cik.trim_start_matches('0'),
        accession_no_dashes,
        document
    )
}

pub fn browse_edgar_url(cik: &str, form_type: Option<&str>) -> String {
    match form_type {
        Some(form) => format!("{SEC_BROWSE_EDGAR}?action=getcompany&CIK={cik}&type={form}"),
        None => format!("{SEC_BROWSE_EDGAR}?action=getcompany&CIK={cik}"),
    }
}

pub fn strip_accession_dashes(accession: &str) -> String {
    accession.replace('-', "")
}

#[derive(Debug, Deserialize)]
pub struct SecSubmissions {
    pub name: Option<String>,
    pub cik: Option<serde_json::Value>,
    pub sic: Option<String>,
    #[serde(rename = "sicDescription")]
    pub sic_description: Option<String>,
    #[serde(default)]
    pub addresses: SecAddresses,
    pub filings: SecFilings,
}

#[derive(Debug, Default, Deserialize)]
pub struct SecAddresses {
    pub business: Option<SecAddress>,
}

#[derive(Debug, Deserialize)]
pub struct SecAddress {
    pub city: Option<String>,
    #[serde(rename = "stateOrCountry")]
    pub state_or_country: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SecFilings {
    pub recent: SecRecentFilings,
}

/// The submissions JSON stores each field as a parallel array indexed by
/// filing; `row(i)` reassembles one filing's fields by index.
#[derive(Debug, Default, Deserialize)]
pub struct SecRecentFilings {
    #[serde(default)]
    pub form: Vec<String>,
    #[serde(default, rename = "accessionNumber")]
    pub accession_number: Vec<String>,
    #[serde(default, rename = "filingDate")]
    pub filing_date: Vec<String>,
    #[serde(default, rename = "reportDate")]
    pub report_date: Vec<String>,
    #[serde(default, rename = "primaryDocument")]
    pub primary_document: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SecFiling {
    pub form: String,
    pub accession_number: Option<String>,
    pub filing_date: Option<String>,
    pub report_date: Option<String>,
    pub primary_document: Option<String>,
}

impl SecRecentFilings {
    fn at(values: &[String], i: usize) -> Option<String> {
        values.get(i).cloned()
    }

    pub fn filings(&self) -> Vec<SecFiling> {
        self.form
            .iter()
            .enumerate()
            .map(|(i, form)| SecFiling {
                form: form.clone(),
                accession_number: Self::at(&self.accession_number, i),
                filing_date: Self::at(&self.filing_date, i),
                report_date: Self::at(&self.report_date, i),
                primary_document: Self::at(&self.primary_document, i),
            })
            .collect()
    }
}

impl SecSubmissions {
    /// Filings whose form matches one of `form_types`, most recent first,
    /// capped at `limit` (the submissions feed is already newest-first).
    pub fn filings_of(&self, form_types: &[&str], limit: usize) -> Vec<SecFiling> {
        self.filings
            .recent
            .filings()
            .into_iter()
            .filter(|f| form_types.contains(&f.form.as_str()))
            .take(limit)
            .collect()
    }
}

/// Finds the first descendant whose local tag name matches (case-insensitive),
/// ignoring namespace prefixes — the common trick for XBRL-adjacent SEC XML
/// that mixes default and prefixed namespaces across filer software versions.
pub fn find_text_by_local_name<'a>(node: roxmltree::Node<'a, 'a>, local_name: &str) -> Option<String> {
    node.descendants()
        .find(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case(local_name))
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn nodes_by_local_name<'a>(node: roxmltree::Node<'a, 'a>, local_name: &str) -> Vec<roxmltree::Node<'a, 'a>> {
    node.descendants()
        .filter(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case(local_name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_cik_to_ten_digits() {
        assert_eq!(pad_cik("320193"), "0000320193");
        assert_eq!(pad_cik("0000320193"), "0000320193");
    }

    #[test]
    fn builds_submissions_url() {
        assert_eq!(
            submissions_url("320193"),
            "https://data.sec.gov/submissions/CIK0000320193.json"
        );
    }

    #[test]
    fn archives_path_uses_unpadded_cik() {
        assert_eq!(
            filing_index_url("0000320193", "000032019324000001"),
            "https://www.sec.gov/Archives/edgar/data/320193/000032019324000001/"
        );
    }
}
