//! URL validation and tracking-param cleaning (spec §6).
//!
//! No analog exists anywhere in the original Python sources (`serperapi.py`,
//! `jina.py`, `http_pool.py` — none clean or validate URLs); this module is
//! grounded in the spec's own rule text plus the teacher's
//! `normalize_url_key()` tracking-param-stripping idiom from
//! `tools/search/mod.rs`.

use crate::error::ValidationError;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
    "ref",
    "source",
];

const TRAILING_DIRECTORY_SEGMENTS: &[&str] = &[
    "articles", "paper", "doi", "abstract", "pmc", "pubmed", "content", "view", "detail",
    "item", "search", "results", "list", "index", "home",
];

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\d+|\{id\}|\{slug\}|%s|:id|\[id\]|<id>|[{}<>]").unwrap()
    })
}

fn pmc_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/PMC\d+").unwrap())
}

fn pubmed_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/\d+").unwrap())
}

fn doi_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"10\.\d+/").unwrap())
}

fn arxiv_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4}\.\d+").unwrap())
}

/// Validates a URL per spec §6.
pub fn validate_url(raw: &str) -> Result<Url, ValidationError> {
    let fail = || ValidationError::InvalidUrl(raw.to_string());

    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return Err(fail());
    }

    let parsed = Url::parse(raw).map_err(|_| fail())?;

    let host = parsed.host_str().ok_or_else(fail)?;
    if !host.contains('.') {
        return Err(fail());
    }

    if placeholder_regex().is_match(raw) {
        return Err(fail());
    }

    let path = parsed.path();
    let last_segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    if TRAILING_DIRECTORY_SEGMENTS
        .iter()
        .any(|seg| last_segment.eq_ignore_ascii_case(seg))
    {
        return Err(fail());
    }

    if host.contains("ncbi.nlm.nih.gov") && path.to_lowercase().contains("pmc") {
        if !pmc_regex().is_match(raw) {
            return Err(fail());
        }
    } else if host.contains("pubmed.ncbi.nlm.nih.gov") {
        if !pubmed_regex().is_match(path) {
            return Err(fail());
        }
    } else if host == "doi.org" || host.ends_with(".doi.org") {
        if !doi_regex().is_match(raw) {
            return Err(fail());
        }
    } else if host.contains("arxiv.org") {
        if !arxiv_regex().is_match(raw) {
            return Err(fail());
        }
    }

    Ok(parsed)
}

/// Strips known tracking query params and empty query strings. Idempotent:
/// `clean(clean(u)) == clean(u)`.
pub fn clean_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_string();
    };

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        let qs = kept
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        parsed.set_query(Some(&qs));
    }

    parsed.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_scheme() {
        assert!(validate_url("ftp://example.org/file").is_err());
    }

    #[test]
    fn rejects_host_without_dot() {
        assert!(validate_url("https://localhost/page").is_err());
    }

    #[test]
    fn accepts_well_formed_url() {
        assert!(validate_url("https://en.wikipedia.org/wiki/Rust_(programming_language)").is_ok());
    }

    #[test]
    fn rejects_placeholder_token() {
        assert!(validate_url("https://example.org/article/{id}").is_err());
        assert!(validate_url("https://example.org/article/$1").is_err());
    }

    #[test]
    fn rejects_trailing_directory_path() {
        assert!(validate_url("https://journal.example.org/articles").is_err());
        assert!(validate_url("https://journal.example.org/articles/").is_err());
    }

    #[test]
    fn rejects_bare_doi_host() {
        assert!(validate_url("https://doi.org/").is_err());
    }

    #[test]
    fn accepts_doi_with_identifier() {
        assert!(validate_url("https://doi.org/10.1000/xyz123").is_ok());
    }

    #[test]
    fn requires_pmc_identifier() {
        assert!(validate_url("https://www.ncbi.nlm.nih.gov/pmc/articles/").is_err());
        assert!(validate_url("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC1234567/").is_ok());
    }

    #[test]
    fn requires_arxiv_identifier() {
        assert!(validate_url("https://arxiv.org/abs/").is_err());
        assert!(validate_url("https://arxiv.org/abs/2301.12345").is_ok());
    }

    #[test]
    fn cleaning_strips_tracking_params() {
        let cleaned = clean_url("https://example.org/a?utm_source=x&real=1");
        assert_eq!(cleaned, "https://example.org/a?real=1");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let once = clean_url("https://example.org/a?utm_source=x&fbclid=y&real=1");
        let twice = clean_url(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn cleaning_drops_query_entirely_when_all_tracking() {
        let cleaned = clean_url("https://example.org/a?utm_source=x&gclid=y");
        assert_eq!(cleaned, "https://example.org/a");
    }
}
