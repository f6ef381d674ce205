use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use newsbot_core::CrawlError;

const TRACKING_PREFIXES: &[&str] = &["utm_", "gclid", "fbclid", "yclid"];

const EXCLUDED_SEGMENTS: &[&str] = &[
    "/tags/", "/tag/", "/search/", "/auth/", "/user/", "/account/", "/amp/", "/video/",
    "/gallery/", "/photo/", "/subscribe/",
];

static LENTA_ARTICLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/news/\d{4}/\d{2}/\d{2}/[^/]+/?$").unwrap());
static RBC_ARTICLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/[a-zA-Z0-9_-]+/\d{2}/\d{2}/\d{4}/.*$").unwrap());

/// Normalizes a URL into the stable key used throughout the crawl engine
/// (§4.1). Missing scheme defaults to https; tracking query parameters are
/// dropped; the fragment is dropped unconditionally.
pub fn canonicalize(raw: &str) -> Result<String, CrawlError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CrawlError::InvalidUrl("empty url".into()));
    }
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| CrawlError::InvalidUrl(e.to_string()))?;
    url.set_fragment(None);

    let host = url
        .host_str()
        .ok_or_else(|| CrawlError::InvalidUrl("missing host".into()))?
        .to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| CrawlError::InvalidUrl(e.to_string()))?;

    url.set_path(&collapse_path(url.path()));

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_key(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (k, v) in &pairs {
            serializer.append_pair(k, v);
        }
        url.set_query(Some(&serializer.finish()));
    }

    Ok(url.to_string())
}

fn collapse_path(path: &str) -> String {
    let mut collapsed = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        collapsed.push(c);
    }
    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
    }
    if collapsed.is_empty() {
        "/".to_string()
    } else {
        collapsed
    }
}

fn is_tracking_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    TRACKING_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Maps a canonical URL's host to a publisher tag, or `None` for unknown hosts.
pub fn identify_source(canonical: &str) -> Option<&'static str> {
    let url = Url::parse(canonical).ok()?;
    let host = url.host_str()?;
    if host.ends_with("lenta.ru") {
        Some("lenta.ru")
    } else if host.ends_with("rbc.ru") {
        Some("rbc.ru")
    } else {
        None
    }
}

fn is_excluded_path(path: &str) -> bool {
    EXCLUDED_SEGMENTS.iter().any(|seg| path.starts_with(seg))
}

/// Whether a canonical URL's path falls in an excluded section (tags,
/// search, auth, media galleries, ...). Used by both classification and
/// link extraction.
pub fn is_excluded(canonical: &str) -> bool {
    match Url::parse(canonical) {
        Ok(url) => is_excluded_path(url.path()),
        Err(_) => true,
    }
}

/// Pure function of the canonical URL (§4.1): decides whether a URL
/// identifies an article page rather than an index/listing page.
pub fn is_article(canonical: &str) -> bool {
    let Ok(url) = Url::parse(canonical) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let path = url.path();

    if is_excluded_path(path) {
        return false;
    }

    if host.ends_with("lenta.ru") {
        return LENTA_ARTICLE_RE.is_match(path);
    }

    if host.ends_with("rbc.ru") {
        if host.starts_with("quote.") || host.starts_with("trends.") || host.starts_with("plus.") {
            return false;
        }
        return RBC_ARTICLE_RE.is_match(path);
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form() {
        let got = canonicalize(
            "HTTP://www.Lenta.RU//news/2024/01/05/foo/?utm_source=x&b=2&a=1#top",
        )
        .unwrap();
        assert_eq!(got, "http://lenta.ru/news/2024/01/05/foo?a=1&b=2");
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let once = canonicalize("https://rbc.ru/politics/12/01/2024/abc?z=1&a=2").unwrap();
        let twice = canonicalize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn canonicalize_is_tracking_invariant() {
        let a = canonicalize("https://lenta.ru/news/2024/01/05/foo?b=2&a=1").unwrap();
        let b =
            canonicalize("https://lenta.ru/news/2024/01/05/foo?utm_source=x&a=1&b=2&gclid=y")
                .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn article_vs_not() {
        assert!(is_article("https://lenta.ru/news/2024/01/05/foo"));
        assert!(!is_article("https://lenta.ru/tags/war"));
        assert!(!is_article(
            "https://quote.rbc.ru/news/article/12/01/2024/abc"
        ));
        assert!(is_article("https://rbc.ru/politics/12/01/2024/abc"));
    }

    #[test]
    fn excluded_prefix_is_anchored_to_path_start() {
        // Only a leading "/tags/" segment is excluded, matching the
        // original robot's anchored regex; "/tags/" appearing deeper in
        // the path must not trip the exclusion.
        assert!(is_excluded("https://lenta.ru/tags/war"));
        assert!(!is_excluded(
            "https://lenta.ru/news/2024/01/05/see-also-tags/war"
        ));
    }

    #[test]
    fn identifies_known_publishers_only() {
        assert_eq!(
            identify_source("https://lenta.ru/news/2024/01/05/foo"),
            Some("lenta.ru")
        );
        assert_eq!(identify_source("https://example.com/foo"), None);
    }
}
