use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use url::Url;

use crate::url::{canonicalize, identify_source, is_excluded};

const MIN_BLOCK_LEN: usize = 40;
const STRIPPED_TAGS: &[&str] = &["script", "style", "noscript", "svg", "form"];

/// Hex SHA-256 of the raw response bytes (§3 `html_hash`, §4.4 step 1).
pub fn hash_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Detaches every `script`/`style`/`noscript`/`svg`/`form` subtree from the
/// parsed document (§4.2 step 2) so neither their markup nor their text
/// content leaks into title/body extraction.
fn strip_ignored_subtrees(document: &mut Html) {
    for tag in STRIPPED_TAGS {
        let Ok(selector) = Selector::parse(tag) else {
            continue;
        };
        let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
    }
}

fn body_selectors(source: Option<&str>) -> &'static [&'static str] {
    match source {
        Some("lenta.ru") => &[
            "div.topic-body__content",
            "div.topic-body",
            "div[data-testid='topic-body']",
            "article",
            "main",
        ],
        Some("rbc.ru") => &["div.article__text", "div.article__content", "article", "main"],
        _ => &["article", "main"],
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extracts the title + body text of an article page (§4.2). Returns the
/// empty string when no usable body was found, regardless of publisher.
pub fn extract_article(canonical_url: &str, html: &str) -> String {
    let source = identify_source(canonical_url);
    let mut document = Html::parse_document(html);
    strip_ignored_subtrees(&mut document);

    let title = Selector::parse("h1")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let mut body_node = None;
    for selector_str in body_selectors(source) {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(node) = document.select(&selector).next() {
                body_node = Some(node);
                break;
            }
        }
    }

    let Some(body_node) = body_node else {
        return String::new();
    };

    let block_selector = Selector::parse("p, li").unwrap();
    let mut blocks: Vec<String> = body_node
        .select(&block_selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| t.len() >= MIN_BLOCK_LEN)
        .collect();

    if blocks.is_empty() {
        let fallback: Vec<String> = body_node
            .text()
            .map(collapse_whitespace)
            .filter(|t| !t.is_empty())
            .collect();
        if !fallback.is_empty() {
            blocks.push(fallback.join("\n"));
        }
    }

    let body = blocks.join("\n");

    match (title, body.is_empty()) {
        (Some(t), false) => format!("{t}\n\n{body}"),
        (Some(t), true) => t,
        (None, false) => body,
        (None, true) => String::new(),
    }
}

/// Extracts, canonicalizes, and filters anchor hrefs from a page (§4.2
/// link-extraction paragraph). Results are deduplicated preserving
/// first-seen order and capped at `limit`.
pub fn extract_links(base_url: &str, html: &str, limit: usize) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        if links.len() >= limit {
            break;
        }
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let Ok(canonical) = canonicalize(resolved.as_str()) else {
            continue;
        };
        if identify_source(&canonical).is_none() || is_excluded(&canonical) {
            continue;
        }
        if seen.insert(canonical.clone()) {
            links.push(canonical);
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_and_long_paragraphs_only() {
        let html = r#"
            <html><body>
                <h1>Big news happened today in the capital</h1>
                <div class="topic-body__content">
                    <p>short</p>
                    <p>This paragraph is long enough to survive the forty character filter easily.</p>
                </div>
            </body></html>
        "#;
        let text = extract_article("https://lenta.ru/news/2024/01/05/foo", html);
        assert!(text.contains("Big news happened today"));
        assert!(text.contains("long enough to survive"));
        assert!(!text.starts_with("short"));
    }

    #[test]
    fn strips_script_and_style_text_from_fallback() {
        let html = r#"
            <html><body>
                <article>
                    <script>trackPageview("secret-id");</script>
                    <style>.hidden { display: none; }</style>
                    Plenty of real article text lives right here, outside any tags at all.
                </article>
            </body></html>
        "#;
        let text = extract_article("https://example.com/x", html);
        assert!(!text.contains("trackPageview"));
        assert!(!text.contains("display: none"));
        assert!(text.contains("real article text"));
    }

    #[test]
    fn hash_bytes_is_stable() {
        let a = hash_bytes(b"hello world");
        let b = hash_bytes(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hash_bytes(b"hello worlds"));
    }

    #[test]
    fn no_body_node_yields_empty_even_with_a_title() {
        // §4.2 step 5: no recognized body container means no article, full
        // stop — a lone <h1> must not produce a non-empty extraction, or
        // save_article_if_changed would wrongly create a corpus entry.
        let html = "<html><body><h1>Just a headline</h1></body></html>";
        let text = extract_article("https://lenta.ru/news/2024/01/05/foo", html);
        assert_eq!(text, "");
    }

    #[test]
    fn link_extraction_skips_scheme_and_unknown_hosts() {
        let html = r#"
            <html><body>
                <a href="/news/2024/01/05/bar">bar</a>
                <a href="https://example.com/other">ext</a>
                <a href="mailto:foo@example.com">mail</a>
                <a href="/tags/war">tag</a>
            </body></html>
        "#;
        let links = extract_links("https://lenta.ru/news/2024/01/05/foo", html, 10);
        assert_eq!(links, vec!["https://lenta.ru/news/2024/01/05/bar".to_string()]);
    }
}
