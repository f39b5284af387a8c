//! Link extraction from fetched HTML pages and email bodies.

use scraper::{Html, Selector};
use url::Url;

/// A candidate disclosure link pulled from a page.
#[derive(Debug, Clone)]
pub struct DocumentLink {
    pub href: String,
    pub text: String,
}

/// Collect every `<a href>` on the page whose href contains one of `exts`
/// (an empty list keeps all links), resolved against `base` when relative.
/// Order is document order, which on disclosure pages puts the newest file
/// first.
pub fn document_links(html: &str, base: Option<&str>, exts: &[&str]) -> Vec<DocumentLink> {
    let doc = Html::parse_document(html);
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let base_url = base.and_then(|b| Url::parse(b).ok());
    let mut links = Vec::new();
    for element in doc.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href_lower = href.to_lowercase();
        if !exts.is_empty() && !exts.iter().any(|ext| href_lower.contains(ext)) {
            continue;
        }
        let resolved = match (&base_url, Url::parse(href)) {
            (_, Ok(abs)) => abs.to_string(),
            (Some(base), Err(_)) => match base.join(href) {
                Ok(joined) => joined.to_string(),
                Err(_) => continue,
            },
            (None, Err(_)) => continue,
        };
        links.push(DocumentLink {
            href: resolved,
            text: element.text().collect::<String>().trim().to_string(),
        });
    }
    links
}

/// First link whose text or href contains any of the needles
/// (case-insensitive). Needle order is priority order.
pub fn pick_link(links: &[DocumentLink], needles: &[String]) -> Option<DocumentLink> {
    for needle in needles {
        let needle = needle.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        if let Some(link) = links.iter().find(|l| {
            l.text.to_lowercase().contains(&needle) || l.href.to_lowercase().contains(&needle)
        }) {
            return Some(link.clone());
        }
    }
    None
}
