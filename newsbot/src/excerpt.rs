use crate::traits::PageFetcher;
use crate::types::{CandidateItem, FilterOutcome};
use scraper::{Html, Node};
use tracing::{debug, info, warn};

/// Words kept from an article's visible text.
pub const EXCERPT_WORDS: usize = 350;

const HIDDEN_ELEMENTS: [&str; 6] = ["script", "style", "noscript", "head", "title", "template"];

/// Visible text of an HTML document with whitespace collapsed.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut words: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| HIDDEN_ELEMENTS.contains(&element.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    words.join(" ")
}

/// The first `max_words` words of the visible text.
pub fn excerpt_from_html(html: &str, max_words: usize) -> String {
    visible_text(html)
        .split(' ')
        .filter(|word| !word.is_empty())
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fetch each article and attach its excerpt. Items whose page cannot be
/// fetched or has no visible text are dropped.
pub async fn enrich_with_excerpt(items: Vec<CandidateItem>, fetcher: &dyn PageFetcher) -> FilterOutcome {
    let total = items.len();
    let mut kept = Vec::with_capacity(total);

    for mut item in items {
        let html = match fetcher.fetch_page(&item.url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not fetch article {}: {}", item.url, e);
                continue;
            }
        };

        let excerpt = excerpt_from_html(&html, EXCERPT_WORDS);
        if excerpt.is_empty() {
            debug!("No visible text on {}", item.url);
            continue;
        }

        item.excerpt = Some(excerpt);
        kept.push(item);
    }

    let removed = total - kept.len();
    info!("Excerpt enrichment dropped {} of {} items", removed, total);
    FilterOutcome { kept, removed }
}
