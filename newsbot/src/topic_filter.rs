use crate::ledger::Ledger;
use crate::llm_adapter::{is_on_topic, LlmAdapter};
use crate::types::{CandidateItem, FilterOutcome};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

const AI_KEYWORDS: &[&str] = &[
    " ML ", " AI ", " AI-", " GAN ", " KNN ", " NLP ", " CNN ", "LLM",
    " Machine Learning ", " Artificial Intelligence ", " Neural Networks ", " Deep Learning ",
    " Data Science ", " Algorithm ", " Automation ", " Predictive Modeling ",
    " Natural Language Processing ", " Reinforcement Learning ",
    " Supervised Learning ", " Unsupervised Learning ", " Semi-Supervised Learning ",
    " Ensemble Learning ", " Transfer Learning ", " Convolutional Neural Networks ",
    " Recurrent Neural Networks ", " Generative Adversarial Networks ",
    " Feature Engineering ", " Gradient Descent ", " Overfitting ", " Bias-Variance Tradeoff ",
    " Hyperparameters ", " Backpropagation ",
    " ChatGPT ", "GPT", "llama2", "llama", "PaLM", " BART ",
];

/// Lower-cased keywords plus their leading-space and trailing-space variants.
fn ai_keywords() -> &'static [String] {
    static KEYWORDS: OnceLock<Vec<String>> = OnceLock::new();
    KEYWORDS.get_or_init(|| {
        let mut keywords: Vec<String> = AI_KEYWORDS.iter().map(|k| k.to_lowercase()).collect();
        for keyword in AI_KEYWORDS {
            let clean = keyword.trim().to_lowercase();
            keywords.push(format!(" {}", clean));
            keywords.push(format!("{} ", clean));
        }
        keywords
    })
}

pub fn contains_ai_keyword(text: &str) -> bool {
    let text = text.to_lowercase();
    ai_keywords().iter().any(|keyword| text.contains(keyword.as_str()))
}

fn outcome(stage: &str, total: usize, kept: Vec<CandidateItem>) -> FilterOutcome {
    let removed = total - kept.len();
    info!("Filtered out {} of {} in {}", removed, total, stage);
    FilterOutcome { kept, removed }
}

pub fn filter_by_keywords_in_title(items: Vec<CandidateItem>) -> FilterOutcome {
    let total = items.len();
    let kept = items.into_iter().filter(|item| contains_ai_keyword(&item.title)).collect();
    outcome("keyword title filter", total, kept)
}

/// With `keep_matching` only titles matching `pattern` survive; without it
/// matching titles are dropped.
pub fn filter_by_title_regex(items: Vec<CandidateItem>, pattern: &Regex, keep_matching: bool) -> FilterOutcome {
    let total = items.len();
    let kept = items
        .into_iter()
        .filter(|item| pattern.is_match(&item.title) == keep_matching)
        .collect();
    outcome("title pattern filter", total, kept)
}

/// Delete every span of the title matching `pattern`.
pub fn strip_title(items: &mut [CandidateItem], pattern: &Regex) {
    for item in items.iter_mut() {
        let stripped = pattern.replace_all(&item.title, "").trim().to_string();
        if stripped.is_empty() {
            debug!("Stripping would empty the title of {}, keeping it", item.url);
            continue;
        }
        item.title = stripped;
    }
}

/// Drop URLs an earlier run classified as off-topic.
pub async fn filter_previously_rejected(items: Vec<CandidateItem>, ledger: &Ledger) -> FilterOutcome {
    let total = items.len();
    let mut kept = Vec::with_capacity(total);

    for item in items {
        match ledger.is_rejected(&item.url).await {
            Ok(true) => debug!("Previously rejected: {}", item.url),
            Ok(false) => kept.push(item),
            Err(e) => {
                warn!("Rejection lookup failed for {}, keeping it: {}", item.url, e);
                kept.push(item);
            }
        }
    }

    outcome("off-topic memo", total, kept)
}

/// Keep items whose excerpt is rated on-topic. Items rated off-topic are
/// remembered in the ledger so later runs skip them without another
/// classification call.
pub async fn filter_by_ai_content(items: Vec<CandidateItem>, llm: &dyn LlmAdapter, ledger: &Ledger) -> FilterOutcome {
    let total = items.len();
    let mut kept = Vec::with_capacity(total);

    for item in items {
        let Some(excerpt) = item.excerpt.as_deref().filter(|e| !e.is_empty()) else {
            continue;
        };
        // Skip the classification call when no keyword appears at all.
        if !contains_ai_keyword(excerpt) {
            continue;
        }

        match llm.rate_topic(excerpt).await {
            Ok(rating) if is_on_topic(rating) => kept.push(item),
            Ok(rating) => {
                debug!("Rated {:?}, off-topic: {}", rating, item.url);
                if let Err(e) = ledger.mark_rejected(&item.url).await {
                    warn!("Could not remember off-topic {}: {}", item.url, e);
                }
            }
            Err(e) => warn!("Topic classification failed for {}: {}", item.url, e),
        }
    }

    outcome("AI content filter", total, kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str) -> CandidateItem {
        CandidateItem::new(title, format!("https://a.com/{}", title.len()))
    }

    #[test]
    fn keyword_variants_match_at_title_edges() {
        assert!(contains_ai_keyword("AI beats humans at chess"));
        assert!(contains_ai_keyword("New llama release"));
        assert!(contains_ai_keyword("Why we love machine learning"));
        assert!(!contains_ai_keyword("Gardening tips for spring"));
        // "ai" inside a word is not a keyword hit
        assert!(!contains_ai_keyword("Fresh pain au chocolat"));
    }

    #[test]
    fn title_regex_keeps_or_drops_matches() {
        let pattern = Regex::new("(?i)sponsored").unwrap();
        let items = vec![item("Sponsored: buy now"), item("Real news")];

        let kept = filter_by_title_regex(items.clone(), &pattern, true);
        assert_eq!(kept.kept.len(), 1);
        assert_eq!(kept.kept[0].title, "Sponsored: buy now");

        let dropped = filter_by_title_regex(items, &pattern, false);
        assert_eq!(dropped.removed, 1);
        assert_eq!(dropped.kept[0].title, "Real news");
    }

    #[test]
    fn strip_title_removes_suffix() {
        let pattern = Regex::new(r"\s*\|\s*Site Name$").unwrap();
        let mut items = vec![item("Big story | Site Name"), item("| Site Name")];
        strip_title(&mut items, &pattern);
        assert_eq!(items[0].title, "Big story");
        assert_eq!(items[1].title, "| Site Name");
    }
}
