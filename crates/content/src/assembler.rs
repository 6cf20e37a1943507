//! Grounding-context assembly.
//!
//! Reads the full content corpus, scores every item against the user's
//! query, and renders the winners as labeled blocks under a hard
//! character ceiling. Assembly never fails: an empty or unreadable
//! corpus degrades to empty context, because grounding is an
//! enhancement for a chat reply, not a prerequisite.

use crate::html;
use crate::source::{ContentItem, ContentSource, Priority};
use tracing::{debug, warn};

/// Query terms shorter than this are ignored by the scorer.
const MIN_TERM_LEN: usize = 2;
/// Score for a term match in the item title.
const TITLE_WEIGHT: u32 = 10;
/// Score for a term match in the item summary.
const SUMMARY_WEIGHT: u32 = 5;
/// Score for a term match in the item body.
const BODY_WEIGHT: u32 = 1;
/// Number of scored items included beyond the always-include set.
const MAX_SCORED_ITEMS: usize = 5;
/// Per-item excerpt ceiling, in characters.
const EXCERPT_CAP: usize = 1_000;

/// Marker appended when the assembled context hits the global ceiling.
const TRUNCATION_MARKER: &str = "\n\n[Content truncated]";

/// The context assembler. Stateless apart from its configuration —
/// create one and reuse it.
pub struct ContextAssembler<S> {
    source: S,
    max_chars: usize,
}

impl<S: ContentSource> ContextAssembler<S> {
    /// Create an assembler over a content source with a global
    /// character ceiling.
    pub fn new(source: S, max_chars: usize) -> Self {
        Self { source, max_chars }
    }

    /// Build the grounding context text for a query.
    ///
    /// High-priority items are always included; the rest are scored and
    /// the top five positive scorers join them. When nothing scores and
    /// nothing is high-priority, the whole corpus is used — on a small
    /// site some context beats none.
    pub async fn build_context(&self, query: &str) -> String {
        let items = match self.source.load_all().await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Content source read failed; using empty context");
                return String::new();
            }
        };
        if items.is_empty() {
            return String::new();
        }

        let terms = query_terms(query);

        let (always, scored): (Vec<&ContentItem>, Vec<&ContentItem>) =
            items.iter().partition(|i| i.priority == Priority::High);

        let mut ranked: Vec<(&ContentItem, u32)> = scored
            .iter()
            .map(|item| (*item, score_item(item, &terms)))
            .filter(|(_, score)| *score > 0)
            .collect();
        // Stable sort: ties retain corpus order.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(MAX_SCORED_ITEMS);

        let selected: Vec<&ContentItem> = if always.is_empty() && ranked.is_empty() {
            debug!("No scoring items and no always-include items; falling back to full corpus");
            items.iter().collect()
        } else {
            always
                .into_iter()
                .chain(ranked.into_iter().map(|(item, _)| item))
                .collect()
        };

        debug!(
            selected = selected.len(),
            corpus = items.len(),
            "Assembled grounding context"
        );

        let blocks: Vec<String> = selected.iter().map(|item| render_block(item)).collect();
        let text = format!("Website content:\n\n{}", blocks.join("\n\n"));

        truncate(&text, self.max_chars)
    }
}

/// Lower-cased query terms longer than the minimum length.
fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > MIN_TERM_LEN)
        .map(str::to_string)
        .collect()
}

/// Score one item against the query terms.
fn score_item(item: &ContentItem, terms: &[String]) -> u32 {
    let title = item.title.to_lowercase();
    let summary = item.summary.as_deref().unwrap_or("").to_lowercase();
    let body = html::to_plain_text(&item.body).to_lowercase();

    let mut score = 0;
    for term in terms {
        if title.contains(term.as_str()) {
            score += TITLE_WEIGHT;
        }
        if summary.contains(term.as_str()) {
            score += SUMMARY_WEIGHT;
        }
        if body.contains(term.as_str()) {
            score += BODY_WEIGHT;
        }
    }
    // The priority bonus breaks ties between matching items; it never
    // drags a non-matching item into the selection.
    if score == 0 {
        return 0;
    }
    score
        + match item.priority {
            Priority::High => 0, // always-include, never scored in practice
            Priority::Medium => 1,
            Priority::Low => 0,
        }
}

/// Render one item as a labeled block with a capped excerpt.
fn render_block(item: &ContentItem) -> String {
    let body = html::to_plain_text(&item.body);
    let excerpt: String = if body.chars().count() > EXCERPT_CAP {
        let cut: String = body.chars().take(EXCERPT_CAP).collect();
        format!("{cut}...")
    } else {
        body
    };

    let mut block = format!("[{}] {} ({})", item.kind.label(), item.title, item.path);
    if let Some(summary) = &item.summary {
        block.push_str(&format!("\nSummary: {summary}"));
    }
    block.push_str(&format!("\n{excerpt}"));
    block
}

/// Apply the global ceiling: cut at a character boundary and append the
/// explicit truncation marker. Independent of per-item caps — a hard
/// bound on request latency and provider cost regardless of corpus
/// size.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(TRUNCATION_MARKER.chars().count());
    let cut: String = text.chars().take(keep).collect();
    format!("{cut}{TRUNCATION_MARKER}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ContentKind, StaticSource};

    fn item(title: &str, body: &str, priority: Priority) -> ContentItem {
        ContentItem {
            title: title.into(),
            path: format!("/{}", title.to_lowercase().replace(' ', "-")),
            kind: ContentKind::Page,
            priority,
            summary: None,
            body: body.into(),
        }
    }

    fn assembler(items: Vec<ContentItem>) -> ContextAssembler<StaticSource> {
        ContextAssembler::new(StaticSource::new(items), 8_000)
    }

    #[tokio::test]
    async fn title_match_outranks_body_match() {
        let ctx = assembler(vec![
            item("Consulting", "We do many things.", Priority::Medium),
            item("About", "Our consulting heritage goes back decades.", Priority::Medium),
        ])
        .build_context("consulting rates")
        .await;

        let title_pos = ctx.find("Consulting (").unwrap();
        let about_pos = ctx.find("About (").unwrap();
        assert!(title_pos < about_pos);
    }

    #[tokio::test]
    async fn high_priority_included_without_score() {
        let ctx = assembler(vec![
            item("Legal notice", "Impressum text.", Priority::High),
            item("Blogpost", "Totally unrelated ramblings.", Priority::Medium),
        ])
        .build_context("quantum gardening")
        .await;

        assert!(ctx.contains("Legal notice"));
        assert!(!ctx.contains("Blogpost"));
    }

    #[tokio::test]
    async fn zero_scores_fall_back_to_full_corpus() {
        let ctx = assembler(vec![
            item("One", "alpha", Priority::Medium),
            item("Two", "beta", Priority::Low),
        ])
        .build_context("quantum gardening")
        .await;

        assert!(ctx.contains("One"));
        assert!(ctx.contains("Two"));
    }

    #[tokio::test]
    async fn top_five_scoring_items_kept() {
        let mut items: Vec<ContentItem> = (0..8)
            .map(|i| item(&format!("Page{i}"), "widgets for sale", Priority::Medium))
            .collect();
        // One item that scores higher via the title.
        items.push(item("Widgets", "the widgets page", Priority::Medium));

        let ctx = assembler(items).build_context("widgets").await;

        assert!(ctx.contains("Widgets ("));
        // 6 blocks total would exceed the cap of 5.
        let blocks = ctx.matches("[Page]").count();
        assert_eq!(blocks, 5);
    }

    #[tokio::test]
    async fn ties_retain_corpus_order() {
        let ctx = assembler(vec![
            item("First", "widgets here", Priority::Medium),
            item("Second", "widgets here", Priority::Medium),
        ])
        .build_context("widgets")
        .await;

        assert!(ctx.find("First").unwrap() < ctx.find("Second").unwrap());
    }

    #[tokio::test]
    async fn empty_corpus_gives_empty_context() {
        let ctx = assembler(vec![]).build_context("anything").await;
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn long_bodies_get_excerpt_cap() {
        let long_body = "services ".repeat(400); // well past the cap
        let ctx = assembler(vec![item("Services", &long_body, Priority::Medium)])
            .build_context("services")
            .await;
        assert!(ctx.contains("..."));
    }

    #[tokio::test]
    async fn global_ceiling_is_enforced() {
        let long_body = "alpha beta gamma ".repeat(200);
        let items: Vec<ContentItem> = (0..6)
            .map(|i| item(&format!("Doc{i}"), &long_body, Priority::High))
            .collect();

        let assembler = ContextAssembler::new(StaticSource::new(items), 2_000);
        let ctx = assembler.build_context("alpha").await;

        assert!(ctx.chars().count() <= 2_000);
        assert!(ctx.ends_with("[Content truncated]"));
    }

    #[test]
    fn truncate_is_noop_under_limit() {
        assert_eq!(truncate("short", 100), "short");
    }

    #[test]
    fn truncate_appends_marker() {
        let out = truncate(&"x".repeat(500), 100);
        assert!(out.chars().count() <= 100);
        assert!(out.ends_with("[Content truncated]"));
    }

    #[test]
    fn query_terms_drop_short_words() {
        let terms = query_terms("Do you do AI consulting?");
        assert_eq!(terms, vec!["you", "consulting"]);
    }
}
