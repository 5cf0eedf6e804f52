use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use std::time::Duration;

use crate::browser::{wait_until, BrowserError, PageDriver, Readiness};
use crate::config::PageLayout;
use crate::status::WaitTimeStatus;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Reads the current wait time status from a page. Failures are absorbed:
/// an element timeout, a missing element and an empty reading all yield `None`.
#[async_trait]
pub trait StatusReader: Send + Sync {
    async fn read(&self, page: &dyn PageDriver) -> Option<WaitTimeStatus>;
}

pub struct WaitTimeExtractor {
    layout: PageLayout,
}

impl WaitTimeExtractor {
    pub fn new(layout: PageLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    async fn try_extract(&self, page: &dyn PageDriver) -> Result<String, BrowserError> {
        let layout = &self.layout;
        let interval = Duration::from_millis(layout.check_interval_ms);
        let summary = layout.summary_xpath();

        wait_until(
            page,
            &summary,
            Readiness::Clickable,
            Duration::from_millis(layout.section_timeout_ms),
            interval,
        )
        .await?;

        if page.is_open(&layout.details_xpath()).await? {
            tracing::debug!("'{}' menu was already open", layout.section_label);
        } else {
            page.scroll_into_view(&summary).await?;
            tokio::time::sleep(Duration::from_millis(layout.scroll_pause_ms)).await;
            page.click(&summary).await?;
            tracing::info!("Clicked on '{}' menu", layout.section_label);
            tokio::time::sleep(Duration::from_millis(layout.expand_pause_ms)).await;
        }

        wait_until(
            page,
            &layout.status_xpath,
            Readiness::Visible,
            Duration::from_millis(layout.status_timeout_ms),
            interval,
        )
        .await?;

        let text = page.inner_text(&layout.status_xpath).await?;
        let text = text.trim();
        if !text.is_empty() {
            return Ok(text.to_string());
        }

        tracing::debug!("Rendered status text is empty, falling back to markup");
        let html = page.inner_html(&layout.status_xpath).await?;
        Ok(clean_markup(&html, &layout.hidden_class))
    }
}

#[async_trait]
impl StatusReader for WaitTimeExtractor {
    async fn read(&self, page: &dyn PageDriver) -> Option<WaitTimeStatus> {
        match self.try_extract(page).await {
            Ok(text) => {
                let status = WaitTimeStatus::parse(&text);
                if status.is_none() {
                    tracing::warn!("Wait time element was found but held no text");
                }
                status
            }
            Err(e) => {
                tracing::warn!("Error extracting wait time: {}", e);
                None
            }
        }
    }
}

/// Text of an HTML fragment without the `span.<hidden_class>` subtrees
/// (screen-reader-only text), whitespace collapsed.
pub fn clean_markup(html: &str, hidden_class: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut pieces = Vec::new();

    for node in fragment.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor.value().as_element().is_some_and(|el| {
                el.name() == "span" && el.classes().any(|class| class == hidden_class)
            })
        });
        if !hidden {
            pieces.push(text.to_string());
        }
    }

    WHITESPACE
        .replace_all(&pieces.join(" "), " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeElement, FakePage};
    use std::sync::atomic::Ordering;

    fn layout() -> PageLayout {
        PageLayout::default()
    }

    fn section() -> FakeElement {
        FakeElement::default()
    }

    fn status(text: &str, html: &str) -> FakeElement {
        FakeElement {
            text: text.to_string(),
            html: html.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_markup_drops_invisible_spans() {
        let html = r#"<span class="wb-inv">Estimated wait time for personal taxes</span>
            15 minutes <span class="glyphicon wb-inv">(opens in a new window)</span>"#;
        assert_eq!(clean_markup(html, "wb-inv"), "15 minutes");
    }

    #[test]
    fn test_clean_markup_keeps_visible_spans_and_collapses_whitespace() {
        let html = "<strong>Not</strong>\n\n   <span class=\"label\">available</span>";
        assert_eq!(clean_markup(html, "wb-inv"), "Not available");
    }

    #[test]
    fn test_clean_markup_only_strips_spans() {
        let html = r#"<em class="wb-inv">Closed</em><span class="wb-inv">hidden</span>"#;
        assert_eq!(clean_markup(html, "wb-inv"), "Closed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expands_collapsed_section_and_reads_text() {
        let layout = layout();
        let page = FakePage::default()
            .with_element(&layout.summary_xpath(), section())
            .with_element(&layout.status_xpath, status("  Wait time: 15 minutes ", ""));

        let extractor = WaitTimeExtractor::new(layout.clone());
        let result = extractor.read(&page).await.unwrap();

        assert_eq!(result.as_str(), "Wait time: 15 minutes");
        assert_eq!(page.clicks(), vec![layout.summary_xpath()]);
        assert_eq!(page.scrolls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_section_is_not_clicked() {
        let layout = layout();
        let page = FakePage::default()
            .with_element(&layout.summary_xpath(), section())
            .with_open(&layout.details_xpath())
            .with_element(&layout.status_xpath, status("Wait time: Not available", ""));

        let extractor = WaitTimeExtractor::new(layout);
        let result = extractor.read(&page).await.unwrap();

        assert!(result.is_unavailable());
        assert!(page.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_text_falls_back_to_markup() {
        let layout = layout();
        let page = FakePage::default()
            .with_element(&layout.summary_xpath(), section())
            .with_element(
                &layout.status_xpath,
                status(
                    "   ",
                    r#"<span class="wb-inv">Wait time for </span>20 minutes"#,
                ),
            );

        let extractor = WaitTimeExtractor::new(layout);
        assert_eq!(extractor.read(&page).await.unwrap().as_str(), "20 minutes");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_status_element_yields_none_after_timeout() {
        let layout = layout();
        let page = FakePage::default().with_element(&layout.summary_xpath(), section());

        let extractor = WaitTimeExtractor::new(layout.clone());
        let start = tokio::time::Instant::now();
        assert!(extractor.read(&page).await.is_none());

        let expected = Duration::from_millis(
            layout.scroll_pause_ms + layout.expand_pause_ms + layout.status_timeout_ms,
        );
        assert_eq!(start.elapsed(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_section_yields_none_without_click() {
        let layout = layout();
        let page = FakePage::default();

        let extractor = WaitTimeExtractor::new(layout);
        assert!(extractor.read(&page).await.is_none());
        assert!(page.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_markup_yields_none() {
        let layout = layout();
        let page = FakePage::default()
            .with_element(&layout.summary_xpath(), section())
            .with_element(
                &layout.status_xpath,
                status("", r#"<span class="wb-inv">Wait time</span>"#),
            );

        let extractor = WaitTimeExtractor::new(layout);
        assert!(extractor.read(&page).await.is_none());
    }
}
