//! Trustpilot public review pages
//!
//! Pages are plain HTML. Class names on the site are generated and change
//! between deployments, so every field is located through an ordered list of
//! fallback selectors and the first one producing usable text wins.

use std::sync::Arc;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, warn};

use super::{PageRequest, SourceClient, SourcePage};
use crate::domain::{NextPage, ProviderError, RawPayload, Region, SourceKind, StoreReview};
use crate::infrastructure::http_client::{HttpClient, PageBody};

const CARD_SELECTORS: &[&str] = &[
    "div[class^='styles_cardWrapper']",
    "article[data-service-review-card-paper]",
    "article[class*='reviewCard']",
];

const RATING_SELECTORS: &[&str] = &[
    "div[class*='star-rating'] img",
    "div[data-service-review-rating] img",
    "img[alt*='star']",
    "img[alt*='Rated']",
    "div[class*='rating'] img",
    "[class*='stars'] img",
    "div[data-service-review-rating]",
];

const TITLE_SELECTORS: &[&str] = &[
    "h2[data-service-review-title-typography='true']",
    "h2[class^='typography_heading']",
    "h3[class^='typography_heading']",
    "h2[class*='heading']",
    "h3[class*='heading']",
    "div[data-service-review-title-typography='true']",
    "span[data-service-review-title-typography='true']",
    "[class*='review-title']",
    "[class*='reviewTitle']",
];

const BODY_SELECTORS: &[&str] = &[
    "div[data-service-review-text-typography='true']",
    "p[data-service-review-text-typography='true']",
    "div[class*='review-content']",
    "p[class*='review-content']",
    "div[class^='typography_body-l']",
    "p[class^='typography_body-l']",
    "div[class^='typography_body']",
    "p[class^='typography_body']",
    "span[class*='typography_body']",
];

const AUTHOR_SELECTORS: &[&str] = &[
    "span[data-consumer-name-typography='true']",
    "[class*='consumerName']",
    "a[name='consumer-profile'] span",
];

const NOT_FOUND_SELECTORS: &[&str] = &["div[class^='errors_error404']"];

const RATING_ATTRIBUTES: &[&str] = &["data-rating", "data-stars", "data-score"];

lazy_static! {
    /// Patterns that pull a star count out of alt text or class names.
    static ref RATING_PATTERNS: Vec<Regex> = [
        r"(?i)rated (\d+)",
        r"(?i)(\d+) out of",
        r"(?i)(\d+) star",
        r"(?i)rating-(\d+)",
        r"(?i)stars-(\d+)",
        r"(?i)star-(\d+)",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect();

    /// Text that looks like card metadata rather than a title or review.
    static ref METADATA_TEXT: Vec<Regex> = [
        r"(?i)^\d+\s*(star|stars|out of)",
        r"^\d{1,2}[/-]\d{1,2}[/-]\d{2,4}",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect();

    static ref PARSER: ReviewPageParser = ReviewPageParser::new();
}

/// Compiled selector sets for review pages.
pub struct ReviewPageParser {
    cards: Vec<Selector>,
    rating: Vec<Selector>,
    rating_fallback: Vec<Selector>,
    title: Vec<Selector>,
    headings: Vec<Selector>,
    body: Vec<Selector>,
    body_fallback: Vec<Selector>,
    author: Vec<Selector>,
    time: Vec<Selector>,
    not_found: Vec<Selector>,
}

impl ReviewPageParser {
    pub fn new() -> Self {
        Self {
            cards: compile_selectors(CARD_SELECTORS),
            rating: compile_selectors(RATING_SELECTORS),
            rating_fallback: compile_selectors(&["[class*='rating'], [class*='star'], [data-rating]"]),
            title: compile_selectors(TITLE_SELECTORS),
            headings: compile_selectors(&["h1, h2, h3, h4, h5, h6"]),
            body: compile_selectors(BODY_SELECTORS),
            body_fallback: compile_selectors(&["div, p"]),
            author: compile_selectors(AUTHOR_SELECTORS),
            time: compile_selectors(&["time"]),
            not_found: compile_selectors(NOT_FOUND_SELECTORS),
        }
    }

    /// True when the document is the site's "page not found" screen.
    pub fn is_not_found(&self, html: &Html) -> bool {
        self.not_found
            .iter()
            .any(|selector| html.select(selector).next().is_some())
    }

    pub fn parse(&self, html: &Html) -> Vec<StoreReview> {
        for selector in &self.cards {
            let reviews: Vec<StoreReview> = html
                .select(selector)
                .map(|card| self.parse_card(card))
                .collect();
            if !reviews.is_empty() {
                return reviews;
            }
        }
        Vec::new()
    }

    fn parse_card(&self, card: ElementRef<'_>) -> StoreReview {
        let title = first_text(card, &self.title, 2).or_else(|| {
            find_text(card, &self.headings, |text| {
                text.chars().count() > 3 && text.chars().count() < 200 && !is_metadata(text)
            })
        });
        let body = first_text(card, &self.body, 10).or_else(|| {
            find_text(card, &self.body_fallback, |text| {
                let lower = text.to_lowercase();
                text.chars().count() > 20
                    && !is_metadata(text)
                    && !lower.contains("verified")
                    && !lower.contains("helpful")
            })
        });
        let date = self
            .time
            .iter()
            .flat_map(|selector| card.select(selector))
            .find_map(|element| element.value().attr("datetime"))
            .map(str::to_string);

        StoreReview {
            author: first_text(card, &self.author, 0),
            rating: self.rating(card).map(Value::from),
            title,
            body,
            date,
            ..StoreReview::default()
        }
    }

    fn rating(&self, card: ElementRef<'_>) -> Option<u8> {
        for selector in &self.rating {
            let Some(element) = card.select(selector).next() else {
                continue;
            };
            if let Some(rating) = element.value().attr("alt").and_then(rating_from_text) {
                return Some(rating);
            }
            if let Some(rating) = rating_from_attributes(element) {
                return Some(rating);
            }
        }

        self.rating_fallback
            .iter()
            .flat_map(|selector| card.select(selector))
            .find_map(|element| {
                element
                    .value()
                    .attr("class")
                    .and_then(rating_from_text)
                    .or_else(|| rating_from_attributes(element))
            })
    }
}

impl Default for ReviewPageParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one review page with the shared selector set.
pub fn parse_review_page(html: &str) -> Vec<StoreReview> {
    PARSER.parse(&Html::parse_document(html))
}

fn compile_selectors(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|raw| match Selector::parse(raw) {
            Ok(selector) => Some(selector),
            Err(e) => {
                warn!("Failed to compile selector '{}': {}", raw, e);
                None
            }
        })
        .collect()
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First element text longer than `min_chars` across the selector list.
fn first_text(card: ElementRef<'_>, selectors: &[Selector], min_chars: usize) -> Option<String> {
    find_text(card, selectors, |text| text.chars().count() > min_chars)
}

fn find_text<F>(card: ElementRef<'_>, selectors: &[Selector], accept: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    selectors
        .iter()
        .flat_map(|selector| card.select(selector))
        .map(element_text)
        .find(|text| !text.is_empty() && accept(text))
}

fn is_metadata(text: &str) -> bool {
    METADATA_TEXT.iter().any(|pattern| pattern.is_match(text))
}

fn rating_from_text(text: &str) -> Option<u8> {
    RATING_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(text)?
            .get(1)?
            .as_str()
            .parse::<u8>()
            .ok()
            .filter(|rating| (1..=5).contains(rating))
    })
}

fn rating_from_attributes(element: ElementRef<'_>) -> Option<u8> {
    RATING_ATTRIBUTES.iter().find_map(|attr| {
        element
            .value()
            .attr(attr)?
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|rating| (1..=5).contains(rating))
    })
}

pub struct TrustpilotClient {
    http: Arc<HttpClient>,
    domain: String,
}

impl TrustpilotClient {
    /// `domain` is the reviewed company's domain, e.g. `example.com`.
    pub fn new(http: Arc<HttpClient>, domain: impl Into<String>) -> Self {
        Self {
            http,
            domain: domain.into(),
        }
    }

    pub fn page_url(&self, region: &Region, page_index: u32) -> String {
        let host = match region.as_str() {
            "us" | "www" | "" => "www".to_string(),
            other => other.to_string(),
        };
        let base = format!("https://{}.trustpilot.com/review/{}", host, self.domain);
        if page_index <= 1 {
            base
        } else {
            format!("{base}?page={page_index}")
        }
    }
}

#[async_trait]
impl SourceClient for TrustpilotClient {
    fn kind(&self) -> SourceKind {
        SourceKind::Trustpilot
    }

    async fn request(&self, region: &Region, page: &PageRequest) -> Result<SourcePage, ProviderError> {
        let url = self.page_url(region, page.page_index);
        let html = match self.http.get_page(&url).await? {
            PageBody::Found(html) => html,
            PageBody::NotFound => {
                debug!("Trustpilot {} page {} not found", region, page.page_index);
                return Ok(SourcePage::end());
            }
        };

        let (reviews, not_found) = {
            let document = Html::parse_document(&html);
            (PARSER.parse(&document), PARSER.is_not_found(&document))
        };
        if not_found {
            return Ok(SourcePage::end());
        }

        debug!(
            "Trustpilot {} page {}: {} reviews",
            region,
            page.page_index,
            reviews.len()
        );
        Ok(SourcePage::new(
            reviews.into_iter().map(RawPayload::Trustpilot).collect(),
            NextPage::Index,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="styles_cardWrapper__abc">
            <span data-consumer-name-typography="true">Erin</span>
            <div data-service-review-rating="4"><img alt="Rated 4 out of 5 stars"></div>
            <time datetime="2024-03-05T08:00:00.000Z">Mar 5</time>
            <h2 data-service-review-title-typography="true">Solid service</h2>
            <p data-service-review-text-typography="true">Delivery was quick and support answered fast.</p>
          </div>
          <div class="styles_cardWrapper__abc">
            <div class="star-rating stars-2"></div>
            <h3>Not great at all</h3>
            <p>My parcel arrived two weeks late and damaged.</p>
          </div>
        </body></html>
    "#;

    #[test]
    fn parses_cards_with_primary_selectors() {
        let reviews = parse_review_page(PAGE);
        assert_eq!(reviews.len(), 2);
        let first = &reviews[0];
        assert_eq!(first.author.as_deref(), Some("Erin"));
        assert_eq!(first.rating, Some(Value::from(4u8)));
        assert_eq!(first.title.as_deref(), Some("Solid service"));
        assert_eq!(
            first.body.as_deref(),
            Some("Delivery was quick and support answered fast.")
        );
        assert_eq!(first.date.as_deref(), Some("2024-03-05T08:00:00.000Z"));
    }

    #[test]
    fn falls_back_to_class_names_and_generic_text() {
        let reviews = parse_review_page(PAGE);
        let second = &reviews[1];
        assert_eq!(second.rating, Some(Value::from(2u8)));
        assert_eq!(second.title.as_deref(), Some("Not great at all"));
        assert_eq!(
            second.body.as_deref(),
            Some("My parcel arrived two weeks late and damaged.")
        );
        assert_eq!(second.author, None);
    }

    #[test]
    fn rating_text_patterns() {
        assert_eq!(rating_from_text("Rated 3 out of 5 stars"), Some(3));
        assert_eq!(rating_from_text("5 star review"), Some(5));
        assert_eq!(rating_from_text("star-rating"), None);
        assert_eq!(rating_from_text("Rated 9"), None);
    }

    #[test]
    fn page_without_cards_is_empty() {
        assert!(parse_review_page("<html><body><p>nothing</p></body></html>").is_empty());
    }

    #[test]
    fn not_found_screen_is_detected() {
        let html = Html::parse_document(r#"<div class="errors_error404__x">Gone</div>"#);
        assert!(PARSER.is_not_found(&html));
    }

    #[test]
    fn page_url_per_region() {
        let http = Arc::new(HttpClient::new(Default::default()).unwrap());
        let client = TrustpilotClient::new(http, "example.com");
        assert_eq!(
            client.page_url(&Region::new("us"), 1),
            "https://www.trustpilot.com/review/example.com"
        );
        assert_eq!(
            client.page_url(&Region::new("uk"), 3),
            "https://uk.trustpilot.com/review/example.com?page=3"
        );
    }
}
