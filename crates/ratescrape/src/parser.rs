use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

use crate::types::{ProfessorLink, RatingDistribution};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to parse URL: {0}")]
    UrlParse(String),
}

pub(crate) const RELAY_STORE_MARKER: &str = "window.__RELAY_STORE__";

const RATINGS_DISTRIBUTION_TYPENAME: &str = "ratingsDistribution";

const UNKNOWN_NAME: &str = "Unknown";

static RE_RELAY_STORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)window\.__RELAY_STORE__\s*=\s*(\{.*?\});")
        .expect("invalid regex: relay store")
});

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses every professor card on a fully loaded search results page.
///
/// Card links are relative; they are resolved against `origin`. A card
/// without a name gets `"Unknown"`, a card without a link is skipped.
pub fn parse_professor_cards(html: &str, origin: &str) -> Result<Vec<ProfessorLink>, ParseError> {
    let base = Url::parse(origin).map_err(|e| ParseError::UrlParse(format!("{origin}: {e}")))?;

    let document = Html::parse_document(html);
    let card_sel = Selector::parse(r#"a[class*="TeacherCard__StyledTeacherCard"]"#).unwrap();
    let name_sel = Selector::parse(r#"div[class*="CardName__StyledCardName"]"#).unwrap();

    let mut links = Vec::new();

    for card in document.select(&card_sel) {
        let name = card
            .select(&name_sel)
            .next()
            .map(|e| normalize_whitespace(&elem_text(e)))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());

        let Some(href) = card.value().attr("href") else {
            log::warn!("Skipping professor card '{}' without a link", name);
            continue;
        };

        match base.join(href) {
            Ok(url) => links.push(ProfessorLink {
                name,
                profile_url: url.to_string(),
            }),
            Err(e) => log::warn!("Skipping professor card '{}' ({}): {}", name, href, e),
        }
    }

    Ok(links)
}

/// Pulls a server-rendered state object out of page markup.
pub trait StateExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Option<Value>;
}

/// Reads the JSON object assigned to `window.__RELAY_STORE__` in an inline
/// script.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayStoreExtractor;

impl StateExtractor for RelayStoreExtractor {
    fn extract(&self, html: &str) -> Option<Value> {
        let document = Html::parse_document(html);
        let script_sel = Selector::parse("script").unwrap();

        let script = document
            .select(&script_sel)
            .map(elem_text)
            .find(|text| text.contains(RELAY_STORE_MARKER))?;

        let Some(caps) = RE_RELAY_STORE.captures(&script) else {
            log::warn!("Relay store marker present but no assignment matched");
            return None;
        };

        serde_json::from_str(&caps[1])
            .inspect_err(|e| log::warn!("Relay store is not valid JSON: {}", e))
            .ok()
    }
}

/// Finds the first top-level record tagged `ratingsDistribution`.
/// Missing star counts default to 0.
pub fn find_rating_distribution(state: &Value) -> Option<RatingDistribution> {
    let dist = state.as_object()?.values().find(|value| {
        value.get("__typename").and_then(Value::as_str) == Some(RATINGS_DISTRIBUTION_TYPENAME)
    })?;

    let count = |key: &str| {
        dist.get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    };

    Some(RatingDistribution {
        r1: count("r1"),
        r2: count("r2"),
        r3: count("r3"),
        r4: count("r4"),
        r5: count("r5"),
    })
}
