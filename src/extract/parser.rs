//! Metric value extraction from rendered markup
//!
//! Values are the text of every element with a given tag whose `class` attribute
//! contains a given fragment, in document order. Class names on the target pages carry
//! a generated suffix that shifts between deploys, so matching is by substring.

use scraper::{Html, Selector};

/// Glyph the pages use for negative numbers
const UNICODE_MINUS: char = '\u{2212}';

/// Glyph the pages use for "no value"
const EMPTY_VALUE: char = '\u{2205}';

/// Extracts metric values from page markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueExtractor {
    element: String,
    class_fragment: String,
}

impl ValueExtractor {
    pub fn new(element: &str, class_fragment: &str) -> Self {
        Self {
            element: element.to_string(),
            class_fragment: class_fragment.to_string(),
        }
    }

    /// CSS selector matching the value elements, used to wait for the page to render
    pub fn selector(&self) -> String {
        format!(
            "{}[class*=\"{}\"]",
            self.element,
            self.class_fragment.replace('\\', "\\\\").replace('"', "\\\"")
        )
    }

    /// Returns every value on the page, in document order
    ///
    /// # Arguments
    ///
    /// * `markup` - The serialized DOM of the rendered page
    ///
    /// # Returns
    ///
    /// One entry per matching element. `None` marks an element that rendered the
    /// empty-value glyph or no text at all; it keeps its position so the columns
    /// of the row stay aligned.
    pub fn extract(&self, markup: &str) -> Vec<Option<String>> {
        let Ok(selector) = Selector::parse(&self.element) else {
            tracing::warn!("Invalid value element selector: {}", self.element);
            return Vec::new();
        };

        let document = Html::parse_document(markup);
        document
            .select(&selector)
            .filter(|element| {
                element
                    .value()
                    .attr("class")
                    .is_some_and(|class| class.contains(&self.class_fragment))
            })
            .map(|element| normalize_value(&element.text().collect::<String>()))
            .collect()
    }
}

/// Normalizes one raw value string
///
/// The Unicode minus becomes an ASCII `-`, the empty-value glyph is removed, and
/// surrounding whitespace is trimmed. Nothing left means no value.
pub fn normalize_value(raw: &str) -> Option<String> {
    let value: String = raw
        .chars()
        .filter(|&c| c != EMPTY_VALUE)
        .map(|c| if c == UNICODE_MINUS { '-' } else { c })
        .collect();
    let value = value.trim();

    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
