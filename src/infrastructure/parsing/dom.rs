//! Selector helpers shared by the layout extractors.
//!
//! Every lookup returns an `Option`; callers decide the default.

use scraper::{ElementRef, Selector};

use super::error::{ParsingError, ParsingResult};

pub fn compile(selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector).map_err(|e| ParsingError::invalid_selector(selector, e.to_string()))
}

/// Compiles an ordered fallback list
pub fn compile_all(selectors: &[&str]) -> ParsingResult<Vec<Selector>> {
    selectors.iter().map(|s| compile(s)).collect()
}

/// A selector paired with the attribute to read from its match
pub struct AttrRule {
    pub selector: Selector,
    pub attr: &'static str,
}

impl AttrRule {
    pub fn new(selector: &str, attr: &'static str) -> ParsingResult<Self> {
        Ok(Self {
            selector: compile(selector)?,
            attr,
        })
    }
}

/// Text of the element with every whitespace run collapsed to one space
/// and the ends trimmed
pub fn normalized_text(element: ElementRef<'_>) -> Option<String> {
    let joined = element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}

pub fn text_of(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).next().and_then(normalized_text)
}

pub fn attr_of(element: ElementRef<'_>, attr: &str) -> Option<String> {
    element
        .value()
        .attr(attr)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// First non-blank attribute value across the rules, tried in order
pub fn first_attr(scope: ElementRef<'_>, rules: &[AttrRule]) -> Option<String> {
    rules.iter().find_map(|rule| {
        scope
            .select(&rule.selector)
            .find_map(|element| attr_of(element, rule.attr))
    })
}

/// First `href` found by the fallback selectors
pub fn first_href(scope: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        scope
            .select(selector)
            .find_map(|element| attr_of(element, "href"))
    })
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
