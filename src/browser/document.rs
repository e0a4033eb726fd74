//! Pure helpers over a rendered HTML document
//!
//! These never hold a parsed document past the call, so sessions can keep the
//! raw HTML as a `String` and stay `Send`.

use crate::browser::{BrowserError, Locator};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Returns true if `locator` matches at least one element
pub fn contains(html: &str, locator: &Locator) -> bool {
    count(html, locator) > 0
}

/// Counts the elements matching `locator`
pub fn count(html: &str, locator: &Locator) -> usize {
    let document = Html::parse_document(html);
    document.select(locator.selector()).count()
}

/// Resolves where activating the `index`-th match of `locator` leads
///
/// A control is followable when it carries an `href`, a `data-href`, or wraps
/// an `<a href>`. Relative targets are resolved against `base`.
pub fn activation_target(
    html: &str,
    base: Option<&Url>,
    locator: &Locator,
    index: usize,
) -> Result<Url, BrowserError> {
    let document = Html::parse_document(html);

    let element = document
        .select(locator.selector())
        .nth(index)
        .ok_or_else(|| BrowserError::ElementNotFound {
            selector: locator.as_str().to_string(),
            index,
        })?;

    let href = link_of(&element).ok_or_else(|| BrowserError::NotInteractable {
        selector: locator.as_str().to_string(),
    })?;

    resolve(href.trim(), base)
}

/// Finds the link an element points at
fn link_of(element: &ElementRef<'_>) -> Option<String> {
    let value = element.value();
    if let Some(href) = value.attr("href").or_else(|| value.attr("data-href")) {
        return Some(href.to_string());
    }

    let anchor = Selector::parse("a[href]").ok()?;
    element
        .select(&anchor)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string)
}

/// Resolves an href to an absolute URL
fn resolve(href: &str, base: Option<&Url>) -> Result<Url, BrowserError> {
    let invalid = |e: url::ParseError| BrowserError::InvalidUrl {
        url: href.to_string(),
        message: e.to_string(),
    };

    if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
        return Err(BrowserError::InvalidUrl {
            url: href.to_string(),
            message: "not a navigable link".to_string(),
        });
    }

    match base {
        Some(base) => base.join(href).map_err(invalid),
        None => Url::parse(href).map_err(invalid),
    }
}
