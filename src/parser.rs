use scraper::{Html, Selector};
use serde_json::Value;

use crate::config::Store;
use crate::error::ScrapeError;
use crate::models::{Discount, Item};

const TITLE_FIELDS: &[&[&str]] = &[&["name"], &["displayName"], &["title"]];
const PRICE_FIELDS: &[&[&str]] = &[
    &["price", "price"],
    &["price", "current"],
    &["price", "priceInteger"],
    &["priceInfo", "currentPrice", "price"],
    &["priceInfo", "linePrice"],
    &["price"],
];
const WAS_PRICE_FIELDS: &[&[&str]] = &[
    &["price", "wasPrice"],
    &["price", "listPrice"],
    &["price", "comparisonPrice"],
    &["priceInfo", "wasPrice", "price"],
];
const DISCOUNT_FIELDS: &[&[&str]] = &[&["discountPercent"], &["price", "savingsPercent"]];
const URL_FIELDS: &[&[&str]] = &[&["productUrl"], &["canonicalUrl"], &["productCanonicalUrl"]];
const IMAGE_FIELDS: &[&[&str]] = &[
    &["imageInfo", "thumbnailUrl"],
    &["imageInfo", "thumbnail"],
    &["imageInfo", "mainUrl"],
    &["image"],
];
const SKU_FIELDS: &[&[&str]] = &[&["usItemId"], &["productId"], &["id"]];
const AVAILABILITY_FIELDS: &[&[&str]] = &[&["availabilityStatus"], &["availability"]];

/// Items normalized from one page, plus the entries that were dropped.
#[derive(Debug, Default)]
pub struct ParsedPage {
    pub items: Vec<Item>,
    pub skipped: Vec<ScrapeError>,
}

/// Normalizes every entry of a page. Bad entries are logged and skipped.
pub fn parse_page(entries: &[Value], store: &Store, page: u32, site_url: &str) -> ParsedPage {
    let mut parsed = ParsedPage::default();
    for entry in entries {
        match normalize_item(entry, store, page, site_url) {
            Ok(item) => parsed.items.push(item),
            Err(err) => {
                tracing::warn!(store = %store.slug, page, error = %err, "skipping listing");
                parsed.skipped.push(err);
            }
        }
    }
    parsed
}

/// Converts one raw search result into an [`Item`] for `store`.
///
/// # Errors
///
/// Returns [`ScrapeError::InvalidEntry`] when the entry is not an object, has
/// no usable title, or has no parseable non-negative price.
pub fn normalize_item(
    raw: &Value,
    store: &Store,
    page: u32,
    site_url: &str,
) -> Result<Item, ScrapeError> {
    let invalid = |reason: String| ScrapeError::InvalidEntry { page, reason };

    if !raw.is_object() {
        return Err(invalid(format!("expected an object, got `{raw}`")));
    }

    let title = first_text(raw, TITLE_FIELDS).ok_or_else(|| invalid("missing title".into()))?;

    let price = match first_amount(raw, PRICE_FIELDS) {
        Amount::Parsed(p) if p.is_finite() && p >= 0.0 => p,
        Amount::Parsed(p) if p.is_finite() => {
            return Err(invalid(format!("negative price {p} for `{title}`")));
        }
        Amount::Parsed(p) => return Err(invalid(format!("unparseable price `{p}` for `{title}`"))),
        Amount::Unparseable(text) => {
            return Err(invalid(format!("unparseable price `{text}` for `{title}`")));
        }
        Amount::Missing => return Err(invalid(format!("missing price for `{title}`"))),
    };

    let original_price = match first_amount(raw, WAS_PRICE_FIELDS) {
        Amount::Parsed(was) if was.is_finite() && was > 0.0 && was >= price => Some(was),
        Amount::Parsed(was) => {
            tracing::debug!(%title, price, was, "ignoring unusable pre-discount price");
            None
        }
        Amount::Unparseable(_) | Amount::Missing => None,
    };

    let source_percent = match first_amount(raw, DISCOUNT_FIELDS) {
        Amount::Parsed(pct) => Some(pct),
        Amount::Unparseable(_) | Amount::Missing => None,
    };

    Ok(Item {
        sku: first_text(raw, SKU_FIELDS),
        title,
        price,
        original_price,
        discount: Discount::resolve(price, original_price, source_percent),
        store: store.name.clone(),
        city: store.city.clone(),
        url: first_text(raw, URL_FIELDS).map(|url| absolutize(&url, site_url)),
        image_url: first_text(raw, IMAGE_FIELDS).map(|url| absolutize(&url, site_url)),
        availability: first_text(raw, AVAILABILITY_FIELDS),
    })
}

/// Pulls the `__NEXT_DATA__` JSON blob out of a server-rendered search page.
pub fn extract_next_data(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse("script#__NEXT_DATA__").ok()?;
    doc.select(&selector)
        .next()
        .map(|e| e.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
}

/// Parses a price or percentage written the way the storefront displays it:
/// `"$398.00"`, `"398,00 $"`, `"1 299,99 $"`, `"1,299.99"`, `"33%"`.
///
/// Negative amounts (`"-$5.00"`) and values too large for an `f64` are
/// rejected.
pub fn parse_amount(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let prefix = &text[..start];
    if prefix.trim_end_matches(['$', ' ', '\u{a0}']).ends_with('-') {
        return None;
    }
    // ".99" / ",50 $": the separator before the first digit is a decimal point
    if prefix.ends_with(['.', ',']) {
        let digits: String = text[start..].chars().take_while(char::is_ascii_digit).collect();
        return format!("0.{digits}").parse().ok();
    }

    let mut number = String::new();
    let mut chars = text[start..].chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '0'..='9' | ',' | '.' => number.push(c),
            // thousands separators in fr-CA formatting
            ' ' | '\u{a0}' | '\u{202f}' if chars.peek().is_some_and(char::is_ascii_digit) => {}
            _ => break,
        }
    }
    let number = number.trim_end_matches([',', '.']);

    let normalized = match (number.rfind(','), number.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => number.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => number.replace(',', ""),
        (Some(comma), None) if number.len() - comma - 1 == 3 => number.replace(',', ""),
        (Some(_), None) => number.replace(',', "."),
        (None, _) => number.to_owned(),
    };
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

enum Amount {
    Parsed(f64),
    Unparseable(String),
    Missing,
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .filter(|v| !v.is_null())
}

/// First candidate that parses wins; a present but unparseable scalar is
/// remembered so the caller can say why the entry was dropped.
fn first_amount(raw: &Value, paths: &[&[&str]]) -> Amount {
    let mut result = Amount::Missing;
    for path in paths {
        let parsed = match lookup(raw, path) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => parse_amount(s),
            _ => continue,
        };
        match parsed {
            Some(amount) => return Amount::Parsed(amount),
            None => {
                if matches!(result, Amount::Missing) {
                    let text = lookup(raw, path).map(Value::to_string).unwrap_or_default();
                    result = Amount::Unparseable(text);
                }
            }
        }
    }
    result
}

fn first_text(raw: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| match lookup(raw, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn absolutize(url: &str, site_url: &str) -> String {
    if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else if url.starts_with('/') {
        format!("{}{url}", site_url.trim_end_matches('/'))
    } else {
        url.to_owned()
    }
}
