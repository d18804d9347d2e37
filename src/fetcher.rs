use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};
use serde_json::Value;

use crate::config::{FetchSettings, Store};
use crate::error::ScrapeError;
use crate::parser;

/// One search-results page as returned by the endpoint, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    /// 1-based page number.
    pub number: u32,
    pub entries: Vec<Value>,
}

/// Anything that can hand back the raw listing entries for one page.
///
/// The HTTP implementation is [`HttpSource`]; tests substitute scripted ones.
pub trait PageSource {
    fn fetch_page(
        &self,
        store: &Store,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Value>, ScrapeError>;
}

/// Blocking client for the store-scoped catalog search endpoint.
pub struct HttpSource {
    client: Client,
    endpoint: String,
    max_retries: u32,
    backoff_base: Duration,
}

impl HttpSource {
    pub fn new(settings: &FetchSettings) -> Result<Self, ScrapeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("fr-CA,fr;q=0.9,en;q=0.8"),
        );
        headers.insert(REFERER, HeaderValue::from_static("https://www.walmart.ca/"));

        let client = Client::builder()
            .timeout(settings.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            max_retries: settings.max_retries,
            backoff_base: settings.backoff_base,
        })
    }

    fn request_once(
        &self,
        store: &Store,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Value>, ScrapeError> {
        let page = page.to_string();
        let page_size = page_size.to_string();
        let params = [
            ("query", query),
            ("page", page.as_str()),
            ("pageSize", page_size.as_str()),
            ("storeId", store.store_id.as_str()),
            ("sort", "relevance"),
            ("enableStoreSelection", "true"),
        ];
        tracing::debug!(endpoint = %self.endpoint, ?params, "GET");

        let response = self.client.get(&self.endpoint).query(&params).send()?;
        let status = response.status();
        let url = response.url().to_string();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ScrapeError::RateLimited {
                url,
                retry_after_secs,
            });
        }
        if !status.is_success() {
            return Err(ScrapeError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text()?;
        decode_payload(&body, &url)
    }
}

impl PageSource for HttpSource {
    fn fetch_page(
        &self,
        store: &Store,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Value>, ScrapeError> {
        retry_with_backoff(self.max_retries, self.backoff_base, || {
            self.request_once(store, query, page, page_size)
        })
    }
}

/// Runs `operation`, retrying transient failures up to `max_retries` more
/// times and sleeping [`retry_delay`] between attempts.
pub(crate) fn retry_with_backoff<T, F>(
    max_retries: u32,
    backoff_base: Duration,
    mut operation: F,
) -> Result<T, ScrapeError>
where
    F: FnMut() -> Result<T, ScrapeError>,
{
    let mut attempt = 0u32;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() || attempt >= max_retries => return Err(err),
            Err(err) => {
                let delay = retry_delay(&err, backoff_base, attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient fetch error, retrying"
                );
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

/// `backoff_base * 2^attempt`, or the server's `Retry-After` when that is longer.
pub(crate) fn retry_delay(err: &ScrapeError, backoff_base: Duration, attempt: u32) -> Duration {
    let backoff = backoff_base.saturating_mul(1u32 << attempt.min(16));
    match err {
        ScrapeError::RateLimited {
            retry_after_secs, ..
        } => backoff.max(Duration::from_secs(*retry_after_secs)),
        _ => backoff,
    }
}

/// Turns a response body into listing entries.
///
/// JSON bodies are used as-is; HTML bodies must carry a `__NEXT_DATA__`
/// script. Entries come from a top-level `items` array, else from every
/// `itemStacks[*].items` array in the document. A document with neither is an
/// empty page.
pub fn decode_payload(body: &str, context: &str) -> Result<Vec<Value>, ScrapeError> {
    let shape = |reason: String| ScrapeError::UnexpectedShape {
        context: context.to_owned(),
        reason,
    };

    let payload: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(json_err) if body.trim_start().starts_with('<') => {
            let script = parser::extract_next_data(body)
                .ok_or_else(|| shape("HTML page without __NEXT_DATA__".into()))?;
            serde_json::from_str(&script)
                .map_err(|e| shape(format!("invalid __NEXT_DATA__ JSON: {e} (body: {json_err})")))?
        }
        Err(e) => return Err(shape(format!("invalid JSON: {e}"))),
    };

    let Value::Object(mut map) = payload else {
        return Err(shape("top-level value is not an object".into()));
    };

    match map.remove("items") {
        Some(Value::Array(items)) => return Ok(items),
        Some(Value::Null) | None => {}
        Some(other) => return Err(shape(format!("`items` is not an array: {other}"))),
    }

    let mut entries = Vec::new();
    collect_item_stacks(&Value::Object(map), &mut entries);
    Ok(entries)
}

fn collect_item_stacks(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Object(map) => {
            if let Some(stacks) = map.get("itemStacks").and_then(Value::as_array) {
                for stack in stacks {
                    if let Some(items) = stack.get("items").and_then(Value::as_array) {
                        out.extend(items.iter().cloned());
                    }
                }
                return;
            }
            map.values().for_each(|v| collect_item_stacks(v, out));
        }
        Value::Array(values) => values.iter().for_each(|v| collect_item_stacks(v, out)),
        _ => {}
    }
}

/// Lazily walks the result pages of one store.
///
/// Sleeps `delay` between requests (never before the first). Ends after
/// `max_pages` requests, on an empty page, after a short page, or after
/// yielding the first error.
pub struct Pages<'a, S: PageSource + ?Sized> {
    source: &'a S,
    store: &'a Store,
    settings: &'a FetchSettings,
    next_page: u32,
    done: bool,
}

impl<'a, S: PageSource + ?Sized> Pages<'a, S> {
    pub fn new(source: &'a S, store: &'a Store, settings: &'a FetchSettings) -> Self {
        Self {
            source,
            store,
            settings,
            next_page: 1,
            done: false,
        }
    }
}

impl<S: PageSource + ?Sized> Iterator for Pages<'_, S> {
    type Item = Result<RawPage, ScrapeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next_page > self.settings.max_pages {
            return None;
        }
        let number = self.next_page;
        self.next_page += 1;

        if number > 1 && !self.settings.delay.is_zero() {
            thread::sleep(self.settings.delay);
        }

        let entries = match self.source.fetch_page(
            self.store,
            &self.settings.query,
            number,
            self.settings.page_size,
        ) {
            Ok(entries) => entries,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        if entries.is_empty() {
            tracing::info!(city = %self.store.city, page = number, "no listings on page");
            self.done = true;
            return None;
        }
        if entries.len() < self.settings.page_size as usize {
            self.done = true;
        }
        Some(Ok(RawPage { number, entries }))
    }
}
