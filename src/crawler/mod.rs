//! Paginated reply crawling against the Threads GraphQL endpoint.
//!
//! The crawl is strictly sequential: one request in flight at a time, each
//! page merged into an id-keyed map before the next request goes out. The
//! server's `page_info` is the only termination signal. A failing page is
//! retried with doubling backoff up to the configured bound, then the crawl
//! returns a terminal error instead of looping forever.

mod response;

use std::collections::HashMap;

use anyhow::Context;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::extractor::Credentials;
use response::RepliesResponse;

pub use response::ReplyRecord;

/// GraphQL document id of the replies query.
const DOC_ID: &str = "8146902565367397";

/// Fixed application id the endpoint requires in the `x-ig-app-id` header.
const IG_APP_ID: &str = "238260118697367";

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("cannot crawl without credentials; missing: {0}")]
    MissingCredentials(String),
    #[error("giving up on reply page after {attempts} attempts: {source:#}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },
    #[error("reply page does not match the expected shape: {0}")]
    MalformedResponse(#[source] serde_json::Error),
}

/// Build the HTTP client used for both the page fetch and the crawl.
///
/// # Errors
///
/// Returns an error if the client cannot be constructed.
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.http_timeout)
        .gzip(true)
        .build()
}

/// Fetch the server-rendered thread page for credential extraction.
///
/// # Errors
///
/// Returns an error if the request fails or the server answers non-2xx.
pub async fn fetch_thread_page(
    client: &Client,
    config: &Config,
    url: &str,
) -> anyhow::Result<String> {
    let response = client
        .get(url)
        .header("cookie", &config.cookie)
        .send()
        .await
        .context("Failed to fetch thread page")?;

    if !response.status().is_success() {
        anyhow::bail!("thread page fetch failed with status {}", response.status());
    }

    response
        .text()
        .await
        .context("Failed to read thread page body")
}

/// Crawl every reply page for the post named by `credentials`.
///
/// Returns the deduplicated result set keyed by reply id; a duplicate id
/// across pages keeps the most recently seen record.
///
/// # Errors
///
/// Fails before any network call when either credential is missing, and
/// during the crawl when a page exhausts its retry budget or the response
/// body does not carry the expected `data.data` shape.
pub async fn crawl_replies(
    client: &Client,
    config: &Config,
    credentials: &Credentials,
) -> Result<HashMap<String, ReplyRecord>, CrawlError> {
    let Some((post_id, fb_dtsg)) = credentials.complete() else {
        return Err(CrawlError::MissingCredentials(
            credentials.missing_fields().join(", "),
        ));
    };

    let mut replies: HashMap<String, ReplyRecord> = HashMap::new();
    let mut has_next = true;
    let mut cursor: Option<String> = None;
    let mut page = 0u32;

    while has_next {
        page += 1;
        let body =
            fetch_page_with_retry(client, config, post_id, fb_dtsg, cursor.as_deref(), page)
                .await?;

        let parsed: RepliesResponse =
            serde_json::from_str(&body).map_err(CrawlError::MalformedResponse)?;
        let connection = parsed.data.data;

        has_next = connection.page_info.has_next_page;
        cursor = connection.page_info.end_cursor;

        let edge_count = connection.edges.len();
        let mut skipped = 0usize;
        for edge in connection.edges {
            match response::project_edge(edge) {
                Ok(record) => {
                    // Last write wins when the server repeats an id.
                    if replies.insert(record.id.clone(), record).is_some() {
                        debug!(page, "Duplicate reply id replaced");
                    }
                }
                Err(e) => {
                    skipped += 1;
                    warn!(page, error = format!("{e:#}"), "Skipping malformed reply edge");
                }
            }
        }

        info!(
            page,
            edges = edge_count,
            skipped,
            total = replies.len(),
            has_next,
            "Fetched reply page"
        );
    }

    info!(pages = page, replies = replies.len(), "Reply crawl completed");

    Ok(replies)
}

/// Request one logical page, retrying transport failures with backoff.
async fn fetch_page_with_retry(
    client: &Client,
    config: &Config,
    post_id: &str,
    fb_dtsg: &str,
    cursor: Option<&str>,
    page: u32,
) -> Result<String, CrawlError> {
    let mut backoff = config.retry_backoff;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match fetch_page(client, config, post_id, fb_dtsg, cursor).await {
            Ok(body) => return Ok(body),
            Err(e) if attempt > config.max_page_retries => {
                return Err(CrawlError::RetriesExhausted {
                    attempts: attempt,
                    source: e,
                });
            }
            Err(e) => {
                warn!(
                    page,
                    attempt,
                    backoff = ?backoff,
                    error = format!("{e:#}"),
                    "Reply page request failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }
    }
}

/// Issue a single replies request; exactly one outbound call.
async fn fetch_page(
    client: &Client,
    config: &Config,
    post_id: &str,
    fb_dtsg: &str,
    cursor: Option<&str>,
) -> anyhow::Result<String> {
    let variables = request_variables(post_id, cursor).to_string();
    let form = [
        ("fb_dtsg", fb_dtsg),
        ("doc_id", DOC_ID),
        ("variables", variables.as_str()),
    ];

    let response = client
        .post(&config.graphql_url)
        .header("cookie", &config.cookie)
        .header("x-ig-app-id", IG_APP_ID)
        .form(&form)
        .send()
        .await
        .context("Failed to send replies request")?;

    if !response.status().is_success() {
        anyhow::bail!("replies endpoint returned status {}", response.status());
    }

    response
        .text()
        .await
        .context("Failed to read replies response body")
}

/// Variables object for the replies query.
///
/// The relay feature flags are part of the query's contract with the
/// endpoint; `after` is present only when the previous page handed back a
/// cursor.
fn request_variables(post_id: &str, cursor: Option<&str>) -> Value {
    let mut variables = json!({
        "postID": post_id,
        "__relay_internal__pv__BarcelonaIsLoggedInrelayprovider": true,
        "__relay_internal__pv__BarcelonaShouldShowFediverseM1Featuresrelayprovider": true,
        "__relay_internal__pv__BarcelonaIsInlineReelsEnabledrelayprovider": true,
        "__relay_internal__pv__BarcelonaUseCometVideoPlaybackEnginerelayprovider": false,
        "__relay_internal__pv__BarcelonaOptionalCookiesEnabledrelayprovider": false,
        "__relay_internal__pv__BarcelonaShowReshareCountrelayprovider": false,
        "__relay_internal__pv__BarcelonaQuotePostImpressionLoggingEnabledrelayprovider": false,
        "__relay_internal__pv__BarcelonaShouldShowFediverseM075Featuresrelayprovider": true,
    });

    if let Some(cursor) = cursor {
        variables["after"] = Value::String(cursor.to_string());
    }

    variables
}
