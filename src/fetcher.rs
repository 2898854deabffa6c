use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::db::{FeedItem, FetchRow, FetchWriter};

const API_URL: &str = "https://piazza.com/logic/api";
const CONCURRENCY: usize = 4;
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 1000;
const FEED_LIMIT_ALL: usize = 999_999;

/// Fetch stats returned after completion.
pub struct FetchStats {
    pub total: usize,
    pub ok: usize,
    pub errors: usize,
}

/// Thin client for Piazza's JSON-RPC style endpoint, authenticated by a
/// browser session cookie.
pub struct PiazzaClient {
    http: reqwest::Client,
    cookies: String,
    network_id: String,
}

impl PiazzaClient {
    pub fn new(cookies: &str, network_id: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            cookies: cookies.to_string(),
            network_id: network_id.to_string(),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let params = params.to_string();
        let response = self
            .http
            .post(API_URL)
            .query(&[("method", method)])
            .header(reqwest::header::COOKIE, self.cookies.as_str())
            .form(&[("method", method), ("params", params.as_str())])
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response
            .json()
            .await
            .with_context(|| format!("{} returned a non-JSON body", method))?;
        unwrap_envelope(method, body)
    }

    /// Check the session and return the e-mail it belongs to.
    pub async fn verify_session(&self) -> Result<String> {
        let result = self
            .call("user.status", json!({}))
            .await
            .context("Session check failed; cookies may be expired")?;
        Ok(result
            .get("email")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown")
            .to_string())
    }

    /// Classes (networks) the session can see, for picking `PIAZZA_NETWORK_ID`.
    pub async fn list_classes(&self) -> Result<Vec<ClassInfo>> {
        let result = self
            .call("user.status", json!({}))
            .await
            .context("Failed to list classes")?;
        Ok(parse_networks(&result))
    }

    pub async fn fetch_feed(&self, limit: Option<usize>) -> Result<Vec<FeedItem>> {
        info!("Fetching feed for network {}", self.network_id);
        let result = self
            .call(
                "network.get_my_feed",
                json!({
                    "nid": self.network_id,
                    "limit": limit.unwrap_or(FEED_LIMIT_ALL),
                    "offset": 0,
                }),
            )
            .await
            .context("Failed to fetch feed")?;
        let mut items = parse_feed(&result);
        if let Some(n) = limit {
            items.truncate(n);
        }
        info!("Feed lists {} posts", items.len());
        Ok(items)
    }

    async fn get_post(&self, cid: &str) -> Result<Value> {
        self.call("content.get", json!({ "nid": self.network_id, "cid": cid }))
            .await
    }
}

/// Pull `result` out of an API envelope, surfacing the API's own error message.
fn unwrap_envelope(method: &str, mut body: Value) -> Result<Value> {
    match body.get("error") {
        None | Some(Value::Null) => {}
        Some(Value::String(e)) => bail!("{} failed: {}", method, e),
        Some(other) => bail!("{} failed: {}", method, other),
    }
    match body.get_mut("result").map(Value::take) {
        Some(Value::Null) | None => Err(anyhow!("{} returned no result", method)),
        Some(result) => Ok(result),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    pub nid: String,
    pub name: String,
    pub term: String,
}

/// Networks listed under `user.status`; entries without an id are skipped.
fn parse_networks(result: &Value) -> Vec<ClassInfo> {
    let text = |v: &Value, key: &str| {
        v.get(key).and_then(|s| s.as_str()).unwrap_or_default().to_string()
    };
    result
        .get("networks")
        .and_then(|n| n.as_array())
        .map(|networks| {
            networks
                .iter()
                .filter_map(|n| {
                    let nid = n.get("id").or_else(|| n.get("nid"))?.as_str()?.to_string();
                    Some(ClassInfo {
                        nid,
                        name: text(n, "name"),
                        term: text(n, "term"),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Feed entries with an id, in feed order.
fn parse_feed(result: &Value) -> Vec<FeedItem> {
    result
        .get("feed")
        .and_then(|f| f.as_array())
        .map(|feed| {
            feed.iter()
                .filter_map(|item| {
                    let cid = item.get("id")?.as_str()?.to_string();
                    Some(FeedItem {
                        cid,
                        nr: item.get("nr").and_then(|n| n.as_i64()),
                        subject: item.get("subject").and_then(|s| s.as_str()).map(str::to_string),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Fetch posts concurrently, saving each result to DB as it arrives.
pub async fn fetch_posts_streaming(
    conn: &Connection,
    client: Arc<PiazzaClient>,
    queue: Vec<(i64, String)>,
) -> Result<FetchStats> {
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let total = queue.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send results, main loop saves to DB
    let (tx, mut rx) = tokio::sync::mpsc::channel::<FetchRow>(CONCURRENCY * 2);

    for (post_id, cid) in queue {
        let client = Arc::clone(&client);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();

        tokio::spawn(async move {
            // The semaphore is never closed, so acquire only fails if it is dropped.
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let row = fetch_with_retry(&client, post_id, &cid).await;
            let _ = tx.send(row).await;
        });
    }

    // Drop our copy of tx so rx closes when all spawned tasks finish
    drop(tx);

    let mut ok = 0usize;
    let mut errors = 0usize;
    let mut writer = FetchWriter::new(conn)?;

    while let Some(row) = rx.recv().await {
        if let Some(e) = &row.error {
            warn!("Failed to fetch post {}: {}", row.cid, e);
            errors += 1;
        } else {
            ok += 1;
        }
        writer.save(&row)?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!("Fetched {} posts ({} ok, {} errors)", total, ok, errors);

    Ok(FetchStats { total, ok, errors })
}

/// HTTP 429 and 5xx, timeouts, connect failures and "rate limit" API errors.
fn is_retryable(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| match cause.downcast_ref::<reqwest::Error>() {
        Some(e) => {
            let throttled = e.status().is_some_and(|s| {
                s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
            });
            throttled || e.is_timeout() || e.is_connect()
        }
        None => cause.to_string().to_lowercase().contains("rate limit"),
    })
}

async fn fetch_with_retry(client: &PiazzaClient, post_id: i64, cid: &str) -> FetchRow {
    let mut attempt = 0;
    loop {
        let (row, retry) = fetch_one(client, post_id, cid).await;
        if !retry || attempt == MAX_RETRIES {
            return row;
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        attempt += 1;
        warn!(
            "Transient failure on {} (attempt {}/{}), backing off {:.1}s",
            cid,
            attempt,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }
}

/// One `content.get` call; the flag says whether a failure is worth retrying.
async fn fetch_one(client: &PiazzaClient, post_id: i64, cid: &str) -> (FetchRow, bool) {
    let start = Instant::now();
    let result = client.get_post(cid).await;
    let elapsed = i64::try_from(start.elapsed().as_millis()).ok();
    debug!("content.get {} took {:?}ms", cid, elapsed);

    let (raw_json, error, retry) = match result {
        Ok(value) => (Some(value.to_string()), None, false),
        Err(e) => (None, Some(format!("{:#}", e)), is_retryable(&e)),
    };
    let row = FetchRow {
        post_id,
        cid: cid.to_string(),
        raw_json,
        error,
        latency_ms: elapsed,
    };
    (row, retry)
}
