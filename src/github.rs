use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, error, info, warn};

use crate::models::{raw, CommitRecord, IssueRecord, ReleaseRecord, RepoActivity, RepoInfo};

/// GitHub's default page size; a shorter page means the last one.
const PAGE_SIZE: usize = 30;
/// Below this many remaining requests we pause before hitting the API again.
const RATE_LIMIT_FLOOR: i64 = 10;
const MAX_ATTEMPTS: usize = 3;
const USER_AGENT: &str = "github-activity-agent";

#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
}

/// Token-authenticated, rate-limit aware client for the GitHub REST API.
pub struct GitHubClient {
    http: Client,
    base_url: String,
    rate_limit_remaining: AtomicI64,
}

impl GitHubClient {
    pub fn new(token: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("token {}", token))
            .context("GITHUB_TOKEN contains invalid header characters")?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limit_remaining: AtomicI64::new(5000),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, params: &[(&str, String)]) -> Result<T> {
        for attempt in 1..=MAX_ATTEMPTS {
            if self.rate_limit_remaining.load(Ordering::Relaxed) < RATE_LIMIT_FLOOR {
                warn!("rate limit low, waiting 60s before next request");
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            }

            let response = self.http.get(url).query(params).send().await?;

            if let Some(remaining) = header_i64(response.headers(), "X-RateLimit-Remaining") {
                self.rate_limit_remaining.store(remaining, Ordering::Relaxed);
            }

            let status = response.status();
            if status.is_success() {
                return Ok(response.json().await?);
            }

            let reset = header_i64(response.headers(), "X-RateLimit-Reset");
            let body = response.text().await.unwrap_or_default();

            if status == StatusCode::FORBIDDEN && is_rate_limited(&body) {
                let wait = reset
                    .map(|t| (t - Utc::now().timestamp()).max(0) as u64 + 10)
                    .unwrap_or(60);
                warn!(
                    wait_secs = wait,
                    attempt, "rate limit exceeded, waiting for reset"
                );
                tokio::time::sleep(std::time::Duration::from_secs(wait)).await;
                continue;
            }

            error!(%status, url, "GitHub API request failed: {}", body);
            return Err(anyhow!("GitHub API request failed ({}): {}", status, body));
        }

        Err(anyhow!(
            "GitHub API request to {} still rate limited after {} attempts",
            url,
            MAX_ATTEMPTS
        ))
    }

    /// Fetch every page of a listing endpoint until a short or empty page.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut query: Vec<(&str, String)> = params.to_vec();
            query.push(("page", page.to_string()));

            let batch: Vec<T> = self.get_json(url, &query).await?;
            let len = batch.len();
            items.extend(batch);

            if is_last_page(len) {
                break;
            }
            page += 1;
        }

        debug!(url, pages = page, count = items.len(), "fetched listing");
        Ok(items)
    }

    /// Basic information about a repository.
    pub async fn repository(&self, slug: &str) -> Result<RepoInfo> {
        let url = format!("{}/repos/{}", self.base_url, slug);
        let repo: raw::Repo = self.get_json(&url, &[]).await?;
        Ok(repo.into())
    }

    /// Commits pushed in the last `days` days.
    pub async fn commits(&self, slug: &str, days: u64) -> Result<Vec<CommitRecord>> {
        let since = (Utc::now() - Duration::days(days as i64)).to_rfc3339();
        let url = format!("{}/repos/{}/commits", self.base_url, slug);
        let commits: Vec<raw::Commit> = self.get_paginated(&url, &[("since", since)]).await?;
        Ok(commits.into_iter().map(Into::into).collect())
    }

    /// The raw issues feed for the last `days` days. GitHub mixes pull
    /// requests into this feed; callers split them with `is_pull_request`.
    pub async fn issues_feed(&self, slug: &str, days: u64) -> Result<Vec<raw::Issue>> {
        let since = (Utc::now() - Duration::days(days as i64)).to_rfc3339();
        let url = format!("{}/repos/{}/issues", self.base_url, slug);
        self.get_paginated(&url, &[("since", since), ("state", "all".to_string())])
            .await
    }

    /// Releases published in the last `days` days. The releases endpoint has
    /// no `since` parameter, so pages are filtered client-side and fetching
    /// stops as soon as a page contains older releases.
    pub async fn releases(&self, slug: &str, days: u64) -> Result<Vec<ReleaseRecord>> {
        let since = Utc::now() - Duration::days(days as i64);
        let url = format!("{}/repos/{}/releases", self.base_url, slug);

        let mut releases = Vec::new();
        let mut page = 1u32;

        loop {
            let batch: Vec<raw::Release> =
                self.get_json(&url, &[("page", page.to_string())]).await?;

            let (recent, stop) = filter_release_page(batch, since);
            releases.extend(recent);

            if stop {
                break;
            }
            page += 1;
        }

        Ok(releases)
    }

    /// Collect one full activity snapshot for a repository.
    pub async fn collect(&self, slug: &str, days: u64) -> Result<RepoActivity> {
        info!(repo = slug, days, "collecting repository activity");

        let (repo_info, commits, feed, releases) = futures::try_join!(
            self.repository(slug),
            self.commits(slug, days),
            self.issues_feed(slug, days),
            self.releases(slug, days),
        )?;

        let (prs, issues) = split_issue_feed(feed);
        info!(
            repo = slug,
            commits = commits.len(),
            issues = issues.len(),
            pull_requests = prs.len(),
            releases = releases.len(),
            "snapshot collected"
        );

        Ok(RepoActivity {
            repo_name: slug.to_string(),
            repo_info,
            commits,
            issues,
            pull_requests: prs,
            releases,
            time_period_days: days,
            collection_date: Utc::now(),
        })
    }
}

/// Split the mixed issues feed into (pull requests, plain issues).
pub fn split_issue_feed(feed: Vec<raw::Issue>) -> (Vec<IssueRecord>, Vec<IssueRecord>) {
    let (prs, issues): (Vec<_>, Vec<_>) = feed.into_iter().partition(raw::Issue::is_pull_request);
    (
        prs.into_iter().map(Into::into).collect(),
        issues.into_iter().map(Into::into).collect(),
    )
}

/// A page shorter than GitHub's page size is the last one.
fn is_last_page(len: usize) -> bool {
    len < PAGE_SIZE
}

/// Keep the releases inside the lookback window; the bool says whether
/// fetching should stop (short or empty page, or older releases reached).
/// Unpublished drafts have no date and count as outside the window.
fn filter_release_page(
    batch: Vec<raw::Release>,
    since: chrono::DateTime<Utc>,
) -> (Vec<ReleaseRecord>, bool) {
    let total = batch.len();
    let recent: Vec<ReleaseRecord> = batch
        .into_iter()
        .filter(|r| r.published_at.map(|d| d > since).unwrap_or(false))
        .map(ReleaseRecord::from)
        .collect();

    let stop = is_last_page(total) || recent.len() < total;
    (recent, stop)
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn is_rate_limited(body: &str) -> bool {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.message.to_lowercase().contains("rate limit"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn feed_entry(number: u64, pull_request: bool) -> raw::Issue {
        let mut value = serde_json::json!({
            "number": number,
            "title": format!("Item {}", number),
            "state": "open",
            "created_at": "2024-03-01T08:00:00Z",
            "updated_at": "2024-03-02T08:00:00Z",
            "user": { "login": "someone" },
            "labels": [],
            "html_url": format!("https://github.com/o/r/issues/{}", number)
        });
        if pull_request {
            value["pull_request"] = serde_json::json!({ "url": "..." });
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_split_issue_feed() {
        let feed = vec![
            feed_entry(1, false),
            feed_entry(2, true),
            feed_entry(3, false),
            feed_entry(4, true),
        ];

        let (prs, issues) = split_issue_feed(feed);

        assert_eq!(prs.iter().map(|p| p.number).collect::<Vec<_>>(), vec![2, 4]);
        assert_eq!(
            issues.iter().map(|i| i.number).collect::<Vec<_>>(),
            vec![1, 3]
        );
    }

    fn release(tag: &str, published_at: Option<&str>) -> raw::Release {
        serde_json::from_value(serde_json::json!({
            "tag_name": tag,
            "name": tag,
            "published_at": published_at,
            "author": { "login": "maintainer" },
            "html_url": format!("https://github.com/o/r/releases/tag/{}", tag)
        }))
        .unwrap()
    }

    #[test]
    fn test_is_last_page() {
        assert!(is_last_page(0));
        assert!(is_last_page(PAGE_SIZE - 1));
        assert!(!is_last_page(PAGE_SIZE));
    }

    #[test]
    fn test_release_page_full_and_recent_continues() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let batch: Vec<raw::Release> = (0..PAGE_SIZE)
            .map(|i| release(&format!("v0.{}", i), Some("2024-03-05T00:00:00Z")))
            .collect();

        let (recent, stop) = filter_release_page(batch, since);
        assert_eq!(recent.len(), PAGE_SIZE);
        assert!(!stop, "a full page of in-window releases keeps paging");
    }

    #[test]
    fn test_release_page_stops_on_older_release() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut batch: Vec<raw::Release> = (0..PAGE_SIZE - 1)
            .map(|i| release(&format!("v0.{}", i), Some("2024-03-05T00:00:00Z")))
            .collect();
        batch.push(release("v0.old", Some("2024-01-01T00:00:00Z")));

        let (recent, stop) = filter_release_page(batch, since);
        assert_eq!(recent.len(), PAGE_SIZE - 1);
        assert!(stop, "hitting an older release ends pagination");
    }

    #[test]
    fn test_release_page_short_page_stops() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let batch = vec![release("v1.0.0", Some("2024-03-05T00:00:00Z"))];

        let (recent, stop) = filter_release_page(batch, since);
        assert_eq!(recent.len(), 1);
        assert!(stop);

        let (recent, stop) = filter_release_page(vec![], since);
        assert!(recent.is_empty());
        assert!(stop);
    }

    #[test]
    fn test_release_page_skips_unpublished_drafts() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let batch = vec![
            release("v1.0.0", Some("2024-03-05T00:00:00Z")),
            release("v1.1.0-draft", None),
        ];

        let (recent, stop) = filter_release_page(batch, since);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].tag_name, "v1.0.0");
        assert!(stop);
    }

    #[test]
    fn test_is_rate_limited() {
        assert!(is_rate_limited(
            r#"{"message":"API rate limit exceeded for user"}"#
        ));
        assert!(!is_rate_limited(r#"{"message":"Not Found"}"#));
        assert!(!is_rate_limited("not json"));
    }

    #[test]
    fn test_header_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("42"));
        assert_eq!(header_i64(&headers, "X-RateLimit-Remaining"), Some(42));
        assert_eq!(header_i64(&headers, "X-RateLimit-Reset"), None);
    }
}
