use crate::problem::{parse_ratings, Difficulty, ProblemRecord};
use anyhow::{Context, Result};
use derive_builder::Builder;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{header, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::future::Future;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub const DEFAULT_ENDPOINT: &str = "https://leetcode.com/graphql";
const REFERER: &str = "https://leetcode.com";
const QUERY: &str = r#"query selectProblem($titleSlug: String!) {
  question(titleSlug: $titleSlug) {
    difficulty
  }
}"#;

/// Resolves difficulty labels for problem slugs, one query per scraper run.
#[derive(Debug, Builder)]
#[builder(setter(into))]
pub struct Scraper {
    #[builder(default = "DEFAULT_ENDPOINT.to_string()")]
    endpoint: String,
    #[builder(default)]
    policy: RatePolicy,
    #[builder(default = "Duration::from_secs(30)")]
    timeout: Duration,
}

/// How fast requests go out: a token bucket of `burst` tokens refilled at
/// `per_second`, with at most `max_in_flight` requests outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub burst: NonZeroU32,
    pub per_second: NonZeroU32,
    pub max_in_flight: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeReport {
    pub total: usize,
    pub resolved: usize,
    pub failed: usize,
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("no such question")]
    NotFound,
    #[error("unknown difficulty {0:?}")]
    UnknownDifficulty(String),
}

pub trait DifficultySource: Send + Sync + 'static {
    fn difficulty(&self, slug: &str) -> impl Future<Output = Result<Difficulty, QueryError>> + Send;
}

/// Client for the GraphQL `question(titleSlug)` query.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'static str,
    variables: Variables<'a>,
}

#[derive(Debug, Serialize)]
struct Variables<'a> {
    #[serde(rename = "titleSlug")]
    title_slug: &'a str,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<QuestionData>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct QuestionData {
    question: Option<Question>,
}

#[derive(Debug, Deserialize)]
struct Question {
    difficulty: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

impl Default for RatePolicy {
    fn default() -> Self {
        // 20 requests every 500ms
        Self {
            burst: NonZeroU32::new(20).unwrap_or(NonZeroU32::MIN),
            per_second: NonZeroU32::new(40).unwrap_or(NonZeroU32::MIN),
            max_in_flight: 20,
        }
    }
}

impl RatePolicy {
    pub fn quota(&self) -> Quota {
        Quota::per_second(self.per_second).allow_burst(self.burst)
    }

    fn limiter(&self) -> DefaultDirectRateLimiter {
        RateLimiter::direct(self.quota())
    }
}

impl GraphqlClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn query(&self, slug: &str) -> Result<Difficulty, QueryError> {
        let body = GraphqlRequest {
            query: QUERY,
            variables: Variables { title_slug: slug },
        };
        let res = self
            .client
            .post(&self.endpoint)
            .header(header::REFERER, REFERER)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        info!("{} - {}", status.as_u16(), slug);
        if !status.is_success() {
            return Err(QueryError::Status(status));
        }

        let result: GraphqlResponse = res.json().await?;
        if let Some(errors) = result.errors.filter(|e| !e.is_empty()) {
            let messages = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(QueryError::Remote(messages));
        }

        let difficulty = result
            .data
            .and_then(|d| d.question)
            .ok_or(QueryError::NotFound)?
            .difficulty;
        difficulty
            .parse()
            .map_err(|_| QueryError::UnknownDifficulty(difficulty))
    }
}

impl DifficultySource for GraphqlClient {
    fn difficulty(&self, slug: &str) -> impl Future<Output = Result<Difficulty, QueryError>> + Send {
        self.query(slug)
    }
}

impl Scraper {
    /// Read the ratings file, resolve every difficulty and write the JSON artifact.
    pub async fn run(&self, input: &Path, output: &Path) -> Result<ScrapeReport> {
        let text = fs::read_to_string(input)
            .with_context(|| format!("failed to read {}", input.display()))?;
        let records = parse_ratings(&text)?;
        info!(count = records.len(), input = %input.display(), "parsed ratings file");

        let (records, report) = self.scrape(records).await?;

        let json = serde_json::to_string_pretty(&records)?;
        if let Err(e) = fs::write(output, json) {
            error!(output = %output.display(), error = %e, "failed to write artifact");
            return Err(e).with_context(|| format!("failed to write {}", output.display()));
        }
        info!(
            output = %output.display(),
            total = report.total,
            resolved = report.resolved,
            failed = report.failed,
            "wrote artifact"
        );
        Ok(report)
    }

    pub async fn scrape(&self, records: Vec<ProblemRecord>) -> Result<(Vec<ProblemRecord>, ScrapeReport)> {
        let client = GraphqlClient::new(&self.endpoint, self.timeout)?;
        scrape_with(Arc::new(client), self.policy, records).await
    }
}

/// Fill in `difficulty` for every record, querying each distinct slug once.
///
/// A failed query leaves the affected records without a difficulty; it is
/// logged and never retried.
pub async fn scrape_with<S: DifficultySource>(
    source: Arc<S>,
    policy: RatePolicy,
    mut records: Vec<ProblemRecord>,
) -> Result<(Vec<ProblemRecord>, ScrapeReport)> {
    let slugs: Vec<String> = {
        let mut seen = HashSet::new();
        records
            .iter()
            .filter(|r| seen.insert(r.slug.as_str()))
            .map(|r| r.slug.clone())
            .collect()
    };

    let limiter = Arc::new(policy.limiter());
    let permits = Arc::new(Semaphore::new(policy.max_in_flight.max(1)));

    let mut handles = Vec::with_capacity(slugs.len());
    for slug in slugs {
        let source = source.clone();
        let limiter = limiter.clone();
        let permits = permits.clone();
        let handle = tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            limiter.until_ready().await;
            let difficulty = source.difficulty(&slug).await;
            Ok::<_, anyhow::Error>((slug, difficulty))
        });
        handles.push(handle);
    }

    let mut resolved = HashMap::with_capacity(handles.len());
    for handle in handles {
        let (slug, difficulty) = handle.await??;
        match difficulty {
            Ok(difficulty) => {
                resolved.insert(slug, difficulty);
            }
            Err(e) => warn!(slug = %slug, error = %e, "failed to fetch difficulty"),
        }
    }

    for record in records.iter_mut() {
        record.difficulty = resolved.get(&record.slug).copied();
    }

    let report = ScrapeReport::of(&records);
    Ok((records, report))
}

impl ScrapeReport {
    pub fn of(records: &[ProblemRecord]) -> Self {
        let resolved = records.iter().filter(|r| r.difficulty.is_some()).count();
        Self {
            total: records.len(),
            resolved,
            failed: records.len() - resolved,
        }
    }
}
