use crate::problem::{parse_ratings, ParseError, ProblemRecord};
use crate::store::{Flag, FlagStore};
use reqwest::StatusCode;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Where problem data is read from: a local file or an http(s) URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// JSON artifact written by the scraper, with an optional second path.
    Artifact {
        primary: Location,
        fallback: Option<Location>,
    },
    /// Raw tab separated ratings file.
    Ratings(Location),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch problem data: {}", describe(.attempts))]
    Unreachable { attempts: Vec<(Location, FetchError)> },
    #[error("invalid problem data in {location}: {source}")]
    Json {
        location: Location,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid ratings file {location}: {source}")]
    Ratings {
        location: Location,
        #[source]
        source: ParseError,
    },
    #[error("duplicate problem id {0}")]
    DuplicateId(u32),
}

impl FromStr for Location {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("http://") || s.starts_with("https://") {
            Ok(Location::Url(s.to_string()))
        } else {
            Ok(Location::File(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Url(url) => write!(f, "{}", url),
        }
    }
}

impl Location {
    async fn fetch(&self, client: &reqwest::Client) -> Result<String, FetchError> {
        match self {
            Location::File(path) => Ok(tokio::fs::read_to_string(path).await?),
            Location::Url(url) => {
                let res = client.get(url).send().await?;
                if !res.status().is_success() {
                    return Err(FetchError::Status(res.status()));
                }
                Ok(res.text().await?)
            }
        }
    }
}

fn describe(attempts: &[(Location, FetchError)]) -> String {
    attempts
        .iter()
        .map(|(location, e)| format!("{} ({})", location, e))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load the problem list from `source` and merge completion flags from `store`.
pub async fn load<S>(source: &Source, store: &S) -> Result<Vec<ProblemRecord>, LoadError>
where
    S: FlagStore + ?Sized,
{
    load_with(&reqwest::Client::new(), source, store).await
}

pub async fn load_with<S>(
    client: &reqwest::Client,
    source: &Source,
    store: &S,
) -> Result<Vec<ProblemRecord>, LoadError>
where
    S: FlagStore + ?Sized,
{
    let mut records = match source {
        Source::Artifact { primary, fallback } => {
            let (location, body) = fetch_first(client, primary, fallback.as_ref()).await?;
            serde_json::from_str::<Vec<ProblemRecord>>(&body)
                .map_err(|source| LoadError::Json { location, source })?
        }
        Source::Ratings(location) => {
            let (location, body) = fetch_first(client, location, None).await?;
            parse_ratings(&body).map_err(|source| LoadError::Ratings { location, source })?
        }
    };

    let mut seen = HashSet::with_capacity(records.len());
    if let Some(dup) = records.iter().find(|r| !seen.insert(r.id)) {
        return Err(LoadError::DuplicateId(dup.id));
    }

    merge_flags(&mut records, store);
    info!(count = records.len(), "loaded problems");
    Ok(records)
}

async fn fetch_first(
    client: &reqwest::Client,
    primary: &Location,
    fallback: Option<&Location>,
) -> Result<(Location, String), LoadError> {
    let mut attempts = Vec::with_capacity(2);
    for location in std::iter::once(primary).chain(fallback) {
        match location.fetch(client).await {
            Ok(body) => return Ok((location.clone(), body)),
            Err(e) => {
                warn!(%location, error = %e, "failed to fetch problem data");
                attempts.push((location.clone(), e));
            }
        }
    }
    Err(LoadError::Unreachable { attempts })
}

/// Mark records completed when the store holds a done flag for their id.
pub fn merge_flags<S>(records: &mut [ProblemRecord], store: &S)
where
    S: FlagStore + ?Sized,
{
    for record in records.iter_mut() {
        match store.get(&record.id.to_string()) {
            Ok(Some(flag)) if flag == Flag::Done.as_str() => record.completed = true,
            Ok(_) => {}
            Err(e) => warn!(id = record.id, error = %e, "failed to read completion flag"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::tests::ratings_file;
    use crate::problem::Difficulty;
    use crate::store::{MemoryFlagStore, StoreError};
    use axum::{http::StatusCode as AxumStatus, routing::get, Router};
    use std::fs;

    const ARTIFACT: &str = r#"[
      {"id": 1, "name": "Two Sum", "slug": "two-sum", "rating": 1200, "difficulty": "Easy"},
      {"id": 42, "name": "Trapping Rain Water", "slug": "trapping-rain-water", "rating": 2100.5, "difficulty": "Hard", "completed": false},
      {"id": 3, "name": "Longest Substring", "slug": "longest-substring", "rating": 1500}
    ]"#;

    fn file(path: &std::path::Path) -> Location {
        Location::File(path.to_path_buf())
    }

    #[tokio::test]
    async fn load_should_merge_done_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, ARTIFACT).unwrap();
        let store: MemoryFlagStore = [("42", "t"), ("1", "f")].into_iter().collect();

        let source = Source::Artifact {
            primary: file(&path),
            fallback: None,
        };
        let records = load(&source, &store).await.unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().find(|r| r.id == 42).unwrap().completed);
        assert!(!records.iter().find(|r| r.id == 1).unwrap().completed);
        assert_eq!(records[0].difficulty, Some(Difficulty::Easy));
        assert_eq!(records[2].difficulty, None);
    }

    #[tokio::test]
    async fn load_should_use_fallback_when_primary_missing() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("fallback.json");
        fs::write(&fallback, ARTIFACT).unwrap();

        let source = Source::Artifact {
            primary: file(&dir.path().join("missing.json")),
            fallback: Some(file(&fallback)),
        };
        let records = load(&source, &MemoryFlagStore::new()).await.unwrap();
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn load_should_fail_when_both_sources_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::Artifact {
            primary: file(&dir.path().join("a.json")),
            fallback: Some(file(&dir.path().join("b.json"))),
        };

        match load(&source, &MemoryFlagStore::new()).await {
            Err(LoadError::Unreachable { attempts }) => assert_eq!(attempts.len(), 2),
            other => panic!("expected unreachable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn load_should_not_fall_back_on_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("data.json");
        let fallback = dir.path().join("fallback.json");
        fs::write(&primary, "{not json").unwrap();
        fs::write(&fallback, ARTIFACT).unwrap();

        let source = Source::Artifact {
            primary: file(&primary),
            fallback: Some(file(&fallback)),
        };
        let err = load(&source, &MemoryFlagStore::new()).await.unwrap_err();
        assert!(matches!(err, LoadError::Json { .. }));
    }

    #[tokio::test]
    async fn load_should_parse_raw_ratings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.txt");
        fs::write(
            &path,
            ratings_file(&[(1200.0, 1, "Two Sum", "two-sum"), (2100.0, 42, "Trapping Rain Water", "trapping-rain-water")]),
        )
        .unwrap();
        let store: MemoryFlagStore = [("42", "t")].into_iter().collect();

        let records = load(&Source::Ratings(file(&path)), &store).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(!records[0].completed);
        assert!(records[1].completed);
    }

    struct UnreadableStore;

    impl FlagStore for UnreadableStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Io {
                path: key.into(),
                source: io::Error::other("storage unavailable"),
            })
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn merge_flags_should_treat_read_failure_as_absent() {
        let mut records = vec![
            ProblemRecord::new(1, "Two Sum", "two-sum", 1200.0),
            ProblemRecord {
                completed: true,
                ..ProblemRecord::new(42, "Trapping Rain Water", "trapping-rain-water", 2100.0)
            },
        ];
        merge_flags(&mut records, &UnreadableStore);

        assert!(!records[0].completed);
        assert!(records[1].completed);
    }

    #[tokio::test]
    async fn load_should_report_bad_ratings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.txt");
        fs::write(&path, "Rating\tID\tTitle\tTitle ZH\tTitle Slug\nhigh\t1\tTwo Sum\tzh\ttwo-sum\n")
            .unwrap();

        match load(&Source::Ratings(file(&path)), &MemoryFlagStore::new()).await {
            Err(LoadError::Ratings { location, source }) => {
                assert_eq!(location, file(&path));
                assert_eq!(
                    source,
                    ParseError::InvalidNumber {
                        line: 2,
                        column: "rating",
                        value: "high".to_string()
                    }
                );
            }
            other => panic!("expected ratings error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn load_should_reject_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(
            &path,
            r#"[{"id": 1, "name": "A", "slug": "a", "rating": 1}, {"id": 1, "name": "B", "slug": "b", "rating": 2}]"#,
        )
        .unwrap();

        let source = Source::Artifact {
            primary: file(&path),
            fallback: None,
        };
        let err = load(&source, &MemoryFlagStore::new()).await.unwrap_err();
        assert!(matches!(err, LoadError::DuplicateId(1)));
    }

    #[tokio::test]
    async fn load_should_fetch_over_http_with_fallback() {
        let app = Router::new()
            .route("/data.json", get(|| async { (AxumStatus::NOT_FOUND, "") }))
            .route("/backup/data.json", get(|| async { ARTIFACT }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let source = Source::Artifact {
            primary: format!("http://{addr}/data.json").parse().unwrap(),
            fallback: Some(format!("http://{addr}/backup/data.json").parse().unwrap()),
        };
        let records = load(&source, &MemoryFlagStore::new()).await.unwrap();
        assert_eq!(records.len(), 3);
    }

    #[test]
    fn location_should_parse_urls_and_paths() {
        assert_eq!(
            "https://example.com/data.json".parse::<Location>().unwrap(),
            Location::Url("https://example.com/data.json".to_string())
        );
        assert_eq!(
            "public/data.json".parse::<Location>().unwrap(),
            Location::File(PathBuf::from("public/data.json"))
        );
    }
}
