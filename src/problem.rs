use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use strum::{Display, EnumString};
use thiserror::Error;

const PROBLEM_URL: &str = "https://leetcode.com/problems";

/// One catalog entry, as written to the artifact and shown in the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemRecord {
    pub id: u32,
    pub name: String,
    pub slug: String,
    pub rating: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub completed: bool,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[strum(ascii_case_insensitive)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("line {line}: missing column `{column}`")]
    MissingColumn { line: usize, column: &'static str },
    #[error("line {line}: `{column}` is not a number: {value:?}")]
    InvalidNumber {
        line: usize,
        column: &'static str,
        value: String,
    },
    #[error("line {line}: `{column}` is empty")]
    Empty { line: usize, column: &'static str },
}

impl ProblemRecord {
    pub fn new(id: u32, name: impl Into<String>, slug: impl Into<String>, rating: f64) -> Self {
        Self {
            id,
            name: name.into(),
            slug: slug.into(),
            rating,
            difficulty: None,
            completed: false,
        }
    }

    pub fn url(&self) -> String {
        format!("{}/{}/", PROBLEM_URL, self.slug)
    }
}

impl Difficulty {
    /// Tag colour used by the rendered table.
    pub fn color(&self) -> &'static str {
        match self {
            Difficulty::Easy => "green",
            Difficulty::Medium => "orange",
            Difficulty::Hard => "red",
        }
    }
}

/// Parse the tab separated ratings file.
///
/// Columns are `rating, id, name, <unused>, slug, ...`. The first line is a
/// header and blank lines (usually a trailing one) are skipped.
pub fn parse_ratings(text: &str) -> Result<Vec<ProblemRecord>, ParseError> {
    text.split('\n')
        .enumerate()
        .skip(1)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| parse_line(idx + 1, line))
        .collect()
}

fn parse_line(line: usize, text: &str) -> Result<ProblemRecord, ParseError> {
    let items: Vec<&str> = text.trim().split('\t').collect();
    let column = |idx: usize, name: &'static str| {
        items
            .get(idx)
            .map(|s| s.trim())
            .ok_or(ParseError::MissingColumn { line, column: name })
    };

    let rating = column(0, "rating")?;
    let rating = rating
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber {
            line,
            column: "rating",
            value: rating.to_string(),
        })?;

    let id = column(1, "id")?;
    let id = id
        .parse::<NonZeroU32>()
        .map_err(|_| ParseError::InvalidNumber {
            line,
            column: "id",
            value: id.to_string(),
        })?
        .get();

    let name = non_empty(line, "name", column(2, "name")?)?;
    let slug = non_empty(line, "slug", column(4, "slug")?)?;

    Ok(ProblemRecord::new(id, name, slug, rating))
}

fn non_empty<'a>(line: usize, column: &'static str, value: &'a str) -> Result<&'a str, ParseError> {
    if value.is_empty() {
        Err(ParseError::Empty { line, column })
    } else {
        Ok(value)
    }
}
