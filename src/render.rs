use crate::problem::ProblemRecord;
use crate::table::{Page, Summary};
use anyhow::Result;
use askama::Template;

pub const TITLE: &str = "LeetCode Problems Tracker";

#[derive(Debug, Template)]
#[template(path = "problems.html.j2")]
pub struct ProblemTable {
    pub title: String,
    pub rows: Vec<Row>,
    pub range_label: String,
    pub summary: Summary,
}

#[derive(Debug)]
pub struct Row {
    pub id: u32,
    pub name: String,
    pub url: String,
    pub rating: String,
    pub difficulty: String,
    pub color: &'static str,
    pub completed: bool,
}

impl From<&ProblemRecord> for Row {
    fn from(record: &ProblemRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            url: record.url(),
            rating: format!("{:.0}", record.rating),
            difficulty: record
                .difficulty
                .map(|d| d.to_string())
                .unwrap_or_default(),
            color: record.difficulty.map(|d| d.color()).unwrap_or_default(),
            completed: record.completed,
        }
    }
}

impl ProblemTable {
    /// Table for one page of rows; the summary covers the whole dataset.
    pub fn new(all: &[ProblemRecord], page: &Page<'_>) -> Self {
        Self {
            title: TITLE.to_string(),
            rows: page.rows.iter().map(Row::from).collect(),
            range_label: page.range_label(),
            summary: Summary::of(all),
        }
    }

    pub fn generate(&self) -> Result<String> {
        Ok(self.render()?)
    }
}
