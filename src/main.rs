use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use leet_ratings::render::ProblemTable;
use leet_ratings::scraper::{RatePolicy, ScraperBuilder, DEFAULT_ENDPOINT};
use leet_ratings::table::{
    is_persisted, paginate, parse_page_size, view, Summary, DEFAULT_PAGE_SIZE,
};
use leet_ratings::{
    load, toggle, FileFlagStore, Location, ProblemRecord, SortColumn, SortOrder, Source,
};
use std::fs;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Scrape LeetCode problem difficulties and track which ones are done.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve difficulties for the ratings file and write the JSON artifact
    Scrape(ScrapeArgs),
    /// Print the filtered, sorted problem table
    List(ViewArgs),
    /// Flip the completed flag of one problem
    Toggle {
        id: u32,
        #[command(flatten)]
        data: DataArgs,
    },
    /// Write the problem table as an HTML page
    Render {
        #[command(flatten)]
        view: ViewArgs,
        #[arg(long, default_value = "problems.html")]
        out: PathBuf,
    },
}

#[derive(Debug, Args)]
struct ScrapeArgs {
    #[arg(long, env = "LEET_RATINGS_INPUT", default_value = "public/ratings.txt")]
    input: PathBuf,
    #[arg(long, env = "LEET_RATINGS_OUTPUT", default_value = "public/data.json")]
    output: PathBuf,
    #[arg(long, env = "LEET_RATINGS_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
    /// Requests allowed back to back before pacing starts
    #[arg(long, default_value = "20")]
    burst: NonZeroU32,
    #[arg(long, default_value = "40")]
    per_second: NonZeroU32,
    #[arg(long, default_value = "20")]
    max_in_flight: usize,
    #[arg(long, default_value = "30")]
    timeout_secs: u64,
}

#[derive(Debug, Args)]
struct DataArgs {
    /// JSON artifact, a file path or an http(s) URL
    #[arg(long, env = "LEET_RATINGS_DATA", default_value = "public/data.json")]
    data: Location,
    /// Tried once when the artifact cannot be fetched
    #[arg(long, env = "LEET_RATINGS_FALLBACK", default_value = "data.json")]
    fallback: Location,
    /// Read the raw ratings file instead of the artifact
    #[arg(long, conflicts_with = "data")]
    raw: Option<Location>,
    #[arg(long, env = "LEET_RATINGS_FLAGS", default_value = ".leet-ratings/flags.json")]
    flags: PathBuf,
}

#[derive(Debug, Args)]
struct ViewArgs {
    #[command(flatten)]
    data: DataArgs,
    /// Matches problem name or difficulty, ignoring case
    #[arg(long, short, default_value = "")]
    keyword: String,
    /// Lowest rating shown, defaults to the dataset minimum
    #[arg(long)]
    min: Option<f64>,
    /// Highest rating shown, defaults to the dataset maximum
    #[arg(long)]
    max: Option<f64>,
    #[arg(long, default_value_t = SortColumn::Rating)]
    sort: SortColumn,
    #[arg(long)]
    desc: bool,
    #[arg(long, default_value = "1")]
    page: usize,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = parse_page_size)]
    page_size: usize,
}

impl DataArgs {
    fn source(&self) -> Source {
        match &self.raw {
            Some(raw) => Source::Ratings(raw.clone()),
            None => Source::Artifact {
                primary: self.data.clone(),
                fallback: Some(self.fallback.clone()),
            },
        }
    }

    async fn load(&self) -> Result<(Vec<ProblemRecord>, FileFlagStore)> {
        let store = FileFlagStore::open(&self.flags)?;
        let records = load(&self.source(), &store).await?;
        Ok((records, store))
    }
}

impl ViewArgs {
    fn view(&self, records: &[ProblemRecord]) -> Vec<ProblemRecord> {
        let order = if self.desc {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        };
        view(records, &self.keyword, self.min, self.max, self.sort, order)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Scrape(args) => scrape(args).await,
        Command::List(args) => list(args).await,
        Command::Toggle { id, data } => toggle_problem(id, data).await,
        Command::Render { view, out } => render(view, out).await,
    }
}

async fn scrape(args: ScrapeArgs) -> Result<()> {
    let scraper = ScraperBuilder::default()
        .endpoint(args.endpoint)
        .policy(RatePolicy {
            burst: args.burst,
            per_second: args.per_second,
            max_in_flight: args.max_in_flight,
        })
        .timeout(Duration::from_secs(args.timeout_secs))
        .build()?;

    scraper.run(&args.input, &args.output).await?;
    Ok(())
}

async fn list(args: ViewArgs) -> Result<()> {
    let (records, _) = args.data.load().await?;
    let rows = args.view(&records);
    let page = paginate(&rows, args.page, args.page_size);

    for row in page.rows {
        println!(
            "[{}] {:>5}  {:<60} {:>6.0}  {}",
            if row.completed { "x" } else { " " },
            row.id,
            row.name,
            row.rating,
            row.difficulty.map(|d| d.to_string()).unwrap_or_default()
        );
    }
    let summary = Summary::of(&records);
    println!("{}", page.range_label());
    println!(
        "Total Problems: {}  Completed: {}  Remaining: {}",
        summary.total, summary.completed, summary.remaining
    );
    Ok(())
}

async fn toggle_problem(id: u32, data: DataArgs) -> Result<()> {
    let (mut records, mut store) = data.load().await?;
    if !toggle(&mut records, id, &mut store) {
        bail!("no problem with id {}", id);
    }
    if let Some(record) = records.iter().find(|r| r.id == id) {
        if !is_persisted(&store, id, record.completed) {
            bail!(
                "failed to save completion flag for {} to {}",
                id,
                store.path().display()
            );
        }
        info!(id, completed = record.completed, path = %store.path().display(), "toggled");
        println!(
            "{} {}",
            record.name,
            if record.completed { "completed" } else { "not completed" }
        );
    }
    Ok(())
}

async fn render(args: ViewArgs, out: PathBuf) -> Result<()> {
    let (records, _) = args.data.load().await?;
    let rows = args.view(&records);
    let page = paginate(&rows, args.page, args.page_size);

    let html = ProblemTable::new(&records, &page).generate()?;
    fs::write(&out, html)?;
    info!(out = %out.display(), rows = page.rows.len(), "rendered problem table");
    Ok(())
}
