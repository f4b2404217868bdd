pub mod catalog;
pub mod problem;
pub mod render;
pub mod scraper;
pub mod store;
pub mod table;

pub use catalog::{load, LoadError, Location, Source};
pub use problem::{parse_ratings, Difficulty, ProblemRecord};
pub use store::{FileFlagStore, FlagStore, MemoryFlagStore};
pub use table::{filter, sort, toggle, Filter, SortColumn, SortOrder};
