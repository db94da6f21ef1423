//! Output module for inspecting and exporting committed results
//!
//! This module handles:
//! - Summarizing the checkpoint and stored batches
//! - Exporting every committed page result as one JSON file

mod export;
pub mod stats;

pub use export::{collect_results, export_results};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
