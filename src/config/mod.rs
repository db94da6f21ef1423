//! Configuration module for Resume-Crawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use resume_crawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawler will use concurrency: {}", config.crawler.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserConfig, Config, CrawlerConfig, HttpConfig, InputConfig, OnFlushError, StoreConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
