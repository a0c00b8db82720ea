//! TOML configuration for a fetch run
//!
//! A config file sets the engine limits, the user agent, status-code overrides,
//! the shared cookie pool, and the seed tasks. Files are validated as a whole on
//! load; [`Config`] then builds the runtime pieces the scheduler needs.
//!
//! # Example
//!
//! ```no_run
//! use gatherer::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("gatherer.toml")).unwrap();
//! let classifier = config.classifier().unwrap();
//! println!("{} workers, {} status codes", config.engine.workers, classifier.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CookieEntry, EngineConfig, ExtractConfig, SeedEntry, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
