//! Builds and queries a TF-IDF search index over the local manual-page corpus.

pub mod cache;
pub mod config;
pub mod constants;
pub mod crawl;
pub mod doc;
pub mod error;
pub mod index;
pub mod io_util;
pub mod logging;
pub mod model;
pub mod name;
pub mod page;
pub mod search;
pub mod store;
pub mod text;

pub use error::{Error, Result};
