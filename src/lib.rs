//! Resolve anime and manga titles into playable streams and chapter images.
//!
//! A provider walks a catalog in four steps (search, list episodes or
//! chapters, list video servers, extract) and [`resolver::Resolver`] wraps
//! each step so failures degrade to empty results.

pub mod config;
pub mod diagnostics;
pub mod extractors;
pub mod http;
pub mod manifest;
pub mod player;
pub mod providers;
pub mod resolver;
pub mod store;
pub mod types;

pub use providers::{AnimeProvider, MangaProvider, Source};
pub use resolver::Resolver;
