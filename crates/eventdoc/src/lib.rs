//! `eventdoc` - Browse and document the analytics event catalog
//!
//! This library holds everything the `eventdoc` binary does: the record model,
//! the gateway to the catalog API, the shared query cache, and the browsing
//! state (filter, per-event editors, coverage summary) with its text views.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod browse;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod record;
pub mod render;
pub mod session;

pub use cache::{CacheOptions, QueryCache, QueryState};
pub use config::Config;
pub use error::{Error, Result};
pub use gateway::{EventGateway, HttpGateway, MemoryGateway};
pub use logging::init_logging;
pub use record::{EventRecord, JsonText};
pub use session::{BrowseCommand, Browser};
