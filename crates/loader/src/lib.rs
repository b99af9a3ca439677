//! Roole Loader
//!
//! Fetches the source of imported stylesheets.

mod error;
mod loader;

pub use error::{LoadError, LoadResult};
pub use loader::{FileLoader, Loader, MemoryLoader};
