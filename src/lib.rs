//! Fold per-run episode documents into an accumulating RSS 2.0 feed.
//!
//! The [`feed`] module holds the merge pipeline, [`xml`] the small document
//! model it runs on, [`config`] the TOML settings and [`util`] the file-system
//! glue used by the binary.

pub mod config;
pub mod feed;
pub mod util;
pub mod xml;
