//! `readorder` - Reading-order reconstruction for fixed-layout EPUB pages
//!
//! # Features
//!
//! - **Geometric detection**: absolutely positioned text runs are clustered
//!   back into fact tables, comparison tables and ordered lists
//! - **Structural repair**: callouts, split sentences and marker paragraphs
//!   are rejoined into asides, paragraphs and nested lists
//! - **Footers**: page-number artifacts become one landmark footer
//! - **Patching**: the rebuilt fragment is inserted into the source file
//!
//! # Example
//!
//! ```rust
//! use readorder::{Config, Processor};
//!
//! let processor = Processor::new(Config::default());
//! let out = processor.reconstruct(
//!     "<html><body><p>1. Red</p><p>2. Green</p><p>The end. 7</p></body></html>",
//!     "",
//! );
//! assert_eq!(out.footer.page_number.as_deref(), Some("7"));
//! assert_eq!(out.text, "1. Red\n2. Green\n\nThe end.\n\nPage Number 7");
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod job;
pub mod layout;
pub mod patch;
pub mod pipeline;
pub mod report;
pub mod structure;
pub mod text;

pub use config::Config;
pub use error::{PatchError, ProcessError, Result};
pub use job::{JobHandle, JobRegistry, JobStatus};
pub use pipeline::{FileReport, FolderReport, Processor, Progress, Reconstruction, Stage};

/// Version of readorder
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
