//! # openchd-core
//!
//! Core error handling and the container trait for the openchd project.
//!
//! This crate defines the seam between image handles (CD-ROM, hard disk) and
//! the compressed-hunk container codec that backs them:
//!
//! - [`Error`] / [`Result`]: the error vocabulary shared by all crates
//! - [`HunkContainer`]: the consumed container interface
//! - [`AccessMode`]: read-only vs read-write open requests
//! - [`container::tags`]: well-known metadata tags

pub mod container;
pub mod error;

pub use container::{tags, AccessMode, HunkContainer};
pub use error::{Error, Result};
