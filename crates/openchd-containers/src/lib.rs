//! # openchd-containers
//!
//! Container implementations for the openchd project.
//!
//! Two implementations of [`openchd_core::HunkContainer`]:
//!
//! - [`ChdContainer`]: the production container, backed by the `chd` codec
//!   crate. Compressed, read-only.
//! - [`MemContainer`]: an uncompressed in-memory container. Writable, used
//!   by read-write hard-disk images and as the test fixture container.

pub mod chd;
pub mod mem;

pub use self::chd::ChdContainer;
pub use self::mem::MemContainer;
