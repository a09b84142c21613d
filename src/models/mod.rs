//! Domain models for Context Dropper.
//!
//! # Core Concepts
//!
//! - [`Project`]: A named project root with a prompt guide. At most one project is
//!   active at a time; commands without an explicit project act on it.
//! - [`Category`]: A per-project tag used to export a subset of selections.
//! - [`Selection`]: A file or directory picked for the context file, optionally
//!   limited by a file-type filter and optionally tagged with a category.

mod category;
mod project;
mod selection;

pub use category::*;
pub use project::*;
pub use selection::*;
