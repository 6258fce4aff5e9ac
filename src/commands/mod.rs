//! CLI command implementations
//!
//! `list` prints the discovered partition table. `transfer` runs the image
//! and framed-file pipelines against a named partition.

mod list;
mod progress;
mod transfer;

pub use list::list_partitions;
pub use transfer::{run_action, Action};
