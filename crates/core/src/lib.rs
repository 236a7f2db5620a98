#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Shared resource models for the build controller pipeline.

pub mod api;
pub mod model;

mod util;

pub use util::{new_ulid, now_ms};
