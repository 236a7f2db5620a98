#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Event pipeline feeding the build controller.
//!
//! Two reflectors mirror Builds from the authority into a cache and a work
//! queue, a poller mirrors Pods into a second work queue, and a kind-based
//! dispatcher picks the strategy that turns a Build into a pod.
//! [`factory::ControllerFactory`] assembles all of it.

pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod fifo;
pub mod poller;
pub mod reflector;
pub mod source;
pub mod store;
pub mod strategy;

pub use error::{Error, Result};
