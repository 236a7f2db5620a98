//! Access to the remote resource authority.
//!
//! - [`BuildClient`] / [`PodClient`]: the calls the pipeline and the
//!   reconciliation loop make against the authority
//! - [`WatchStream`]: an open change subscription
//! - [`http::HttpAuthority`]: REST implementation
//! - [`memory::InMemoryAuthority`]: in-process implementation for tests

pub mod http;
pub mod memory;

use async_trait::async_trait;
use buildflow_core::api::{BuildList, PodList, Selector, WatchEvent};
use buildflow_core::model::{Build, Pod};
use tokio::sync::mpsc;

use crate::error::Result;

/// Events buffered between the connection and the consumer of a watch.
pub const WATCH_BUFFER: usize = 256;

/// Build operations offered by the authority.
#[async_trait]
pub trait BuildClient: Send + Sync {
    /// Lists all Builds matching `selector`.
    async fn list_builds(&self, selector: &Selector) -> Result<BuildList>;

    /// Opens a change feed for Builds matching `selector`.
    async fn watch_builds(
        &self,
        selector: &Selector,
        resource_version: &str,
    ) -> Result<WatchStream<Build>>;

    /// Writes a Build back, returning the stored object.
    async fn update_build(&self, build: &Build) -> Result<Build>;
}

/// Pod operations offered by the authority.
#[async_trait]
pub trait PodClient: Send + Sync {
    /// Lists all Pods matching `selector`.
    async fn list_pods(&self, selector: &Selector) -> Result<PodList>;

    /// Creates a Pod, returning the stored object.
    async fn create_pod(&self, pod: &Pod) -> Result<Pod>;
}

/// An open change subscription.
///
/// Ends (`next` returns `None`) when the authority closes the feed. Dropping
/// the stream releases the underlying connection.
#[derive(Debug)]
pub struct WatchStream<T> {
    rx: mpsc::Receiver<Result<WatchEvent<T>>>,
}

impl<T> WatchStream<T> {
    /// Creates a stream together with the sender that feeds it.
    pub fn channel(buffer: usize) -> (mpsc::Sender<Result<WatchEvent<T>>>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }

    /// Waits for the next event.
    pub async fn next(&mut self) -> Option<Result<WatchEvent<T>>> {
        self.rx.recv().await
    }
}
