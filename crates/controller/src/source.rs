//! Watch sources: list + watch access to one resource type.

use std::sync::Arc;

use async_trait::async_trait;
use buildflow_core::api::{ObjectList, Selector};
use buildflow_core::model::Build;

use crate::client::{BuildClient, WatchStream};
use crate::error::Result;

/// Version marker asking the authority to watch from the start of what it
/// currently retains rather than resuming from a previous list.
pub const WATCH_FROM_START: &str = "0";

/// Something a [`Reflector`](crate::reflector::Reflector) can drive.
#[async_trait]
pub trait ListerWatcher<T>: Send + Sync {
    /// Full snapshot of the resource set.
    async fn list(&self) -> Result<ObjectList<T>>;

    /// Incremental changes after `resource_version`.
    async fn watch(&self, resource_version: &str) -> Result<WatchStream<T>>;
}

/// Lists and watches every Build.
#[derive(Clone)]
pub struct BuildListWatch {
    client: Arc<dyn BuildClient>,
}

impl BuildListWatch {
    pub fn new(client: Arc<dyn BuildClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ListerWatcher<Build> for BuildListWatch {
    async fn list(&self) -> Result<ObjectList<Build>> {
        self.client.list_builds(&Selector::everything()).await
    }

    /// Resumable watches are not supported: the given version is ignored.
    async fn watch(&self, _resource_version: &str) -> Result<WatchStream<Build>> {
        self.client
            .watch_builds(&Selector::everything(), WATCH_FROM_START)
            .await
    }
}
