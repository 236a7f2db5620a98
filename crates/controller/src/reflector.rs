//! Keeps a [`Store`] in step with a [`ListerWatcher`].

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use buildflow_core::api::WatchEvent;
use buildflow_core::model::Resource;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::source::ListerWatcher;
use crate::store::Store;

/// Background task mirroring a remote resource set into a sink.
///
/// Each cycle lists, replaces the sink content with the snapshot, then
/// applies watch events until the subscription ends or fails. A new cycle
/// starts after `resync_backoff`; the task never exits on its own.
pub struct Reflector<T, L, S> {
    name: String,
    lister_watcher: Arc<L>,
    store: Arc<S>,
    resync_backoff: Duration,
    _marker: PhantomData<fn() -> T>,
}

impl<T, L, S> Reflector<T, L, S>
where
    T: Resource,
    L: ListerWatcher<T> + 'static,
    S: Store<T> + 'static,
{
    pub fn new(
        name: impl Into<String>,
        lister_watcher: Arc<L>,
        store: Arc<S>,
        resync_backoff: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            lister_watcher,
            store,
            resync_backoff,
            _marker: PhantomData,
        }
    }

    /// Spawns the synchronization loop on the current runtime.
    pub fn run(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(reflector = %self.name, "reflector started");
            loop {
                match self.list_and_watch().await {
                    Ok(()) => debug!(reflector = %self.name, "watch ended; relisting"),
                    Err(e) if e.is_transient() => {
                        warn!(reflector = %self.name, error = %e, "sync failed; relisting")
                    }
                    Err(e) => {
                        tracing::error!(reflector = %self.name, error = %e, "sync failed; relisting")
                    }
                }
                tokio::time::sleep(self.resync_backoff).await;
            }
        })
    }

    /// One list + watch cycle.
    ///
    /// The sink is only touched once the list succeeded. Returns `Ok` when the
    /// authority closes the watch.
    pub async fn list_and_watch(&self) -> Result<()> {
        let list = self.lister_watcher.list().await?;
        let mut resource_version = list.resource_version;
        let count = list.items.len();
        self.store.replace(
            list.items
                .into_iter()
                .map(|obj| (obj.id().to_string(), obj))
                .collect(),
        );
        debug!(reflector = %self.name, count, %resource_version, "applied listing");

        let mut watch = self.lister_watcher.watch(&resource_version).await?;
        while let Some(event) = watch.next().await {
            let event = event?;
            let rv = event.object().resource_version();
            if !rv.is_empty() {
                resource_version = rv.to_string();
            }
            match event {
                WatchEvent::Added(obj) => self.store.add(obj.id().to_string(), obj),
                WatchEvent::Modified(obj) => self.store.update(obj.id().to_string(), obj),
                WatchEvent::Deleted(obj) => self.store.delete(obj.id()),
            }
        }
        debug!(reflector = %self.name, %resource_version, "watch closed");
        Ok(())
    }
}
