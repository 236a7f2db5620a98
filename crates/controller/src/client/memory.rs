//! In-memory authority for tests and local development.
//!
//! ## Limitations
//!
//! - **Watches start from "now"**: a subscription only sees changes made
//!   after it was opened, whatever resource version is passed
//! - **Lagging watchers are cut off**: a subscriber that falls more than
//!   [`WATCH_BUFFER`] events behind gets an error and the feed ends

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use buildflow_core::api::{BuildList, ObjectList, PodList, Selector, WatchEvent};
use buildflow_core::model::{Build, Pod, Resource};
use buildflow_core::{new_ulid, now_ms};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use super::{BuildClient, PodClient, WatchStream, WATCH_BUFFER};
use crate::error::{Error, Result};

#[derive(Debug)]
struct Inner {
    version: u64,
    builds: BTreeMap<String, Build>,
    pods: Vec<Pod>,
    events: broadcast::Sender<WatchEvent<Build>>,
    failing_build_lists: u32,
    failing_pod_lists: u32,
    updated_builds: Vec<Build>,
    created_pods: Vec<Pod>,
}

impl Inner {
    fn bump(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

/// Authority double holding Builds and Pods in process memory.
#[derive(Debug)]
pub struct InMemoryAuthority {
    inner: Mutex<Inner>,
}

impl Default for InMemoryAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuthority {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(WATCH_BUFFER);
        Self {
            inner: Mutex::new(Inner {
                version: 0,
                builds: BTreeMap::new(),
                pods: Vec::new(),
                events,
                failing_build_lists: 0,
                failing_pod_lists: 0,
                updated_builds: Vec::new(),
                created_pods: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a Build as an external actor would, notifying watchers.
    ///
    /// Returns the stored object with its new resource version.
    pub fn put_build(&self, mut build: Build) -> Build {
        let mut inner = self.lock();
        build.meta.resource_version = inner.bump();
        if build.meta.created_at_ms == 0 {
            build.meta.created_at_ms = now_ms();
        }
        let event = if inner.builds.contains_key(build.id()) {
            WatchEvent::Modified(build.clone())
        } else {
            WatchEvent::Added(build.clone())
        };
        inner.builds.insert(build.meta.id.clone(), build.clone());
        // No receivers is fine: nobody is watching yet.
        let _ = inner.events.send(event);
        build
    }

    /// Removes a Build, notifying watchers.
    pub fn delete_build(&self, id: &str) -> Option<Build> {
        let mut inner = self.lock();
        let mut build = inner.builds.remove(id)?;
        build.meta.resource_version = inner.bump();
        let _ = inner.events.send(WatchEvent::Deleted(build.clone()));
        Some(build)
    }

    /// Replaces the set of Pods returned by `list_pods`.
    pub fn set_pods(&self, pods: Vec<Pod>) {
        self.lock().pods = pods;
    }

    /// Makes the next `n` Build listings fail.
    pub fn fail_build_lists(&self, n: u32) {
        self.lock().failing_build_lists = n;
    }

    /// Makes the next `n` Pod listings fail.
    pub fn fail_pod_lists(&self, n: u32) {
        self.lock().failing_pod_lists = n;
    }

    /// Ends every open watch subscription.
    pub fn close_watches(&self) {
        let (events, _) = broadcast::channel(WATCH_BUFFER);
        self.lock().events = events;
    }

    /// Number of open watch subscriptions.
    pub fn watcher_count(&self) -> usize {
        self.lock().events.receiver_count()
    }

    /// Builds written back through [`BuildClient::update_build`], in order.
    pub fn updated_builds(&self) -> Vec<Build> {
        self.lock().updated_builds.clone()
    }

    /// Pods created through [`PodClient::create_pod`], in order.
    pub fn created_pods(&self) -> Vec<Pod> {
        self.lock().created_pods.clone()
    }
}

#[async_trait]
impl BuildClient for InMemoryAuthority {
    async fn list_builds(&self, selector: &Selector) -> Result<BuildList> {
        let mut inner = self.lock();
        if inner.failing_build_lists > 0 {
            inner.failing_build_lists -= 1;
            return Err(Error::unavailable("build listing refused"));
        }
        Ok(ObjectList {
            resource_version: inner.version.to_string(),
            items: inner
                .builds
                .values()
                .filter(|b| selector.matches(&b.meta.labels))
                .cloned()
                .collect(),
        })
    }

    async fn watch_builds(
        &self,
        selector: &Selector,
        _resource_version: &str,
    ) -> Result<WatchStream<Build>> {
        let mut rx = self.lock().events.subscribe();
        let (tx, stream) = WatchStream::channel(WATCH_BUFFER);
        let selector = selector.clone();
        tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Closed) => return,
                    Err(RecvError::Lagged(n)) => {
                        let _ = tx
                            .send(Err(Error::unavailable(format!("watch lagged by {n} events"))))
                            .await;
                        return;
                    }
                };
                if !selector.matches(&event.object().meta.labels) {
                    continue;
                }
                if tx.send(Ok(event)).await.is_err() {
                    return;
                }
            }
        });
        Ok(stream)
    }

    async fn update_build(&self, build: &Build) -> Result<Build> {
        let stored = self.put_build(build.clone());
        self.lock().updated_builds.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl PodClient for InMemoryAuthority {
    async fn list_pods(&self, selector: &Selector) -> Result<PodList> {
        let mut inner = self.lock();
        if inner.failing_pod_lists > 0 {
            inner.failing_pod_lists -= 1;
            return Err(Error::unavailable("pod listing refused"));
        }
        Ok(ObjectList {
            resource_version: inner.version.to_string(),
            items: inner
                .pods
                .iter()
                .filter(|p| selector.matches(&p.meta.labels))
                .cloned()
                .collect(),
        })
    }

    async fn create_pod(&self, pod: &Pod) -> Result<Pod> {
        let mut inner = self.lock();
        let mut pod = pod.clone();
        if pod.meta.id.is_empty() {
            pod.meta.id = new_ulid().to_string();
        }
        if inner.pods.iter().any(|p| p.id() == pod.id()) {
            return Err(Error::Status {
                status: 409,
                body: format!("pod {} already exists", pod.id()),
            });
        }
        pod.meta.resource_version = inner.bump();
        pod.meta.created_at_ms = now_ms();
        inner.pods.push(pod.clone());
        inner.created_pods.push(pod.clone());
        Ok(pod)
    }
}
