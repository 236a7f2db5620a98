use async_trait::async_trait;
use buildflow_core::api::{BuildList, PodList, Selector, WatchEvent};
use buildflow_core::model::{Build, Pod};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::debug;

use super::{BuildClient, PodClient, WatchStream, WATCH_BUFFER};
use crate::config::ControllerConfig;
use crate::error::{Error, Result};

/// Status bodies longer than this are cut when reported.
const MAX_ERROR_BODY: usize = 512;

/// REST client for the authority.
///
/// Watches are served as newline-delimited JSON `WatchEvent`s on a long-lived
/// response.
#[derive(Debug, Clone)]
pub struct HttpAuthority {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl HttpAuthority {
    pub fn new(base: &str, token: Option<String>) -> Result<Self> {
        let mut base = Url::parse(base)
            .map_err(|e| Error::config(format!("invalid authority url {base:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(Error::config(format!("authority url {base} cannot be a base")));
        }
        // Joined paths must land under the base path, not replace its last segment.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, base, token })
    }

    /// Builds a client from controller configuration, enforcing credentials
    /// when the configuration requires them.
    pub fn from_config(cfg: &ControllerConfig) -> Result<Self> {
        let token = cfg.bearer_token.clone().filter(|t| !t.trim().is_empty());
        if cfg.require_auth && token.is_none() {
            return Err(Error::config("authority requires a bearer token but none was given"));
        }
        Self::new(&cfg.authority_url, token)
    }

    fn url(&self, path: &str, selector: &Selector) -> Result<Url> {
        let mut url = self
            .base
            .join(&format!("api/v1/{path}"))
            .map_err(|e| Error::config(format!("bad request path {path}: {e}")))?;
        url.query_pairs_mut().append_pair("labels", &selector.to_query());
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let rb = self.http.request(method, url);
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    async fn send<T: DeserializeOwned>(&self, rb: RequestBuilder) -> Result<T> {
        let resp = checked(rb.send().await?).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn checked(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body: String = resp
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(MAX_ERROR_BODY)
        .collect();
    Err(Error::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl BuildClient for HttpAuthority {
    async fn list_builds(&self, selector: &Selector) -> Result<BuildList> {
        let url = self.url("builds", selector)?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn watch_builds(
        &self,
        selector: &Selector,
        resource_version: &str,
    ) -> Result<WatchStream<Build>> {
        let mut url = self.url("watch/builds", selector)?;
        url.query_pairs_mut()
            .append_pair("resourceVersion", resource_version);
        let resp = checked(self.request(Method::GET, url).send().await?).await?;

        let (tx, stream) = WatchStream::channel(WATCH_BUFFER);
        tokio::spawn(pump_watch(resp, tx));
        Ok(stream)
    }

    async fn update_build(&self, build: &Build) -> Result<Build> {
        let url = self.url(&format!("builds/{}", build.meta.id), &Selector::everything())?;
        self.send(self.request(Method::PUT, url).json(build)).await
    }
}

#[async_trait]
impl PodClient for HttpAuthority {
    async fn list_pods(&self, selector: &Selector) -> Result<PodList> {
        let url = self.url("pods", selector)?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn create_pod(&self, pod: &Pod) -> Result<Pod> {
        let url = self.url("pods", &Selector::everything())?;
        self.send(self.request(Method::POST, url).json(pod)).await
    }
}

/// Splits a streamed response body into watch events until the body ends,
/// the connection fails, or the receiving side is dropped.
async fn pump_watch<T: DeserializeOwned>(
    mut resp: Response,
    tx: mpsc::Sender<Result<WatchEvent<T>>>,
) {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        match resp.chunk().await {
            Ok(Some(chunk)) => {
                buf.extend_from_slice(&chunk);
                for event in drain_lines(&mut buf) {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
            }
            Ok(None) => {
                if let Some(event) = drain_tail(&mut buf) {
                    debug!("watch stream ended with an unterminated event");
                    let _ = tx.send(event).await;
                }
                debug!("watch stream ended by authority");
                return;
            }
            Err(e) => {
                let _ = tx.send(Err(e.into())).await;
                return;
            }
        }
    }
}

fn drain_lines<T: DeserializeOwned>(buf: &mut Vec<u8>) -> Vec<Result<WatchEvent<T>>> {
    let mut out = Vec::new();
    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buf.drain(..=pos).collect();
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        out.push(serde_json::from_slice(line).map_err(Error::from));
    }
    out
}

/// Parses whatever is left once the body has ended.
fn drain_tail<T: DeserializeOwned>(buf: &mut Vec<u8>) -> Option<Result<WatchEvent<T>>> {
    let rest = std::mem::take(buf);
    let rest = rest.trim_ascii();
    if rest.is_empty() {
        return None;
    }
    Some(serde_json::from_slice(rest).map_err(Error::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_lines_keeps_partial_tail() {
        let mut buf = br#"{"type":"DELETED","object":{"id":"p1","spec":{"containers":[]}}}

{"type":"ADDED","object":{"id":"p2","#
            .to_vec();
        let events: Vec<Result<WatchEvent<Pod>>> = drain_lines(&mut buf);
        assert_eq!(events.len(), 1);
        match events.into_iter().next().unwrap().unwrap() {
            WatchEvent::Deleted(pod) => assert_eq!(pod.meta.id, "p1"),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(buf, br#"{"type":"ADDED","object":{"id":"p2","#.to_vec());
    }

    #[test]
    fn drain_lines_reports_garbage() {
        let mut buf = b"not json\n".to_vec();
        let events: Vec<Result<WatchEvent<Pod>>> = drain_lines(&mut buf);
        assert!(matches!(events[0], Err(Error::Json(_))));
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_tail_parses_unterminated_event() {
        let mut buf = br#"{"type":"ADDED","object":{"id":"p9","spec":{"containers":[]}}}"#.to_vec();
        assert!(drain_lines::<Pod>(&mut buf).is_empty());
        match drain_tail::<Pod>(&mut buf) {
            Some(Ok(WatchEvent::Added(pod))) => assert_eq!(pod.meta.id, "p9"),
            other => panic!("unexpected tail {other:?}"),
        }
        assert!(buf.is_empty());

        let mut blank = b"  \r\n".to_vec();
        assert!(drain_tail::<Pod>(&mut blank).is_none());

        let mut cut = br#"{"type":"ADDED","obj"#.to_vec();
        assert!(matches!(drain_tail::<Pod>(&mut cut), Some(Err(Error::Json(_)))));
    }

    #[test]
    fn from_config_requires_token_when_asked() {
        let cfg = ControllerConfig {
            require_auth: true,
            bearer_token: Some("  ".into()),
            ..Default::default()
        };
        assert!(matches!(HttpAuthority::from_config(&cfg), Err(Error::Config(_))));

        let cfg = ControllerConfig {
            require_auth: true,
            bearer_token: Some("secret".into()),
            ..Default::default()
        };
        assert!(HttpAuthority::from_config(&cfg).is_ok());
    }

    #[test]
    fn rejects_malformed_url() {
        assert!(matches!(HttpAuthority::new("not a url", None), Err(Error::Config(_))));
    }

    #[test]
    fn urls_are_rooted_under_api() {
        let client = HttpAuthority::new("http://authority:8080/", None).unwrap();
        let url = client.url("watch/builds", &Selector::everything()).unwrap();
        assert_eq!(url.as_str(), "http://authority:8080/api/v1/watch/builds?labels=");

        let prefixed = HttpAuthority::new("http://authority:8080/cluster", None).unwrap();
        let url = prefixed.url("pods", &Selector::everything().with("app", "web")).unwrap();
        assert_eq!(url.as_str(), "http://authority:8080/cluster/api/v1/pods?labels=app%3Dweb");
    }
}
