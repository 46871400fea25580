// src/server/mod.rs
// =============================================================================
// The server: replays cached responses on demand, either under a single
// fixed root (one host mirrored on one listener) or in cross-host mode,
// where the path itself carries the scheme and host to serve
// (`/https/example.com/path`).
//
// Built directly on `hyper` 1.x + `hyper-util`'s `TokioIo` + `http-body-util`,
// not a framework - one accept loop per listener, one task per connection,
// matching the original's one `net.Listen` + `http.Serve` per host.
// =============================================================================

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use dashmap::DashMap;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

use crate::cache::Cacher;
use crate::error::MirrorError;
use crate::issue::{ServerIssue, ServerIssueType};

static CROSS_HOST_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(https?)/([^/]+)(/.*)?$").expect("static cross-host regex is valid"));

type OnServerIssue = Arc<dyn Fn(&ServerIssue) + Send + Sync>;

struct Listener {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

pub struct Server {
    cacher: Arc<dyn Cacher>,
    on_issue: Mutex<Option<OnServerIssue>>,
    listeners: DashMap<String, Listener>,
}

impl Server {
    pub fn new(cacher: Arc<dyn Cacher>) -> Arc<Self> {
        Arc::new(Self {
            cacher,
            on_issue: Mutex::new(None),
            listeners: DashMap::new(),
        })
    }

    pub fn set_on_server_issue(&self, f: OnServerIssue) {
        *self.on_issue.lock().expect("on_issue mutex poisoned") = Some(f);
    }

    /// Starts listening on `port`. `root` fixes the mirrored host (every
    /// request is served as if it targeted `root`); `None` selects
    /// cross-host mode, where the path carries `/scheme/host/rest`. A second
    /// call for a host that already has a listener fails.
    pub async fn listen_and_serve(self: &Arc<Self>, root: Option<Url>, port: u16) -> Result<(), MirrorError> {
        let host = root
            .as_ref()
            .and_then(|u| u.host_str())
            .unwrap_or("")
            .to_string();

        if self.listeners.contains_key(&host) {
            return Err(MirrorError::InputInvalid(
                "existing listener has been found for this host".to_string(),
            ));
        }

        let tcp = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| MirrorError::Transport(e.to_string()))?;

        tracing::info!(?root, port, "serving");

        let (stop_tx, mut stop_rx) = oneshot::channel();
        let server = Arc::clone(self);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        tracing::info!(host = %host, "stopped listening");
                        break;
                    }
                    accepted = tcp.accept() => {
                        let (stream, _) = match accepted {
                            Ok(pair) => pair,
                            Err(e) => {
                                tracing::error!(error = %e, "cannot accept connection");
                                continue;
                            }
                        };
                        let io = TokioIo::new(stream);
                        let server = Arc::clone(&server);
                        let root = root.clone();
                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let server = Arc::clone(&server);
                                let root = root.clone();
                                async move { server.serve(root, req).await }
                            });
                            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                                tracing::debug!(error = %err, "connection closed with error");
                            }
                        });
                    }
                }
            }
        });

        self.listeners.insert(
            host,
            Listener {
                stop_tx: Some(stop_tx),
                task,
            },
        );
        Ok(())
    }

    /// Closes every listener, returning the hosts successfully stopped.
    pub async fn stop(&self) -> Vec<String> {
        let hosts: Vec<String> = self.listeners.iter().map(|entry| entry.key().clone()).collect();
        let mut stopped = Vec::with_capacity(hosts.len());

        for host in hosts {
            if let Some((_, mut listener)) = self.listeners.remove(&host) {
                if let Some(tx) = listener.stop_tx.take() {
                    let _ = tx.send(());
                }
                let _ = listener.task.await;
                stopped.push(host);
            }
        }

        stopped
    }

    async fn serve(
        &self,
        root: Option<Url>,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
            .to_string();

        let target = match target_url(root.as_ref(), &path_and_query) {
            Ok(url) => url,
            Err(placeholder) => {
                return Ok(self.issue_response(
                    ServerIssueType::CrossHostInvalidPath,
                    placeholder,
                    format!("no match for cross-host path {}", req.uri().path()),
                    StatusCode::BAD_REQUEST,
                ));
            }
        };

        if req.method() != &Method::GET {
            return Ok(self.issue_response(
                ServerIssueType::MethodNotAllowed,
                target,
                format!("method not allowed: {}", req.method()),
                StatusCode::METHOD_NOT_ALLOWED,
            ));
        }

        match self.cacher.open(&target).await {
            Ok(entry) => {
                if let Some(expires) = self.cacher.expires(&entry) {
                    if expires < Utc::now() {
                        self.trigger_issue(ServerIssueType::CacheExpired, target.clone(), format!("expired at {expires}"));
                    }
                }

                tracing::debug!(url = %target, status = entry.status_code, "served");

                let mut builder = Response::builder()
                    .status(StatusCode::from_u16(entry.status_code).unwrap_or(StatusCode::OK));
                for (name, value) in &entry.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                Ok(builder.body(Full::new(Bytes::from(entry.body))).unwrap())
            }
            Err(e) => {
                let issue_type = match e {
                    MirrorError::CacheMiss => ServerIssueType::CacheNotFound,
                    _ => ServerIssueType::CacheError,
                };
                Ok(self.issue_response(issue_type, target, e.to_string(), StatusCode::NOT_FOUND))
            }
        }
    }

    fn issue_response(
        &self,
        issue_type: ServerIssueType,
        url: Url,
        info: String,
        status: StatusCode,
    ) -> Response<Full<Bytes>> {
        self.trigger_issue(issue_type, url.clone(), info.clone());
        tracing::debug!(url = %url, issue = ?issue_type, %info, "served");
        Response::builder()
            .status(status)
            .body(Full::new(Bytes::from(info)))
            .unwrap()
    }

    fn trigger_issue(&self, issue_type: ServerIssueType, url: Url, info: String) {
        let callback = self.on_issue.lock().expect("on_issue mutex poisoned").clone();
        if let Some(callback) = callback {
            callback(&ServerIssue {
                issue_type,
                url,
                info,
            });
        }
    }
}

/// Resolves a request's path (and query) into the URL that should be looked
/// up in the cache. `Err` carries a best-effort placeholder URL for issue
/// reporting when the cross-host path doesn't match the expected shape.
fn target_url(root: Option<&Url>, path_and_query: &str) -> Result<Url, Url> {
    if let Some(root) = root {
        let mut base = root.clone();
        base.set_path("/");
        return Ok(base
            .join(path_and_query.trim_start_matches('/'))
            .unwrap_or_else(|_| root.clone()));
    }

    let path = path_and_query.split('?').next().unwrap_or(path_and_query);
    let Some(caps) = CROSS_HOST_PATH.captures(path) else {
        return Err(Url::parse("http://invalid.local/").unwrap());
    };

    let scheme = &caps[1];
    let host = &caps[2];
    let rest = caps.get(3).map(|m| m.as_str()).unwrap_or("/");
    let query = path_and_query.split_once('?').map(|(_, q)| format!("?{q}")).unwrap_or_default();

    Url::parse(&format!("{scheme}://{host}{rest}{query}")).map_err(|_| Url::parse("http://invalid.local/").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_root_rewrites_path_onto_the_root_host() {
        let root = Url::parse("http://mirror.local/").unwrap();
        let resolved = target_url(Some(&root), "/p?x=1").unwrap();
        assert_eq!(resolved.as_str(), "http://mirror.local/p?x=1");
    }

    #[test]
    fn cross_host_path_parses_scheme_host_and_rest() {
        let resolved = target_url(None, "/https/example.com/a/b").unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/a/b");
    }

    #[test]
    fn cross_host_path_carries_the_query_string() {
        let resolved = target_url(None, "/http/example.com/a?x=1").unwrap();
        assert_eq!(resolved.as_str(), "http://example.com/a?x=1");
    }

    #[test]
    fn cross_host_path_without_match_is_an_error() {
        assert!(target_url(None, "/not-a-match").is_err());
    }

    #[test]
    fn cross_host_path_with_no_trailing_segment_defaults_to_root() {
        let resolved = target_url(None, "/http/example.com").unwrap();
        assert_eq!(resolved.as_str(), "http://example.com/");
    }

    #[tokio::test]
    async fn listen_and_serve_rejects_a_second_listener_for_the_same_host() {
        let server = Server::new(Arc::new(crate::cache::MemoryCacher::default()));
        let root = Url::parse("http://mirror.local/").unwrap();

        server.listen_and_serve(Some(root.clone()), 0).await.unwrap();
        let second = server.listen_and_serve(Some(root), 0).await;
        assert!(second.is_err());

        server.stop().await;
    }
}
