// src/issue.rs
// =============================================================================
// The issue bus: a side channel for "interesting but non-fatal" events raised
// by the crawler and the server, so a caller embedding this crate can surface
// them (log, metric, UI) without the engine itself taking an opinion on how.
// =============================================================================

use tokio::sync::mpsc;
use url::Url;

use crate::error::MirrorError;

/// Why the server declined or flagged a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerIssueType {
    MethodNotAllowed,
    CacheNotFound,
    CacheError,
    CacheExpired,
    CrossHostInvalidPath,
}

#[derive(Debug, Clone)]
pub struct ServerIssue {
    pub issue_type: ServerIssueType,
    pub url: Url,
    pub info: String,
}

#[derive(Debug, Clone)]
pub struct DownloadIssue {
    pub url: Url,
    pub error: MirrorError,
}

#[derive(Debug, Clone)]
pub enum Issue {
    Server(ServerIssue),
    Download(DownloadIssue),
}

/// A bounded channel carrying `Issue`s out of the crawler/server and into
/// whoever wants to watch them. Dropping the receiver doesn't stop either
/// producer: `IssueBus::send` swallows a closed channel rather than treating
/// it as an error, since an unwatched bus is a normal, supported mode.
#[derive(Clone)]
pub struct IssueBus {
    sender: mpsc::Sender<Issue>,
}

impl IssueBus {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Issue>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    pub fn send(&self, issue: Issue) {
        let _ = self.sender.try_send(issue);
    }

    pub fn server(&self, issue_type: ServerIssueType, url: Url, info: impl Into<String>) {
        self.send(Issue::Server(ServerIssue {
            issue_type,
            url,
            info: info.into(),
        }));
    }

    pub fn download(&self, url: Url, error: MirrorError) {
        self.send(Issue::Download(DownloadIssue { url, error }));
    }
}
