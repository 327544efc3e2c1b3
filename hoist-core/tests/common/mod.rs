//! Shared test doubles: a recording backend and a scripted tagger.

#![allow(dead_code)]

use async_trait::async_trait;
use hoist_core::backend::{
    BackendClient, BackendConnector, BackendError, BackendResult, ImageBuildOptions, OutputSink,
    ServerVersion,
};
use hoist_core::tag::{TagError, TagOptions, Tagger};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// A backend call, as observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Build { context: PathBuf, tags: Vec<String> },
    Digest(String),
    Tag { source: String, target: String },
    Push(String),
    Load(PathBuf),
    Version,
}

/// Scripted behaviour plus everything the mock observed.
#[derive(Default)]
pub struct BackendState {
    pub calls: Mutex<Vec<Call>>,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,

    /// Digest returned for every image; `sha256:deadbeef` when unset
    pub digest: Mutex<Option<String>>,
    pub api_version: Mutex<Option<String>>,
    pub fail_connect: bool,
    pub fail_build: bool,
    pub fail_tag: bool,
    pub fail_push: bool,

    /// Builds wait until cancelled instead of completing
    pub hang_build: bool,
}

impl BackendState {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn pushes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Push(tag) => Some(tag),
                _ => None,
            })
            .collect()
    }

    /// Tags handed to the backend's build requests, in order.
    pub fn built_tags(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Build { tags, .. } => tags.into_iter().next(),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

/// Connector handing out clients that share one `BackendState`.
#[derive(Clone, Default)]
pub struct MockBackend {
    pub state: Arc<BackendState>,
}

impl MockBackend {
    pub fn new(state: BackendState) -> Self {
        Self { state: Arc::new(state) }
    }

    pub fn with_digest(digest: &str) -> Self {
        let state = BackendState::default();
        *state.digest.lock().unwrap() = Some(digest.to_string());
        Self::new(state)
    }
}

#[async_trait]
impl BackendConnector for MockBackend {
    async fn connect(&self) -> BackendResult<Box<dyn BackendClient>> {
        if self.state.fail_connect {
            return Err(BackendError::BinaryNotFound {
                binary: "docker".to_string(),
                hint: "mock refuses to connect".to_string(),
            });
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockClient { state: Arc::clone(&self.state) }))
    }
}

struct MockClient {
    state: Arc<BackendState>,
}

#[async_trait]
impl BackendClient for MockClient {
    async fn build(
        &self,
        cancel: &CancellationToken,
        options: &ImageBuildOptions,
        out: OutputSink<'_>,
    ) -> BackendResult<()> {
        self.state.record(Call::Build {
            context: options.context_path.clone(),
            tags: options.tags.clone(),
        });
        if self.state.hang_build {
            cancel.cancelled().await;
            return Err(BackendError::Cancelled);
        }
        if self.state.fail_build {
            return Err(BackendError::CommandFailed {
                command: "docker build".to_string(),
                reason: "failed to solve: dockerfile parse error line 3".to_string(),
            });
        }
        out.write_all(b"Step 1/1 : FROM scratch\n").await.map_err(BackendError::Output)?;
        Ok(())
    }

    async fn digest(&self, _cancel: &CancellationToken, tag: &str) -> BackendResult<String> {
        self.state.record(Call::Digest(tag.to_string()));
        let digest = self.state.digest.lock().unwrap().clone();
        Ok(digest.unwrap_or_else(|| "sha256:deadbeef".to_string()))
    }

    async fn tag(
        &self,
        _cancel: &CancellationToken,
        source: &str,
        target: &str,
    ) -> BackendResult<()> {
        self.state.record(Call::Tag { source: source.to_string(), target: target.to_string() });
        if self.state.fail_tag {
            return Err(BackendError::CommandFailed {
                command: "docker tag".to_string(),
                reason: "invalid reference format".to_string(),
            });
        }
        Ok(())
    }

    async fn push(
        &self,
        _cancel: &CancellationToken,
        tag: &str,
        _out: OutputSink<'_>,
    ) -> BackendResult<()> {
        self.state.record(Call::Push(tag.to_string()));
        if self.state.fail_push {
            return Err(BackendError::CommandFailed {
                command: "docker push".to_string(),
                reason: "denied: requested access to the resource is denied".to_string(),
            });
        }
        Ok(())
    }

    async fn load_image(
        &self,
        _cancel: &CancellationToken,
        tarball: &Path,
        _out: OutputSink<'_>,
    ) -> BackendResult<()> {
        self.state.record(Call::Load(tarball.to_path_buf()));
        Ok(())
    }

    async fn server_version(&self, _cancel: &CancellationToken) -> BackendResult<ServerVersion> {
        self.state.record(Call::Version);
        match self.state.api_version.lock().unwrap().clone() {
            Some(api_version) => Ok(ServerVersion { version: "24.0.7".to_string(), api_version }),
            None => Err(BackendError::CommandFailed {
                command: "docker version".to_string(),
                reason: "Cannot connect to the Docker daemon".to_string(),
            }),
        }
    }

    fn close(&self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Tagger producing `registry/<image>:<digest hex>` and recording its inputs.
#[derive(Default)]
pub struct MockTagger {
    pub requests: Mutex<Vec<TagOptions>>,
    pub fail_for: HashSet<String>,
}

impl MockTagger {
    pub fn failing_for(image: &str) -> Self {
        Self { fail_for: HashSet::from([image.to_string()]), ..Default::default() }
    }

    pub fn requests(&self) -> Vec<TagOptions> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tagger for MockTagger {
    async fn generate_fully_qualified_image_name(
        &self,
        _cancel: &CancellationToken,
        _workspace: &Path,
        options: &TagOptions,
    ) -> Result<String, TagError> {
        self.requests.lock().unwrap().push(options.clone());
        if self.fail_for.contains(&options.image_name) {
            return Err(TagError::MissingVariable { name: "GIT_SHA".to_string() });
        }
        Ok(format!("registry/{}:{}", options.image_name, options.digest_hex()))
    }
}

/// Output sink whose writes always fail.
pub struct BrokenSink;

impl AsyncWrite for BrokenSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "log stream closed")))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Output sink accepting a fixed number of writes, then failing.
pub struct FailingSink {
    remaining: usize,
    pub written: Vec<u8>,
}

impl FailingSink {
    pub fn after(writes: usize) -> Self {
        Self { remaining: writes, written: Vec::new() }
    }
}

impl AsyncWrite for FailingSink {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.remaining == 0 {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "log stream closed")));
        }
        self.remaining -= 1;
        self.written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
