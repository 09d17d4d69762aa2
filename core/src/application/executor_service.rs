// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Executor Service
//!
//! Request handler of an executor node: runs shell commands, moves files, and
//! keeps the remote half of the semantic cache (`key -> command`).
//!
//! Handler failures (bad path, key conflict) become `ERROR` replies; a command
//! that exits nonzero is a normal `RESPONSE`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::domain::command_store::{RemoteCommandStore, StoreOutcome};
use crate::domain::execution::{CommandExecutor, ExecutionSpec, FileTransfer, FileTransferError};
use crate::domain::message::{
    error_codes, Body, CacheHitReply, CacheLookupRequest, CacheMissReply, CacheStoreExecRequest, CommandRequest,
    DownloadRequest, DownloadResult, Message, Payload, PongReply, Signable, UploadRequest, UploadResult,
};

use crate::infrastructure::file_transfer::expand_home;

use super::session::MessageHandler;

pub struct ExecutorService {
    node_id: String,
    executor: Arc<dyn CommandExecutor>,
    files: Arc<dyn FileTransfer>,
    store: Arc<dyn RemoteCommandStore>,
    default_timeout: Duration,
    max_timeout: Duration,
}

impl ExecutorService {
    pub fn new(
        node_id: impl Into<String>,
        executor: Arc<dyn CommandExecutor>,
        files: Arc<dyn FileTransfer>,
        store: Arc<dyn RemoteCommandStore>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            executor,
            files,
            store,
            default_timeout: Duration::from_secs(300),
            max_timeout: Duration::from_secs(3600),
        }
    }

    pub fn with_timeouts(mut self, default_timeout: Duration, max_timeout: Duration) -> Self {
        self.default_timeout = default_timeout;
        self.max_timeout = max_timeout;
        self
    }

    /// `0` means the node default; anything above the node maximum is capped.
    fn effective_timeout(&self, requested_secs: u64) -> Duration {
        if requested_secs == 0 {
            self.default_timeout
        } else {
            Duration::from_secs(requested_secs).min(self.max_timeout)
        }
    }

    async fn resolve_cwd(&self, cwd: Option<&str>) -> Result<Option<PathBuf>, Body> {
        let Some(cwd) = cwd else {
            return Ok(None);
        };
        let path = expand_home(cwd);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(Some(path)),
            _ => Err(Body::error(
                error_codes::INVALID_REQUEST,
                format!("working directory does not exist: {}", cwd),
            )),
        }
    }

    async fn run(&self, command: &str, cwd: Option<&str>, timeout_secs: u64) -> Body {
        let cwd = match self.resolve_cwd(cwd).await {
            Ok(cwd) => cwd,
            Err(reply) => return reply,
        };
        let spec = ExecutionSpec {
            command: command.to_string(),
            cwd,
            timeout: self.effective_timeout(timeout_secs),
        };
        let result = self.executor.execute(spec).await;
        info!(
            exit_code = result.exit_code,
            timed_out = result.timed_out,
            "Command finished"
        );
        reply(Payload::Response(result))
    }

    async fn handle_command(&self, request: CommandRequest) -> Body {
        info!(command = %request.command, cwd = ?request.cwd, "Executing command");
        self.run(&request.command, request.cwd.as_deref(), request.timeout_secs)
            .await
    }

    async fn handle_upload(&self, request: UploadRequest) -> Body {
        let data = match request.decode_data() {
            Ok(data) => data,
            Err(e) => {
                return reply(Payload::UploadResult(UploadResult {
                    success: false,
                    message: e.to_string(),
                    bytes_written: 0,
                }))
            }
        };
        let result = match self.files.write_file(&request.remote_path, &data, &request.mode).await {
            Ok(written) => {
                info!(path = %request.remote_path, bytes = written, "Upload written");
                UploadResult {
                    success: true,
                    message: format!("Wrote {} bytes to {}", written, request.remote_path),
                    bytes_written: written,
                }
            }
            Err(e) => {
                warn!(path = %request.remote_path, error = %e, "Upload failed");
                UploadResult {
                    success: false,
                    message: e.to_string(),
                    bytes_written: 0,
                }
            }
        };
        reply(Payload::UploadResult(result))
    }

    async fn handle_download(&self, request: DownloadRequest) -> Body {
        match self.files.read_file(&request.remote_path).await {
            Ok(data) => {
                info!(path = %request.remote_path, bytes = data.len(), "Download read");
                reply(Payload::DownloadResult(DownloadResult::found(&data)))
            }
            Err(e @ (FileTransferError::NotFound(_) | FileTransferError::NotAFile(_))) => {
                reply(Payload::DownloadResult(DownloadResult::not_found(e.to_string())))
            }
            Err(e) => {
                warn!(path = %request.remote_path, error = %e, "Download refused");
                Body::error(e.code(), e.to_string())
            }
        }
    }

    async fn handle_cache_lookup(&self, request: CacheLookupRequest) -> Body {
        let key = match Uuid::parse_str(&request.key) {
            Ok(key) => key,
            Err(_) => {
                return Body::error(
                    error_codes::INVALID_REQUEST,
                    format!("cache key is not a UUID: {}", request.key),
                )
            }
        };
        match self.store.get(key).await {
            Ok(Some(stored)) => {
                info!(key = %key, uses = stored.use_count, "Cache hit");
                reply(Payload::CacheHit(CacheHitReply {
                    key: request.key,
                    command: stored.command,
                }))
            }
            Ok(None) => {
                info!(key = %key, "Cache miss");
                reply(Payload::CacheMiss(CacheMissReply { key: request.key }))
            }
            Err(e) => Body::error(error_codes::INTERNAL, e.to_string()),
        }
    }

    /// Remember `key -> command`, then execute. A key already bound to a
    /// different command is refused without running anything.
    async fn handle_cache_store_exec(&self, request: CacheStoreExecRequest) -> Body {
        let key = match Uuid::parse_str(&request.key) {
            Ok(key) => key,
            Err(_) => {
                return Body::error(
                    error_codes::INVALID_REQUEST,
                    format!("cache key is not a UUID: {}", request.key),
                )
            }
        };
        match self.store.put(key, &request.command).await {
            Ok(StoreOutcome::Stored) => info!(key = %key, explanation = %request.explanation, "Cached command"),
            Ok(StoreOutcome::AlreadyPresent) => info!(key = %key, "Command already cached"),
            Ok(StoreOutcome::Conflict { .. }) => {
                warn!(key = %key, "Cache key already bound to a different command");
                return Body::error(
                    error_codes::CACHE_KEY_CONFLICT,
                    format!("key {} is bound to a different command", key),
                );
            }
            Err(e) => return Body::error(error_codes::INTERNAL, e.to_string()),
        }
        self.run(&request.command, request.cwd.as_deref(), request.timeout_secs)
            .await
    }
}

#[async_trait]
impl MessageHandler for ExecutorService {
    async fn handle(&self, request: Message) -> Body {
        let span = info_span!(
            "request",
            sender_id = %request.sender_id(),
            message_type = %request.message_type()
        );
        self.dispatch(request.into_body().into_payload())
            .instrument(span)
            .await
    }
}

impl ExecutorService {
    async fn dispatch(&self, payload: Payload) -> Body {
        match payload {
            Payload::Command(r) => self.handle_command(r).await,
            Payload::Upload(r) => self.handle_upload(r).await,
            Payload::Download(r) => self.handle_download(r).await,
            Payload::Ping(_) => reply(Payload::Pong(PongReply {
                node_id: self.node_id.clone(),
                time: Utc::now().timestamp(),
            })),
            Payload::CacheLookup(r) => self.handle_cache_lookup(r).await,
            Payload::CacheStoreExec(r) => self.handle_cache_store_exec(r).await,
            other @ (Payload::Response(_)
            | Payload::UploadResult(_)
            | Payload::DownloadResult(_)
            | Payload::Pong(_)
            | Payload::CacheHit(_)
            | Payload::CacheMiss(_)
            | Payload::Error(_)
            | Payload::AuthError(_)) => Body::error(
                error_codes::INVALID_REQUEST,
                format!("{} is not a request", other.message_type()),
            ),
        }
    }
}

fn reply(payload: Payload) -> Body {
    let message_type = payload.message_type();
    Body::new(payload).unwrap_or_else(|e| {
        warn!(%message_type, error = %e, "Failed to encode reply");
        Body::error(error_codes::INTERNAL, e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::ExecutionResult;
    use crate::domain::message::MessageType;
    use crate::infrastructure::command_store::InMemoryCommandStore;
    use crate::infrastructure::file_transfer::LocalFileTransfer;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        ran: Mutex<Vec<ExecutionSpec>>,
    }

    #[async_trait]
    impl CommandExecutor for Recorder {
        async fn execute(&self, spec: ExecutionSpec) -> ExecutionResult {
            let out = format!("ran: {}", spec.command);
            self.ran.lock().push(spec);
            ExecutionResult::completed(out, String::new(), 0)
        }
    }

    fn service() -> (ExecutorService, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let svc = ExecutorService::new(
            "server",
            recorder.clone(),
            Arc::new(LocalFileTransfer::new()),
            Arc::new(InMemoryCommandStore::new()),
        )
        .with_timeouts(Duration::from_secs(30), Duration::from_secs(60));
        (svc, recorder)
    }

    fn store_exec(key: &str, command: &str) -> Payload {
        Payload::CacheStoreExec(CacheStoreExecRequest {
            key: key.into(),
            command: command.into(),
            explanation: "list files".into(),
            cwd: None,
            timeout_secs: 0,
        })
    }

    #[tokio::test]
    async fn test_store_exec_then_lookup_hits() {
        let (svc, recorder) = service();
        let key = Uuid::new_v4().to_string();

        let body = svc.dispatch(store_exec(&key, "ls -la")).await;
        assert_eq!(body.message_type(), MessageType::Response);
        assert_eq!(recorder.ran.lock()[0].timeout, Duration::from_secs(30));

        let body = svc
            .dispatch(Payload::CacheLookup(CacheLookupRequest { key: key.clone() }))
            .await;
        match body.payload() {
            Payload::CacheHit(hit) => {
                assert_eq!(hit.key, key);
                assert_eq!(hit.command, "ls -la");
            }
            other => panic!("expected CACHE_HIT, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lookup_unknown_key_misses() {
        let (svc, _) = service();
        let body = svc
            .dispatch(Payload::CacheLookup(CacheLookupRequest {
                key: Uuid::new_v4().to_string(),
            }))
            .await;
        assert_eq!(body.message_type(), MessageType::CacheMiss);
    }

    #[tokio::test]
    async fn test_conflicting_store_exec_does_not_run() {
        let (svc, recorder) = service();
        let key = Uuid::new_v4().to_string();
        svc.dispatch(store_exec(&key, "ls -la")).await;
        let body = svc.dispatch(store_exec(&key, "rm -rf /tmp/x")).await;
        match body.payload() {
            Payload::Error(e) => assert_eq!(e.code, error_codes::CACHE_KEY_CONFLICT),
            other => panic!("expected ERROR, got {:?}", other),
        }
        assert_eq!(recorder.ran.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_key_is_invalid_request() {
        let (svc, _) = service();
        let body = svc
            .dispatch(Payload::CacheLookup(CacheLookupRequest { key: "nope".into() }))
            .await;
        match body.payload() {
            Payload::Error(e) => assert_eq!(e.code, error_codes::INVALID_REQUEST),
            other => panic!("expected ERROR, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_capped() {
        let (svc, recorder) = service();
        let mut request = CommandRequest::new("true");
        request.timeout_secs = 99_999;
        svc.dispatch(Payload::Command(request)).await;
        assert_eq!(recorder.ran.lock()[0].timeout, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_missing_cwd_is_invalid_request() {
        let (svc, recorder) = service();
        let mut request = CommandRequest::new("ls");
        request.cwd = Some("/definitely/not/here".into());
        let body = svc.dispatch(Payload::Command(request)).await;
        assert_eq!(body.message_type(), MessageType::Error);
        assert!(recorder.ran.lock().is_empty());
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let (svc, _) = service();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/blob.bin").to_string_lossy().to_string();

        let body = svc
            .dispatch(Payload::Upload(UploadRequest::new(path.clone(), &[0, 1, 2, 255], None)))
            .await;
        match body.payload() {
            Payload::UploadResult(r) => {
                assert!(r.success);
                assert_eq!(r.bytes_written, 4);
            }
            other => panic!("expected UPLOAD_RESULT, got {:?}", other),
        }

        let body = svc
            .dispatch(Payload::Download(DownloadRequest { remote_path: path }))
            .await;
        match body.payload() {
            Payload::DownloadResult(r) => assert_eq!(r.decode_data().unwrap(), Some(vec![0, 1, 2, 255])),
            other => panic!("expected DOWNLOAD_RESULT, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_download_missing_file_is_not_found_result() {
        let (svc, _) = service();
        let body = svc
            .dispatch(Payload::Download(DownloadRequest {
                remote_path: "/no/such/file".into(),
            }))
            .await;
        match body.payload() {
            Payload::DownloadResult(r) => assert!(!r.found),
            other => panic!("expected DOWNLOAD_RESULT, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_download_is_invalid_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![1u8; 4096]).unwrap();
        let svc = ExecutorService::new(
            "server",
            Arc::new(Recorder::default()),
            Arc::new(LocalFileTransfer::new().with_max_file_bytes(1000)),
            Arc::new(InMemoryCommandStore::new()),
        );
        let body = svc
            .dispatch(Payload::Download(DownloadRequest {
                remote_path: path.to_string_lossy().to_string(),
            }))
            .await;
        match body.payload() {
            Payload::Error(e) => assert_eq!(e.code, error_codes::INVALID_REQUEST),
            other => panic!("expected ERROR, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_response_payload_is_not_a_request() {
        let (svc, _) = service();
        let body = svc
            .dispatch(Payload::CacheMiss(CacheMissReply { key: "k".into() }))
            .await;
        assert_eq!(body.message_type(), MessageType::Error);
    }
}
