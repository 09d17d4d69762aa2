use std::sync::Arc;
use std::time::Duration;

use sigrelay_core::application::{
    serve, ExecutorService, MessageGate, RelayService, RemoteSession, SessionShell, SigningContext,
    UpstreamPool,
};
use sigrelay_core::domain::error::{ProtocolError, RejectionReason};
use sigrelay_core::domain::identity::{KeyRing, MessageSigner, SignatureVerifier};
use sigrelay_core::domain::message::{error_codes, CacheStoreExecRequest, CommandRequest, UploadRequest};
use sigrelay_core::domain::replay::{ReplayPolicy, SystemClock};
use sigrelay_core::infrastructure::{
    InMemoryCommandStore, LocalFileTransfer, ReplayGuard, SecurityAuditLog, ShellExecutor,
};
use sigrelay_core::infrastructure::signing::{Ed25519Signer, HmacSigner};
use sigrelay_core::infrastructure::wire::MAX_TRANSFER_BYTES;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn context(signer: Arc<dyn MessageSigner>, peers: Vec<(&str, Arc<dyn SignatureVerifier>)>) -> SigningContext {
    let mut keys = KeyRing::new();
    for (id, verifier) in peers {
        keys.insert(id, verifier);
    }
    let gate = MessageGate::new(
        keys,
        Arc::new(ReplayGuard::new(ReplayPolicy::default())),
        Arc::new(SystemClock),
        SecurityAuditLog::new(signer.sender_id()),
    );
    SigningContext::new(signer, Arc::new(gate))
}

async fn start_executor(ctx: SigningContext, shutdown: CancellationToken) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let service = ExecutorService::new(
        ctx.sender_id().to_string(),
        Arc::new(ShellExecutor::new()),
        Arc::new(LocalFileTransfer::new()),
        Arc::new(InMemoryCommandStore::new()),
    );
    let shell = Arc::new(SessionShell::new(ctx, Arc::new(service)));
    tokio::spawn(serve(listener, shell, shutdown));
    address
}

async fn connect(address: &str, ctx: SigningContext) -> RemoteSession {
    RemoteSession::connect(address, Duration::from_secs(5), Duration::from_secs(30), ctx)
        .await
        .unwrap()
}

#[cfg(unix)]
#[tokio::test]
async fn test_direct_command_and_cache_round_trip() {
    let client = Ed25519Signer::generate("client");
    let server = Ed25519Signer::generate("server");
    let client_key: Arc<dyn SignatureVerifier> = Arc::new(client.verifier());
    let server_key: Arc<dyn SignatureVerifier> = Arc::new(server.verifier());

    let shutdown = CancellationToken::new();
    let address = start_executor(context(Arc::new(server), vec![("client", client_key)]), shutdown.clone()).await;
    let mut session = connect(&address, context(Arc::new(client), vec![("server", server_key)])).await;

    let result = session.execute_command(CommandRequest::new("echo hello")).await.unwrap();
    assert!(result.success);
    assert_eq!(result.stdout.trim(), "hello");

    let failed = session.execute_command(CommandRequest::new("exit 3")).await.unwrap();
    assert_eq!(failed.exit_code, 3);
    assert!(!failed.success);

    let key = Uuid::new_v4();
    assert_eq!(session.cache_lookup(key).await.unwrap(), None);
    let stored = session
        .cache_store_exec(CacheStoreExecRequest {
            key: key.to_string(),
            command: "echo cached".into(),
            explanation: "print a word".into(),
            cwd: None,
            timeout_secs: 10,
        })
        .await
        .unwrap();
    assert_eq!(stored.stdout.trim(), "cached");
    assert_eq!(session.cache_lookup(key).await.unwrap().as_deref(), Some("echo cached"));

    let conflict = session
        .cache_store_exec(CacheStoreExecRequest {
            key: key.to_string(),
            command: "echo other".into(),
            explanation: String::new(),
            cwd: None,
            timeout_secs: 10,
        })
        .await
        .unwrap_err();
    match conflict {
        ProtocolError::Remote { code, .. } => assert_eq!(code, error_codes::CACHE_KEY_CONFLICT),
        other => panic!("expected CACHE_KEY_CONFLICT, got {:?}", other),
    }

    shutdown.cancel();
}

#[tokio::test]
async fn test_file_transfer_over_hmac() {
    let secret = vec![7u8; 32];
    let client = HmacSigner::new("client", secret.clone()).unwrap();
    let server = HmacSigner::new("server", secret).unwrap();
    let client_key: Arc<dyn SignatureVerifier> = Arc::new(client.verifier());
    let server_key: Arc<dyn SignatureVerifier> = Arc::new(server.verifier());

    let shutdown = CancellationToken::new();
    let address = start_executor(context(Arc::new(server), vec![("client", client_key)]), shutdown.clone()).await;
    let mut session = connect(&address, context(Arc::new(client), vec![("server", server_key)])).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("payload.bin").to_string_lossy().to_string();
    let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

    let uploaded = session.upload(UploadRequest::new(path.clone(), &data, None)).await.unwrap();
    assert!(uploaded.success);
    assert_eq!(uploaded.bytes_written, data.len() as u64);

    let downloaded = session.download(path).await.unwrap();
    assert_eq!(downloaded.decode_data().unwrap(), Some(data));

    let missing = session.download(dir.path().join("nope").to_string_lossy()).await.unwrap();
    assert!(!missing.found);

    shutdown.cancel();
}

#[tokio::test]
async fn test_download_too_large_for_a_frame_gets_error_reply() {
    let client = Ed25519Signer::generate("client");
    let server = Ed25519Signer::generate("server");
    let client_key: Arc<dyn SignatureVerifier> = Arc::new(client.verifier());
    let server_key: Arc<dyn SignatureVerifier> = Arc::new(server.verifier());

    let shutdown = CancellationToken::new();
    let address = start_executor(context(Arc::new(server), vec![("client", client_key)]), shutdown.clone()).await;
    let mut session = connect(&address, context(Arc::new(client), vec![("server", server_key)])).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.bin");
    std::fs::File::create(&path)
        .unwrap()
        .set_len(MAX_TRANSFER_BYTES + 1)
        .unwrap();

    match session.download(path.to_string_lossy().to_string()).await.unwrap_err() {
        ProtocolError::Remote { code, .. } => assert_eq!(code, error_codes::INVALID_REQUEST),
        other => panic!("expected ERROR reply, got {:?}", other),
    }
    assert!(!session.is_poisoned());
    assert_eq!(session.ping().await.unwrap().node_id, "server");

    shutdown.cancel();
}

#[tokio::test]
async fn test_untrusted_client_gets_auth_error() {
    let client = Ed25519Signer::generate("client");
    let server = Ed25519Signer::generate("server");
    let trusted_elsewhere: Arc<dyn SignatureVerifier> = Arc::new(Ed25519Signer::generate("client").verifier());
    let server_key: Arc<dyn SignatureVerifier> = Arc::new(server.verifier());

    let shutdown = CancellationToken::new();
    let address = start_executor(
        context(Arc::new(server), vec![("client", trusted_elsewhere)]),
        shutdown.clone(),
    )
    .await;
    let mut session = connect(&address, context(Arc::new(client), vec![("server", server_key)])).await;

    match session.ping().await.unwrap_err() {
        ProtocolError::RemoteRejected { reason, .. } => assert_eq!(reason, RejectionReason::AuthenticationFailure),
        other => panic!("expected RemoteRejected, got {:?}", other),
    }
    shutdown.cancel();
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_through_relay() {
    let client = Ed25519Signer::generate("client");
    let relay = Ed25519Signer::generate("relay");
    let server = Ed25519Signer::generate("server");
    let client_key: Arc<dyn SignatureVerifier> = Arc::new(client.verifier());
    let relay_key: Arc<dyn SignatureVerifier> = Arc::new(relay.verifier());
    let server_key: Arc<dyn SignatureVerifier> = Arc::new(server.verifier());
    let relay: Arc<dyn MessageSigner> = Arc::new(relay);

    let shutdown = CancellationToken::new();
    // the server only knows the relay, never the client
    let server_address = start_executor(
        context(Arc::new(server), vec![("relay", relay_key.clone())]),
        shutdown.clone(),
    )
    .await;

    let upstream = Arc::new(UpstreamPool::new(
        server_address,
        context(relay.clone(), vec![("server", server_key)]),
        Duration::from_secs(5),
        Duration::from_secs(30),
        2,
    ));
    let downstream = context(relay, vec![("client", client_key)]);
    let relay_shell = Arc::new(SessionShell::new(
        downstream.clone(),
        Arc::new(RelayService::new(downstream, upstream.clone())),
    ));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_address = listener.local_addr().unwrap().to_string();
    tokio::spawn(serve(listener, relay_shell, shutdown.clone()));

    let mut session = connect(&relay_address, context(Arc::new(client), vec![("relay", relay_key)])).await;
    let result = session.execute_command(CommandRequest::new("echo via-relay")).await.unwrap();
    assert_eq!(result.stdout.trim(), "via-relay");

    let pong = session.ping().await.unwrap();
    assert_eq!(pong.node_id, "server");
    assert_eq!(upstream.idle_count(), 1);

    shutdown.cancel();
}

#[tokio::test]
async fn test_relay_reports_unavailable_upstream() {
    let client = Ed25519Signer::generate("client");
    let relay = Ed25519Signer::generate("relay");
    let client_key: Arc<dyn SignatureVerifier> = Arc::new(client.verifier());
    let relay_key: Arc<dyn SignatureVerifier> = Arc::new(relay.verifier());
    let relay: Arc<dyn MessageSigner> = Arc::new(relay);

    // bind and drop to get a port nobody listens on
    let dead = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap().to_string();
    let upstream = Arc::new(UpstreamPool::new(
        dead,
        context(relay.clone(), vec![]),
        Duration::from_secs(2),
        Duration::from_secs(5),
        2,
    ));
    let downstream = context(relay, vec![("client", client_key)]);
    let shell = Arc::new(SessionShell::new(
        downstream.clone(),
        Arc::new(RelayService::new(downstream, upstream)),
    ));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let shutdown = CancellationToken::new();
    tokio::spawn(serve(listener, shell, shutdown.clone()));

    let mut session = connect(&address, context(Arc::new(client), vec![("relay", relay_key)])).await;
    match session.ping().await.unwrap_err() {
        ProtocolError::Remote { code, .. } => assert_eq!(code, error_codes::UPSTREAM_UNAVAILABLE),
        other => panic!("expected UPSTREAM_UNAVAILABLE, got {:?}", other),
    }
    shutdown.cancel();
}
