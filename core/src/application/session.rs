// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Connection Sessions
//!
//! Server side of a connection. Each accepted connection gets its own task;
//! within a connection requests are handled one at a time, in arrival order.
//!
//! For every inbound frame the session:
//!
//! 1. decodes it ([`MessageCodec`]), answering `AUTH_ERROR(protocol_violation)`
//!    when it is not a well-formed envelope;
//! 2. passes it through the [`MessageGate`](super::gate::MessageGate),
//!    answering `AUTH_ERROR` with the rejection reason when that fails;
//! 3. dispatches the payload to the [`MessageHandler`] and signs whatever
//!    body it returns.
//!
//! Handlers never see a message that failed authentication or replay checks.

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::error::{ProtocolError, RejectionReason};
use crate::domain::message::{error_codes, Body, Message, Signable};
use crate::infrastructure::audit::SecurityAuditLog;
use crate::infrastructure::wire::{ensure_fits, MessageCodec};

use super::gate::SigningContext;

/// Produces the response body for an authenticated request.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, request: Message) -> Body;
}

pub struct SessionShell {
    context: SigningContext,
    handler: Arc<dyn MessageHandler>,
    audit: SecurityAuditLog,
}

impl SessionShell {
    pub fn new(context: SigningContext, handler: Arc<dyn MessageHandler>) -> Self {
        let audit = SecurityAuditLog::new(context.sender_id());
        Self {
            context,
            handler,
            audit,
        }
    }

    pub fn context(&self) -> &SigningContext {
        &self.context
    }

    /// Serve one connection until the peer closes it, the transport fails, or
    /// `shutdown` fires. Work in progress for this connection is dropped on
    /// shutdown.
    pub async fn serve_connection<T>(&self, io: T, peer: &str, shutdown: CancellationToken) -> Result<(), ProtocolError>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut framed = Framed::new(io, MessageCodec::new());
        debug!(peer, "Connection opened");

        loop {
            let frame = tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!(peer, "Connection closed by shutdown");
                    return Ok(());
                }
                frame = framed.next() => frame,
            };

            let decoded = match frame {
                None => {
                    debug!(peer, "Connection closed by peer");
                    return Ok(());
                }
                Some(Err(e)) => return Err(e),
                Some(Ok(decoded)) => decoded,
            };

            let reply = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                reply = self.respond(decoded, peer) => reply,
            };
            let reply = self.seal_reply(reply)?;
            framed.send(reply).await?;
        }
    }

    /// Sign `body`, falling back to a signed `ERROR` when the reply cannot be
    /// sealed or would not fit in a frame.
    fn seal_reply(&self, body: Body) -> Result<Message, ProtocolError> {
        let message_type = body.message_type();
        let sealed = self
            .context
            .seal(body)
            .and_then(|message| ensure_fits(&message).map(|()| message));
        match sealed {
            Ok(message) => Ok(message),
            Err(e) => {
                warn!(%message_type, error = %e, "Reply cannot be sent, answering with ERROR");
                self.context.seal(Body::error(error_codes::INTERNAL, e.to_string()))
            }
        }
    }

    async fn respond(&self, decoded: Result<Message, ProtocolError>, peer: &str) -> Body {
        let request = match decoded {
            Ok(request) => request,
            Err(e) => {
                self.audit.undecodable(peer, &e);
                return Body::auth_error(RejectionReason::ProtocolViolation, e.to_string());
            }
        };

        if let Err(e) = self.context.gate.check(&request) {
            let reason = e.rejection_reason().unwrap_or(RejectionReason::ProtocolViolation);
            return Body::auth_error(reason, e.to_string());
        }

        if !request.message_type().is_request() {
            warn!(
                peer,
                sender_id = request.sender_id(),
                message_type = %request.message_type(),
                "Response-type message sent as a request"
            );
            return Body::auth_error(
                RejectionReason::ProtocolViolation,
                format!("{} is not a request type", request.message_type()),
            );
        }

        debug!(
            peer,
            sender_id = request.sender_id(),
            message_type = %request.message_type(),
            "Dispatching request"
        );
        self.handler.handle(request).await
    }
}

/// Accept connections on `listener` until `shutdown` fires, one task per
/// connection.
pub async fn serve(listener: TcpListener, shell: Arc<SessionShell>, shutdown: CancellationToken) {
    info!(
        node = shell.context().sender_id(),
        address = ?listener.local_addr().ok(),
        "Listening for signed requests"
    );
    loop {
        let (stream, addr) = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Listener shutting down");
                return;
            }
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            },
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Failed to set TCP_NODELAY");
        }
        let shell = shell.clone();
        let token = shutdown.child_token();
        tokio::spawn(async move {
            let peer = addr.to_string();
            if let Err(e) = shell.serve_connection(stream, &peer, token).await {
                warn!(peer = %peer, error = %e, "Connection ended with error");
            }
        });
    }
}
