// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Remote Session (client side)
//!
//! One connection, one outstanding request. [`RemoteSession::call`] signs a
//! request, sends it, waits for the reply, and verifies and admits the reply
//! before returning it.
//!
//! A call that is cancelled or times out after the request was written leaves
//! the connection with a reply nobody will read. The session is then
//! *poisoned*: every later call fails with `TransportFailure` and the caller
//! must open a new connection.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::domain::error::ProtocolError;
use crate::domain::execution::ExecutionResult;
use crate::domain::message::{
    Body, CacheLookupRequest, CacheStoreExecRequest, CommandRequest, DownloadRequest, DownloadResult, Message,
    Payload, PingRequest, PongReply, Signable, UploadRequest, UploadResult,
};
use crate::infrastructure::wire::{ensure_fits, MessageCodec};

use super::gate::SigningContext;

pub struct RemoteSession<T = TcpStream> {
    framed: Framed<T, MessageCodec>,
    context: SigningContext,
    request_timeout: Duration,
    in_flight: bool,
}

impl RemoteSession<TcpStream> {
    pub async fn connect(
        address: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
        context: SigningContext,
    ) -> Result<Self, ProtocolError> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| ProtocolError::Timeout(connect_timeout))?
            .map_err(|e| ProtocolError::TransportFailure(format!("connect to {}: {}", address, e)))?;
        stream.set_nodelay(true)?;
        tracing::debug!(address, "Connected to remote node");
        Ok(Self::new(stream, context, request_timeout))
    }
}

impl<T> RemoteSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(io: T, context: SigningContext, request_timeout: Duration) -> Self {
        Self {
            framed: Framed::new(io, MessageCodec::new()),
            context,
            request_timeout,
            in_flight: false,
        }
    }

    pub fn context(&self) -> &SigningContext {
        &self.context
    }

    /// True once a call was abandoned mid-flight or the transport failed.
    pub fn is_poisoned(&self) -> bool {
        self.in_flight
    }

    /// Sign `payload` as this node and wait for the verified reply.
    pub async fn call(&mut self, payload: Payload) -> Result<Message, ProtocolError> {
        let request = self.context.seal(Body::new(payload)?)?;
        self.forward(request).await
    }

    /// Send an already-signed request and wait for the verified reply.
    ///
    /// Used by relays, which re-sign before forwarding.
    pub async fn forward(&mut self, request: Message) -> Result<Message, ProtocolError> {
        if self.in_flight {
            return Err(ProtocolError::TransportFailure(
                "session poisoned by an abandoned request; reconnect".into(),
            ));
        }
        let request_type = request.message_type();
        ensure_fits(&request)?;

        self.in_flight = true;
        let reply = tokio::time::timeout(self.request_timeout, self.round_trip(request))
            .await
            .map_err(|_| ProtocolError::Timeout(self.request_timeout))?;
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) if e.is_transport() => return Err(e),
            Err(e) => {
                // the reply was fully read; the connection is still in step
                self.in_flight = false;
                return Err(e);
            }
        };
        self.in_flight = false;

        if !request_type.accepts_response(reply.message_type()) {
            return Err(ProtocolError::ProtocolViolation(format!(
                "{} is not a valid response to {}",
                reply.message_type(),
                request_type
            )));
        }
        Ok(reply)
    }

    async fn round_trip(&mut self, request: Message) -> Result<Message, ProtocolError> {
        self.framed.send(request).await?;
        let reply = match self.framed.next().await {
            None => return Err(ProtocolError::TransportFailure("connection closed by peer".into())),
            Some(frame) => frame??,
        };
        self.context.gate.check(&reply)?;
        Ok(reply)
    }

    pub async fn execute_command(&mut self, request: CommandRequest) -> Result<ExecutionResult, ProtocolError> {
        match expect_reply(self.call(Payload::Command(request)).await?)? {
            Payload::Response(result) => Ok(result),
            other => Err(unexpected(other)),
        }
    }

    pub async fn upload(&mut self, request: UploadRequest) -> Result<UploadResult, ProtocolError> {
        match expect_reply(self.call(Payload::Upload(request)).await?)? {
            Payload::UploadResult(result) => Ok(result),
            other => Err(unexpected(other)),
        }
    }

    pub async fn download(&mut self, remote_path: impl Into<String>) -> Result<DownloadResult, ProtocolError> {
        let request = DownloadRequest {
            remote_path: remote_path.into(),
        };
        match expect_reply(self.call(Payload::Download(request)).await?)? {
            Payload::DownloadResult(result) => Ok(result),
            other => Err(unexpected(other)),
        }
    }

    pub async fn ping(&mut self) -> Result<PongReply, ProtocolError> {
        match expect_reply(self.call(Payload::Ping(PingRequest::default())).await?)? {
            Payload::Pong(pong) => Ok(pong),
            other => Err(unexpected(other)),
        }
    }

    /// Ask the executor for the command stored under `key`. `None` on a miss.
    pub async fn cache_lookup(&mut self, key: Uuid) -> Result<Option<String>, ProtocolError> {
        let request = CacheLookupRequest { key: key.to_string() };
        match expect_reply(self.call(Payload::CacheLookup(request)).await?)? {
            Payload::CacheHit(hit) => Ok(Some(hit.command)),
            Payload::CacheMiss(_) => Ok(None),
            other => Err(unexpected(other)),
        }
    }

    pub async fn cache_store_exec(
        &mut self,
        request: CacheStoreExecRequest,
    ) -> Result<ExecutionResult, ProtocolError> {
        match expect_reply(self.call(Payload::CacheStoreExec(request)).await?)? {
            Payload::Response(result) => Ok(result),
            other => Err(unexpected(other)),
        }
    }
}

/// Turn `ERROR`/`AUTH_ERROR` replies into errors; pass anything else through.
fn expect_reply(reply: Message) -> Result<Payload, ProtocolError> {
    match reply.into_body().into_payload() {
        Payload::AuthError(e) => Err(ProtocolError::RemoteRejected {
            reason: e.reason,
            message: e.message,
        }),
        Payload::Error(e) => Err(ProtocolError::Remote {
            code: e.code,
            message: e.message,
        }),
        other => Ok(other),
    }
}

fn unexpected(payload: Payload) -> ProtocolError {
    ProtocolError::ProtocolViolation(format!("unexpected {} reply", payload.message_type()))
}
