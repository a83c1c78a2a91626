//! Line-delimited JSON-RPC channel over an async byte stream.

use super::protocol::{
    IncomingMessage, JSONRPC_VERSION, OutgoingNotification, OutgoingReply, OutgoingRequest,
    RpcErrorObject, error_codes, methods,
};
use crate::mcp_client::ports::{SessionError, SessionResult};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

type Waiter = oneshot::Sender<SessionResult<Value>>;
type SharedWriter<W> = Arc<Mutex<Option<W>>>;

/// One JSON object per line in each direction.
///
/// A reader task owns the inbound half and hands each response to the
/// request waiting on its id, so any number of requests can be in flight.
/// Writers hold the outbound half only while a single line is written.
/// Lines that are not JSON are skipped as server log output; server
/// requests are answered from the reader task.
pub(crate) struct JsonRpcChannel<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    label: Arc<str>,
    next_id: AtomicU64,
    writer: SharedWriter<W>,
    pending: Arc<PendingRequests>,
    reader: JoinHandle<()>,
}

impl<W> JsonRpcChannel<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Starts the reader task; must be called inside a Tokio runtime.
    pub(crate) fn new<R>(label: &str, reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let label: Arc<str> = Arc::from(label);
        let writer = Arc::new(Mutex::new(Some(writer)));
        let pending = Arc::new(PendingRequests::default());
        let reader = tokio::spawn(read_loop(
            Arc::clone(&label),
            reader,
            Arc::clone(&writer),
            Arc::clone(&pending),
        ));
        Self {
            label,
            next_id: AtomicU64::new(1),
            writer,
            pending,
            reader,
        }
    }

    /// Sends a request and waits for the response with the matching id.
    pub(crate) async fn request(&self, method: &str, params: Option<Value>) -> SessionResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (waiter, response) = oneshot::channel();
        self.pending.register(id, waiter)?;
        let _in_flight = InFlight {
            pending: &self.pending,
            id,
        };

        let request = OutgoingRequest {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        };
        write_line(&self.label, &self.writer, &request).await?;
        response.await.unwrap_or(Err(SessionError::Closed))
    }

    /// Sends a notification; no response is expected.
    pub(crate) async fn notify(&self, method: &str, params: Option<Value>) -> SessionResult<()> {
        let notification = OutgoingNotification {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        };
        write_line(&self.label, &self.writer, &notification).await
    }

    /// Fails every request in flight, and every later one, with `reason`.
    pub(crate) fn cancel_pending(&self, reason: &SessionError) {
        self.pending.fail_all(reason);
    }

    /// Closes the write half so the peer sees end of input.
    pub(crate) async fn shutdown_input(&self) -> SessionResult<()> {
        let Some(mut writer) = self.writer.lock().await.take() else {
            return Ok(());
        };
        writer.shutdown().await.map_err(|err| {
            SessionError::Transport(format!("{}: failed to close input: {err}", self.label))
        })
    }
}

impl<W> Drop for JsonRpcChannel<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Requests awaiting a response, keyed by id.
///
/// The lock is never held across an await; the map holds no invariant a
/// panicking holder could break, so a poisoned lock is recovered.
#[derive(Default)]
struct PendingRequests {
    table: std::sync::Mutex<PendingTable>,
}

#[derive(Default)]
struct PendingTable {
    waiting: HashMap<u64, Waiter>,
    failed: Option<SessionError>,
}

impl PendingRequests {
    fn table(&self) -> std::sync::MutexGuard<'_, PendingTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, id: u64, waiter: Waiter) -> SessionResult<()> {
        let mut table = self.table();
        if let Some(reason) = &table.failed {
            return Err(reason.clone());
        }
        table.waiting.insert(id, waiter);
        Ok(())
    }

    fn take(&self, id: u64) -> Option<Waiter> {
        self.table().waiting.remove(&id)
    }

    fn forget(&self, id: u64) {
        self.table().waiting.remove(&id);
    }

    fn fail_all(&self, reason: &SessionError) {
        let waiters: Vec<Waiter> = {
            let mut table = self.table();
            if table.failed.is_none() {
                table.failed = Some(reason.clone());
            }
            table.waiting.drain().map(|(_, waiter)| waiter).collect()
        };
        for waiter in waiters {
            deliver(waiter, Err(reason.clone()));
        }
    }
}

/// Drops the pending entry when a request finishes or is abandoned.
struct InFlight<'a> {
    pending: &'a PendingRequests,
    id: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.pending.forget(self.id);
    }
}

fn deliver(waiter: Waiter, outcome: SessionResult<Value>) {
    if waiter.send(outcome).is_err() {
        tracing::trace!("response arrived after its request was abandoned");
    }
}

async fn read_loop<R, W>(
    label: Arc<str>,
    mut reader: R,
    writer: SharedWriter<W>,
    pending: Arc<PendingRequests>,
) where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let mut line = String::new();
    let reason = loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break SessionError::Closed,
            Ok(_) => {}
            Err(err) => break SessionError::Transport(format!("{label}: failed to read: {err}")),
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Ok(message) = serde_json::from_str::<IncomingMessage>(trimmed) else {
            tracing::debug!(channel = %label, output = trimmed, "skipping non-JSON-RPC output");
            continue;
        };

        if let Some(id) = message.response_id() {
            match pending.take(id) {
                Some(waiter) => deliver(waiter, message.into_result()),
                None => tracing::trace!(channel = %label, id, "response for no pending request"),
            }
            continue;
        }
        if let (Some(method), Some(id)) = (&message.method, &message.id) {
            let reply = reply_to_server_request(method, id.clone());
            if let Err(err) = write_line(&label, &writer, &reply).await {
                tracing::debug!(channel = %label, error = %err, "failed to answer server request");
            }
            continue;
        }
        tracing::trace!(
            channel = %label,
            method = message.method.as_deref().unwrap_or_default(),
            "ignoring unsolicited JSON-RPC message"
        );
    };
    pending.fail_all(&reason);
}

async fn write_line<W>(
    label: &str,
    writer: &Mutex<Option<W>>,
    message: &impl Serialize,
) -> SessionResult<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let mut line = serde_json::to_string(message)
        .map_err(|err| SessionError::Transport(format!("{label}: failed to encode message: {err}")))?;
    line.push('\n');

    let mut guard = writer.lock().await;
    let output = guard.as_mut().ok_or(SessionError::Closed)?;
    output
        .write_all(line.as_bytes())
        .await
        .map_err(|err| SessionError::Transport(format!("{label}: failed to write: {err}")))?;
    output
        .flush()
        .await
        .map_err(|err| SessionError::Transport(format!("{label}: failed to flush: {err}")))
}

fn reply_to_server_request(method: &str, id: Value) -> OutgoingReply {
    if method == methods::PING {
        return OutgoingReply {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(json!({})),
            error: None,
        };
    }
    OutgoingReply {
        jsonrpc: JSONRPC_VERSION,
        id,
        result: None,
        error: Some(RpcErrorObject {
            code: error_codes::METHOD_NOT_FOUND,
            message: format!("method not supported by client: {method}"),
            data: None,
        }),
    }
}
