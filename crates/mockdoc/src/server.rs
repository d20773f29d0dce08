use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

use mockdoc_wire::{
    classify_frame, done_frame, error_frame, frame_id, item_frame, methods, result_frame,
    FrameKind, ServiceStatus,
};

use crate::counters::Counters;
use crate::errors::ServerError;
use crate::facade::{DatabaseFacade, ReplyStream, ResponsePayload};
use crate::matcher::MockDatabase;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Upper bound for one inbound frame line; longer lines are counted
    /// as malformed and skipped.
    pub max_line_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: 1 << 20,
        }
    }
}

/// In-process host for the double, listening on a system-chosen loopback
/// port. For testing only, never production traffic.
///
/// One task accepts connections; each connection runs its own
/// read/dispatch/write loop over newline-delimited JSON frames. A
/// harness-contract violation panics inside that connection's task: the
/// connection dies with the panic while the host keeps serving others.
pub struct Server {
    addr: SocketAddr,
    db: Arc<MockDatabase>,
    shutdown: Arc<Notify>,
    accept_task: JoinHandle<()>,
}

impl Server {
    /// Bind `127.0.0.1:0` and start accepting connections for `db`.
    pub async fn start(db: Arc<MockDatabase>) -> Result<Self, ServerError> {
        Self::start_with_config(db, ServerConfig::default()).await
    }

    pub async fn start_with_config(
        db: Arc<MockDatabase>,
        config: ServerConfig,
    ) -> Result<Self, ServerError> {
        if config.max_line_bytes == 0 {
            return Err(ServerError::InvalidConfig(
                "max_line_bytes must be > 0".to_owned(),
            ));
        }

        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .map_err(|err| ServerError::Bind(err.to_string()))?;
        let addr = listener
            .local_addr()
            .map_err(|err| ServerError::Io(err.to_string()))?;

        let shutdown = Arc::new(Notify::new());
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&db),
            config,
            Arc::clone(&shutdown),
        ));
        tracing::info!(%addr, "mock document server listening");

        Ok(Self {
            addr,
            db,
            shutdown,
            accept_task,
        })
    }

    /// Dialable endpoint string, e.g. `127.0.0.1:49213`.
    pub fn addr(&self) -> String {
        self.addr.to_string()
    }

    pub fn database(&self) -> &Arc<MockDatabase> {
        &self.db
    }

    /// Drop every registered expectation on the shared database.
    pub fn reset(&self) {
        self.db.reset();
    }

    /// Stop accepting and abort all open connections.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(err) = self.accept_task.await {
            if !err.is_cancelled() {
                tracing::warn!(error = %err, "accept task ended abnormally");
            }
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    db: Arc<MockDatabase>,
    config: ServerConfig,
    shutdown: Arc<Notify>,
) {
    let counters = db.counters_handle();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        counters.record_connection();
                        let conn_id = Uuid::new_v4();
                        tracing::debug!(%conn_id, %peer, "connection accepted");
                        let facade = DatabaseFacade::new(Arc::clone(&db));
                        let counters = Arc::clone(&counters);
                        connections.spawn(connection_loop(
                            stream, facade, counters, config, conn_id,
                        ));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "accept failed");
                    }
                }
            }
            _ = shutdown.notified() => break,
        }
    }

    connections.shutdown().await;
}

/// One line in, at most one call dispatched.
/// Frames that do not classify as requests are counted and skipped, never
/// fatal; only a write failure on the answer path closes the connection.
async fn connection_loop(
    stream: TcpStream,
    facade: DatabaseFacade,
    counters: Arc<Counters>,
    config: ServerConfig,
    conn_id: Uuid,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::with_capacity(4096);

    loop {
        line.clear();
        let read = match reader.read_line(&mut line).await {
            Ok(read) => read,
            Err(err) => {
                tracing::debug!(%conn_id, error = %err, "read failed");
                break;
            }
        };
        if read == 0 {
            break;
        }

        let raw = line.trim_end_matches(['\n', '\r']);
        if raw.is_empty() {
            continue;
        }
        if raw.len() > config.max_line_bytes {
            counters.record_malformed_line();
            tracing::warn!(%conn_id, bytes = raw.len(), "oversized frame skipped");
            continue;
        }

        let json = match serde_json::from_str::<Value>(raw) {
            Ok(json) => json,
            Err(_) => {
                counters.record_malformed_line();
                continue;
            }
        };
        counters.record_frame_read();

        if classify_frame(&json) != FrameKind::Request {
            counters.record_malformed_line();
            continue;
        }
        let Some(id) = frame_id(&json) else {
            counters.record_malformed_line();
            continue;
        };
        let method = json
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let params = json.get("params").cloned().unwrap_or(Value::Null);

        if let Err(err) = dispatch(&facade, &counters, &mut write_half, id, &method, params).await {
            tracing::debug!(%conn_id, error = %err, "write failed; closing connection");
            break;
        }
    }

    tracing::debug!(%conn_id, "connection closed");
}

async fn dispatch(
    facade: &DatabaseFacade,
    counters: &Counters,
    writer: &mut OwnedWriteHalf,
    id: u64,
    method: &str,
    params: Value,
) -> io::Result<()> {
    match method {
        methods::DOCUMENT_GET => {
            unary_call(writer, id, method, params, |req| facade.get_document(req)).await
        }
        methods::DATABASE_COMMIT => {
            unary_call(writer, id, method, params, |req| facade.commit(req)).await
        }
        methods::TRANSACTION_BEGIN => {
            unary_call(writer, id, method, params, |req| {
                facade.begin_transaction(req)
            })
            .await
        }
        methods::TRANSACTION_ROLLBACK => {
            unary_call(writer, id, method, params, |req| facade.rollback(req)).await
        }
        methods::DOCUMENT_BATCH_GET => {
            streaming_call(writer, counters, id, method, params, |req| {
                facade.batch_get_documents(req)
            })
            .await
        }
        methods::QUERY_RUN => {
            streaming_call(writer, counters, id, method, params, |req| {
                facade.run_query(req)
            })
            .await
        }
        methods::DATABASE_LISTEN => {
            streaming_call(writer, counters, id, method, params, |req| {
                facade.listen(req)
            })
            .await
        }
        unknown => {
            let status = ServiceStatus::unimplemented(format!("unknown method {unknown}"));
            write_frame(writer, &error_frame(id, &status)).await
        }
    }
}

async fn unary_call<Req, Resp>(
    writer: &mut OwnedWriteHalf,
    id: u64,
    method: &str,
    params: Value,
    handler: impl FnOnce(Req) -> Result<Resp, ServiceStatus>,
) -> io::Result<()>
where
    Req: DeserializeOwned,
    Resp: Serialize,
{
    let frame = match decode_params::<Req>(method, params) {
        Ok(request) => match handler(request) {
            Ok(response) => match serde_json::to_value(&response) {
                Ok(value) => result_frame(id, value),
                Err(err) => error_frame(
                    id,
                    &ServiceStatus::internal(format!("unserializable {method} response: {err}")),
                ),
            },
            Err(status) => error_frame(id, &status),
        },
        Err(status) => error_frame(id, &status),
    };
    write_frame(writer, &frame).await
}

async fn streaming_call<Req, Resp>(
    writer: &mut OwnedWriteHalf,
    counters: &Counters,
    id: u64,
    method: &str,
    params: Value,
    handler: impl FnOnce(Req) -> Result<ReplyStream<Resp>, ServiceStatus>,
) -> io::Result<()>
where
    Req: DeserializeOwned,
    Resp: ResponsePayload + Serialize,
{
    let request = match decode_params::<Req>(method, params) {
        Ok(request) => request,
        Err(status) => return write_frame(writer, &error_frame(id, &status)).await,
    };
    let stream = match handler(request) {
        Ok(stream) => stream,
        Err(status) => return write_frame(writer, &error_frame(id, &status)).await,
    };

    for step in stream {
        match step {
            Ok(item) => {
                let value = match serde_json::to_value(&item) {
                    Ok(value) => value,
                    Err(err) => {
                        let status = ServiceStatus::internal(format!(
                            "unserializable {method} stream element: {err}"
                        ));
                        return write_frame(writer, &error_frame(id, &status)).await;
                    }
                };
                write_frame(writer, &item_frame(id, value)).await?;
                counters.record_stream_item();
            }
            Err(status) => return write_frame(writer, &error_frame(id, &status)).await,
        }
    }
    write_frame(writer, &done_frame(id)).await
}

fn decode_params<Req: DeserializeOwned>(method: &str, params: Value) -> Result<Req, ServiceStatus> {
    serde_json::from_value(params).map_err(|err| {
        ServiceStatus::invalid_argument(format!("undecodable {method} request: {err}"))
    })
}

async fn write_frame(writer: &mut OwnedWriteHalf, frame: &Value) -> io::Result<()> {
    let mut buf = serde_json::to_vec(frame).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("failed to serialize outbound frame: {err}"),
        )
    })?;
    buf.push(b'\n');
    writer.write_all(&buf).await
}
