use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use mockdoc_wire::{
    classify_frame, decode_error, frame_id, methods, request_frame, BatchGetDocumentsRequest,
    BatchGetDocumentsResponse, BeginTransactionRequest, BeginTransactionResponse, CommitRequest,
    CommitResponse, Document, Empty, FrameKind, GetDocumentRequest, ListenRequest, ListenResponse,
    RollbackRequest, RunQueryRequest, RunQueryResponse, ServiceStatus,
};

use crate::errors::ClientError;

/// What a streamed call delivered before it terminated.
///
/// `error` is the scripted or synthesized status that ended the stream;
/// `None` means the host completed it normally.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamOutcome<T> {
    pub items: Vec<T>,
    pub error: Option<ServiceStatus>,
}

/// Wire-level dialer for exercising a running [`Server`](crate::Server)
/// from tests.
///
/// Deliberately thin and sequential: one in-flight call, frames matched by
/// id on the same connection. Tests drive one interaction at a time.
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    next_id: u64,
    line: String,
}

impl Client {
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|err| ClientError::Connect {
                addr: addr.to_owned(),
                reason: err.to_string(),
            })?;
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer,
            next_id: 0,
            line: String::with_capacity(4096),
        })
    }

    /// Issue one unary call and wait for its terminal frame.
    ///
    /// An `error` frame surfaces as [`ClientError::Status`], keeping the
    /// scripted failure intact for assertions.
    pub async fn unary(&mut self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.send_request(method, params).await?;
        let frame = self.read_frame_for(id).await?;
        match classify_frame(&frame) {
            FrameKind::Result => Ok(frame.get("result").cloned().unwrap_or(Value::Null)),
            FrameKind::Error => Err(ClientError::Status(decode_error(&frame))),
            _ => Err(ClientError::UnexpectedFrame {
                id,
                frame: frame.to_string(),
            }),
        }
    }

    /// Issue one streamed call and collect everything it delivers.
    pub async fn streaming(
        &mut self,
        method: &str,
        params: Value,
    ) -> Result<StreamOutcome<Value>, ClientError> {
        let id = self.send_request(method, params).await?;
        let mut items = Vec::new();
        loop {
            let frame = self.read_frame_for(id).await?;
            match classify_frame(&frame) {
                FrameKind::Item => {
                    items.push(frame.get("item").cloned().unwrap_or(Value::Null));
                }
                FrameKind::Done => return Ok(StreamOutcome { items, error: None }),
                FrameKind::Error => {
                    return Ok(StreamOutcome {
                        items,
                        error: Some(decode_error(&frame)),
                    })
                }
                _ => {
                    return Err(ClientError::UnexpectedFrame {
                        id,
                        frame: frame.to_string(),
                    })
                }
            }
        }
    }

    pub async fn get_document(
        &mut self,
        request: &GetDocumentRequest,
    ) -> Result<Document, ClientError> {
        let result = self.unary(methods::DOCUMENT_GET, encode(request)?).await?;
        decode(result)
    }

    pub async fn commit(&mut self, request: &CommitRequest) -> Result<CommitResponse, ClientError> {
        let result = self.unary(methods::DATABASE_COMMIT, encode(request)?).await?;
        decode(result)
    }

    pub async fn begin_transaction(
        &mut self,
        request: &BeginTransactionRequest,
    ) -> Result<BeginTransactionResponse, ClientError> {
        let result = self
            .unary(methods::TRANSACTION_BEGIN, encode(request)?)
            .await?;
        decode(result)
    }

    pub async fn rollback(&mut self, request: &RollbackRequest) -> Result<Empty, ClientError> {
        let result = self
            .unary(methods::TRANSACTION_ROLLBACK, encode(request)?)
            .await?;
        decode(result)
    }

    pub async fn batch_get_documents(
        &mut self,
        request: &BatchGetDocumentsRequest,
    ) -> Result<StreamOutcome<BatchGetDocumentsResponse>, ClientError> {
        let outcome = self
            .streaming(methods::DOCUMENT_BATCH_GET, encode(request)?)
            .await?;
        decode_stream(outcome)
    }

    pub async fn run_query(
        &mut self,
        request: &RunQueryRequest,
    ) -> Result<StreamOutcome<RunQueryResponse>, ClientError> {
        let outcome = self.streaming(methods::QUERY_RUN, encode(request)?).await?;
        decode_stream(outcome)
    }

    pub async fn listen(
        &mut self,
        request: &ListenRequest,
    ) -> Result<StreamOutcome<ListenResponse>, ClientError> {
        let outcome = self
            .streaming(methods::DATABASE_LISTEN, encode(request)?)
            .await?;
        decode_stream(outcome)
    }

    async fn send_request(&mut self, method: &str, params: Value) -> Result<u64, ClientError> {
        self.next_id += 1;
        let id = self.next_id;
        let frame = request_frame(id, method, params);
        let mut buf =
            serde_json::to_vec(&frame).map_err(|err| ClientError::Codec(err.to_string()))?;
        buf.push(b'\n');
        self.writer
            .write_all(&buf)
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        Ok(id)
    }

    async fn read_frame_for(&mut self, id: u64) -> Result<Value, ClientError> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .await
                .map_err(|err| ClientError::Transport(err.to_string()))?;
            if read == 0 {
                return Err(ClientError::ConnectionClosed);
            }

            let raw = self.line.trim_end_matches(['\n', '\r']);
            if raw.is_empty() {
                continue;
            }
            let Ok(frame) = serde_json::from_str::<Value>(raw) else {
                continue;
            };
            if frame_id(&frame) == Some(id) {
                return Ok(frame);
            }
        }
    }
}

fn encode<T: Serialize>(request: &T) -> Result<Value, ClientError> {
    serde_json::to_value(request).map_err(|err| ClientError::Codec(err.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|err| ClientError::Codec(err.to_string()))
}

fn decode_stream<T: DeserializeOwned>(
    outcome: StreamOutcome<Value>,
) -> Result<StreamOutcome<T>, ClientError> {
    let mut items = Vec::with_capacity(outcome.items.len());
    for item in outcome.items {
        items.push(decode(item)?);
    }
    Ok(StreamOutcome {
        items,
        error: outcome.error,
    })
}
