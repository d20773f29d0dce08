//! Wire contract for the mockdoc document-store test double.
//!
//! This crate defines the message schema the double shares with its
//! clients: the document value model, the seven request/response pairs of
//! the service contract, the status object used for failure outcomes, and
//! the JSON frame envelope spoken on the loopback socket. It carries no
//! behavior beyond serialization and structural equality; the matching
//! engine lives in the `mockdoc` crate.

pub mod document;
pub mod frame;
pub mod messages;
pub mod status;
pub mod write;

pub use document::{DocValue, Document, Timestamp};
pub use frame::{
    classify_frame, decode_error, done_frame, error_frame, frame_id, item_frame, request_frame,
    result_frame, FrameKind,
};
pub use messages::{
    methods, BatchGetDocumentsRequest, BatchGetDocumentsResponse, BatchGetResult,
    BeginTransactionRequest, BeginTransactionResponse, CommitRequest, CommitResponse, Empty,
    FieldFilter, FilterOp, GetDocumentRequest, ListenRequest, ListenResponse, ListenTarget,
    OrderDirection, QueryOrder, RequestMessage, ResponseMessage, RollbackRequest, RunQueryRequest,
    RunQueryResponse, StructuredQuery, TargetChangeKind, TransactionToken,
};
pub use status::{ServiceStatus, StatusCode};
pub use write::{
    DocumentTransform, FieldTransform, Precondition, ServerValue, TransformKind, Write, WriteOp,
    WriteResult,
};
