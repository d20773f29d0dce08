use std::marker::PhantomData;
use std::sync::Arc;

use mockdoc_wire::{
    methods, BatchGetDocumentsRequest, BatchGetDocumentsResponse, BeginTransactionRequest,
    BeginTransactionResponse, CommitRequest, CommitResponse, Document, Empty, GetDocumentRequest,
    ListenRequest, ListenResponse, RequestMessage, ResponseMessage, RollbackRequest,
    RunQueryRequest, RunQueryResponse, ServiceStatus,
};

use crate::expectation::{Reply, StreamElement};
use crate::matcher::MockDatabase;

/// A success payload for exactly one catalog method.
///
/// Implemented for each response type of the contract; lets the facade
/// unwrap a scripted reply into the operation's native shape exactly once.
pub trait ResponsePayload: Sized {
    const METHOD: &'static str;

    /// Extract the payload, or give the wrong message back for diagnostics.
    fn from_response(message: ResponseMessage) -> Result<Self, ResponseMessage>;
}

macro_rules! response_payload {
    ($ty:ty, $variant:ident, $method:expr) => {
        impl ResponsePayload for $ty {
            const METHOD: &'static str = $method;

            fn from_response(message: ResponseMessage) -> Result<Self, ResponseMessage> {
                match message {
                    ResponseMessage::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }
    };
}

response_payload!(Document, Document, methods::DOCUMENT_GET);
response_payload!(
    BatchGetDocumentsResponse,
    BatchGet,
    methods::DOCUMENT_BATCH_GET
);
response_payload!(CommitResponse, Commit, methods::DATABASE_COMMIT);
response_payload!(
    BeginTransactionResponse,
    BeginTransaction,
    methods::TRANSACTION_BEGIN
);
response_payload!(Empty, Empty, methods::TRANSACTION_ROLLBACK);
response_payload!(RunQueryResponse, RunQuery, methods::QUERY_RUN);
response_payload!(ListenResponse, Listen, methods::DATABASE_LISTEN);

/// Ordered replay of one streamed reply.
///
/// Yields each scripted payload in order; a status element terminates the
/// stream at its position and nothing after it is yielded. An element
/// whose type does not fit the operation is a harness-contract violation
/// and panics at the point it would have been delivered.
#[derive(Debug)]
pub struct ReplyStream<T> {
    elements: std::vec::IntoIter<StreamElement>,
    failed: bool,
    _payload: PhantomData<T>,
}

impl<T> ReplyStream<T> {
    fn new(elements: Vec<StreamElement>) -> Self {
        Self {
            elements: elements.into_iter(),
            failed: false,
            _payload: PhantomData,
        }
    }
}

impl<T: ResponsePayload> Iterator for ReplyStream<T> {
    type Item = Result<T, ServiceStatus>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.elements.next()? {
            StreamElement::Message(message) => Some(Ok(unwrap_payload::<T>(message))),
            StreamElement::Status(status) => {
                self.failed = true;
                Some(Err(status))
            }
        }
    }
}

/// One handler per RPC operation of the service contract, translating
/// matcher outcomes into the operation's native result shape.
pub struct DatabaseFacade {
    db: Arc<MockDatabase>,
}

impl DatabaseFacade {
    pub fn new(db: Arc<MockDatabase>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<MockDatabase> {
        &self.db
    }

    pub fn get_document(&self, request: GetDocumentRequest) -> Result<Document, ServiceStatus> {
        self.unary(request.into())
    }

    pub fn commit(&self, request: CommitRequest) -> Result<CommitResponse, ServiceStatus> {
        self.unary(request.into())
    }

    pub fn begin_transaction(
        &self,
        request: BeginTransactionRequest,
    ) -> Result<BeginTransactionResponse, ServiceStatus> {
        self.unary(request.into())
    }

    pub fn rollback(&self, request: RollbackRequest) -> Result<Empty, ServiceStatus> {
        self.unary(request.into())
    }

    pub fn batch_get_documents(
        &self,
        request: BatchGetDocumentsRequest,
    ) -> Result<ReplyStream<BatchGetDocumentsResponse>, ServiceStatus> {
        self.streaming(request.into())
    }

    pub fn run_query(
        &self,
        request: RunQueryRequest,
    ) -> Result<ReplyStream<RunQueryResponse>, ServiceStatus> {
        self.streaming(request.into())
    }

    /// Subscribe-style handler: the initial client message is the match
    /// key for the whole interaction.
    ///
    /// Business failures on this method are always pre-scripted as
    /// explicit status elements, so a matching failure means the test
    /// itself is wrong and panics instead of reporting.
    pub fn listen(
        &self,
        request: ListenRequest,
    ) -> Result<ReplyStream<ListenResponse>, ServiceStatus> {
        let request = RequestMessage::from(request);
        let reply = match self.db.resolve(methods::DATABASE_LISTEN, &request) {
            Ok(reply) => reply,
            Err(err) => panic!("{}: {err}", methods::DATABASE_LISTEN),
        };
        unwrap_stream::<ListenResponse>(reply)
    }

    fn unary<T: ResponsePayload>(&self, request: RequestMessage) -> Result<T, ServiceStatus> {
        let reply = self.db.resolve(T::METHOD, &request).map_err(|err| err.to_status())?;
        match reply {
            Reply::Message(message) => Ok(unwrap_payload::<T>(message)),
            Reply::Status(status) => Err(status),
            Reply::Stream(_) => panic!("{}: scripted reply is a stream on a unary method", T::METHOD),
        }
    }

    fn streaming<T: ResponsePayload>(
        &self,
        request: RequestMessage,
    ) -> Result<ReplyStream<T>, ServiceStatus> {
        let reply = self.db.resolve(T::METHOD, &request).map_err(|err| err.to_status())?;
        unwrap_stream::<T>(reply)
    }
}

fn unwrap_payload<T: ResponsePayload>(message: ResponseMessage) -> T {
    T::from_response(message).unwrap_or_else(|wrong| {
        panic!("{}: bad scripted response type: {wrong:?}", T::METHOD);
    })
}

fn unwrap_stream<T: ResponsePayload>(reply: Reply) -> Result<ReplyStream<T>, ServiceStatus> {
    match reply {
        Reply::Stream(elements) => Ok(ReplyStream::new(elements)),
        // A scripted failure before any element was delivered.
        Reply::Status(status) => Err(status),
        Reply::Message(_) => panic!(
            "{}: scripted reply is unary on a streaming method",
            T::METHOD
        ),
    }
}
