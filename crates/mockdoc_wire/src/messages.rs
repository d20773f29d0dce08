use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::document::{DocValue, Document, Timestamp};
use crate::write::{Write, WriteResult};

/// Canonical method catalog shared by the facade, the host dispatch table,
/// and known-method validation.
pub mod methods {
    pub const DOCUMENT_GET: &str = "document/get";
    pub const DOCUMENT_BATCH_GET: &str = "document/batchGet";
    pub const DATABASE_COMMIT: &str = "database/commit";
    pub const TRANSACTION_BEGIN: &str = "transaction/begin";
    pub const TRANSACTION_ROLLBACK: &str = "transaction/rollback";
    pub const QUERY_RUN: &str = "query/run";
    pub const DATABASE_LISTEN: &str = "database/listen";

    pub const KNOWN: [&str; 7] = [
        DOCUMENT_GET,
        DOCUMENT_BATCH_GET,
        DATABASE_COMMIT,
        TRANSACTION_BEGIN,
        TRANSACTION_ROLLBACK,
        QUERY_RUN,
        DATABASE_LISTEN,
    ];
}

/// Opaque transaction handle, hex-encoded on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionToken(pub Vec<u8>);

impl TransactionToken {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }
}

impl Serialize for TransactionToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for TransactionToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(&text)
            .map(TransactionToken)
            .map_err(|err| D::Error::custom(format!("invalid transaction token: {err}")))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GetDocumentRequest {
    pub name: String,
    pub transaction: Option<TransactionToken>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetDocumentsRequest {
    pub database: String,
    pub documents: Vec<String>,
    pub transaction: Option<TransactionToken>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub database: String,
    pub writes: Vec<Write>,
    pub transaction: Option<TransactionToken>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BeginTransactionRequest {
    pub database: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
    pub database: String,
    pub transaction: TransactionToken,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FilterOp {
    LessThan,
    LessThanOrEqual,
    Equal,
    GreaterThan,
    GreaterThanOrEqual,
    ArrayContains,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldFilter {
    pub field_path: String,
    pub op: FilterOp,
    pub value: DocValue,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OrderDirection {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryOrder {
    pub field_path: String,
    pub direction: OrderDirection,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StructuredQuery {
    pub collection: String,
    pub filter: Option<FieldFilter>,
    pub order_by: Vec<QueryOrder>,
    pub limit: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    pub parent: String,
    pub query: StructuredQuery,
    pub transaction: Option<TransactionToken>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ListenTarget {
    Add {
        target_id: i32,
        documents: Vec<String>,
    },
    Remove {
        target_id: i32,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListenRequest {
    pub database: String,
    pub target: ListenTarget,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Empty {}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    pub write_results: Vec<WriteResult>,
    pub commit_time: Option<Timestamp>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BeginTransactionResponse {
    pub transaction: TransactionToken,
}

/// Outcome for one requested document in a batch lookup.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum BatchGetResult {
    Found(Document),
    Missing(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetDocumentsResponse {
    pub result: BatchGetResult,
    pub read_time: Option<Timestamp>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    pub document: Option<Document>,
    pub read_time: Option<Timestamp>,
    pub skipped_results: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TargetChangeKind {
    NoChange,
    Add,
    Remove,
    Current,
    Reset,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ListenResponse {
    TargetChange {
        kind: TargetChangeKind,
        target_ids: Vec<i32>,
    },
    DocumentChange {
        document: Document,
        target_ids: Vec<i32>,
    },
    DocumentDelete {
        document: String,
        read_time: Option<Timestamp>,
    },
}

/// Union of every request the service contract accepts.
///
/// Serialization is untagged: a variant renders exactly as its `params`
/// object would appear on the wire, which keeps mismatch diagnostics
/// readable.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum RequestMessage {
    GetDocument(GetDocumentRequest),
    BatchGetDocuments(BatchGetDocumentsRequest),
    Commit(CommitRequest),
    BeginTransaction(BeginTransactionRequest),
    Rollback(RollbackRequest),
    RunQuery(RunQueryRequest),
    Listen(ListenRequest),
}

impl RequestMessage {
    /// Catalog name of the method this request belongs to.
    pub fn method(&self) -> &'static str {
        match self {
            Self::GetDocument(_) => methods::DOCUMENT_GET,
            Self::BatchGetDocuments(_) => methods::DOCUMENT_BATCH_GET,
            Self::Commit(_) => methods::DATABASE_COMMIT,
            Self::BeginTransaction(_) => methods::TRANSACTION_BEGIN,
            Self::Rollback(_) => methods::TRANSACTION_ROLLBACK,
            Self::RunQuery(_) => methods::QUERY_RUN,
            Self::Listen(_) => methods::DATABASE_LISTEN,
        }
    }
}

macro_rules! request_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for RequestMessage {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        }
    };
}

request_from!(GetDocumentRequest, GetDocument);
request_from!(BatchGetDocumentsRequest, BatchGetDocuments);
request_from!(CommitRequest, Commit);
request_from!(BeginTransactionRequest, BeginTransaction);
request_from!(RollbackRequest, Rollback);
request_from!(RunQueryRequest, RunQuery);
request_from!(ListenRequest, Listen);

/// Union of every success payload the contract can return.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ResponseMessage {
    Document(Document),
    BatchGet(BatchGetDocumentsResponse),
    Commit(CommitResponse),
    BeginTransaction(BeginTransactionResponse),
    Empty(Empty),
    RunQuery(RunQueryResponse),
    Listen(ListenResponse),
}

macro_rules! response_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for ResponseMessage {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        }
    };
}

response_from!(Document, Document);
response_from!(BatchGetDocumentsResponse, BatchGet);
response_from!(CommitResponse, Commit);
response_from!(BeginTransactionResponse, BeginTransaction);
response_from!(Empty, Empty);
response_from!(RunQueryResponse, RunQuery);
response_from!(ListenResponse, Listen);

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn transaction_token_round_trips_as_hex() {
        let token = TransactionToken::new(vec![0xde, 0xad, 0xbe, 0xef]);
        let value = serde_json::to_value(&token).expect("serialize token");
        assert_eq!(value, json!("deadbeef"));

        let back: TransactionToken = serde_json::from_value(value).expect("deserialize token");
        assert_eq!(back, token);
    }

    #[test]
    fn transaction_token_rejects_non_hex() {
        let err = serde_json::from_value::<TransactionToken>(json!("zz")).unwrap_err();
        assert!(err.to_string().contains("invalid transaction token"));
    }

    #[test]
    fn request_message_maps_to_catalog_names() {
        let req = RequestMessage::from(GetDocumentRequest {
            name: "C/a".to_owned(),
            transaction: None,
        });
        assert_eq!(req.method(), methods::DOCUMENT_GET);

        let req = RequestMessage::from(ListenRequest {
            database: "db".to_owned(),
            target: ListenTarget::Remove { target_id: 1 },
        });
        assert_eq!(req.method(), methods::DATABASE_LISTEN);
    }

    #[test]
    fn batch_get_result_tags_found_and_missing() {
        let missing = BatchGetDocumentsResponse {
            result: BatchGetResult::Missing("C/b".to_owned()),
            read_time: Some(Timestamp::new(10, 0)),
        };
        let value = serde_json::to_value(&missing).expect("serialize response");
        assert_eq!(value["result"], json!({"missing": "C/b"}));
        assert_eq!(value["readTime"], json!({"seconds": 10, "nanos": 0}));
    }

    #[test]
    fn untagged_request_renders_as_params_shape() {
        let req = RequestMessage::from(BatchGetDocumentsRequest {
            database: "projects/p/databases/d".to_owned(),
            documents: vec!["C/a".to_owned()],
            transaction: None,
        });
        let value = serde_json::to_value(&req).expect("serialize request");
        assert_eq!(value["database"], "projects/p/databases/d");
        assert_eq!(value["documents"], json!(["C/a"]));
    }
}
