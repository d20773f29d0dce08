use serde::{Deserialize, Serialize};

use crate::document::{DocValue, Document, Timestamp};

/// Guard a write against the current state of the target document.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Precondition {
    Exists(bool),
    UpdateTime(Timestamp),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ServerValue {
    RequestTime,
}

/// Server-side mutation applied to one field.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum TransformKind {
    SetToServerValue(ServerValue),
    Increment(DocValue),
    Maximum(DocValue),
    Minimum(DocValue),
    AppendMissingElements(Vec<DocValue>),
    RemoveAllFromArray(Vec<DocValue>),
}

/// One field transform inside a document transform.
///
/// The producing client emits these in no guaranteed order; comparison
/// code sorts by `field_path` before checking equality.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldTransform {
    pub field_path: String,
    pub kind: TransformKind,
}

impl FieldTransform {
    pub fn new(field_path: impl Into<String>, kind: TransformKind) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTransform {
    pub document: String,
    pub field_transforms: Vec<FieldTransform>,
}

/// The operation half of a write.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum WriteOp {
    Update(Document),
    Delete(String),
    Transform(DocumentTransform),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    pub operation: WriteOp,
    pub update_mask: Option<Vec<String>>,
    pub current_document: Option<Precondition>,
}

impl Write {
    pub fn new(operation: WriteOp) -> Self {
        Self {
            operation,
            update_mask: None,
            current_document: None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    pub update_time: Option<Timestamp>,
    pub transform_results: Vec<DocValue>,
}
