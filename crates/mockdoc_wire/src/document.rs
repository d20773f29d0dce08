use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Wall-clock instant as carried on the wire.
///
/// Equality is field-wise; producers are expected to keep `nanos` in
/// `0..1_000_000_000` so equal instants have one representation.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub const fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }
}

/// One field value inside a document.
///
/// `Map` keys are kept in a `BTreeMap` so structural equality and the
/// serialized form are independent of insertion order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum DocValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    Text(String),
    Reference(String),
    Timestamp(Timestamp),
    Array(Vec<DocValue>),
    Map(BTreeMap<String, DocValue>),
}

/// A stored document: full resource name plus its fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,
    pub fields: BTreeMap<String, DocValue>,
    pub create_time: Option<Timestamp>,
    pub update_time: Option<Timestamp>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: DocValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn map_equality_ignores_insertion_order() {
        let mut forward = BTreeMap::new();
        forward.insert("a".to_owned(), DocValue::Integer(1));
        forward.insert("b".to_owned(), DocValue::Bool(true));

        let mut reverse = BTreeMap::new();
        reverse.insert("b".to_owned(), DocValue::Bool(true));
        reverse.insert("a".to_owned(), DocValue::Integer(1));

        assert_eq!(DocValue::Map(forward), DocValue::Map(reverse));
    }

    #[test]
    fn document_serializes_with_camel_case_times() {
        let doc = Document::new("projects/p/databases/d/documents/C/a")
            .with_field("f", DocValue::Integer(1));
        let json = serde_json::to_value(&doc).expect("serialize document");

        assert_eq!(json["name"], "projects/p/databases/d/documents/C/a");
        assert_eq!(json["fields"]["f"], json!({"integer": 1}));
        assert_eq!(json["createTime"], json!(null));
    }
}
