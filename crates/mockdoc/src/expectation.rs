use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use mockdoc_wire::{
    BatchGetDocumentsResponse, BeginTransactionResponse, CommitResponse, Document, Empty,
    ListenResponse, RequestMessage, ResponseMessage, RunQueryResponse, ServiceStatus,
};

/// Patches fields of an expected request that cannot be known until the
/// actual request is observed. Must be pure: takes the registered
/// expectation and the observed request, returns a fresh comparison basis.
pub type AdjustFn = Arc<dyn Fn(&RequestMessage, &RequestMessage) -> RequestMessage + Send + Sync>;

/// One element of a streamed reply: a payload to deliver, or a status that
/// terminates the stream at its position.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamElement {
    Message(ResponseMessage),
    Status(ServiceStatus),
}

/// Scripted outcome of one matched call.
///
/// Exactly one case applies per expectation; the facade resolves the
/// variant once when it unwraps, never per call site.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Message(ResponseMessage),
    Status(ServiceStatus),
    Stream(Vec<StreamElement>),
}

impl From<ResponseMessage> for Reply {
    fn from(message: ResponseMessage) -> Self {
        Self::Message(message)
    }
}

impl From<ServiceStatus> for Reply {
    fn from(status: ServiceStatus) -> Self {
        Self::Status(status)
    }
}

impl From<Vec<StreamElement>> for Reply {
    fn from(elements: Vec<StreamElement>) -> Self {
        Self::Stream(elements)
    }
}

impl From<ResponseMessage> for StreamElement {
    fn from(message: ResponseMessage) -> Self {
        Self::Message(message)
    }
}

impl From<ServiceStatus> for StreamElement {
    fn from(status: ServiceStatus) -> Self {
        Self::Status(status)
    }
}

macro_rules! reply_from_response {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Reply {
                fn from(value: $ty) -> Self {
                    Self::Message(ResponseMessage::from(value))
                }
            }

            impl From<$ty> for StreamElement {
                fn from(value: $ty) -> Self {
                    Self::Message(ResponseMessage::from(value))
                }
            }
        )+
    };
}

reply_from_response!(
    Document,
    BatchGetDocumentsResponse,
    CommitResponse,
    BeginTransactionResponse,
    Empty,
    RunQueryResponse,
    ListenResponse,
);

/// One registered test scenario.
pub struct Expectation {
    pub(crate) expected: Option<RequestMessage>,
    pub(crate) adjust: Option<AdjustFn>,
    pub(crate) reply: Reply,
}

impl Expectation {
    pub(crate) fn new(expected: Option<RequestMessage>, reply: Reply) -> Self {
        Self {
            expected,
            adjust: None,
            reply,
        }
    }

    pub(crate) fn with_adjust(mut self, adjust: AdjustFn) -> Self {
        self.adjust = Some(adjust);
        self
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("expected", &self.expected)
            .field("adjust", &self.adjust.as_ref().map(|_| "<fn>"))
            .field("reply", &self.reply)
            .finish()
    }
}

/// Method-keyed expectation lists, registration order preserved.
///
/// The store is plain data: locking and scan policy live in
/// `MockDatabase`, which owns the single mutex guarding this structure.
#[derive(Debug, Default)]
pub(crate) struct ExpectationStore {
    entries: HashMap<String, Vec<Expectation>>,
}

impl ExpectationStore {
    pub(crate) fn insert(&mut self, method: String, expectation: Expectation) {
        self.entries.entry(method).or_default().push(expectation);
    }

    pub(crate) fn method_entries(&self, method: &str) -> Option<&[Expectation]> {
        self.entries.get(method).map(Vec::as_slice)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn registered(&self, method: &str) -> usize {
        self.entries.get(method).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn insert_preserves_registration_order_per_method() {
        let mut store = ExpectationStore::default();
        store.insert(
            "document/get".to_owned(),
            Expectation::new(None, Reply::from(Document::new("first"))),
        );
        store.insert(
            "document/get".to_owned(),
            Expectation::new(None, Reply::from(Document::new("second"))),
        );

        let entries = store.method_entries("document/get").expect("entries");
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].reply,
            Reply::Message(ResponseMessage::Document(Document::new("first")))
        );
        assert_eq!(
            entries[1].reply,
            Reply::Message(ResponseMessage::Document(Document::new("second")))
        );
    }

    #[test]
    fn clear_empties_every_method() {
        let mut store = ExpectationStore::default();
        store.insert(
            "document/get".to_owned(),
            Expectation::new(None, Reply::from(Document::new("a"))),
        );
        store.insert(
            "database/commit".to_owned(),
            Expectation::new(None, Reply::from(CommitResponse::default())),
        );

        store.clear();
        assert_eq!(store.registered("document/get"), 0);
        assert_eq!(store.registered("database/commit"), 0);
        assert!(store.method_entries("document/get").is_none());
    }
}
