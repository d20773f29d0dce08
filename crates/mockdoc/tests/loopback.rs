use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::time::timeout;

use mockdoc::{Client, ClientError, MockDatabase, Server, StreamElement};
use mockdoc_wire::{
    methods, BatchGetDocumentsRequest, BatchGetDocumentsResponse, BatchGetResult,
    BeginTransactionRequest, BeginTransactionResponse, CommitRequest, CommitResponse, DocValue,
    Document, DocumentTransform, Empty, FieldTransform, GetDocumentRequest, ListenRequest,
    ListenResponse, ListenTarget, RequestMessage, RollbackRequest, ServiceStatus, StatusCode,
    TargetChangeKind, Timestamp, TransactionToken, TransformKind, Write, WriteOp, WriteResult,
};

const CALL_TIMEOUT: Duration = Duration::from_secs(5);

const DB_PATH: &str = "projects/projectID/databases/(default)";

async fn start() -> (Server, Client) {
    let server = Server::start(Arc::new(MockDatabase::new()))
        .await
        .expect("start server");
    let client = Client::connect(&server.addr()).await.expect("connect");
    (server, client)
}

fn doc_path(id: &str) -> String {
    format!("{DB_PATH}/documents/C/{id}")
}

fn get_request(name: &str) -> GetDocumentRequest {
    GetDocumentRequest {
        name: name.to_owned(),
        transaction: None,
    }
}

fn batch_request(ids: &[&str]) -> BatchGetDocumentsRequest {
    BatchGetDocumentsRequest {
        database: DB_PATH.to_owned(),
        documents: ids.iter().map(|id| doc_path(id)).collect(),
        transaction: None,
    }
}

fn found(id: &str) -> BatchGetDocumentsResponse {
    BatchGetDocumentsResponse {
        result: BatchGetResult::Found(
            Document::new(doc_path(id)).with_field("f", DocValue::Integer(1)),
        ),
        read_time: Some(Timestamp::new(1_485_993_600, 0)),
    }
}

fn missing(id: &str) -> BatchGetDocumentsResponse {
    BatchGetDocumentsResponse {
        result: BatchGetResult::Missing(doc_path(id)),
        read_time: Some(Timestamp::new(1_489_968_000, 0)),
    }
}

fn transform_commit(id: &str, paths: &[&str]) -> CommitRequest {
    CommitRequest {
        database: DB_PATH.to_owned(),
        writes: vec![Write::new(WriteOp::Transform(DocumentTransform {
            document: doc_path(id),
            field_transforms: paths
                .iter()
                .map(|path| {
                    FieldTransform::new(*path, TransformKind::Increment(DocValue::Integer(1)))
                })
                .collect(),
        }))],
        transaction: None,
    }
}

#[tokio::test(flavor = "current_thread")]
async fn wildcard_get_document_answers_repeated_calls() {
    let (server, mut client) = start().await;
    server
        .database()
        .register(methods::DOCUMENT_GET, None, Document::new("X"));

    for _ in 0..2 {
        let doc = timeout(CALL_TIMEOUT, client.get_document(&get_request(&doc_path("a"))))
            .await
            .expect("call timeout")
            .expect("scripted document");
        assert_eq!(doc, Document::new("X"));
    }

    server.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn batch_get_matches_expected_request_and_reports_mismatch() {
    let (server, mut client) = start().await;
    server.database().register(
        methods::DOCUMENT_BATCH_GET,
        Some(RequestMessage::from(batch_request(&["a"]))),
        vec![StreamElement::from(missing("a"))],
    );

    let outcome = timeout(
        CALL_TIMEOUT,
        client.batch_get_documents(&batch_request(&["a"])),
    )
    .await
    .expect("call timeout")
    .expect("stream");
    assert_eq!(outcome.items, vec![missing("a")]);
    assert_eq!(outcome.error, None);

    // A request nothing matches is a reportable failure, delivered before
    // any element, with both sides rendered for debugging.
    let outcome = timeout(
        CALL_TIMEOUT,
        client.batch_get_documents(&batch_request(&["b"])),
    )
    .await
    .expect("call timeout")
    .expect("stream");
    assert!(outcome.items.is_empty());
    let status = outcome.error.expect("mismatch status");
    assert_eq!(status.code, StatusCode::Internal);
    assert!(status.message.contains("documents/C/b"), "{}", status.message);
    assert!(status.message.contains("documents/C/a"), "{}", status.message);

    server.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn stream_delivers_prefix_then_fails_on_error_element() {
    let (server, mut client) = start().await;
    server.database().register(
        methods::DOCUMENT_BATCH_GET,
        None,
        vec![
            StreamElement::from(found("a")),
            StreamElement::from(found("b")),
            StreamElement::from(ServiceStatus::unavailable("backend went away")),
            StreamElement::from(found("never")),
        ],
    );

    let outcome = timeout(
        CALL_TIMEOUT,
        client.batch_get_documents(&batch_request(&["a", "b"])),
    )
    .await
    .expect("call timeout")
    .expect("stream");

    assert_eq!(outcome.items, vec![found("a"), found("b")]);
    assert_eq!(
        outcome.error,
        Some(ServiceStatus::unavailable("backend went away"))
    );

    server.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn commit_with_adjust_matches_generated_name_and_permuted_transforms() {
    let (server, mut client) = start().await;
    let response = CommitResponse {
        write_results: vec![WriteResult {
            update_time: Some(Timestamp::new(1_485_993_600, 0)),
            transform_results: Vec::new(),
        }],
        commit_time: Some(Timestamp::new(1_485_993_600, 0)),
    };
    // The client generates the document id, so the expectation takes the
    // name from the observed request before comparison.
    server.database().register_adjust(
        methods::DATABASE_COMMIT,
        Some(RequestMessage::from(transform_commit(
            "placeholder",
            &["a", "b", "c"],
        ))),
        response.clone(),
        |expected, actual| {
            let (RequestMessage::Commit(want), RequestMessage::Commit(got)) = (expected, actual)
            else {
                return expected.clone();
            };
            let mut adjusted = want.clone();
            if let (Some(write), Some(got_write)) =
                (adjusted.writes.first_mut(), got.writes.first())
            {
                if let (WriteOp::Transform(transform), WriteOp::Transform(got_transform)) =
                    (&mut write.operation, &got_write.operation)
                {
                    transform.document.clone_from(&got_transform.document);
                }
            }
            RequestMessage::Commit(adjusted)
        },
    );

    // Transform order differs from the registration; normalization makes
    // the comparison order-free.
    let got = timeout(
        CALL_TIMEOUT,
        client.commit(&transform_commit("generated-7", &["c", "a", "b"])),
    )
    .await
    .expect("call timeout")
    .expect("commit");
    assert_eq!(got, response);

    server.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn transaction_round_trip_keeps_token_bytes() {
    let (server, mut client) = start().await;
    let token = TransactionToken::new(vec![0xde, 0xad, 0xbe, 0xef]);
    server.database().register(
        methods::TRANSACTION_BEGIN,
        Some(RequestMessage::from(BeginTransactionRequest {
            database: DB_PATH.to_owned(),
        })),
        BeginTransactionResponse {
            transaction: token.clone(),
        },
    );
    server.database().register(
        methods::TRANSACTION_ROLLBACK,
        Some(RequestMessage::from(RollbackRequest {
            database: DB_PATH.to_owned(),
            transaction: token.clone(),
        })),
        Empty::default(),
    );

    let begun = timeout(
        CALL_TIMEOUT,
        client.begin_transaction(&BeginTransactionRequest {
            database: DB_PATH.to_owned(),
        }),
    )
    .await
    .expect("call timeout")
    .expect("begin transaction");
    assert_eq!(begun.transaction, token);

    timeout(
        CALL_TIMEOUT,
        client.rollback(&RollbackRequest {
            database: DB_PATH.to_owned(),
            transaction: begun.transaction,
        }),
    )
    .await
    .expect("call timeout")
    .expect("rollback");

    server.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn listen_replays_scripted_changes_for_matching_subscription() {
    let (server, mut client) = start().await;
    let request = ListenRequest {
        database: DB_PATH.to_owned(),
        target: ListenTarget::Add {
            target_id: 1,
            documents: vec![doc_path("a")],
        },
    };
    server.database().register(
        methods::DATABASE_LISTEN,
        Some(RequestMessage::from(request.clone())),
        vec![
            StreamElement::from(ListenResponse::TargetChange {
                kind: TargetChangeKind::Add,
                target_ids: vec![1],
            }),
            StreamElement::from(ListenResponse::DocumentChange {
                document: Document::new(doc_path("a")).with_field("f", DocValue::Integer(1)),
                target_ids: vec![1],
            }),
        ],
    );

    let outcome = timeout(CALL_TIMEOUT, client.listen(&request))
        .await
        .expect("call timeout")
        .expect("listen stream");
    assert_eq!(outcome.items.len(), 2);
    assert_eq!(outcome.error, None);

    server.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn listen_mismatch_is_fatal_for_the_connection() {
    let (server, mut client) = start().await;
    // Nothing registered for listen: the matcher failure is a harness
    // violation, the handler task panics, and this connection dies rather
    // than reporting an ordinary error.
    let request = ListenRequest {
        database: DB_PATH.to_owned(),
        target: ListenTarget::Remove { target_id: 9 },
    };

    let err = timeout(CALL_TIMEOUT, client.listen(&request))
        .await
        .expect("call timeout")
        .unwrap_err();
    assert!(
        matches!(err, ClientError::ConnectionClosed | ClientError::Transport(_)),
        "unexpected error: {err:?}"
    );

    server.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn unmocked_methods_report_unimplemented() {
    let (server, mut client) = start().await;

    // Known method, nothing registered.
    let err = timeout(CALL_TIMEOUT, client.get_document(&get_request(&doc_path("a"))))
        .await
        .expect("call timeout")
        .unwrap_err();
    let ClientError::Status(status) = err else {
        panic!("expected status error, got {err:?}");
    };
    assert_eq!(status.code, StatusCode::Unimplemented);
    assert!(status.message.contains(methods::DOCUMENT_GET));

    // Method outside the catalog entirely.
    let err = timeout(
        CALL_TIMEOUT,
        client.unary("database/compact", json!({})),
    )
    .await
    .expect("call timeout")
    .unwrap_err();
    let ClientError::Status(status) = err else {
        panic!("expected status error, got {err:?}");
    };
    assert_eq!(status.code, StatusCode::Unimplemented);

    server.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn reset_drops_registered_expectations() {
    let (server, mut client) = start().await;
    server
        .database()
        .register(methods::DOCUMENT_GET, None, Document::new("X"));

    timeout(CALL_TIMEOUT, client.get_document(&get_request(&doc_path("a"))))
        .await
        .expect("call timeout")
        .expect("matches before reset");

    server.reset();

    let err = timeout(CALL_TIMEOUT, client.get_document(&get_request(&doc_path("a"))))
        .await
        .expect("call timeout")
        .unwrap_err();
    assert!(matches!(err, ClientError::Status(_)), "got {err:?}");

    server.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn scripted_status_propagates_verbatim() {
    let (server, mut client) = start().await;
    let scripted = ServiceStatus::permission_denied("no access to C/a")
        .with_details(json!({"resource": doc_path("a")}));
    server
        .database()
        .register(methods::DOCUMENT_GET, None, scripted.clone());

    let err = timeout(CALL_TIMEOUT, client.get_document(&get_request(&doc_path("a"))))
        .await
        .expect("call timeout")
        .unwrap_err();
    let ClientError::Status(status) = err else {
        panic!("expected status error, got {err:?}");
    };
    assert_eq!(status, scripted);

    server.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn host_skips_malformed_lines_and_counts_them() {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    let (server, _client) = start().await;
    server
        .database()
        .register(methods::DOCUMENT_GET, None, Document::new("X"));

    // A garbage line followed by a valid call on the same raw connection.
    let stream = TcpStream::connect(&server.addr()).await.expect("connect");
    let (read_half, mut write_half) = stream.into_split();
    let request = json!({"id": 1, "method": methods::DOCUMENT_GET, "params": {"name": doc_path("a")}});
    let payload = format!("not-json\n{request}\n");
    write_half
        .write_all(payload.as_bytes())
        .await
        .expect("write frames");

    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    timeout(CALL_TIMEOUT, reader.read_line(&mut line))
        .await
        .expect("read timeout")
        .expect("read response");
    let frame: serde_json::Value = serde_json::from_str(line.trim_end()).expect("response json");
    assert_eq!(frame["id"], 1);
    assert_eq!(frame["result"]["name"], "X");

    let snapshot = server.database().counters();
    assert_eq!(snapshot.malformed_lines_total, 1, "{snapshot:?}");
    assert_eq!(snapshot.matched_total, 1, "{snapshot:?}");
    assert!(snapshot.connections_total >= 2, "{snapshot:?}");

    server.shutdown().await;
}
