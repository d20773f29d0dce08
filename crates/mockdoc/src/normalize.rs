//! Pre-comparison canonicalization.
//!
//! The producing client emits a commit's field transforms in no guaranteed
//! order, while structural equality is order-sensitive. Both sides of every
//! comparison pass through here first so permuted-but-equal requests
//! compare equal.

use mockdoc_wire::{RequestMessage, WriteOp};

/// Canonical copy of a request for comparison.
pub fn canonical(request: &RequestMessage) -> RequestMessage {
    let mut copy = request.clone();
    canonicalize_in_place(&mut copy);
    copy
}

/// Sort every transform write's field transforms by field path.
/// Stable sort, so ties keep their wire order.
pub fn canonicalize_in_place(request: &mut RequestMessage) {
    let RequestMessage::Commit(commit) = request else {
        return;
    };
    for write in &mut commit.writes {
        if let WriteOp::Transform(transform) = &mut write.operation {
            transform
                .field_transforms
                .sort_by(|a, b| a.field_path.cmp(&b.field_path));
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use mockdoc_wire::{
        CommitRequest, DocValue, DocumentTransform, FieldTransform, GetDocumentRequest,
        TransformKind, Write, WriteOp,
    };

    use super::*;

    fn transform_commit(paths: &[&str]) -> RequestMessage {
        let field_transforms = paths
            .iter()
            .map(|path| FieldTransform::new(*path, TransformKind::Increment(DocValue::Integer(1))))
            .collect();
        RequestMessage::Commit(CommitRequest {
            database: "projects/p/databases/d".to_owned(),
            writes: vec![Write::new(WriteOp::Transform(DocumentTransform {
                document: "C/a".to_owned(),
                field_transforms,
            }))],
            transaction: None,
        })
    }

    #[test]
    fn permuted_transforms_compare_equal_after_canonicalization() {
        let forward = transform_commit(&["a", "b", "c"]);
        let shuffled = transform_commit(&["c", "a", "b"]);

        assert_ne!(forward, shuffled);
        assert_eq!(canonical(&forward), canonical(&shuffled));
    }

    #[test]
    fn canonical_does_not_mutate_its_input() {
        let shuffled = transform_commit(&["z", "a"]);
        let before = shuffled.clone();
        let _ = canonical(&shuffled);
        assert_eq!(shuffled, before);
    }

    #[test]
    fn non_commit_requests_pass_through() {
        let request = RequestMessage::GetDocument(GetDocumentRequest {
            name: "C/a".to_owned(),
            transaction: None,
        });
        assert_eq!(canonical(&request), request);
    }
}
