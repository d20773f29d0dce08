use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountersSnapshot {
    pub connections_total: u64,
    pub frames_read_total: u64,
    pub malformed_lines_total: u64,
    pub matched_total: u64,
    pub mismatched_total: u64,
    pub stream_items_total: u64,
}

/// Host and matcher counters for long-run assertions.
/// All counters are lock-free atomics; hot paths stay O(1).
#[derive(Debug, Default)]
pub(crate) struct Counters {
    connections_total: AtomicU64,
    frames_read_total: AtomicU64,
    malformed_lines_total: AtomicU64,
    matched_total: AtomicU64,
    mismatched_total: AtomicU64,
    stream_items_total: AtomicU64,
}

impl Counters {
    pub(crate) fn record_connection(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_frame_read(&self) {
        self.frames_read_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed_line(&self) {
        self.malformed_lines_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_match(&self) {
        self.matched_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_mismatch(&self) {
        self.mismatched_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stream_item(&self) {
        self.stream_items_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            frames_read_total: self.frames_read_total.load(Ordering::Relaxed),
            malformed_lines_total: self.malformed_lines_total.load(Ordering::Relaxed),
            matched_total: self.matched_total.load(Ordering::Relaxed),
            mismatched_total: self.mismatched_total.load(Ordering::Relaxed),
            stream_items_total: self.stream_items_total.load(Ordering::Relaxed),
        }
    }
}
