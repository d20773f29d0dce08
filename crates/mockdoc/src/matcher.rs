use std::sync::{Arc, Mutex};

use mockdoc_wire::RequestMessage;

use crate::counters::{Counters, CountersSnapshot};
use crate::errors::MatchError;
use crate::expectation::{AdjustFn, Expectation, ExpectationStore, Reply};
use crate::normalize::canonical;

/// The scriptable half of the double: tests register expectations here and
/// hand the database to a `Server`; the facade resolves incoming requests
/// against it.
///
/// All store access goes through one mutex. Matching never consumes an
/// entry, so the first registered match keeps winning on every call with
/// an equal request; `reset` is the only way to drop expectations.
pub struct MockDatabase {
    store: Mutex<ExpectationStore>,
    counters: Arc<Counters>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(ExpectationStore::default()),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Register one expectation for `method`.
    ///
    /// `expected == None` registers a wildcard that matches any incoming
    /// request. No shape validation happens here; a reply that does not
    /// fit the operation surfaces as a panic at unwrap time.
    pub fn register(
        &self,
        method: impl Into<String>,
        expected: Option<RequestMessage>,
        reply: impl Into<Reply>,
    ) {
        self.with_store(|store| {
            store.insert(method.into(), Expectation::new(expected, reply.into()));
        });
    }

    /// Like [`register`](Self::register), with a pure adjustment function
    /// applied to the expected request before each comparison.
    pub fn register_adjust<F>(
        &self,
        method: impl Into<String>,
        expected: Option<RequestMessage>,
        reply: impl Into<Reply>,
        adjust: F,
    ) where
        F: Fn(&RequestMessage, &RequestMessage) -> RequestMessage + Send + Sync + 'static,
    {
        let adjust: AdjustFn = Arc::new(adjust);
        self.with_store(|store| {
            store.insert(
                method.into(),
                Expectation::new(expected, reply.into()).with_adjust(adjust),
            );
        });
    }

    /// Drop every registered expectation. Safe with none or a backlog.
    pub fn reset(&self) {
        self.with_store(ExpectationStore::clear);
    }

    pub fn counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }

    pub(crate) fn counters_handle(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    /// Find the first expectation for `method` matching `actual` and
    /// return a copy of its scripted reply.
    ///
    /// Scan order is registration order. A non-matching entry means keep
    /// looking; only an exhausted scan is a failure. Wildcards match
    /// unconditionally.
    pub fn resolve(&self, method: &str, actual: &RequestMessage) -> Result<Reply, MatchError> {
        let outcome = self.with_store(|store| {
            let Some(entries) = store.method_entries(method) else {
                return Err(MatchError::MethodNotRegistered {
                    method: method.to_owned(),
                });
            };

            let got = canonical(actual);
            let mut tried = Vec::new();
            for entry in entries {
                let Some(expected) = &entry.expected else {
                    return Ok(entry.reply.clone());
                };
                let basis = match &entry.adjust {
                    Some(adjust) => adjust(expected, actual),
                    None => expected.clone(),
                };
                let want = canonical(&basis);
                if want == got {
                    return Ok(entry.reply.clone());
                }
                tried.push(render(&want));
            }

            Err(MatchError::NoMatchingExpectation {
                method: method.to_owned(),
                got: render(&got),
                tried: tried.join("\n---\n"),
            })
        });

        match &outcome {
            Ok(_) => {
                self.counters.record_match();
                tracing::debug!(method, "expectation matched");
            }
            Err(err) => {
                self.counters.record_mismatch();
                tracing::debug!(method, error = %err, "matching failed");
            }
        }
        outcome
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut ExpectationStore) -> T) -> T {
        match self.store.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn render(request: &RequestMessage) -> String {
    serde_json::to_string_pretty(request)
        .unwrap_or_else(|err| format!("<unrenderable request: {err}>"))
}
