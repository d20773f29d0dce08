//! Scriptable loopback double for a document-store RPC service.
//!
//! Tests register (request, reply) expectations against a [`MockDatabase`],
//! start a [`Server`] around it, and point a wire-level client at the
//! returned address. Incoming requests are matched structurally (after
//! canonicalization of order-free collections) against the registered
//! expectations, and the scripted reply is played back: a single response,
//! a status failure, or an ordered stream of both.
//!
//! There are no real document-store semantics here; the double only
//! replays what the test scripted. Matching failures are ordinary,
//! catchable errors; a reply whose shape does not fit its operation is
//! treated as a bug in the test itself and panics.

pub mod client;
pub mod counters;
pub mod errors;
pub mod expectation;
pub mod facade;
pub mod matcher;
pub mod normalize;
pub mod server;

pub use client::{Client, StreamOutcome};
pub use counters::CountersSnapshot;
pub use errors::{ClientError, MatchError, ServerError};
pub use expectation::{AdjustFn, Reply, StreamElement};
pub use facade::{DatabaseFacade, ReplyStream, ResponsePayload};
pub use matcher::MockDatabase;
pub use normalize::canonical;
pub use server::{Server, ServerConfig};
