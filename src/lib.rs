//! ragserve: retrieval-augmented question answering with per-answer feedback
//!
//! Answers questions over an indexed documentation corpus: the query is
//! embedded, similar passages are retrieved from a vector index, a grounded
//! answer is generated and cached, and readers can vote on each answer. Votes
//! are persisted with one row per (answer, voter), so a revised vote replaces
//! the earlier one instead of double-counting.

pub mod cache;
pub mod config;
pub mod error;
pub mod feedback;
pub mod generation;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::{AnswerOutcome, AnswerPipeline};
pub use types::{
    answer::{Answer, AnswerState, Passage, INSUFFICIENT_INFORMATION},
    query::AnswerRequest,
    vote::{Vote, VoteStatistics, VoteSummary, VoteValue},
};
