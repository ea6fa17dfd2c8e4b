//! Core data types

pub mod answer;
pub mod query;
pub mod vote;

pub use answer::{Answer, AnswerState, Passage};
pub use query::AnswerRequest;
pub use vote::{Vote, VoteStatistics, VoteSummary, VoteValue};
