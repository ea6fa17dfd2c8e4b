//! Durable per-answer feedback

pub mod store;

pub use store::FeedbackStore;
