//! API routes: answering and feedback

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::vote::VoteFilter;
use crate::types::{AnswerRequest, AnswerState, Vote, VoteStatistics, VoteSummary, VoteValue};

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/answer", post(answer))
        .route("/vote", post(vote))
        .route("/votes/stats", get(vote_stats))
        .route("/votes/list", get(list_votes))
        .route("/votes/:answer_id", get(vote_summary))
        .route("/info", get(info))
}

/// Response body for `POST /api/answer`
#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub answer_id: String,
    pub answer: String,
    pub source_passage_ids: Vec<String>,
    pub state: AnswerState,
    pub cached: bool,
    pub processing_time_ms: u64,
}

/// POST /api/answer - answer a question with retrieval-augmented generation
pub async fn answer(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>> {
    let start = Instant::now();
    tracing::info!("Answer request: \"{}\"", request.question);

    let outcome = state.pipeline().answer(&request.question, request.k).await?;

    // Persist grounded answers for audit and strict voting
    if outcome.answer.state == AnswerState::Grounded && !outcome.cached {
        if let Err(e) = state.feedback().record_answer(&request.question, &outcome.answer) {
            tracing::warn!("Failed to persist answer for audit: {}", e);
        }
    }

    let processing_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "Answer completed in {}ms ({} sources, cached: {})",
        processing_time_ms,
        outcome.answer.source_passage_ids.len(),
        outcome.cached
    );

    Ok(Json(AnswerResponse {
        answer_id: outcome.answer.id,
        answer: outcome.answer.text,
        source_passage_ids: outcome.answer.source_passage_ids,
        state: outcome.answer.state,
        cached: outcome.cached,
        processing_time_ms,
    }))
}

/// Request body for `POST /api/vote`
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub answer_id: String,
    pub voter_id: String,
    pub value: VoteValue,
    #[serde(default)]
    pub comment: Option<String>,
}

/// POST /api/vote - record one vote per (answer, voter), replacing any
/// earlier vote from the same voter
pub async fn vote(
    State(state): State<AppState>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<VoteSummary>> {
    state.feedback().record_vote(
        &request.answer_id,
        &request.voter_id,
        request.value,
        request.comment.as_deref(),
    )?;

    let summary = state.feedback().vote_summary(&request.answer_id)?;
    Ok(Json(summary))
}

/// GET /api/votes/:answer_id - vote summary for one answer
pub async fn vote_summary(
    State(state): State<AppState>,
    Path(answer_id): Path<String>,
) -> Result<Json<VoteSummary>> {
    let summary = state.feedback().vote_summary(&answer_id)?;
    Ok(Json(summary))
}

/// GET /api/votes/list - list votes with optional filters
pub async fn list_votes(
    State(state): State<AppState>,
    axum::extract::Query(filter): axum::extract::Query<VoteFilter>,
) -> Result<Json<Vec<Vote>>> {
    let votes = state.feedback().list_votes(&filter)?;
    Ok(Json(votes))
}

/// GET /api/votes/stats - aggregate vote statistics
pub async fn vote_stats(State(state): State<AppState>) -> Result<Json<VoteStatistics>> {
    let stats = state.feedback().statistics()?;
    Ok(Json(stats))
}

/// API info endpoint
pub async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "ragserve",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Question answering with vector retrieval and per-answer feedback",
        "model_tag": state.pipeline().model_tag(),
        "cache": state.pipeline().cache().stats(),
        "endpoints": {
            "POST /api/answer": "Answer a question from indexed documentation",
            "POST /api/vote": "Record feedback for an answer (idempotent per voter)",
            "GET /api/votes/:answer_id": "Vote summary for one answer",
            "GET /api/votes/list": "List votes with filters",
            "GET /api/votes/stats": "Aggregate vote statistics"
        }
    }))
}
