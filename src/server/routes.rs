use std::sync::Arc;

use axum::extract::{Path, State};
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::auth::issuance::IssuanceError;
use crate::ballot::{create_ballot, BallotError, EncryptedBallot, SubmitError};
use crate::storage::ledger::LedgerError;
use crate::tally::TallyOutcome;

use super::bootstrap::EngineState;
use super::dto::{
    CredentialRequestBody, CredentialResponse, EncryptRequest, ParametersResponse, RosterResponse,
    SubmitRequest, SubmitResponse, TallyResponse, VerifyResponse,
};
use super::error::ApiError;
use super::logging::log_requests;

const LOG_TARGET: &str = "server::routes";

/// Issuance surface: roster lookups plus blind signing.
pub fn auth_router(state: Arc<EngineState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/auth/request_credential", post(request_credential))
        .route("/auth/shareholders", get(list_shareholders))
        .route("/auth/shareholders/:voter_id", get(get_shareholder))
        .route("/params", get(get_parameters))
        .layer(middleware::from_fn(log_requests))
        .layer(cors)
        .with_state(state)
}

/// Ballot surface: encryption helper, submission, tally and verification.
pub fn tally_router(state: Arc<EngineState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/encrypt", post(encrypt_vote))
        .route("/submit", post(submit_vote))
        .route("/tally/result", get(tally_result))
        .route("/verify/:vote_index", get(verify_vote))
        .route("/params", get(get_parameters))
        .layer(middleware::from_fn(log_requests))
        .layer(cors)
        .with_state(state)
}

async fn get_parameters(State(state): State<Arc<EngineState>>) -> Json<ParametersResponse> {
    Json(ParametersResponse::new(
        &state.keys.group,
        &state.keys.y,
        &state.rsa.n,
        &state.rsa.e,
    ))
}

async fn request_credential(
    State(state): State<Arc<EngineState>>,
    Json(body): Json<CredentialRequestBody>,
) -> Result<Json<CredentialResponse>, ApiError> {
    let issued = state
        .issuance
        .issue(&body.voter_id, &body.blinded_serial)
        .map_err(|err| match err {
            IssuanceError::InvalidVoterId(voter_id) => ApiError::forbidden("Invalid voter ID")
                .with_message(format!("{voter_id} is not on the shareholder roster")),
            IssuanceError::InvalidBlindedFormat => {
                ApiError::bad_request("Invalid blinded serial format")
            }
        })?;
    Ok(Json(CredentialResponse::from(issued)))
}

async fn list_shareholders(State(state): State<Arc<EngineState>>) -> Json<RosterResponse> {
    Json(RosterResponse {
        shareholders: state.roster.all().clone(),
    })
}

async fn get_shareholder(
    State(state): State<Arc<EngineState>>,
    Path(voter_id): Path<String>,
) -> Result<Json<crate::auth::roster::Voter>, ApiError> {
    state
        .roster
        .get(&voter_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Shareholder not found"))
}

async fn encrypt_vote(
    State(state): State<Arc<EngineState>>,
    Json(body): Json<EncryptRequest>,
) -> Result<Json<EncryptedBallot>, ApiError> {
    if body.vote > 1 {
        return Err(ApiError::bad_request("Vote must be 0 or 1"));
    }
    let vote = body.vote == 1;
    let weight = body.weight;

    let ballot = tokio::task::spawn_blocking(move || {
        let mut rng = rand::thread_rng();
        create_ballot(&state.keys.group, &state.keys.y, vote, weight, &mut rng)
    })
    .await
    .map_err(|err| ApiError::internal(err.to_string()))?
    .map_err(|err| match err {
        BallotError::ZeroWeight => ApiError::bad_request("Weight must be positive"),
        other => ApiError::bad_request(other.to_string()),
    })?;
    Ok(Json(ballot))
}

async fn submit_vote(
    State(state): State<Arc<EngineState>>,
    Json(body): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let voter_id = body.voter_id.clone();
    let receipt = tokio::task::spawn_blocking(move || {
        state
            .ballot_box
            .submit(body.encrypted_vote, &body.credential)
    })
    .await
    .map_err(|err| ApiError::internal(err.to_string()))?
    .map_err(|err| match err {
        SubmitError::InvalidCredential => ApiError::forbidden("Invalid credential"),
        SubmitError::Ballot(BallotError::InvalidProof) => {
            ApiError::bad_request("Invalid ballot proof")
        }
        SubmitError::Ballot(inner) => ApiError::bad_request(inner.to_string()),
        SubmitError::CredentialStore(inner) => ApiError::internal(inner.to_string()),
        SubmitError::Ledger(inner) => ApiError::internal(inner.to_string()),
    })?;

    tracing::info!(
        target: LOG_TARGET,
        voter_id = %voter_id,
        vote_index = receipt.index,
        "vote submission accepted"
    );
    Ok(Json(SubmitResponse {
        success: true,
        vote_index: receipt.index,
        merkle_proof: receipt.merkle_proof,
    }))
}

async fn tally_result(
    State(state): State<Arc<EngineState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let keys = Arc::clone(&state.keys);
    let outcome = tokio::task::spawn_blocking(move || {
        let mut rng = rand::thread_rng();
        state.tallier.tally(&mut rng)
    })
    .await
    .map_err(|err| ApiError::internal(err.to_string()))?
    .map_err(|err| ApiError::internal(err.to_string()))?;

    match outcome {
        TallyOutcome::Empty => Ok(Json(serde_json::json!({ "error": "No votes found" }))),
        TallyOutcome::Counted(result) => {
            let response = TallyResponse::from_result(result, &keys);
            serde_json::to_value(response)
                .map(Json)
                .map_err(|err| ApiError::internal(err.to_string()))
        }
    }
}

async fn verify_vote(
    State(state): State<Arc<EngineState>>,
    Path(vote_index): Path<usize>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let check = tokio::task::spawn_blocking(move || state.ledger.verify(vote_index))
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;

    match check {
        Ok(check) => Ok(Json(VerifyResponse::from_check(check))),
        Err(LedgerError::IndexOutOfRange(_)) => {
            Ok(Json(VerifyResponse::failure("Vote index out of range")))
        }
        Err(err) => Err(ApiError::internal(err.to_string())),
    }
}
