//! HTTP routes and the axum router.

use crate::clock;
use crate::context::ServerContext;
use crate::error::{ServerError, ServerResult};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use packsync_protocol::{
    allowed_extension, safe_filename, ChallengeRequest, ChallengeResponse, ExchangeRequest,
    ExchangeResponse, PingResponse, RemoteManifest, CHALLENGE_PATH, EXCHANGE_PATH, MANIFEST_PATH,
    PING_PATH,
};
use std::fs;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds the router serving the manifest, pack bytes, ping, and the
/// key-exchange endpoints.
pub fn build_router(ctx: Arc<ServerContext>) -> Router {
    Router::new()
        .route(PING_PATH, get(ping))
        .route(MANIFEST_PATH, get(manifest))
        .route("/packs/:filename", get(download_pack))
        .route(CHALLENGE_PATH, post(create_challenge))
        .route(EXCHANGE_PATH, post(exchange_key))
        .with_state(ctx)
}

/// Binds the configured address and serves requests until shutdown.
pub async fn serve(ctx: Arc<ServerContext>) -> ServerResult<()> {
    let addr = ctx.config().bind_addr;
    let app = build_router(ctx);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Pack server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ping(State(ctx): State<Arc<ServerContext>>) -> Json<PingResponse> {
    Json(PingResponse::ok(
        ctx.config().server_version.clone(),
        clock::now_ms(),
    ))
}

async fn manifest(
    State(ctx): State<Arc<ServerContext>>,
) -> Result<Json<RemoteManifest>, ServerError> {
    ctx.build_manifest().map(Json)
}

async fn download_pack(
    State(ctx): State<Arc<ServerContext>>,
    Path(filename): Path<String>,
) -> Result<Vec<u8>, ServerError> {
    if !safe_filename(&filename) {
        return Err(ServerError::invalid_request(format!(
            "unsafe filename: {}",
            filename
        )));
    }
    if !allowed_extension(&filename) {
        return Err(ServerError::forbidden(format!(
            "extension not allowed: {}",
            filename
        )));
    }

    let source = ctx.config().pack_dir.join(&filename);
    if !source.is_file() {
        return Err(ServerError::not_found(format!("no such pack: {}", filename)));
    }

    let bytes = match ctx.encryption() {
        Some(encryption) => encryption
            .cache
            .get_encrypted(&filename, &source)?
            .ciphertext
            .clone(),
        None => fs::read(&source)?,
    };
    debug!("Serving pack {} ({} bytes)", filename, bytes.len());
    Ok(bytes)
}

async fn create_challenge(
    State(ctx): State<Arc<ServerContext>>,
    Json(request): Json<ChallengeRequest>,
) -> Result<Json<ChallengeResponse>, ServerError> {
    let encryption = ctx
        .encryption()
        .ok_or_else(|| ServerError::not_found("key exchange is disabled"))?;
    let (challenge, expires_at) = encryption.challenges.create_challenge(&request.client_id);
    Ok(Json(ChallengeResponse::new(challenge, expires_at)))
}

async fn exchange_key(
    State(ctx): State<Arc<ServerContext>>,
    Json(request): Json<ExchangeRequest>,
) -> Result<Json<ExchangeResponse>, ServerError> {
    let encryption = ctx
        .encryption()
        .ok_or_else(|| ServerError::not_found("key exchange is disabled"))?;

    if !encryption
        .challenges
        .verify_and_consume(&request.challenge, &request.filename, &request.hmac)
    {
        return Err(ServerError::not_authorized("invalid or expired challenge"));
    }

    let key = encryption.keys.get_or_create(&request.filename);
    Ok(Json(ExchangeResponse::new(key)))
}
