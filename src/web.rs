//! HTTP endpoints next to the bot
//!
//! `GET /oauthcallback` completes the Google OAuth flow and sends the browser
//! back to the bot; `GET /api/get_counts` serves the public usage counters.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::handlers::commands::calendar::complete_oauth;
use crate::state::AppContext;
use crate::utils::errors::Result;

/// Query string Google appends to the redirect URI
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Public usage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardCounts {
    pub users: i64,
    pub messages: i64,
    pub events: i64,
}

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/oauthcallback", get(oauth_callback))
        .route("/api/get_counts", get(get_counts))
        .route("/health", get(health))
        .with_state(ctx)
}

/// Serve the router until the listener fails
pub async fn serve(ctx: AppContext) -> Result<()> {
    let addr = ctx.settings.web.bind_address.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Web server listening");
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

pub async fn oauth_callback(State(ctx): State<AppContext>, Query(params): Query<OAuthParams>) -> Redirect {
    match (&params.code, &params.state) {
        (Some(code), Some(state)) => {
            if let Err(e) = complete_oauth(&ctx, code, state).await {
                error!(error = %e, "OAuth completion failed");
            }
        }
        _ => warn!(error = ?params.error, "OAuth callback without code or state"),
    }
    Redirect::to(&ctx.settings.bot.bot_link)
}

pub async fn get_counts(State(ctx): State<AppContext>) -> Response {
    match dashboard_counts(&ctx).await {
        Ok(counts) => Json(counts).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to count records");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

/// Counts with the configured offsets, served from Redis while fresh
pub async fn dashboard_counts(ctx: &AppContext) -> Result<DashboardCounts> {
    if let Some(redis) = &ctx.redis {
        match redis.cached_counts::<DashboardCounts>().await {
            Ok(Some(counts)) => {
                debug!("Dashboard counts served from cache");
                return Ok(counts);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Dashboard cache read failed"),
        }
    }

    let counts = ctx.store.counts().await?;
    let offsets = &ctx.settings.dashboard;
    let counts = DashboardCounts {
        users: counts.users,
        messages: counts.messages + offsets.message_offset,
        events: counts.events + offsets.event_offset,
    };

    if let Some(redis) = &ctx.redis {
        if let Err(e) = redis.cache_counts(&counts).await {
            warn!(error = %e, "Dashboard cache write failed");
        }
    }
    Ok(counts)
}
