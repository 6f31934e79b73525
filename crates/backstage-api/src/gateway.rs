use axum::{
    Json,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use backstage_gateway::connection;

use crate::error::AppResult;
use crate::middleware::decode_token;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct GatewayQuery {
    pub token: Option<String>,
}

/// GET /gateway. A `token` query parameter authenticates at upgrade time
/// (rejected with 401 if invalid); without one the client must send an
/// Identify command first.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let preauth = match query.token.as_deref() {
        Some(token) => Some(decode_token(token, &state.jwt_secret)?),
        None => None,
    };
    let ctx = state.gateway_context();
    Ok(ws.on_upgrade(move |socket| connection::handle_connection(socket, ctx, preauth)))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "gateway_sessions": state.dispatcher.session_count().await,
    }))
}
