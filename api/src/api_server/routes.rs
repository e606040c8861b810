use axum::{extract::State, routing::post, Json, Router};
use serde_json::Value;

use crate::{api_server::handlers, NeonApiState};

async fn jsonrpc(State(state): State<NeonApiState>, Json(request): Json<handlers::JsonRpcRequest>) -> Json<Value> {
    Json(handlers::dispatch(&state, request).await)
}

pub fn register() -> Router<NeonApiState> {
    Router::new().route("/", post(jsonrpc))
}
