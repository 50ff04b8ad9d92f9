use std::convert::Infallible;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::{Filter, Reply};

use crate::context::GatewayContext;
use crate::rpc;

/// Builds the full route tree of the gateway.
///
/// `GET /health` answers the liveness probe, `POST /mcp` (with or without
/// a trailing slash) carries the JSON-RPC envelope, CORS is permissive,
/// and everything else rejects into warp's 404.
pub fn routes(ctx: Arc<GatewayContext>) -> BoxedFilter<(impl Reply + Send,)> {
    let ctx_filter = warp::any().map(move || Arc::clone(&ctx)).boxed();

    let health = warp::get()
        .and(warp::path("health"))
        .and(warp::path::end())
        .and(ctx_filter.clone())
        .and_then(handle_health)
        .boxed();

    // matches exactly `/mcp` and `/mcp/`, nothing deeper.
    let mcp = warp::post()
        .and(warp::path("mcp"))
        .and(warp::path::tail())
        .and_then(|tail: warp::path::Tail| async move {
            match tail.as_str() {
                "" | "/" => Ok(()),
                _ => Err(warp::reject::not_found()),
            }
        })
        .untuple_one()
        .and(ctx_filter)
        .and(warp::body::json())
        .and_then(handle_mcp)
        .boxed();

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "OPTIONS"]);

    health.or(mcp).with(cors).boxed()
}

/// Handles the liveness probe.
pub async fn handle_health(
    ctx: Arc<GatewayContext>,
) -> Result<impl warp::Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "server": rpc::SERVER_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "upstream_endpoint": ctx.config.graphql_endpoint,
        "timestamp": unix_now(),
    })))
}

/// Decodes one JSON-RPC envelope, dispatches it and encodes the response.
///
/// A malformed envelope yields a transport-level error object over HTTP
/// 200; the notification method yields an entirely empty 200 body.
pub async fn handle_mcp(
    ctx: Arc<GatewayContext>,
    body: Value,
) -> Result<warp::reply::Response, Infallible> {
    let id = body.get("id").cloned().unwrap_or(Value::Null);
    let request: rpc::RpcRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Got invalid payload: {:?}", e);
            let response = rpc::RpcResponse::error(
                id,
                rpc::INTERNAL_ERROR,
                format!("Invalid request: {e}"),
            );
            return Ok(warp::reply::json(&response).into_response());
        }
    };
    match rpc::handle_request(&ctx, request).await {
        Some(response) => Ok(warp::reply::json(&response).into_response()),
        // the notification: nothing goes back, not even an empty object.
        None => Ok(StatusCode::OK.into_response()),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
