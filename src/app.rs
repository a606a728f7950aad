use std::net::SocketAddr;

use axum::{middleware, routing::get, Router};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::{
    auth,
    middleware::{attach_diagnostic, PanicResponse},
    state::AppState,
    users,
};

pub fn build_app(state: AppState) -> Router {
    let routes = Router::new().nest(
        "/v1",
        Router::new()
            .merge(auth::router())
            .merge(users::router())
            .route("/health", get(|| async { "ok" })),
    );
    with_layers(routes, state)
}

/// Wraps `routes` in the request-id, tracing, panic and diagnostics stack.
pub fn with_layers(routes: Router<AppState>, state: AppState) -> Router {
    let debug = state.config.run_mode.is_debug();

    routes
        .layer(middleware::map_response_with_state(
            state.clone(),
            attach_diagnostic,
        ))
        .with_state(state)
        .layer(CatchPanicLayer::custom(PanicResponse { debug }))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    let request_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-")
                        .to_string();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        %request_id,
                        status = tracing::field::Empty,
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
