#![allow(dead_code)]
#![deny(warnings)]
#![deny(clippy::all, clippy::pedantic)]
mod api_options;
mod api_server;

use api_server::handlers::NeonApiError;
use axum::Router;
pub use evm_proxy_lib::config;
pub use evm_proxy_lib::errors;
use tracing_appender::non_blocking::NonBlockingBuilder;

use std::sync::Arc;
use std::{env, net::SocketAddr, str::FromStr};

pub use config::Config;
use http::Request;
use hyper::Body;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tower_request_id::{RequestId, RequestIdLayer};
use tracing::info_span;

type NeonApiResult<T> = Result<T, NeonApiError>;
type NeonApiState = Arc<api_server::state::State>;

#[tokio::main(flavor = "multi_thread", worker_threads = 512)]
async fn main() -> NeonApiResult<()> {
    let options = api_options::parse();

    let (non_blocking, _guard) = NonBlockingBuilder::default().lossy(false).finish(std::io::stdout());

    tracing_subscriber::fmt().with_thread_ids(true).with_writer(non_blocking).init();

    let config = Config::from_environment()?;

    let state: NeonApiState = Arc::new(api_server::state::State::new(config));

    let app = Router::new()
        .merge(api_server::routes::register())
        .with_state(state)
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .extensions()
                    .get::<RequestId>()
                    .map_or_else(|| "unknown".into(), ToString::to_string);
                info_span!("request", id = %request_id)
            }),
        )
        .layer(RequestIdLayer);

    let listener_addr = options
        .value_of("host")
        .map(std::borrow::ToOwned::to_owned)
        .unwrap_or_else(|| env::var("NEON_API_LISTENER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned()));

    let addr = SocketAddr::from_str(listener_addr.as_str()).map_err(|e| NeonApiError(errors::ProxyError::InvalidParam {
        field: "host".to_owned(),
        reason: e.to_string(),
    }))?;
    tracing::info!("listening on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("signal received, starting graceful shutdown");
}
