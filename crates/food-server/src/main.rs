use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod context;
mod error;
mod nutrition;
mod predict;
mod request;

use context::ServiceContext;

const BIND_ADDR: &str = "0.0.0.0:5000";
const BODY_LIMIT: usize = 16 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	if std::env::var("RUST_LOG").is_err() {
		std::env::set_var("RUST_LOG", "info");
	}
	tracing_subscriber::fmt::init();

	let ctx = Arc::new(ServiceContext::load().context("service startup failed")?);
	tracing::info!(classes = ctx.labels.len(), "model and lookup tables loaded");

	let app = Router::new()
		.route("/predict", post(predict::predict))
		.route("/health", get(predict::health))
		.layer(DefaultBodyLimit::max(BODY_LIMIT))
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
		.layer(CatchPanicLayer::new())
		.with_state(ctx);

	let listener = TcpListener::bind(BIND_ADDR)
		.await
		.with_context(|| format!("binding {BIND_ADDR}"))?;
	tracing::info!("listening on http://{}", listener.local_addr()?);

	axum::serve(listener, app).await?;

	Ok(())
}
