use crate::detector::{BoundingBox, DetectionSession};
use crate::error::{Error, Result};
use axum::{
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
	Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// The detection session is not internally synchronized; one mutex
// serializes every inference the server runs.
#[derive(Clone)]
pub struct AppState {
	session: Arc<Mutex<DetectionSession>>,
	device_name: String,
}

impl AppState {
	pub fn new(session: DetectionSession, device_name: String) -> Self {
		Self {
			session: Arc::new(Mutex::new(session)),
			device_name,
		}
	}
}

#[derive(Serialize)]
pub struct HealthResponse {
	pub status: String,
	pub device: String,
	pub cached_model: Option<String>,
}

#[derive(Deserialize)]
pub struct DetectRequest {
	/// Base64-encoded image bytes (any format the image loader understands)
	pub image: String,
	pub prompt: String,
	#[serde(default)]
	pub model: Option<String>,
	#[serde(default)]
	pub box_threshold: Option<f32>,
}

#[derive(Serialize)]
pub struct DetectResponse {
	pub ok: bool,
	pub model: String,
	pub boxes: Vec<BoundingBox>,
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let (status, message) = match self {
			Error::ModelNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
			Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
			Error::ModelLoadFailed(_) | Error::DownloadFailed(_) | Error::InferenceFailed(_) => {
				(StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
			}
			_ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
		};

		let body = Json(serde_json::json!({
			"error": message,
		}));

		(status, body).into_response()
	}
}

async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
	let session = state.session.lock().await;

	Ok(Json(HealthResponse {
		status: "ok".to_string(),
		device: state.device_name.clone(),
		cached_model: session.cached_model().map(str::to_string),
	}))
}

async fn detect_handler(
	State(state): State<AppState>,
	Json(payload): Json<DetectRequest>,
) -> Result<Json<DetectResponse>> {
	if payload.prompt.trim().is_empty() {
		return Err(Error::InvalidInput("Prompt cannot be empty".to_string()));
	}

	let bytes = BASE64
		.decode(payload.image.as_bytes())
		.map_err(|e| Error::InvalidInput(format!("Image is not valid base64: {}", e)))?;
	let image = image::load_from_memory(&bytes)
		.map_err(|e| Error::InvalidInput(format!("Could not decode image: {}", e)))?;

	let model = payload
		.model
		.unwrap_or_else(|| crate::model::DEFAULT_MODEL.to_string());
	let threshold = payload.box_threshold.unwrap_or(0.3);

	let mut session = state.session.lock().await;
	let boxes = session.predict(&image, &model, &payload.prompt, threshold)?;

	Ok(Json(match boxes {
		Some(boxes) => DetectResponse {
			ok: true,
			model,
			boxes,
		},
		None => DetectResponse {
			ok: false,
			model,
			boxes: Vec::new(),
		},
	}))
}

async fn clear_cache_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
	let mut session = state.session.lock().await;
	session.clear_cache();

	Ok(Json(serde_json::json!({
		"status": "cleared",
	})))
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/api/health", get(health_handler))
		.route("/api/detect", post(detect_handler))
		.route("/api/clear-cache", post(clear_cache_handler))
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
		.with_state(state)
}

pub async fn serve(host: &str, port: u16, state: AppState) -> Result<()> {
	let app = create_router(state);
	let addr = format!("{}:{}", host, port);

	tracing::info!("Starting server on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.map_err(|e| Error::ConfigError(format!("Failed to bind to {}: {}", addr, e)))?;

	axum::serve(listener, app)
		.await
		.map_err(|e| Error::ConfigError(format!("Server error: {}", e)))?;

	Ok(())
}
