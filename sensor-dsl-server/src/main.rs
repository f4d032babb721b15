use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use sensor_dsl_core::{compile, to_canonical};

#[derive(Deserialize)]
pub struct ValidateRequest {
    pub expected_dsl_output: Option<String>,
    pub generated_dsl_output: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum ValidateResponse {
    Ok {
        is_valid: bool,
        full_output: FullOutput,
    },
    CompileFailed {
        error: String,
        dsl_output_file_with_errors: &'static str,
    },
    BadRequest {
        error: String,
    },
}

#[derive(Serialize)]
pub struct FullOutput {
    pub expected: serde_json::Value,
    pub generated: serde_json::Value,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("sensor_dsl_server=info,tower_http=debug")
        .init();

    dotenvy::dotenv().ok();

    let client_url =
        std::env::var("CLIENT_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
    let port = std::env::var("SERVER_PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()
        .unwrap_or(3000);

    let app = create_router(&client_url)?;

    let addr = format!("0.0.0.0:{}", port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(client_url: &str) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(client_url.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Ok(Router::new()
        .route("/api/health", get(health_check))
        .route("/api/sensor/validate", post(validate))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors)))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Compile both texts and compare their canonical projections.
async fn validate(
    Json(request): Json<ValidateRequest>,
) -> (StatusCode, Json<ValidateResponse>) {
    let (expected_source, generated_source) = match (
        request.expected_dsl_output,
        request.generated_dsl_output,
    ) {
        (Some(expected), Some(generated)) => (expected, generated),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ValidateResponse::BadRequest {
                    error: "expected_dsl_output and generated_dsl_output are required"
                        .to_string(),
                }),
            )
        }
    };

    let expected = match canonical_of(&expected_source) {
        Ok(value) => value,
        Err(error) => return compile_failed(error, "expected"),
    };
    let generated = match canonical_of(&generated_source) {
        Ok(value) => value,
        Err(error) => return compile_failed(error, "generated"),
    };

    let is_valid = expected == generated;
    info!(is_valid, "validated dsl outputs");
    (
        StatusCode::OK,
        Json(ValidateResponse::Ok {
            is_valid,
            full_output: FullOutput {
                expected,
                generated,
            },
        }),
    )
}

fn canonical_of(source: &str) -> Result<serde_json::Value, String> {
    let product = compile(source).map_err(|err| err.to_string())?;
    to_canonical(&product).map_err(|err| err.to_string())
}

fn compile_failed(
    error: String,
    side: &'static str,
) -> (StatusCode, Json<ValidateResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ValidateResponse::CompileFailed {
            error,
            dsl_output_file_with_errors: side,
        }),
    )
}
