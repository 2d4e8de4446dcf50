use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::info;

mod classifier;
mod error;
mod model;
mod preprocess;
mod utils;

use classifier::{Classifier, Prediction};
use error::ServiceError;
use model::{Infer, TomatoModel};
use preprocess::Normalization;
use utils::{ensure_model_exists, get_env};

const MODEL_PATH: &str = "./model/tomato_disease.pb";

struct AppState {
    model: Arc<dyn Infer>,
    classifier: Classifier,
    normalization: Normalization,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    ensure_model_exists(MODEL_PATH).await;
    let (body_limit_bytes, port) = get_env();

    let model = TomatoModel::load(MODEL_PATH).expect("Failed to load model");
    let classifier = Classifier::tomato();
    classifier.warn_missing_advisories();

    let state = Arc::new(AppState {
        model: Arc::new(model),
        classifier,
        normalization: Normalization::default(),
    });

    let app = app(state, body_limit_bytes);

    info!("Listening on http://0.0.0.0:{}", port);
    axum::Server::bind(&format!("0.0.0.0:{}", port).parse().unwrap())
        .serve(app.into_make_service())
        .await
        .unwrap();
}

fn app(state: Arc<AppState>, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/api/detect", post(detect_handler))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .with_state(state)
        .route("/", get(home))
        .route("/health", get(health_check))
        // browser frontends call this API cross-origin
        .layer(CorsLayer::permissive())
}

async fn home() -> &'static str {
    "🍅 Tomato Disease Classifier API is running."
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "OK" }))
}

async fn detect_handler(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Prediction>, ServiceError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or("").to_string();
            let bytes = field.bytes().await?;
            upload = Some((file_name, bytes));
            break;
        }
    }

    let (file_name, bytes) = upload.ok_or(ServiceError::MissingFile)?;
    if file_name.is_empty() || bytes.is_empty() {
        return Err(ServiceError::EmptyFile);
    }

    let tensor = preprocess::prepare(&bytes, state.normalization)?;
    let scores = state.model.predict(&tensor)?;
    let prediction = state.classifier.classify(&scores)?;
    Ok(Json(prediction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use crate::preprocess::ImageTensor;
    use std::io::Cursor;
    use tower::ServiceExt;

    struct StubModel {
        scores: Vec<f32>,
    }

    impl Infer for StubModel {
        fn predict(&self, _image: &ImageTensor) -> Result<Vec<f32>, ServiceError> {
            Ok(self.scores.clone())
        }
    }

    fn test_app(scores: Vec<f32>) -> Router {
        let state = Arc::new(AppState {
            model: Arc::new(StubModel { scores }),
            classifier: Classifier::tomato(),
            normalization: Normalization::default(),
        });
        app(state, 5 * 1024 * 1024)
    }

    const BOUNDARY: &str = "test-boundary";

    fn multipart_body(field_name: &str, file_name: &str, file: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field_name}\"; \
                 filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn black_png() -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(256, 256);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    async fn post_detect(app: Router, body: Vec<u8>) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::post("/api/detect")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn detect_returns_label_confidence_and_advisories() {
        let mut scores = vec![0.01_f32; 10];
        scores[0] = 0.9;
        let app = test_app(scores);

        let body = multipart_body("file", "leaf.png", &black_png());
        let (status, json) = post_detect(app, body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["prediction"], "Tomato_Bacterial_spot");
        assert!((json["confidence"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert_eq!(json["prevention_measures"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected_and_service_survives() {
        let app = test_app(vec![0.1; 10]);

        let body = multipart_body("file", "leaf.png", b"definitely not an image");
        let (status, json) = post_detect(app.clone(), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!json["error"].as_str().unwrap().is_empty());

        // the same router keeps serving valid requests afterwards
        let body = multipart_body("file", "leaf.png", &black_png());
        let (status, _) = post_detect(app, body).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_file_field_is_a_client_error() {
        let app = test_app(vec![0.1; 10]);
        let body = multipart_body("something_else", "leaf.png", &black_png());
        let (status, json) = post_detect(app, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No file part");
    }

    #[tokio::test]
    async fn empty_file_name_is_a_client_error() {
        let app = test_app(vec![0.1; 10]);
        let body = multipart_body("file", "", &black_png());
        let (status, json) = post_detect(app, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "No selected file");
    }

    #[tokio::test]
    async fn score_vector_drift_is_a_server_error() {
        let app = test_app(vec![0.5; 9]);
        let body = multipart_body("file", "leaf.png", &black_png());
        let (status, json) = post_detect(app, body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "model returned 9 scores for 10 known labels");
    }

    #[tokio::test]
    async fn cross_origin_requests_are_allowed() {
        let app = test_app(vec![0.1; 10]);
        let response = app
            .oneshot(
                Request::get("/health")
                    .header(header::ORIGIN, "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let app = test_app(vec![0.1; 10]);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "OK");
    }
}
