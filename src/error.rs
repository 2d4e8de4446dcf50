use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Everything that can go wrong while serving one detection request.
///
/// Client-input problems (bad upload, undecodable image) map to 400 and
/// are the caller's to fix. A score vector whose length disagrees with
/// the label table means the deployed model and the label list have
/// drifted apart; that is a 500 and gets logged loudly, never papered
/// over by truncating or padding.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No file part")]
    MissingFile,
    #[error("No selected file")]
    EmptyFile,
    #[error("invalid multipart payload: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),
    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("model returned {got} scores for {expected} known labels")]
    LabelMismatch { expected: usize, got: usize },
    #[error("inference failed: {0}")]
    Inference(String),
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::EmptyFile | Self::Multipart(_) | Self::Decode(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::LabelMismatch { .. } | Self::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
