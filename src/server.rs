//! Web front-end: one page, a live analysis route and a saved-response replay route.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::analysis::{AnalysisError, AnalysisResult, Diagnostic};
use crate::config::Config;
use crate::extract::SafetyTipRules;
use crate::render::{self, AnnotatedImage, OutputFormat, RenderError, Renderer};
use crate::report::{AnalysisReport, AnnotatedImageView, ReplayReport};
use crate::vision::{VisionClient, VisionCredentials, VisionError};

const INDEX_HTML: &str = include_str!("index.html");

pub struct AppState {
    pub config: Config,
    pub renderer: Renderer,
    pub safety_tips: SafetyTipRules,
    pub vision: VisionClient,
}

impl AppState {
    pub fn new(config: Config, renderer: Renderer, safety_tips: SafetyTipRules) -> Self {
        Self { config, renderer, safety_tips, vision: VisionClient::new() }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("invalid multipart upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Vision(#[from] VisionError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Analysis(_) => StatusCode::BAD_REQUEST,
            Self::Multipart(err) => err.status(),
            Self::Render(RenderError::Decode(_)) => StatusCode::BAD_REQUEST,
            Self::Render(RenderError::Encode { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Vision(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        } else {
            warn!(%status, error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/analyze", post(analyze))
        .route("/replay", post(replay))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[derive(Default)]
struct Upload {
    image: Option<Vec<u8>>,
    analysis: Option<Vec<u8>>,
    endpoint: Option<String>,
    key: Option<String>,
    format: Option<String>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut upload = Upload::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" => upload.image = Some(field.bytes().await?.to_vec()),
                "analysis" => upload.analysis = Some(field.bytes().await?.to_vec()),
                "endpoint" => upload.endpoint = non_blank(field.text().await?),
                "key" => upload.key = non_blank(field.text().await?),
                "format" => upload.format = non_blank(field.text().await?),
                other => debug!(field = other, "ignoring unknown multipart field"),
            }
        }
        Ok(upload)
    }

    fn image(&self) -> Result<&[u8], AppError> {
        let image = self
            .image
            .as_deref()
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| AppError::BadRequest("missing `image` upload".to_string()))?;
        if image::guess_format(image).is_err() {
            return Err(AppError::BadRequest(
                "`image` is not a recognised raster format".to_string(),
            ));
        }
        Ok(image)
    }

    fn credentials(&self) -> Result<Option<VisionCredentials>, AppError> {
        match (&self.endpoint, &self.key) {
            (Some(endpoint), Some(key)) => {
                Ok(Some(VisionCredentials::new(endpoint.as_str(), key.as_str())))
            }
            (None, None) => Ok(None),
            _ => Err(AppError::BadRequest(
                "provide both `endpoint` and `key`, or neither".to_string(),
            )),
        }
    }

    fn output_format(&self, image: &[u8]) -> Result<OutputFormat, AppError> {
        match &self.format {
            Some(name) => OutputFormat::from_name(name)
                .ok_or_else(|| AppError::BadRequest(format!("unsupported output format `{name}`"))),
            None => Ok(OutputFormat::detect(image).unwrap_or(OutputFormat::Png)),
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn annotated_view(
    image: AnnotatedImage,
    format: OutputFormat,
) -> Result<AnnotatedImageView, AppError> {
    let bytes = image.encode(format)?;
    Ok(AnnotatedImageView::new(
        format,
        image.width(),
        image.height(),
        &bytes,
        image.overlays().to_vec(),
    ))
}

fn log_skipped(skipped: &[Diagnostic]) {
    for diagnostic in skipped {
        warn!(%diagnostic, "skipped malformed annotation");
    }
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<AnalysisReport>, AppError> {
    let started = Instant::now();
    let upload = Upload::read(multipart).await?;

    let credentials = upload
        .credentials()?
        .or_else(|| state.config.vision.clone())
        .ok_or_else(|| {
            AppError::BadRequest(
                "no vision credentials: provide `endpoint` and `key`, \
                 or set AZURE_VISION_ENDPOINT and AZURE_VISION_KEY"
                    .to_string(),
            )
        })?;
    let image = upload.image()?;
    let format = upload.output_format(image)?;
    // Reject undecodable uploads before paying for a vision call.
    let pixels = render::decode(image)?;

    let document = state.vision.analyze(&credentials, image.to_vec()).await?;
    let parsed = AnalysisResult::from_value(document)?;
    let rendered = state.renderer.render_pixels(pixels, &parsed.result);

    let mut skipped = parsed.diagnostics;
    skipped.extend(rendered.skipped);
    log_skipped(&skipped);

    let view = annotated_view(rendered.image, format)?;
    let elapsed = started.elapsed().as_millis();
    info!(
        objects = parsed.result.objects.len(),
        people = parsed.result.people.len(),
        skipped = skipped.len(),
        elapsed_ms = elapsed as u64,
        "analysis complete"
    );
    Ok(Json(AnalysisReport::new(&parsed.result, view, &skipped, elapsed)))
}

async fn replay(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ReplayReport>, AppError> {
    let started = Instant::now();
    let upload = Upload::read(multipart).await?;

    let analysis = upload
        .analysis
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("missing `analysis` upload".to_string()))?;
    let analysis = std::str::from_utf8(analysis)
        .map_err(|_| AppError::BadRequest("`analysis` must be UTF-8 JSON".to_string()))?;
    let parsed = AnalysisResult::from_json(analysis)?;
    let image = upload.image()?;
    let format = upload.output_format(image)?;

    // Safety view highlights detected objects only, with their confidences.
    let highlighted = AnalysisResult { people: Vec::new(), ..parsed.result.clone() };
    let rendered = state.renderer.clone().with_confidence(true).render(image, &highlighted)?;

    let mut skipped = parsed.diagnostics;
    skipped.extend(rendered.skipped);
    log_skipped(&skipped);

    let view = annotated_view(rendered.image, format)?;
    let report = ReplayReport::new(
        &parsed.result,
        &state.safety_tips,
        view,
        &skipped,
        started.elapsed().as_millis(),
    );
    info!(tips = report.safety_tips.len(), skipped = skipped.len(), "replay complete");
    Ok(Json(report))
}
