//! Fill session API endpoints
//!
//! - Create a session for a template URL and a record
//! - Render pages with their overlay controls
//! - Edit field values and choice selections
//! - Download, print or preview the filled document

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::extract::{ChoiceGroup, FieldDescriptor};
use crate::overlay::{PageFrame, PageOverlay};
use crate::session::{
    parse_id, ChoiceUpdate, CreateSessionRequest, FieldUpdate, OutputKind, SessionSummary,
    SynthesisOutput,
};
use crate::state::AppState;

/// Query parameters for session creation
#[derive(Debug, Deserialize)]
pub struct CreateQuery {
    /// Prepare before responding instead of in the background
    #[serde(default)]
    pub wait: bool,
}

/// Query parameters for page rendering
#[derive(Debug, Deserialize)]
pub struct ZoomQuery {
    /// Zoom factor (default: 1.0), clamped to the supported range
    #[serde(default = "default_zoom")]
    pub zoom: f32,
}

fn default_zoom() -> f32 {
    1.0
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/:id", get(get_session).delete(delete_session))
        .route("/:id/pages/:page", get(render_page))
        .route("/:id/pages/:page/overlay", get(page_overlay))
        .route("/:id/fields/:field_id", put(update_field))
        .route("/:id/choices/:group", put(select_option))
        .route("/:id/download", post(download))
        .route("/:id/print", post(print))
        .route("/:id/preview", post(preview))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/sessions
///
/// Returns 202 with a `loading` session, or 201 with a prepared one when
/// `?wait=true`.
async fn create_session(
    State(state): State<AppState>,
    Query(query): Query<CreateQuery>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionSummary>)> {
    if request.template_url.trim().is_empty() {
        return Err(AppError::BadRequest("templateUrl is required".to_string()));
    }

    if query.wait {
        let summary = state.engine().open_session(&request).await?;
        Ok((StatusCode::CREATED, Json(summary)))
    } else {
        let summary = state.engine().start_session(&request).await?;
        Ok((StatusCode::ACCEPTED, Json(summary)))
    }
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSummary>> {
    let id = parse_id(&id)?;
    Ok(Json(state.engine().summary(id).await?))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id)?;
    state.engine().delete_session(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn render_page(
    State(state): State<AppState>,
    Path((id, page)): Path<(String, usize)>,
    Query(query): Query<ZoomQuery>,
) -> Result<Json<PageFrame>> {
    let id = parse_id(&id)?;
    Ok(Json(state.engine().render_page(id, page, query.zoom).await?))
}

async fn page_overlay(
    State(state): State<AppState>,
    Path((id, page)): Path<(String, usize)>,
    Query(query): Query<ZoomQuery>,
) -> Result<Json<PageOverlay>> {
    let id = parse_id(&id)?;
    Ok(Json(state.engine().overlay(id, page, query.zoom).await?))
}

async fn update_field(
    State(state): State<AppState>,
    Path((id, field_id)): Path<(String, String)>,
    Json(update): Json<FieldUpdate>,
) -> Result<Json<FieldDescriptor>> {
    let id = parse_id(&id)?;
    let field = state
        .engine()
        .update_field(id, &field_id, update.value)
        .await?;
    Ok(Json(field))
}

async fn select_option(
    State(state): State<AppState>,
    Path((id, group)): Path<(String, String)>,
    Json(update): Json<ChoiceUpdate>,
) -> Result<Json<ChoiceGroup>> {
    let id = parse_id(&id)?;
    let group = state
        .engine()
        .select_option(id, &group, update.option.as_deref())
        .await?;
    Ok(Json(group))
}

async fn download(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    synthesize(state, &id, OutputKind::Download).await
}

async fn print(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    synthesize(state, &id, OutputKind::Print).await
}

async fn preview(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    synthesize(state, &id, OutputKind::Preview).await
}

async fn synthesize(state: AppState, id: &str, kind: OutputKind) -> Result<Response> {
    let id = parse_id(id)?;
    let output = state.engine().synthesize(id, kind).await?;
    Ok(pdf_response(output))
}

fn pdf_response(output: SynthesisOutput) -> Response {
    let disposition = if output.kind.is_inline() {
        format!("inline; filename=\"{}\"", output.filename)
    } else {
        format!("attachment; filename=\"{}\"", output.filename)
    };

    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        output.bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::routes::app;
    use crate::template::StaticTransport;
    use crate::test_support::PdfBuilder;

    use super::*;

    const TOKENS_URL: &str = "https://forms.test/tokens.pdf";

    fn state() -> AppState {
        let transport = StaticTransport::new();
        transport.insert(
            TOKENS_URL,
            PdfBuilder::new()
                .page(612.0, 792.0)
                .text(100.0, 100.0, 12.0, "{firstName}")
                .text(300.0, 100.0, 12.0, "{lastName}")
                .build(),
        );
        AppState::with_transport(Config::default(), Arc::new(transport)).unwrap()
    }

    fn create_body(url: &str) -> Body {
        Body::from(
            json!({
                "templateUrl": url,
                "documentKind": "intake",
                "record": { "subject": { "firstName": "Ada", "lastName": "Lovelace" } }
            })
            .to_string(),
        )
    }

    fn json_request(method: &str, uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap()
    }

    async fn read_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn open(state: &AppState) -> String {
        let response = app(state.clone())
            .oneshot(json_request(
                "POST",
                "/api/v1/sessions?wait=true",
                create_body(TOKENS_URL),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = read_json(response).await;
        assert_eq!(body["state"], "editable");
        assert_eq!(body["mode"], "placeholder");
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["sessions"], 0);
    }

    #[tokio::test]
    async fn test_fill_and_download() {
        let state = state();
        let id = open(&state).await;

        let response = app(state.clone())
            .oneshot(
                Request::get(format!("/api/v1/sessions/{}/pages/0/overlay?zoom=2", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let overlay = read_json(response).await;
        assert_eq!(overlay["zoom"], 2.0);
        assert_eq!(overlay["fields"].as_array().unwrap().len(), 2);

        let response = app(state.clone())
            .oneshot(json_request(
                "PUT",
                &format!("/api/v1/sessions/{}/fields/field_0", id),
                Body::from(json!({ "value": "Augusta" }).to_string()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["currentValue"], "Augusta");

        let response = app(state.clone())
            .oneshot(
                Request::post(format!("/api/v1/sessions/{}/download", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/pdf"
        );
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"Ada_Lovelace_intake_"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_print_is_inline() {
        let state = state();
        let id = open(&state).await;

        let response = app(state)
            .oneshot(
                Request::post(format!("/api/v1/sessions/{}/print", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("inline"));
    }

    #[tokio::test]
    async fn test_background_create_is_accepted() {
        let response = app(state())
            .oneshot(json_request(
                "POST",
                "/api/v1/sessions",
                create_body(TOKENS_URL),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(read_json(response).await["state"], "loading");
    }

    #[tokio::test]
    async fn test_failed_load_is_bad_gateway() {
        let response = app(state())
            .oneshot(json_request(
                "POST",
                "/api/v1/sessions?wait=true",
                create_body("https://forms.test/missing.pdf"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(read_json(response).await["error"], "load_error");
    }

    #[tokio::test]
    async fn test_unknown_session_and_page() {
        let state = state();

        let response = app(state.clone())
            .oneshot(
                Request::get("/api/v1/sessions/not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let id = open(&state).await;
        let response = app(state.clone())
            .oneshot(
                Request::get(format!("/api/v1/sessions/{}/pages/9/overlay", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app(state.clone())
            .oneshot(
                Request::delete(format!("/api/v1/sessions/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_blank_template_url_rejected() {
        let response = app(state())
            .oneshot(json_request(
                "POST",
                "/api/v1/sessions",
                create_body("  "),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
