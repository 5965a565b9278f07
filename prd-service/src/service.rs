use axum::{
    Router,
    extract::{
        DefaultBodyLimit, Path, Query, Request, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use prd_core::{
    CoreError, QuickScore, RawDocument, StructuredData, ValidationResult, parse, quick_score,
    validate_structure,
};
use serde_json::{Value, json};
use std::fmt::{self, Write as _};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    analysis::{DimensionAnalyzer, LlmDimensionAnalyzer, analyze_document},
    config::ServiceConfig,
    extraction::{ExtractionError, extract_document},
    llm::OpenRouterClient,
    models::{
        AnalysisReport, AnalyzeRequest, CreateProjectRequest, DimensionOutcome, ExportFormat,
        ExportQuery, ParseDocumentRequest, ParseDocumentResponse, ParseTextRequest, Project,
        QuickScoreRequest, UpdateProjectRequest, ValidateRequest,
    },
    storage::{AnalysisRepository, InMemoryStore, PostgresStore, ProjectRepository},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

const CORRELATION_HEADER: &str = "x-correlation-id";

fn error_with_status(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": message })))
}

fn bad_request_error(message: &str) -> ApiError {
    error_with_status(StatusCode::BAD_REQUEST, message)
}

fn not_found_error(message: &str, id: &Uuid) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn rejection_error(status: StatusCode, details: String) -> ApiError {
    warn!(status = %status, details = %details, "Rejected request");
    (
        status,
        Json(json!({
            "error": "Invalid request",
            "details": details
        })),
    )
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| rejection_error(rejection.status(), rejection.body_text()))
}

fn path_id(id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|rejection| rejection_error(rejection.status(), rejection.body_text()))
}

fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| rejection_error(rejection.status(), rejection.body_text()))
}

#[derive(Clone)]
pub struct AppState {
    pub projects: Arc<dyn ProjectRepository>,
    pub analyses: Arc<dyn AnalysisRepository>,
    pub analyzer: Arc<dyn DimensionAnalyzer>,
    pub ocr: OpenRouterClient,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    /// State backed by a single store for both repositories.
    pub fn with_store<S>(store: Arc<S>, analyzer: Arc<dyn DimensionAnalyzer>, config: ServiceConfig) -> Self
    where
        S: ProjectRepository + AnalysisRepository + 'static,
    {
        let ocr = OpenRouterClient::new(config.openrouter_api_key.clone(), config.ocr_model.clone());
        Self {
            projects: store.clone(),
            analyses: store,
            analyzer,
            ocr,
            config: Arc::new(config),
        }
    }
}

pub async fn create_app(config: ServiceConfig) -> Router {
    let app_state = create_app_state(config).await;
    build_router(app_state)
}

async fn create_app_state(config: ServiceConfig) -> AppState {
    let analyzer: Arc<dyn DimensionAnalyzer> = Arc::new(LlmDimensionAnalyzer::new(
        config.openrouter_api_key.clone(),
        config.analysis_model.clone(),
    ));

    match config.database_url.as_deref() {
        Some(database_url) => {
            info!("Using PostgreSQL storage");
            match PostgresStore::connect(database_url).await {
                Ok(store) => AppState::with_store(Arc::new(store), analyzer, config),
                Err(e) => {
                    error!(
                        "Failed to connect to PostgreSQL: {}. Falling back to in-memory storage.",
                        e
                    );
                    AppState::with_store(Arc::new(InMemoryStore::new()), analyzer, config)
                }
            }
        }
        None => {
            info!("Using in-memory storage (set DATABASE_URL to use PostgreSQL)");
            AppState::with_store(Arc::new(InMemoryStore::new()), analyzer, config)
        }
    }
}

pub fn build_router(app_state: AppState) -> Router {
    // Base64 inflates uploads by a third, plus room for the JSON envelope.
    let body_limit = app_state.config.max_upload_bytes / 3 * 4 + 64 * 1024;

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/documents/parse", post(parse_document))
        .route("/prd/parse", post(parse_text))
        .route("/prd/validate", post(validate))
        .route("/prd/quick-score", post(score_quickly))
        .route("/prd/analyze", post(analyze))
        .route("/analyses/{id}", get(get_analysis))
        .route("/analyses/{id}/export", get(export_analysis))
        .route("/projects", post(create_project).get(list_projects))
        .route(
            "/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/{id}/analyses", get(list_project_analyses))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state)
}

/// Tag every request with a correlation id and run it inside an `http_request` span.
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    let header_value = HeaderValue::from_str(&correlation_id).ok();

    if let Some(value) = header_value.clone() {
        request.headers_mut().insert(CORRELATION_HEADER, value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;

    if let Some(value) = header_value {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "PRD Analysis Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Parses product requirements documents, validates their structure and scores them",
        "endpoints": {
            "POST /documents/parse": "Extract text and structure from an uploaded PDF, DOCX or TXT file",
            "POST /prd/parse": "Extract structure from plain text",
            "POST /prd/validate": "Validate PRD structure",
            "POST /prd/quick-score": "Heuristic score without AI",
            "POST /prd/analyze": "Full analysis with AI dimension scoring",
            "GET /analyses/{id}": "Get a stored analysis",
            "GET /analyses/{id}/export": "Export an analysis as markdown or json",
            "POST /projects": "Create a project",
            "GET /projects": "List projects",
            "GET /projects/{id}": "Get a project",
            "PUT /projects/{id}": "Update a project",
            "DELETE /projects/{id}": "Delete a project",
            "GET /projects/{id}/analyses": "List analyses of a project",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

fn extraction_error(e: ExtractionError) -> ApiError {
    let status = match &e {
        ExtractionError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ExtractionError::Decode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ExtractionError::Empty(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ExtractionError::Ocr(_) => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(json!({
            "error": "Failed to extract document",
            "details": e.to_string()
        })),
    )
}

async fn parse_document(
    State(state): State<AppState>,
    payload: Result<Json<ParseDocumentRequest>, JsonRejection>,
) -> ApiResult<ParseDocumentResponse> {
    let request = json_body(payload)?;
    let bytes = STANDARD
        .decode(request.content_base64.trim())
        .map_err(|e| {
            warn!(filename = %request.filename, error = %e, "Invalid base64 upload");
            bad_request_error("contentBase64 is not valid base64")
        })?;

    if bytes.len() > state.config.max_upload_bytes {
        return Err(error_with_status(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Document exceeds the maximum upload size",
        ));
    }

    let document = RawDocument::new(request.filename, bytes)
        .map_err(|e| extraction_error(ExtractionError::from(e)))?;

    let parsed = extract_document(&document, &state.ocr)
        .await
        .map_err(extraction_error)?;
    let structured_data = parse(&parsed.text);

    info!(
        filename = %document.filename,
        sections = structured_data.sections.len(),
        "Document parsed"
    );

    Ok(Json(ParseDocumentResponse {
        parsed,
        structured_data,
    }))
}

async fn parse_text(payload: Result<Json<ParseTextRequest>, JsonRejection>) -> ApiResult<StructuredData> {
    let request = json_body(payload)?;
    Ok(Json(parse(&request.text)))
}

async fn validate(payload: Result<Json<ValidateRequest>, JsonRejection>) -> ApiResult<ValidationResult> {
    let request = json_body(payload)?;
    validate_structure(request.structured_data.as_ref(), request.content.as_deref())
        .map(Json)
        .map_err(core_error)
}

async fn score_quickly(payload: Result<Json<QuickScoreRequest>, JsonRejection>) -> ApiResult<QuickScore> {
    let request = json_body(payload)?;
    Ok(Json(quick_score(&request.structured_data)))
}

fn core_error(e: CoreError) -> ApiError {
    match e {
        CoreError::MissingInput => bad_request_error("structuredData or content is required"),
        other => internal_error("Analysis failed", &other.to_string()),
    }
}

async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<AnalysisReport> {
    let AnalyzeRequest {
        project_id,
        structured_data,
        content,
    } = json_body(payload)?;

    let data = match (structured_data, content.as_deref()) {
        (Some(data), _) => data,
        (None, Some(text)) => parse(text),
        (None, None) => return Err(core_error(CoreError::MissingInput)),
    };

    if let Some(project_id) = project_id {
        fetch_project(&state, project_id).await?;
    }

    info!(project_id = ?project_id, sections = data.sections.len(), "Starting PRD analysis");

    let report = analyze_document(
        state.analyzer.clone(),
        data,
        content.as_deref(),
        project_id,
        state.config.dimension_timeout,
    )
    .await
    .map_err(core_error)?;

    state.analyses.save(report.clone()).await.map_err(|e| {
        error!(analysis_id = %report.id, error = %e, "Failed to save analysis");
        internal_error("Failed to save analysis", &e.to_string())
    })?;

    info!(analysis_id = %report.id, overall_score = report.overall_score, "Analysis stored");
    Ok(Json(report))
}

async fn fetch_analysis(state: &AppState, id: Uuid) -> Result<AnalysisReport, ApiError> {
    match state.analyses.get(id).await {
        Ok(Some(report)) => Ok(report),
        Ok(None) => Err(not_found_error("Analysis not found", &id)),
        Err(e) => {
            error!(analysis_id = %id, error = %e, "Failed to get analysis");
            Err(internal_error("Failed to get analysis", &e.to_string()))
        }
    }
}

async fn get_analysis(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<AnalysisReport> {
    let id = path_id(id)?;
    fetch_analysis(&state, id).await.map(Json)
}

async fn export_analysis(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let id = path_id(id)?;
    let query = query_params(query)?;
    let report = fetch_analysis(&state, id).await?;

    info!(analysis_id = %id, format = ?query.format, "Exporting analysis");

    Ok(match query.format {
        ExportFormat::Json => Json(report).into_response(),
        ExportFormat::Markdown => (
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            render_markdown(&report).map_err(|e| {
                error!(analysis_id = %id, error = %e, "Failed to render markdown");
                internal_error("Failed to render markdown", &e.to_string())
            })?,
        )
            .into_response(),
    })
}

/// Render a report as a Markdown document.
pub fn render_markdown(report: &AnalysisReport) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_markdown(&mut out, report)?;
    Ok(out)
}

/// Make free text safe for a single Markdown table cell.
fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn write_markdown(out: &mut String, report: &AnalysisReport) -> fmt::Result {
    writeln!(out, "# PRD Analysis Report\n")?;
    writeln!(out, "- Analysis: `{}`", report.id)?;
    if let Some(project_id) = report.project_id {
        writeln!(out, "- Project: `{}`", project_id)?;
    }
    writeln!(out, "- Created: {}", report.created_at.to_rfc3339())?;
    writeln!(out, "- Overall score: **{}/100**\n", report.overall_score)?;

    writeln!(out, "## Dimensions\n")?;
    writeln!(out, "| Dimension | Score | Notes |")?;
    writeln!(out, "|---|---|---|")?;
    for (dimension, outcome) in &report.dimensions {
        let (score, notes) = match outcome {
            DimensionOutcome::Scored {
                score, feedback, ..
            } => (score.to_string(), table_cell(feedback)),
            DimensionOutcome::Failed { reason } => {
                ("n/a".to_string(), format!("failed: {}", table_cell(reason)))
            }
            DimensionOutcome::TimedOut => ("n/a".to_string(), "timed out".to_string()),
        };
        writeln!(out, "| {} | {} | {} |", dimension.label(), score, notes)?;
    }

    let quick = &report.quick_score;
    writeln!(out, "\n## Quick Score\n")?;
    writeln!(
        out,
        "{}/100 (sections {}, content {}, metrics {})",
        quick.overall, quick.breakdown.sections, quick.breakdown.content, quick.breakdown.metrics
    )?;

    let structure = &report.structure;
    writeln!(out, "\n## Structure\n")?;
    writeln!(out, "Structure score: {}/100", structure.overall_score)?;
    if !structure.missing_required.is_empty() {
        let names: Vec<&str> = structure.missing_required.iter().map(|s| s.title()).collect();
        writeln!(out, "\nMissing required sections: {}", names.join(", "))?;
    }
    if !structure.missing_optional.is_empty() {
        let names: Vec<&str> = structure.missing_optional.iter().map(|s| s.title()).collect();
        writeln!(out, "\nMissing optional sections: {}", names.join(", "))?;
    }

    let suggestions = report
        .dimensions
        .values()
        .filter_map(|outcome| match outcome {
            DimensionOutcome::Scored { suggestions, .. } => Some(suggestions),
            _ => None,
        })
        .flatten();

    writeln!(out, "\n## Recommendations\n")?;
    for recommendation in structure.recommendations.iter().chain(suggestions) {
        writeln!(out, "- {}", recommendation)?;
    }

    Ok(())
}

async fn fetch_project(state: &AppState, id: Uuid) -> Result<Project, ApiError> {
    match state.projects.get(id).await {
        Ok(Some(project)) => Ok(project),
        Ok(None) => Err(not_found_error("Project not found", &id)),
        Err(e) => {
            error!(project_id = %id, error = %e, "Failed to get project");
            Err(internal_error("Failed to get project", &e.to_string()))
        }
    }
}

async fn save_project(state: &AppState, project: Project) -> Result<Project, ApiError> {
    state.projects.save(project.clone()).await.map_err(|e| {
        error!(project_id = %project.id, error = %e, "Failed to save project");
        internal_error("Failed to save project", &e.to_string())
    })?;
    Ok(project)
}

async fn create_project(
    State(state): State<AppState>,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let request = json_body(payload)?;
    if request.name.trim().is_empty() {
        return Err(bad_request_error("Project name is required"));
    }

    let project = Project::new(request.name.trim().to_string(), request.description);
    let project = save_project(&state, project).await?;

    info!(project_id = %project.id, "Project created");
    Ok((StatusCode::CREATED, Json(project)))
}

async fn list_projects(State(state): State<AppState>) -> ApiResult<Vec<Project>> {
    state.projects.list().await.map(Json).map_err(|e| {
        error!(error = %e, "Failed to list projects");
        internal_error("Failed to list projects", &e.to_string())
    })
}

async fn get_project(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Project> {
    let id = path_id(id)?;
    fetch_project(&state, id).await.map(Json)
}

async fn update_project(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateProjectRequest>, JsonRejection>,
) -> ApiResult<Project> {
    let id = path_id(id)?;
    let request = json_body(payload)?;
    let mut project = fetch_project(&state, id).await?;

    if let Some(name) = request.name {
        if name.trim().is_empty() {
            return Err(bad_request_error("Project name cannot be empty"));
        }
        project.name = name.trim().to_string();
    }
    if let Some(description) = request.description {
        project.description = Some(description);
    }
    if let Some(status) = request.status {
        project.status = status;
    }
    project.updated_at = Utc::now();

    let project = save_project(&state, project).await?;
    info!(project_id = %id, status = ?project.status, "Project updated");
    Ok(Json(project))
}

async fn delete_project(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = path_id(id)?;
    match state.projects.delete(id).await {
        Ok(true) => {
            let removed = state.analyses.delete_for_project(id).await.map_err(|e| {
                error!(project_id = %id, error = %e, "Failed to delete project analyses");
                internal_error("Failed to delete project analyses", &e.to_string())
            })?;
            info!(project_id = %id, analyses_removed = removed, "Project deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err(not_found_error("Project not found", &id)),
        Err(e) => {
            error!(project_id = %id, error = %e, "Failed to delete project");
            Err(internal_error("Failed to delete project", &e.to_string()))
        }
    }
}

async fn list_project_analyses(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Vec<AnalysisReport>> {
    let id = path_id(id)?;
    fetch_project(&state, id).await?;

    state.analyses.list_for_project(id).await.map(Json).map_err(|e| {
        error!(project_id = %id, error = %e, "Failed to list analyses");
        internal_error("Failed to list analyses", &e.to_string())
    })
}
