use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::db::models::{
    extract_tags_from_prompt, format_project_preview, generate_project_name, GenerationHistory,
    NewGenerationHistory, NewSchemaProject, ProjectUpdate, ProjectWithHistory, SchemaProject,
};
use crate::db::project_store::ProjectStore;
use crate::db::StoreError;
use crate::llm::models::{
    GenerationInput, GenerationMode, GenerationOutcome, GenerationResult, Progress,
    ValidationReport,
};
use crate::llm::prompts::{validate_input, EXAMPLE_PROMPTS};
use crate::llm::LlmError;
use crate::web::state::AppState;

// Error body

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: Vec<String>,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, error: impl Into<String>, details: Vec<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
            details,
        }),
    )
}

fn llm_error(err: LlmError) -> ApiError {
    match err {
        LlmError::Validation(details) => {
            api_error(StatusCode::BAD_REQUEST, "Invalid input", details)
        }
        LlmError::Configuration(message) => {
            error!("LLM configuration error: {}", message);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "LLM is not configured", vec![message])
        }
        err @ (LlmError::Upstream { .. } | LlmError::Network(_)) => {
            warn!("Generation failed: {}", err);
            api_error(StatusCode::BAD_GATEWAY, "Schema generation failed", vec![err.to_string()])
        }
    }
}

fn store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(id) => api_error(
            StatusCode::NOT_FOUND,
            "Project not found",
            vec![format!("No project with id {}", id)],
        ),
        err => {
            error!("Project store error: {}", err);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Database error", vec![err.to_string()])
        }
    }
}

// DuckDB calls block, so they run off the async workers
async fn with_store<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&ProjectStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = state.project_store.clone();
    tokio::task::spawn_blocking(move || work(&store))
        .await
        .map_err(|e| StoreError::Task(e.to_string()))
        .and_then(|result| result)
        .map_err(store_error)
}

// Generation types

#[derive(Debug, Deserialize)]
pub struct SaveOptions {
    pub owner_id: String,
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    pub description: Option<String>,
    pub uploaded_sql: Option<String>,
    pub file_name: Option<String>,
    #[serde(default)]
    pub mock: bool,
    pub save: Option<SaveOptions>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl GenerateRequest {
    /// Blank fields count as absent.
    pub fn to_input(&self) -> GenerationInput {
        let description = present(self.description.clone());
        let input = match present(self.uploaded_sql.clone()) {
            Some(sql) => GenerationInput::from_sql(sql, present(self.file_name.clone())),
            None => GenerationInput::default(),
        };

        match description {
            Some(description) => input.with_description(description),
            None => input,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub result: GenerationResult,
    pub mode: GenerationMode,
    pub model: String,
    pub duration_ms: u64,
    pub tokens_used: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExamplePrompt {
    pub name: &'static str,
    pub prompt: &'static str,
}

// Project types

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    pub owner_id: String,
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectListItem {
    #[serde(flatten)]
    pub project: SchemaProject,
    pub preview: String,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    pub is_favorite: bool,
}

// System status

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub backend: String,
    pub model: String,
    pub project_count: usize,
}

// API Implementations

pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let input = payload.to_input();
    info!(
        "Generating schema (description: {}, upload: {}, mock: {})",
        input.description_text().is_some(),
        input.sql_text().is_some(),
        payload.mock
    );

    let report_progress =
        |p: Progress| debug!("Generation progress {}% [{}] {}", p.percent, p.step, p.message);

    let outcome = state
        .llm_manager
        .generate_schema(&input, payload.mock, Some(&report_progress))
        .await
        .map_err(llm_error)?;

    let project_id = match payload.save {
        Some(save) => Some(save_outcome(&state, &input, &outcome, save).await?),
        None => None,
    };

    Ok(Json(GenerateResponse {
        result: outcome.result,
        mode: outcome.mode,
        model: outcome.model,
        duration_ms: outcome.duration_ms,
        tokens_used: outcome.tokens_used,
        project_id,
    }))
}

async fn save_outcome(
    state: &AppState,
    input: &GenerationInput,
    outcome: &GenerationOutcome,
    save: SaveOptions,
) -> Result<String, ApiError> {
    let description = input.description_text();
    let file_name = Some(input.context.file_name.as_str()).filter(|f| !f.is_empty());

    let project = NewSchemaProject {
        owner_id: save.owner_id,
        name: present(save.name).unwrap_or_else(|| generate_project_name(description, file_name)),
        description: description.map(str::to_string),
        input_type: outcome.mode.into(),
        original_prompt: description.map(str::to_string),
        uploaded_sql: input.sql_text().map(str::to_string),
        generated_sql: outcome.result.sql.clone(),
        ai_explanation: Some(outcome.result.explanation.clone()),
        ai_suggestions: outcome.result.suggestions.clone(),
        tags: save
            .tags
            .unwrap_or_else(|| extract_tags_from_prompt(description.unwrap_or_default())),
        is_favorite: false,
    };

    let prompt_used = outcome.prompt_used.clone();
    let ai_model = outcome.model.clone();
    let generation_time_ms = outcome.duration_ms as i64;
    let tokens_used = outcome.tokens_used.map(i64::from);

    let saved = with_store(state, move |store| {
        let saved = store.create_project(project)?;
        store.add_history(NewGenerationHistory {
            project_id: saved.id.clone(),
            prompt_used,
            sql_generated: saved.generated_sql.clone(),
            ai_model,
            generation_time_ms,
            tokens_used,
        })?;
        Ok(saved)
    })
    .await?;

    info!("Saved generated schema as project {}", saved.id);
    Ok(saved.id)
}

pub async fn validate(Json(payload): Json<GenerateRequest>) -> Json<ValidationReport> {
    Json(validate_input(&payload.to_input()))
}

pub async fn list_examples() -> Json<Vec<ExamplePrompt>> {
    Json(
        EXAMPLE_PROMPTS
            .iter()
            .map(|&(name, prompt)| ExamplePrompt { name, prompt })
            .collect(),
    )
}

pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<Vec<ProjectListItem>>, ApiError> {
    let projects = with_store(&state, move |store| match query.q.as_deref() {
        Some(term) => store.search_projects(&query.owner_id, term),
        None => store.list_projects(&query.owner_id),
    })
    .await?;

    Ok(Json(
        projects
            .into_iter()
            .map(|project| ProjectListItem {
                preview: format_project_preview(&project),
                project,
            })
            .collect(),
    ))
}

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewSchemaProject>,
) -> Result<(StatusCode, Json<SchemaProject>), ApiError> {
    let project = with_store(&state, move |store| store.create_project(payload)).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProjectWithHistory>, ApiError> {
    let lookup = id.clone();
    with_store(&state, move |store| store.get_project_with_history(&lookup))
        .await?
        .map(Json)
        .ok_or_else(|| store_error(StoreError::NotFound(id)))
}

pub async fn update_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<ProjectUpdate>,
) -> Result<Json<SchemaProject>, ApiError> {
    let project = with_store(&state, move |store| store.update_project(&id, payload)).await?;
    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    with_store(&state, move |store| store.delete_project(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_favorite(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<FavoriteRequest>,
) -> Result<Json<SchemaProject>, ApiError> {
    let project = with_store(&state, move |store| {
        store.set_favorite(&id, payload.is_favorite)?;
        store
            .get_project(&id)?
            .ok_or(StoreError::NotFound(id))
    })
    .await?;
    Ok(Json(project))
}

pub async fn project_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<GenerationHistory>>, ApiError> {
    let history = with_store(&state, move |store| {
        if store.get_project(&id)?.is_none() {
            return Err(StoreError::NotFound(id));
        }
        store.list_history(&id)
    })
    .await?;
    Ok(Json(history))
}

pub async fn system_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SystemStatus>, ApiError> {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds();
    let project_count = with_store(&state, |store| store.count_projects()).await?;

    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        backend: state.llm_manager.backend().to_string(),
        model: state.llm_manager.generator(false).model().to_string(),
        project_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_are_absent() {
        let request = GenerateRequest {
            description: Some("   ".into()),
            uploaded_sql: Some("CREATE TABLE t (id INT);".into()),
            file_name: Some("".into()),
            ..Default::default()
        };
        let input = request.to_input();
        assert!(input.description.is_none());
        assert_eq!(input.sql_text(), Some("CREATE TABLE t (id INT);"));
        assert!(input.context.is_improvement);
        assert_eq!(input.context.file_name, "");
    }

    #[test]
    fn test_description_and_upload_combine() {
        let request = GenerateRequest {
            description: Some("Add soft deletes everywhere".into()),
            uploaded_sql: Some("CREATE TABLE t (id INT);".into()),
            file_name: Some("legacy.sql".into()),
            ..Default::default()
        };
        let input = request.to_input();
        assert_eq!(input.description_text(), Some("Add soft deletes everywhere"));
        assert_eq!(input.context.file_name, "legacy.sql");
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            llm_error(LlmError::Validation(vec!["x".into()])).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            llm_error(LlmError::Configuration("no key".into())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            llm_error(LlmError::Network("refused".into())).0,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            store_error(StoreError::NotFound("p1".into())).0,
            StatusCode::NOT_FOUND
        );
    }
}
