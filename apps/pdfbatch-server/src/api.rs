//! API handlers for the pdfbatch server
//!
//! Provides REST endpoints for:
//! - Batch submission
//! - Job status polling
//! - Source upload / result download (local mode)

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use pdfbatch_core::{Instruction, OperationKind};
use pdfbatch_engine::{BatchConfig, BatchRunner, BlobStore, Job, JobStore};

use crate::error::ServerError;
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pdfbatch-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Batch submission body
#[derive(Deserialize)]
pub struct SubmitBatchRequest {
    /// Operation kind; every instruction must match it
    pub operation: OperationKind,

    /// Owner recorded on the job record
    #[serde(default)]
    pub user_id: Option<String>,

    /// Already-validated instruction list, ordering significant
    pub instructions: Vec<Instruction>,
}

/// Batch submission response; all further status comes from polling the job
#[derive(Serialize)]
pub struct SubmitBatchResponse {
    pub success: bool,
    pub job_id: String,
}

/// Handler: POST /api/batch
pub async fn handle_submit_batch(
    State(state): State<AppState>,
    Json(req): Json<SubmitBatchRequest>,
) -> Result<Json<SubmitBatchResponse>, ServerError> {
    validate_batch(&req, &state.config)?;

    let user_id = req.user_id.unwrap_or_else(|| "anonymous".to_string());
    let job = Job::new(user_id, req.operation, req.instructions.len());
    let job_id = job.id.clone();

    state
        .jobs
        .insert(job)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    info!(
        job_id,
        operation = %req.operation,
        instructions = req.instructions.len(),
        "batch accepted"
    );

    let runner = BatchRunner::new(
        state.blob.clone(),
        state.jobs.clone(),
        state.config.clone(),
    );
    let instructions = req.instructions;
    let spawned_id = job_id.clone();
    tokio::spawn(async move {
        if let Err(err) = runner.run(&spawned_id, instructions).await {
            error!(job_id = %spawned_id, %err, "batch runner aborted");
        }
    });

    Ok(Json(SubmitBatchResponse {
        success: true,
        job_id,
    }))
}

/// Synchronous submission checks; nothing here creates a job.
fn validate_batch(req: &SubmitBatchRequest, config: &BatchConfig) -> Result<(), ServerError> {
    if req.instructions.is_empty() {
        return Err(ServerError::InvalidRequest(
            "instruction list is empty".into(),
        ));
    }

    if req.instructions.len() > config.max_instructions {
        return Err(ServerError::InvalidRequest(format!(
            "batch of {} instructions exceeds the {} instruction cap",
            req.instructions.len(),
            config.max_instructions
        )));
    }

    let referenced: u64 = req
        .instructions
        .iter()
        .map(|i| i.source_files().len() as u64)
        .sum();
    let estimated = referenced * config.estimated_document_bytes;
    if estimated > config.max_batch_bytes {
        return Err(ServerError::InvalidRequest(format!(
            "batch references {} source files, estimated {} bytes exceeds the {} byte cap",
            referenced, estimated, config.max_batch_bytes
        )));
    }

    for instruction in &req.instructions {
        if instruction.kind() != req.operation {
            return Err(ServerError::InvalidRequest(format!(
                "instruction '{}' is a {} instruction in a {} batch",
                instruction.label(),
                instruction.kind(),
                req.operation
            )));
        }
        instruction
            .validate()
            .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
    }

    Ok(())
}

/// Job status response
#[derive(Serialize)]
pub struct JobStatusResponse {
    pub success: bool,
    pub job: Job,
}

/// Handler: GET /api/jobs/{id}
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, ServerError> {
    let job = state
        .jobs
        .get(&id)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .ok_or_else(|| ServerError::JobNotFound(id))?;

    Ok(Json(JobStatusResponse { success: true, job }))
}

/// Upload response
#[derive(Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub name: String,
    pub size: usize,
}

/// Handler: PUT /api/files/{name}
///
/// Local-mode convenience: seeds the blob store so a batch has sources to
/// work on. Production deployments point the engine at a real bucket and
/// skip this endpoint.
pub async fn handle_upload_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ServerError> {
    if body.is_empty() {
        return Err(ServerError::InvalidRequest("empty file body".into()));
    }

    let size = body.len();
    state
        .blob
        .store(&name, body.to_vec(), "application/pdf")
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    info!(name, size, "file uploaded");
    Ok(Json(UploadResponse {
        success: true,
        name,
        size,
    }))
}

/// Handler: GET /api/results/{job_id}
///
/// Streams the finished archive once the job has completed.
pub async fn handle_download_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let job = state
        .jobs
        .get(&job_id)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .ok_or_else(|| ServerError::JobNotFound(job_id.clone()))?;

    let location = job
        .result_location
        .ok_or_else(|| ServerError::ResultNotReady(job_id.clone()))?;

    let bytes = state
        .blob
        .fetch(&location)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .ok_or_else(|| ServerError::FileNotFound(location))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{job_id}.zip\""),
            ),
        ],
        bytes,
    ))
}
