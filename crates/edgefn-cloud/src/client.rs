use std::sync::Arc;

use edgefn_build::{ImportWalker, SourceTree, WalkError};
use edgefn_core::{ImportMap, ProjectRef};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::manifest::{FunctionMetadata, UploadManifest};
use crate::multipart::MultipartWriter;

/// Capacity of the in-memory pipe between form encoding and the request body.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Source files read ahead of the encoder.
const SOURCE_QUEUE_DEPTH: usize = 4;

const FILE_FIELD: &str = "file";

/// Uploads one function's manifest to the remote platform.
#[allow(async_fn_in_trait)]
pub trait FunctionUploader: Send + Sync {
    async fn upload(
        &self,
        manifest: UploadManifest,
        cancel: &CancellationToken,
    ) -> Result<DeployedFunction, UploadError>;
}

/// Function record returned by a successful deploy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeployedFunction {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub status: String,
}

/// Management API client for the functions deploy endpoint.
pub struct FunctionsClient {
    http: reqwest::Client,
    api_url: String,
    token: SecretString,
    project_ref: ProjectRef,
}

impl FunctionsClient {
    pub fn new(api_url: &str, token: SecretString, project_ref: ProjectRef) -> Self {
        Self::with_http_client(reqwest::Client::new(), api_url, token, project_ref)
    }

    pub fn with_http_client(
        http: reqwest::Client,
        api_url: &str,
        token: SecretString,
        project_ref: ProjectRef,
    ) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_owned(),
            token,
            project_ref,
        }
    }

    fn deploy_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/functions/deploy",
            self.api_url, self.project_ref
        )
    }
}

impl FunctionUploader for FunctionsClient {
    async fn upload(
        &self,
        manifest: UploadManifest,
        cancel: &CancellationToken,
    ) -> Result<DeployedFunction, UploadError> {
        let slug = manifest.slug.clone();
        tracing::info!(%slug, project = %self.project_ref, "uploading function");

        let (body_reader, body_writer) = tokio::io::duplex(PIPE_CAPACITY);
        let form = MultipartWriter::new(body_writer);
        let content_type = form.content_type();

        // The join handle is the producer's single-slot error channel. The
        // pipe's write end is dropped when the task ends, on every path.
        let mut producer = tokio::spawn(async move { produce(form, &manifest).await });

        let request = self
            .http
            .post(self.deploy_url())
            .query(&[("slug", slug.as_str())])
            .bearer_auth(self.token.expose_secret())
            .header(CONTENT_TYPE, content_type)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(body_reader)));

        let sent = tokio::select! {
            sent = send(request) => sent,
            () = cancel.cancelled() => {
                producer.abort();
                return Err(UploadError::Cancelled);
            }
        };

        let produced = tokio::select! {
            joined = &mut producer => joined.unwrap_or_else(|e| Err(UploadError::Producer { source: e })),
            () = cancel.cancelled() => {
                producer.abort();
                return Err(UploadError::Cancelled);
            }
        };

        match (produced, sent) {
            // The request failed first and the producer only saw the pipe close.
            (Err(UploadError::PipeClosed { .. }), Err(e)) => Err(UploadError::Request { source: e }),
            // The server rejected the upload without reading all of it.
            (Err(UploadError::PipeClosed { .. }), Ok((status, body))) if !status.is_success() => {
                parse_response(status, body)
            }
            (Err(e), _) => {
                tracing::debug!(%slug, "producer failure overrides response");
                Err(e)
            }
            (Ok(()), Err(e)) => Err(UploadError::Request { source: e }),
            (Ok(()), Ok((status, body))) => parse_response(status, body),
        }
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<(StatusCode, String), reqwest::Error> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}

fn parse_response(status: StatusCode, body: String) -> Result<DeployedFunction, UploadError> {
    if !status.is_success() {
        return Err(UploadError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        });
    }
    match serde_json::from_str::<DeployedFunction>(&body) {
        Ok(deployed) => {
            tracing::info!(
                slug = %deployed.slug,
                version = deployed.version,
                status = %deployed.status,
                "function deployed",
            );
            Ok(deployed)
        }
        Err(e) => Err(UploadError::MalformedResponse {
            status: status.as_u16(),
            body,
            source: e,
        }),
    }
}

/// Encode the whole form into the pipe, then close it.
async fn produce(
    mut form: MultipartWriter<DuplexStream>,
    manifest: &UploadManifest,
) -> Result<(), UploadError> {
    write_form(&mut form, manifest).await?;
    form.finish().await.map_err(UploadError::from_write)?;
    Ok(())
}

async fn write_form(
    form: &mut MultipartWriter<DuplexStream>,
    manifest: &UploadManifest,
) -> Result<(), UploadError> {
    let mut metadata = serde_json::to_vec(&manifest.metadata)
        .map_err(|e| UploadError::Metadata { source: e })?;
    metadata.push(b'\n');
    form.write_field("metadata", &metadata)
        .await
        .map_err(UploadError::from_write)?;

    let mut parts = spawn_source_reader(manifest.metadata.clone(), manifest.source.clone());
    while let Some(part) = parts.recv().await {
        let part = part?;
        form.write_file(FILE_FIELD, &part.path, &part.data)
            .await
            .map_err(UploadError::from_write)?;
    }

    if let Some(bundle) = &manifest.bundle {
        let mut reader = tokio::fs::File::open(&bundle.path)
            .await
            .map_err(|e| UploadError::ReadBundle {
                path: bundle.path.clone(),
                source: e,
            })?;
        form.copy_file(FILE_FIELD, &bundle.name, &mut reader)
            .await
            .map_err(UploadError::from_write)?;
    }

    Ok(())
}

/// A file read from the source tree, ready to be written as a form part.
struct SourcePart {
    path: String,
    data: Vec<u8>,
}

/// Read the import map, static files and import graph on the blocking pool.
///
/// Parts arrive in form order. The queue is bounded, so at most
/// [`SOURCE_QUEUE_DEPTH`] files are held in memory ahead of the encoder.
/// Reading stops once the receiver is dropped.
fn spawn_source_reader(
    metadata: FunctionMetadata,
    source: Arc<dyn SourceTree>,
) -> mpsc::Receiver<Result<SourcePart, UploadError>> {
    let (tx, rx) = mpsc::channel(SOURCE_QUEUE_DEPTH);
    tokio::task::spawn_blocking(move || {
        if let Err(e) = read_sources(&metadata, source.as_ref(), &tx) {
            if tx.blocking_send(Err(e)).is_err() {
                tracing::debug!("upload ended before source error was delivered");
            }
        }
    });
    rx
}

fn read_sources(
    meta: &FunctionMetadata,
    source: &dyn SourceTree,
    tx: &mpsc::Sender<Result<SourcePart, UploadError>>,
) -> Result<(), UploadError> {
    // False once the encoder has hung up.
    let emit = |path: String, data: Vec<u8>| tx.blocking_send(Ok(SourcePart { path, data })).is_ok();

    // Import map
    let mut import_map = ImportMap::default();
    if let Some(path) = &meta.import_map_path {
        let data = source.read(path).map_err(|e| UploadError::ReadImportMap {
            path: path.clone(),
            source: e,
        })?;
        import_map =
            ImportMap::parse(path, &data).map_err(|e| UploadError::ImportMap { source: e })?;
        if !emit(path.clone(), data) {
            return Ok(());
        }
    }

    // Static files
    for pattern in &meta.static_patterns {
        for path in source.glob(pattern)? {
            let data = match source.read(&path) {
                Ok(data) => data,
                Err(e) if e.kind() == std::io::ErrorKind::IsADirectory => {
                    tracing::warn!(path = %path, pattern = %pattern, "skipping directory matched by static pattern");
                    continue;
                }
                Err(e) => return Err(UploadError::ReadStatic { path, source: e }),
            };
            if !emit(path, data) {
                return Ok(());
            }
        }
    }

    // Entrypoint and its import graph
    for file in ImportWalker::new(&meta.entrypoint_path, &import_map, source) {
        let file = file?;
        if !emit(file.path, file.content) {
            return Ok(());
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to encode function metadata")]
    Metadata { source: serde_json::Error },

    #[error("failed to load import map {path}")]
    ReadImportMap {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid import map")]
    ImportMap { source: edgefn_core::Error },

    #[error("failed to load static file {path}")]
    ReadStatic {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to collect function sources")]
    Walk {
        #[from]
        source: WalkError,
    },

    #[error("failed to open bundle {path}")]
    ReadBundle {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode multipart body")]
    Encode { source: std::io::Error },

    #[error("upload body closed before encoding finished")]
    PipeClosed { source: std::io::Error },

    #[error("upload producer task failed")]
    Producer { source: tokio::task::JoinError },

    #[error("failed to deploy function")]
    Request { source: reqwest::Error },

    #[error("unexpected deploy status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("malformed deploy response (status {status}): {body}")]
    MalformedResponse {
        status: u16,
        body: String,
        source: serde_json::Error,
    },

    #[error("upload was cancelled")]
    Cancelled,
}

impl UploadError {
    fn from_write(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::BrokenPipe {
            Self::PipeClosed { source: e }
        } else {
            Self::Encode { source: e }
        }
    }
}
