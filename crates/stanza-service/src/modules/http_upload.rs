//! HTTP File Upload module (XEP-0363)
//!
//! Hands out upload slots over IQ and serves the matching PUT/GET endpoints
//! on the HTTP listener. Slot metadata lives in the repository; file
//! contents live in the configured storage folder, one file per slot id.

use anyhow::Context;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::Json;
use stanza_common::{AppError, ErrorResponse, HttpUploadConfig};
use stanza_core::{Element, Iq, Stanza, StanzaError, StanzaErrorCondition, UploadSlot};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use super::{send, send_error};
use crate::context::ServiceContext;
use crate::error::ServiceResult;
use crate::module::{IqProcessor, Lifecycle, Module};

pub const MODULE_NAME: &str = "http_upload";
pub const XEP_NUMBER: &str = "0363";
pub const HTTP_UPLOAD_NAMESPACE: &str = "urn:xmpp:http:upload:0";

const FEATURES: &[&str] = &[HTTP_UPLOAD_NAMESPACE];

pub const UPLOAD_ROUTE: &str = "/upload/:id/:filename";
pub const DOWNLOAD_ROUTE: &str = "/download/:id/:filename";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// ============================================================================
// Slot request
// ============================================================================

/// Attributes of a `<request/>` element
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
struct SlotRequest {
    #[validate(
        length(min = 1, max = 255, message = "Filename must be 1-255 characters"),
        does_not_contain(pattern = "/", message = "Filename must not contain '/'")
    )]
    filename: String,

    #[validate(range(min = 1, message = "Size must be positive"))]
    size: u64,

    content_type: Option<String>,
}

impl SlotRequest {
    /// Read and validate the request attributes
    ///
    /// Returns `None` for a missing filename or size, a non-numeric size,
    /// an unknown attribute, or a value failing validation.
    fn parse(request: &Element) -> Option<Self> {
        let mut filename = None;
        let mut size = None;
        let mut content_type = None;

        for (name, value) in request.attributes() {
            match name {
                "xmlns" => {}
                "filename" => filename = Some(value.to_string()),
                "size" => size = Some(value.parse::<u64>().ok()?),
                "content-type" => content_type = Some(value.to_string()),
                _ => return None,
            }
        }

        let request = Self {
            filename: filename?,
            size: size?,
            content_type,
        };
        request.validate().ok()?;
        Some(request)
    }
}

fn file_too_large(max_file_size: u64) -> Element {
    Element::builder("file-too-large")
        .namespace(HTTP_UPLOAD_NAMESPACE)
        .child(
            Element::builder("max-file-size")
                .text(max_file_size.to_string())
                .build(),
        )
        .build()
}

// ============================================================================
// Module
// ============================================================================

/// HTTP File Upload module
pub struct HttpUpload {
    ctx: ServiceContext,
    config: HttpUploadConfig,
    routes_registered: AtomicBool,
}

impl HttpUpload {
    pub fn new(ctx: ServiceContext, config: HttpUploadConfig) -> Self {
        Self {
            ctx,
            config,
            routes_registered: AtomicBool::new(false),
        }
    }

    fn slot_url(&self, kind: &str, slot: &UploadSlot) -> String {
        format!(
            "{}/{kind}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            slot.id,
            urlencoding::encode(&slot.filename)
        )
    }

    #[instrument(skip(self, iq, request), fields(module = MODULE_NAME, id = %iq.id))]
    async fn request_slot(&self, iq: &Iq, request: SlotRequest) -> ServiceResult<()> {
        if request.size > self.config.max_file_size {
            let err = StanzaError::new(StanzaErrorCondition::NotAcceptable)
                .with_application(file_too_large(self.config.max_file_size));
            send(&self.ctx, MODULE_NAME, Stanza::from(iq.error_reply(err))).await;
            return Ok(());
        }

        let mut slot = UploadSlot::new(request.filename, request.size, request.content_type);
        if let Err(e) = self.ctx.repository().insert_slot(&mut slot).await {
            error!(error = %e, "Failed to store upload slot");
            return Err(e.into());
        }
        info!(slot = %slot.id, size = slot.size, "Upload slot reserved");

        let reply = Element::builder("slot")
            .namespace(HTTP_UPLOAD_NAMESPACE)
            .child(
                Element::builder("put")
                    .attribute("url", self.slot_url("upload", &slot))
                    .build(),
            )
            .child(
                Element::builder("get")
                    .attribute("url", self.slot_url("download", &slot))
                    .build(),
            )
            .build();
        send(&self.ctx, MODULE_NAME, Stanza::from(iq.result_reply(Some(reply)))).await;
        Ok(())
    }
}

impl Module for HttpUpload {
    fn name(&self) -> &'static str {
        MODULE_NAME
    }

    fn version(&self) -> &'static str {
        XEP_NUMBER
    }

    fn matches_namespace(&self, namespace: &str, _server_target: bool) -> bool {
        namespace == HTTP_UPLOAD_NAMESPACE
    }

    fn server_features(&self) -> &[&'static str] {
        FEATURES
    }

    fn iq_processor(&self) -> Option<&dyn IqProcessor> {
        Some(self)
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

#[async_trait]
impl IqProcessor for HttpUpload {
    async fn process_iq(&self, iq: Iq) -> ServiceResult<()> {
        let request = match iq.payload_ns("request", HTTP_UPLOAD_NAMESPACE) {
            Some(element) if iq.is_get() => SlotRequest::parse(element),
            _ => None,
        };
        match request {
            Some(request) => self.request_slot(&iq, request).await,
            None => {
                send_error(&self.ctx, MODULE_NAME, &iq, StanzaErrorCondition::BadRequest).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Lifecycle for HttpUpload {
    async fn start(&self) -> anyhow::Result<()> {
        let folder = PathBuf::from(&self.config.storage_folder);
        tokio::fs::create_dir_all(&folder)
            .await
            .with_context(|| format!("creating storage folder {}", folder.display()))?;

        if !self.routes_registered.load(Ordering::Acquire) {
            let http = self
                .ctx
                .http()
                .context("http_upload requires an HTTP listener")?;
            let files = Arc::new(UploadFiles {
                ctx: self.ctx.clone(),
                folder: folder.clone(),
            });
            http.register(UPLOAD_ROUTE, put(put_file).with_state(Arc::clone(&files)))?;
            http.register(DOWNLOAD_ROUTE, get(get_file).with_state(files))?;
            self.routes_registered.store(true, Ordering::Release);
        }

        info!(
            module = MODULE_NAME,
            xep = XEP_NUMBER,
            folder = %folder.display(),
            "Started http_upload module"
        );
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        info!(module = MODULE_NAME, xep = XEP_NUMBER, "Stopped http_upload module");
        Ok(())
    }
}

// ============================================================================
// HTTP endpoints
// ============================================================================

/// State shared by the upload and download handlers
struct UploadFiles {
    ctx: ServiceContext,
    folder: PathBuf,
}

impl UploadFiles {
    async fn slot(&self, id: &str, filename: &str) -> Result<UploadSlot, HttpError> {
        self.ctx
            .repository()
            .fetch_slot(id)
            .await
            .map_err(AppError::from)?
            .filter(|slot| slot.filename == filename)
            .ok_or_else(|| AppError::not_found(format!("Upload slot {id}")).into())
    }
}

/// `AppError` rendered as a JSON error response
#[derive(Debug)]
pub struct HttpError(AppError);

impl From<AppError> for HttpError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "Upload endpoint failed");
        } else {
            warn!(error = %self.0, "Upload request rejected");
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

/// `PUT /upload/:id/:filename`
async fn put_file(
    State(files): State<Arc<UploadFiles>>,
    Path((id, filename)): Path<(String, String)>,
    body: Bytes,
) -> Result<StatusCode, HttpError> {
    let slot = files.slot(&id, &filename).await?;

    let length = body.len() as u64;
    if length > slot.size {
        return Err(AppError::PayloadTooLarge(format!(
            "{length} bytes sent, slot allows {}",
            slot.size
        ))
        .into());
    }
    if length < slot.size {
        return Err(AppError::validation(format!(
            "{length} bytes sent, slot expects {}",
            slot.size
        ))
        .into());
    }

    tokio::fs::write(files.folder.join(&slot.id), &body)
        .await
        .map_err(AppError::from)?;
    info!(module = MODULE_NAME, slot = %slot.id, bytes = length, "File uploaded");
    Ok(StatusCode::CREATED)
}

/// `GET /download/:id/:filename`
async fn get_file(
    State(files): State<Arc<UploadFiles>>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response, HttpError> {
    let slot = files.slot(&id, &filename).await?;

    let content = match tokio::fs::read(files.folder.join(&slot.id)).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::not_found(format!("File for slot {id}")).into());
        }
        Err(e) => return Err(AppError::from(e).into()),
    };

    let content_type = slot
        .content_type
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    Ok(([(header::CONTENT_TYPE, content_type)], content).into_response())
}
