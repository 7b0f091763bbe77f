//! Microsoft Graph access for SharePoint and OneDrive content.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::context::{self, ContextKey, RequestContext};

pub mod client;
pub mod types;

pub use client::GraphClient;
pub use types::{DownloadedFile, Drive, DriveItem, FileDescriptor};

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("missing credential: {0}")]
    MissingCredential(ContextKey),

    #[error("Graph returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Format(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl From<reqwest::Error> for GraphError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GraphError::Format(err.to_string())
        } else {
            GraphError::Transport(err.to_string())
        }
    }
}

/// Tokens and site id a Graph call runs with.
#[derive(Clone, Default)]
pub struct GraphCredentials {
    pub site_id: Option<String>,
    pub access_token: Option<String>,
    pub obo_access_token: Option<String>,
}

impl GraphCredentials {
    pub fn from_context(ctx: &RequestContext) -> Self {
        Self {
            site_id: ctx.get(ContextKey::SiteId).map(str::to_owned),
            access_token: ctx.get(ContextKey::AccessToken).map(str::to_owned),
            obo_access_token: ctx.get(ContextKey::OboAccessToken).map(str::to_owned),
        }
    }

    /// Credentials of the request currently in scope.
    pub fn current() -> Self {
        Self::from_context(&context::snapshot())
    }

    pub fn app_token(&self) -> Result<&str, GraphError> {
        self.access_token
            .as_deref()
            .ok_or(GraphError::MissingCredential(ContextKey::AccessToken))
    }

    pub fn obo_token(&self) -> Result<&str, GraphError> {
        self.obo_access_token
            .as_deref()
            .ok_or(GraphError::MissingCredential(ContextKey::OboAccessToken))
    }

    pub fn site_id(&self) -> Result<&str, GraphError> {
        self.site_id
            .as_deref()
            .ok_or(GraphError::MissingCredential(ContextKey::SiteId))
    }
}

impl fmt::Debug for GraphCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphCredentials")
            .field("site_id", &self.site_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field(
                "obo_access_token",
                &self.obo_access_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// The SharePoint/OneDrive operations the tools are built on.
#[async_trait]
pub trait SharePointApi: Send + Sync {
    /// Id of the caller's own OneDrive.
    async fn my_drive_id(&self, creds: &GraphCredentials) -> Result<String, GraphError>;

    /// Id of the site document library whose name matches, ignoring case.
    async fn drive_id_by_name(
        &self,
        creds: &GraphCredentials,
        library_name: &str,
    ) -> Result<Option<String>, GraphError>;

    /// Id of the folder at `folder_path`; the drive root when the path is empty.
    async fn folder_id(
        &self,
        creds: &GraphCredentials,
        drive_id: &str,
        folder_path: &str,
    ) -> Result<Option<String>, GraphError>;

    /// Most recently modified files (never folders) matching `query`.
    async fn recent_drive_files(
        &self,
        creds: &GraphCredentials,
        drive_id: &str,
        query: &str,
        top: usize,
    ) -> Result<Vec<DriveItem>, GraphError>;

    async fn recent_my_files(
        &self,
        creds: &GraphCredentials,
        query: &str,
        top: usize,
    ) -> Result<Vec<DriveItem>, GraphError>;

    async fn download_url(
        &self,
        creds: &GraphCredentials,
        drive_id: &str,
        item_id: &str,
    ) -> Result<Option<String>, GraphError>;

    /// Starts copying an item of the caller's OneDrive. Success means the
    /// service accepted the job.
    async fn copy_item(
        &self,
        creds: &GraphCredentials,
        item_id: &str,
        dest_drive_id: &str,
        dest_folder_id: &str,
    ) -> Result<(), GraphError>;

    /// Patches the list-item fields behind a drive item.
    async fn update_item_fields(
        &self,
        creds: &GraphCredentials,
        drive_id: &str,
        item_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Value, GraphError>;

    async fn site_analytics(&self, creds: &GraphCredentials) -> Result<Option<Value>, GraphError>;

    /// Fetches a file at the drive root by name together with its MIME type.
    async fn download_by_name(
        &self,
        creds: &GraphCredentials,
        drive_id: &str,
        file_name: &str,
    ) -> Result<DownloadedFile, GraphError>;

    /// Display name of the signed-in user.
    async fn my_display_name(&self, creds: &GraphCredentials)
    -> Result<Option<String>, GraphError>;
}
