//! Model-callable tools.
//!
//! A tool only ever sees the arguments the model produced. Credentials and
//! the site id come from the request context, and every failure comes back
//! as a [`ToolOutcome::Failure`] the model can read.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::context::ContextKey;
use crate::graph::GraphError;
use crate::summarize::SummarizeError;

pub mod builtins;
pub mod registry;

pub use builtins::{
    CopyOneDriveFileTool, GetDriveIdTool, GetFolderIdTool, GetOneDriveIdTool,
    GetSiteAnalyticsTool, RecentOneDriveFilesTool, RecentSharePointFilesTool, SummarizeFileTool,
    UpdateFileMetadataTool,
};
pub use registry::ToolRegistry;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error("{0} is not available in the request context")]
    MissingCredential(ContextKey),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Unsupported(String),
    #[error("{0}")]
    Summarization(String),
    #[error("no result within {0}s")]
    Timeout(u64),
    #[error("no tool named {0}")]
    UnknownTool(String),
    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    /// Stable identifier shown to the model.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::InvalidArguments(_) => "invalid_arguments",
            ToolError::MissingCredential(_) => "missing_credential",
            ToolError::NotFound(_) => "not_found",
            ToolError::Upstream(_) => "upstream",
            ToolError::Unsupported(_) => "unsupported",
            ToolError::Summarization(_) => "summarization",
            ToolError::Timeout(_) => "timeout",
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::Internal(_) => "internal",
        }
    }
}

impl From<GraphError> for ToolError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::MissingCredential(key) => ToolError::MissingCredential(key),
            GraphError::NotFound(what) => ToolError::NotFound(what),
            other => ToolError::Upstream(other.to_string()),
        }
    }
}

impl From<SummarizeError> for ToolError {
    fn from(err: SummarizeError) -> Self {
        match err {
            SummarizeError::Unsupported(mime) => {
                ToolError::Unsupported(format!("cannot summarize files of type {}", mime))
            }
            other => ToolError::Summarization(other.to_string()),
        }
    }
}

/// What a dispatched call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(Value),
    Failure { kind: &'static str, message: String },
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Failure { .. })
    }

    /// Tool message content: JSON on success, `Error: <kind>: <message>` otherwise.
    pub fn render(&self) -> String {
        match self {
            ToolOutcome::Success(value) => value.to_string(),
            ToolOutcome::Failure { kind, message } => format!("Error: {}: {}", kind, message),
        }
    }
}

impl From<ToolError> for ToolOutcome {
    fn from(err: ToolError) -> Self {
        ToolOutcome::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<Result<Value, ToolError>> for ToolOutcome {
    fn from(result: Result<Value, ToolError>) -> Self {
        match result {
            Ok(value) => ToolOutcome::Success(value),
            Err(err) => err.into(),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn definition(&self) -> genie::chat::Tool;
    async fn call(&self, args: Value) -> Result<Value, ToolError>;
}

/// The fixed set of SharePoint tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    GetOneDriveId,
    GetDriveId,
    GetFolderId,
    RecentSharePointFiles,
    RecentOneDriveFiles,
    CopyOneDriveFile,
    SummarizeFile,
    UpdateFileMetadata,
    GetSiteAnalytics,
}

impl ToolName {
    pub const ALL: [ToolName; 9] = [
        ToolName::GetOneDriveId,
        ToolName::GetDriveId,
        ToolName::GetFolderId,
        ToolName::RecentSharePointFiles,
        ToolName::RecentOneDriveFiles,
        ToolName::CopyOneDriveFile,
        ToolName::SummarizeFile,
        ToolName::UpdateFileMetadata,
        ToolName::GetSiteAnalytics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::GetOneDriveId => "get_one_drive_id",
            ToolName::GetDriveId => "get_drive_id",
            ToolName::GetFolderId => "get_folder_id",
            ToolName::RecentSharePointFiles => "recent_sharepoint_files",
            ToolName::RecentOneDriveFiles => "recent_onedrive_files",
            ToolName::CopyOneDriveFile => "copy_onedrive_file",
            ToolName::SummarizeFile => "summarize_file",
            ToolName::UpdateFileMetadata => "update_file_metadata",
            ToolName::GetSiteAnalytics => "get_site_analytics",
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}
