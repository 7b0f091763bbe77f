//! Recently modified files of a document library or the user's OneDrive.

use async_trait::async_trait;
use genie::chat::Tool;
use log::debug;
use serde_json::{Value, json};
use std::sync::Arc;

use super::helpers::{credentials, optional_count, optional_flag, optional_str, required_str};
use crate::context::ContextKey;
use crate::graph::{DriveItem, FileDescriptor, GraphCredentials, SharePointApi};
use crate::tools::{Tool as ToolTrait, ToolError, ToolName};

const DEFAULT_TOP: usize = 10;
const MAX_TOP: usize = 100;

fn listing_parameters(with_drive: bool) -> Value {
    let mut properties = json!({
        "file_name": {
            "type": "string",
            "description": "Search text matched against file names and content. \".\" matches every file.",
            "default": "."
        },
        "top": {
            "type": "integer",
            "description": "Maximum number of files to return.",
            "default": DEFAULT_TOP
        },
        "file_download": {
            "type": "boolean",
            "description": "Include a short-lived download URL for each file.",
            "default": false
        }
    });
    let mut required = Vec::new();
    if with_drive {
        properties["drive_id"] = json!({
            "type": "string",
            "description": "Id of the document library to search."
        });
        required.push("drive_id");
    }
    json!({ "type": "object", "properties": properties, "required": required })
}

/// Flattens items, attaching download URLs when requested. A download URL
/// that cannot be fetched is left out rather than failing the listing.
async fn describe(
    api: &dyn SharePointApi,
    creds: &GraphCredentials,
    fallback_drive: Option<&str>,
    items: Vec<DriveItem>,
    with_download: bool,
) -> Vec<FileDescriptor> {
    let mut files = Vec::with_capacity(items.len());
    for item in items {
        let download_url = if with_download {
            match item.drive_id().or(fallback_drive) {
                Some(drive_id) => match api.download_url(creds, drive_id, &item.id).await {
                    Ok(url) => url,
                    Err(e) => {
                        debug!("no download URL for {}: {}", item.id, e);
                        None
                    }
                },
                None => None,
            }
        } else {
            None
        };
        files.push(item.into_descriptor(download_url));
    }
    files
}

pub struct RecentSharePointFilesTool {
    api: Arc<dyn SharePointApi>,
}

impl RecentSharePointFilesTool {
    pub fn new(api: Arc<dyn SharePointApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolTrait for RecentSharePointFilesTool {
    fn name(&self) -> &str {
        ToolName::RecentSharePointFiles.as_str()
    }

    fn definition(&self) -> Tool {
        Tool::function(
            self.name(),
            "List the most recently modified files of a SharePoint document library, newest first.",
            listing_parameters(true),
        )
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let drive_id = required_str(&args, "drive_id")?;
        let query = optional_str(&args, "file_name", ".");
        let top = optional_count(&args, "top", DEFAULT_TOP, MAX_TOP)?;
        let with_download = optional_flag(&args, "file_download");
        let creds = credentials(&[ContextKey::OboAccessToken])?;

        let items = self
            .api
            .recent_drive_files(&creds, drive_id, query, top)
            .await?;
        let files = describe(self.api.as_ref(), &creds, Some(drive_id), items, with_download).await;
        serde_json::to_value(files).map_err(|e| ToolError::Internal(e.to_string()))
    }
}

pub struct RecentOneDriveFilesTool {
    api: Arc<dyn SharePointApi>,
}

impl RecentOneDriveFilesTool {
    pub fn new(api: Arc<dyn SharePointApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolTrait for RecentOneDriveFilesTool {
    fn name(&self) -> &str {
        ToolName::RecentOneDriveFiles.as_str()
    }

    fn definition(&self) -> Tool {
        Tool::function(
            self.name(),
            "List the most recently modified files of the signed-in user's OneDrive, newest first.",
            listing_parameters(false),
        )
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let query = optional_str(&args, "file_name", ".");
        let top = optional_count(&args, "top", DEFAULT_TOP, MAX_TOP)?;
        let with_download = optional_flag(&args, "file_download");
        let creds = credentials(&[ContextKey::OboAccessToken])?;

        let items = self.api.recent_my_files(&creds, query, top).await?;
        let files = describe(self.api.as_ref(), &creds, None, items, with_download).await;
        serde_json::to_value(files).map_err(|e| ToolError::Internal(e.to_string()))
    }
}
