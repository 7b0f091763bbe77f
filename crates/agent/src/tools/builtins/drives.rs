//! Drive and folder id lookups.

use async_trait::async_trait;
use genie::chat::Tool;
use serde_json::{Value, json};
use std::sync::Arc;

use super::helpers::{credentials, optional_str, required_str};
use crate::context::ContextKey;
use crate::graph::SharePointApi;
use crate::tools::{Tool as ToolTrait, ToolError, ToolName};

pub struct GetOneDriveIdTool {
    api: Arc<dyn SharePointApi>,
}

impl GetOneDriveIdTool {
    pub fn new(api: Arc<dyn SharePointApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolTrait for GetOneDriveIdTool {
    fn name(&self) -> &str {
        ToolName::GetOneDriveId.as_str()
    }

    fn definition(&self) -> Tool {
        Tool::function(
            self.name(),
            "Get the drive id of the signed-in user's OneDrive.",
            json!({ "type": "object", "properties": {} }),
        )
    }

    async fn call(&self, _args: Value) -> Result<Value, ToolError> {
        let creds = credentials(&[ContextKey::OboAccessToken])?;
        Ok(Value::String(self.api.my_drive_id(&creds).await?))
    }
}

pub struct GetDriveIdTool {
    api: Arc<dyn SharePointApi>,
}

impl GetDriveIdTool {
    pub fn new(api: Arc<dyn SharePointApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolTrait for GetDriveIdTool {
    fn name(&self) -> &str {
        ToolName::GetDriveId.as_str()
    }

    fn definition(&self) -> Tool {
        Tool::function(
            self.name(),
            "Get the drive id of a SharePoint document library by its display name. \
             Returns null when the site has no library with that name.",
            json!({
                "type": "object",
                "properties": {
                    "library_name": {
                        "type": "string",
                        "description": "Display name of the document library, e.g. \"Documents\"."
                    }
                },
                "required": ["library_name"]
            }),
        )
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let library_name = required_str(&args, "library_name")?;
        let creds = credentials(&[ContextKey::AccessToken, ContextKey::SiteId])?;
        let id = self.api.drive_id_by_name(&creds, library_name).await?;
        Ok(id.map(Value::String).unwrap_or(Value::Null))
    }
}

pub struct GetFolderIdTool {
    api: Arc<dyn SharePointApi>,
}

impl GetFolderIdTool {
    pub fn new(api: Arc<dyn SharePointApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolTrait for GetFolderIdTool {
    fn name(&self) -> &str {
        ToolName::GetFolderId.as_str()
    }

    fn definition(&self) -> Tool {
        Tool::function(
            self.name(),
            "Get the id of a folder inside a drive. An empty path returns the drive's root folder. \
             Returns null when the folder does not exist.",
            json!({
                "type": "object",
                "properties": {
                    "drive_id": {
                        "type": "string",
                        "description": "Id of the drive or document library."
                    },
                    "folder_path": {
                        "type": "string",
                        "description": "Folder path relative to the drive root, e.g. \"Reports/2024\".",
                        "default": ""
                    }
                },
                "required": ["drive_id"]
            }),
        )
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let drive_id = required_str(&args, "drive_id")?;
        let folder_path = optional_str(&args, "folder_path", "");
        let creds = credentials(&[ContextKey::AccessToken])?;
        let id = self.api.folder_id(&creds, drive_id, folder_path).await?;
        Ok(id.map(Value::String).unwrap_or(Value::Null))
    }
}
