use async_trait::async_trait;
use genie::chat::Tool;
use log::info;
use serde_json::{Value, json};
use std::sync::Arc;

use super::helpers::{credentials, required_str};
use crate::context::ContextKey;
use crate::graph::SharePointApi;
use crate::tools::{Tool as ToolTrait, ToolError, ToolName};

/// Copies an item of the user's OneDrive. The copy itself runs
/// asynchronously in the service; success means the job was accepted.
pub struct CopyOneDriveFileTool {
    api: Arc<dyn SharePointApi>,
}

impl CopyOneDriveFileTool {
    pub fn new(api: Arc<dyn SharePointApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolTrait for CopyOneDriveFileTool {
    fn name(&self) -> &str {
        ToolName::CopyOneDriveFile.as_str()
    }

    fn definition(&self) -> Tool {
        Tool::function(
            self.name(),
            "Copy a file from the user's OneDrive into a folder of a document library or drive. \
             An existing file with the same name is replaced. The copy completes in the background.",
            json!({
                "type": "object",
                "properties": {
                    "file_id": {
                        "type": "string",
                        "description": "Id of the OneDrive file to copy."
                    },
                    "drive_id": {
                        "type": "string",
                        "description": "Id of the destination drive."
                    },
                    "folder_id": {
                        "type": "string",
                        "description": "Id of the destination folder."
                    }
                },
                "required": ["file_id", "drive_id", "folder_id"]
            }),
        )
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let file_id = required_str(&args, "file_id")?;
        let drive_id = required_str(&args, "drive_id")?;
        let folder_id = required_str(&args, "folder_id")?;
        let creds = credentials(&[ContextKey::OboAccessToken])?;

        self.api
            .copy_item(&creds, file_id, drive_id, folder_id)
            .await?;
        info!("copy of {} into {}/{} accepted", file_id, drive_id, folder_id);
        Ok(json!({ "success": true, "status": "accepted" }))
    }
}
