use async_trait::async_trait;
use genie::chat::Tool;
use serde_json::{Value, json};
use std::sync::Arc;

use super::helpers::{credentials, required_str};
use crate::context::ContextKey;
use crate::graph::SharePointApi;
use crate::tools::{Tool as ToolTrait, ToolError, ToolName};

/// Writes list-item columns of a file. The list item and list lookups and the
/// final patch must all succeed.
pub struct UpdateFileMetadataTool {
    api: Arc<dyn SharePointApi>,
}

impl UpdateFileMetadataTool {
    pub fn new(api: Arc<dyn SharePointApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ToolTrait for UpdateFileMetadataTool {
    fn name(&self) -> &str {
        ToolName::UpdateFileMetadata.as_str()
    }

    fn definition(&self) -> Tool {
        Tool::function(
            self.name(),
            "Update metadata columns of a file in a document library or OneDrive.",
            json!({
                "type": "object",
                "properties": {
                    "drive_id": {
                        "type": "string",
                        "description": "Id of the drive containing the file."
                    },
                    "file_id": {
                        "type": "string",
                        "description": "Id of the file to update."
                    },
                    "metadata": {
                        "type": "object",
                        "description": "Column names and new values, e.g. {\"Summary\": \"Title|Summary\"}.",
                        "additionalProperties": true
                    }
                },
                "required": ["drive_id", "file_id", "metadata"]
            }),
        )
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let drive_id = required_str(&args, "drive_id")?;
        let file_id = required_str(&args, "file_id")?;
        let fields = match args.get("metadata") {
            Some(Value::Object(map)) if !map.is_empty() => map,
            Some(Value::Object(_)) => {
                return Err(ToolError::InvalidArguments(
                    "metadata must contain at least one field".to_string(),
                ));
            }
            _ => {
                return Err(ToolError::InvalidArguments(
                    "metadata must be an object".to_string(),
                ));
            }
        };
        let creds = credentials(&[ContextKey::OboAccessToken, ContextKey::SiteId])?;

        let patched = self
            .api
            .update_item_fields(&creds, drive_id, file_id, fields)
            .await?;
        Ok(json!({ "success": true, "fields": patched }))
    }
}
