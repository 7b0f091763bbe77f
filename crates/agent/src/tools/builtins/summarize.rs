use async_trait::async_trait;
use genie::chat::Tool;
use serde_json::{Value, json};
use std::sync::Arc;

use super::helpers::{credentials, required_str};
use crate::context::ContextKey;
use crate::graph::SharePointApi;
use crate::summarize::DocumentSummarizer;
use crate::tools::{Tool as ToolTrait, ToolError, ToolName};

pub struct SummarizeFileTool {
    api: Arc<dyn SharePointApi>,
    summarizer: Arc<dyn DocumentSummarizer>,
}

impl SummarizeFileTool {
    pub fn new(api: Arc<dyn SharePointApi>, summarizer: Arc<dyn DocumentSummarizer>) -> Self {
        Self { api, summarizer }
    }
}

#[async_trait]
impl ToolTrait for SummarizeFileTool {
    fn name(&self) -> &str {
        ToolName::SummarizeFile.as_str()
    }

    fn definition(&self) -> Tool {
        Tool::function(
            self.name(),
            "Summarize a PDF, Word, PowerPoint, Excel or text document stored at the root of a \
             document library. Returns a short title, a neutral 3-4 sentence summary, and a \
             \"Summary\" metadata value ready for update_file_metadata.",
            json!({
                "type": "object",
                "properties": {
                    "drive_id": {
                        "type": "string",
                        "description": "Id of the document library containing the file."
                    },
                    "file_name": {
                        "type": "string",
                        "description": "Name of the document, including its extension."
                    }
                },
                "required": ["drive_id", "file_name"]
            }),
        )
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let drive_id = required_str(&args, "drive_id")?;
        let file_name = required_str(&args, "file_name")?;
        let creds = credentials(&[ContextKey::AccessToken])?;

        let file = self.api.download_by_name(&creds, drive_id, file_name).await?;
        let summary = self
            .summarizer
            .summarize(&file.name, &file.mime_type, file.bytes)
            .await?;
        Ok(json!({
            "title": summary.title,
            "summary": summary.summary,
            "metadata": { "Summary": summary.metadata_value() },
        }))
    }
}
