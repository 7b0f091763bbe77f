//! Tool registry and dispatch.

use futures::FutureExt;
use genie::ToolCall;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

use super::builtins::{
    CopyOneDriveFileTool, GetDriveIdTool, GetFolderIdTool, GetOneDriveIdTool,
    GetSiteAnalyticsTool, RecentOneDriveFilesTool, RecentSharePointFilesTool, SummarizeFileTool,
    UpdateFileMetadataTool,
};
use super::{Tool, ToolError, ToolName, ToolOutcome};
use crate::graph::SharePointApi;
use crate::summarize::DocumentSummarizer;

/// Registry for managing available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    call_timeout: Option<Duration>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The nine SharePoint/OneDrive tools.
    pub fn sharepoint(
        api: Arc<dyn SharePointApi>,
        summarizer: Arc<dyn DocumentSummarizer>,
    ) -> Self {
        let mut registry = Self::new();
        for name in ToolName::ALL {
            let tool: Arc<dyn Tool> = match name {
                ToolName::GetOneDriveId => Arc::new(GetOneDriveIdTool::new(api.clone())),
                ToolName::GetDriveId => Arc::new(GetDriveIdTool::new(api.clone())),
                ToolName::GetFolderId => Arc::new(GetFolderIdTool::new(api.clone())),
                ToolName::RecentSharePointFiles => {
                    Arc::new(RecentSharePointFilesTool::new(api.clone()))
                }
                ToolName::RecentOneDriveFiles => {
                    Arc::new(RecentOneDriveFilesTool::new(api.clone()))
                }
                ToolName::CopyOneDriveFile => Arc::new(CopyOneDriveFileTool::new(api.clone())),
                ToolName::SummarizeFile => {
                    Arc::new(SummarizeFileTool::new(api.clone(), summarizer.clone()))
                }
                ToolName::UpdateFileMetadata => Arc::new(UpdateFileMetadataTool::new(api.clone())),
                ToolName::GetSiteAnalytics => Arc::new(GetSiteAnalyticsTool::new(api.clone())),
            };
            registry.add(tool);
        }
        registry
    }

    pub fn add(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Bounds every [`ToolRegistry::dispatch`].
    pub fn set_call_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.call_timeout = timeout;
        self
    }

    /// Definitions sorted by name.
    pub fn definitions(&self) -> Vec<genie::chat::Tool> {
        let mut defs: Vec<_> = self.tools.values().map(|tool| tool.definition()).collect();
        defs.sort_by(|a, b| a.function.name.cmp(&b.function.name));
        defs
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs one requested call. Never fails: every problem, including a
    /// panicking tool, becomes a [`ToolOutcome::Failure`].
    #[instrument(
        name = "agent.tool_call",
        skip(self, call),
        fields(
            tool_name = %call.function.name,
            tool_call_id = %call.id,
            is_error = tracing::field::Empty
        )
    )]
    pub async fn dispatch(&self, call: &ToolCall) -> ToolOutcome {
        let outcome = match self.run(call).await {
            Ok(value) => ToolOutcome::Success(value),
            Err(err) => {
                debug!("tool {} failed: {}", call.function.name, err);
                ToolOutcome::from(err)
            }
        };
        tracing::Span::current().record("is_error", outcome.is_error());
        outcome
    }

    async fn run(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let tool = self
            .find(&call.function.name)
            .ok_or_else(|| ToolError::UnknownTool(call.function.name.clone()))?;
        let args = parse_arguments(&call.function.arguments)?;

        let guarded = AssertUnwindSafe(tool.call(args)).catch_unwind();
        let result = match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .map_err(|_| ToolError::Timeout(limit.as_secs()))?,
            None => guarded.await,
        };
        result.unwrap_or_else(|panic| {
            let reason = panic_message(panic.as_ref());
            warn!("tool {} panicked: {}", call.function.name, reason);
            Err(ToolError::Internal(format!("tool panicked: {}", reason)))
        })
    }
}

/// Arguments must be a JSON object; an empty string counts as `{}`.
fn parse_arguments(raw: &str) -> Result<Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Value::Object(map)),
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(other) => Err(ToolError::InvalidArguments(format!(
            "arguments must be a JSON object, got {}",
            other
        ))),
        Err(e) => Err(ToolError::InvalidArguments(format!(
            "arguments are not valid JSON: {}",
            e
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
