mod analytics;
mod copy;
mod drives;
mod files;
mod helpers;
mod metadata;
mod summarize;

pub use analytics::GetSiteAnalyticsTool;
pub use copy::CopyOneDriveFileTool;
pub use drives::{GetDriveIdTool, GetFolderIdTool, GetOneDriveIdTool};
pub use files::{RecentOneDriveFilesTool, RecentSharePointFilesTool};
pub use metadata::UpdateFileMetadataTool;
pub use summarize::SummarizeFileTool;
