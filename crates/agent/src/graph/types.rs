use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A page of a Graph collection response.
#[derive(Debug, Deserialize)]
pub(crate) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Drive {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    pub drive_id: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentitySet {
    pub user: Option<Identity>,
}

impl IdentitySet {
    fn display_name(&self) -> Option<String> {
        self.user.as_ref().and_then(|u| u.display_name.clone())
    }
}

/// A file or folder in a drive.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub last_modified_date_time: Option<String>,
    pub web_url: Option<String>,
    pub size: Option<u64>,
    pub parent_reference: Option<ItemReference>,
    pub file: Option<FileFacet>,
    pub folder: Option<Value>,
    pub created_by: Option<IdentitySet>,
    pub last_modified_by: Option<IdentitySet>,
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    pub download_url: Option<String>,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        self.folder.is_some()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.file.as_ref().and_then(|f| f.mime_type.as_deref())
    }

    pub fn drive_id(&self) -> Option<&str> {
        self.parent_reference
            .as_ref()
            .and_then(|p| p.drive_id.as_deref())
    }

    pub fn into_descriptor(self, download_url: Option<String>) -> FileDescriptor {
        let parent = self.parent_reference.unwrap_or_default();
        FileDescriptor {
            file_type: self.file.and_then(|f| f.mime_type),
            created_by: self.created_by.as_ref().and_then(IdentitySet::display_name),
            last_modified_by: self
                .last_modified_by
                .as_ref()
                .and_then(IdentitySet::display_name),
            name: self.name,
            modified: self.last_modified_date_time,
            web_url: self.web_url,
            id: self.id,
            size: self.size,
            drive_id: parent.drive_id,
            folder_id: parent.id,
            download_url,
        }
    }
}

/// The flattened view of a file handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDescriptor {
    pub name: String,
    pub modified: Option<String>,
    pub web_url: Option<String>,
    pub id: String,
    pub size: Option<u64>,
    pub drive_id: Option<String>,
    pub folder_id: Option<String>,
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    pub created_by: Option<String>,
    pub last_modified_by: Option<String>,
}

/// Content fetched for a named file.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}
