use async_trait::async_trait;
use log::{debug, trace};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::time::Duration;
use url::Url;

use super::types::{Drive, DriveItem, Page};
use super::{DownloadedFile, GraphCredentials, GraphError, SharePointApi};

pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0/";

/// Upper bound on followed `@odata.nextLink` pages per search.
const MAX_PAGES: usize = 20;

/// [`SharePointApi`] over the Graph REST endpoints.
#[derive(Clone)]
pub struct GraphClient {
    http: Client,
    base_url: Url,
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemWithListItem {
    list_item: Option<IdOnly>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Me {
    display_name: Option<String>,
}

impl GraphClient {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, GraphError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, GraphError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GraphError::Format(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Like [`GraphClient::endpoint`], splitting `path` on `/` after `prefix`.
    fn path_endpoint(&self, prefix: &[&str], path: &str) -> Result<Url, GraphError> {
        let rest = path.split('/').filter(|s| !s.is_empty());
        self.endpoint(prefix.iter().copied().chain(rest))
    }

    async fn send(&self, rb: RequestBuilder) -> Result<Response, GraphError> {
        let resp = rb.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        debug!("Graph request failed with {}: {}", status, body);
        Err(GraphError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, token: &str) -> Result<T, GraphError> {
        trace!("GET {}", url);
        let resp = self.send(self.http.get(url).bearer_auth(token)).await?;
        Ok(resp.json::<T>().await?)
    }

    /// GET that treats 404 as absent.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        url: Url,
        token: &str,
    ) -> Result<Option<T>, GraphError> {
        match self.get_json(url, token).await {
            Ok(value) => Ok(Some(value)),
            Err(GraphError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn search_url(&self, prefix: &[&str], query: &str, top: usize) -> Result<Url, GraphError> {
        let term = format!("search(q='{}')", query.replace('\'', "''"));
        let mut url = self.endpoint(prefix.iter().copied().chain([term.as_str()]))?;
        url.set_query(Some(&format!(
            "$orderby=lastModifiedDateTime%20desc&$top={}",
            (top * 2).max(20)
        )));
        Ok(url)
    }

    /// Follows `@odata.nextLink` until `top` files are collected.
    async fn search_files(
        &self,
        mut url: Url,
        token: &str,
        top: usize,
    ) -> Result<Vec<DriveItem>, GraphError> {
        let mut files = Vec::new();
        for _ in 0..MAX_PAGES {
            let page: Page<DriveItem> = self.get_json(url, token).await?;
            files.extend(page.value.into_iter().filter(|item| !item.is_folder()));
            if files.len() >= top {
                break;
            }
            match page.next_link {
                Some(next) => url = Url::parse(&next)?,
                None => break,
            }
        }
        files.truncate(top);
        Ok(files)
    }
}

#[async_trait]
impl SharePointApi for GraphClient {
    async fn my_drive_id(&self, creds: &GraphCredentials) -> Result<String, GraphError> {
        let drive: IdOnly = self
            .get_json(self.endpoint(["me", "drive"])?, creds.obo_token()?)
            .await?;
        Ok(drive.id)
    }

    async fn drive_id_by_name(
        &self,
        creds: &GraphCredentials,
        library_name: &str,
    ) -> Result<Option<String>, GraphError> {
        let token = creds.app_token()?;
        let wanted = library_name.to_lowercase();
        let mut url = self.endpoint(["sites", creds.site_id()?, "drives"])?;
        for _ in 0..MAX_PAGES {
            let page: Page<Drive> = self.get_json(url, token).await?;
            if let Some(drive) = page
                .value
                .into_iter()
                .find(|d| d.name.to_lowercase() == wanted)
            {
                return Ok(Some(drive.id));
            }
            match page.next_link {
                Some(next) => url = Url::parse(&next)?,
                None => break,
            }
        }
        Ok(None)
    }

    async fn folder_id(
        &self,
        creds: &GraphCredentials,
        drive_id: &str,
        folder_path: &str,
    ) -> Result<Option<String>, GraphError> {
        if drive_id.is_empty() {
            return Ok(None);
        }
        let token = creds.app_token()?;
        let trimmed = folder_path.trim_matches('/');
        let url = if trimmed.is_empty() {
            self.endpoint(["drives", drive_id, "root"])?
        } else {
            self.path_endpoint(&["drives", drive_id, "root:"], trimmed)?
        };
        let item: Option<IdOnly> = self.get_optional(url, token).await?;
        Ok(item.map(|i| i.id))
    }

    async fn recent_drive_files(
        &self,
        creds: &GraphCredentials,
        drive_id: &str,
        query: &str,
        top: usize,
    ) -> Result<Vec<DriveItem>, GraphError> {
        let url = self.search_url(&["drives", drive_id, "root"], query, top)?;
        self.search_files(url, creds.obo_token()?, top).await
    }

    async fn recent_my_files(
        &self,
        creds: &GraphCredentials,
        query: &str,
        top: usize,
    ) -> Result<Vec<DriveItem>, GraphError> {
        let url = self.search_url(&["me", "drive", "root"], query, top)?;
        self.search_files(url, creds.obo_token()?, top).await
    }

    async fn download_url(
        &self,
        creds: &GraphCredentials,
        drive_id: &str,
        item_id: &str,
    ) -> Result<Option<String>, GraphError> {
        let item: DriveItem = self
            .get_json(
                self.endpoint(["drives", drive_id, "items", item_id])?,
                creds.obo_token()?,
            )
            .await?;
        Ok(item.download_url)
    }

    async fn copy_item(
        &self,
        creds: &GraphCredentials,
        item_id: &str,
        dest_drive_id: &str,
        dest_folder_id: &str,
    ) -> Result<(), GraphError> {
        let mut url = self.endpoint(["me", "drive", "items", item_id, "copy"])?;
        url.set_query(Some("@microsoft.graph.conflictBehavior=replace"));
        let body = json!({
            "parentReference": { "driveId": dest_drive_id, "id": dest_folder_id }
        });
        let resp = self
            .send(self.http.post(url).bearer_auth(creds.obo_token()?).json(&body))
            .await?;
        if resp.status() != StatusCode::ACCEPTED {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GraphError::Status { status, body });
        }
        debug!("copy of {} accepted", item_id);
        Ok(())
    }

    async fn update_item_fields(
        &self,
        creds: &GraphCredentials,
        drive_id: &str,
        item_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Value, GraphError> {
        let token = creds.obo_token()?;
        let site_id = creds.site_id()?;

        let mut item_url = self.endpoint(["drives", drive_id, "items", item_id])?;
        item_url.set_query(Some("expand=listItem"));
        let item: ItemWithListItem = self.get_json(item_url, token).await?;
        let list_item_id = item
            .list_item
            .ok_or_else(|| GraphError::NotFound(format!("list item for {}", item_id)))?
            .id;

        let list: IdOnly = self
            .get_json(self.endpoint(["drives", drive_id, "list"])?, token)
            .await?;

        let url = self.endpoint([
            "sites",
            site_id,
            "lists",
            list.id.as_str(),
            "items",
            list_item_id.as_str(),
            "fields",
        ])?;
        let resp = self
            .send(self.http.patch(url).bearer_auth(token).json(fields))
            .await?;
        if resp.status() != StatusCode::OK {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(GraphError::Status { status, body });
        }
        Ok(resp.json::<Value>().await?)
    }

    async fn site_analytics(&self, creds: &GraphCredentials) -> Result<Option<Value>, GraphError> {
        let url = self.endpoint(["sites", creds.site_id()?, "analytics", "allTime"])?;
        self.get_optional(url, creds.app_token()?).await
    }

    async fn download_by_name(
        &self,
        creds: &GraphCredentials,
        drive_id: &str,
        file_name: &str,
    ) -> Result<DownloadedFile, GraphError> {
        let url = self.path_endpoint(&["drives", drive_id, "root:"], file_name)?;
        let item: DriveItem = self.get_json(url, creds.app_token()?).await?;
        let mime_type = item
            .mime_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let download_url = item
            .download_url
            .ok_or_else(|| GraphError::Format(format!("{} has no download URL", item.name)))?;

        // Download URLs are pre-authenticated.
        let resp = self.send(self.http.get(download_url)).await?;
        let bytes = resp.bytes().await?.to_vec();
        debug!("downloaded {} ({} bytes, {})", item.name, bytes.len(), mime_type);
        Ok(DownloadedFile {
            name: item.name,
            mime_type,
            bytes,
        })
    }

    async fn my_display_name(
        &self,
        creds: &GraphCredentials,
    ) -> Result<Option<String>, GraphError> {
        let me: Me = self
            .get_json(self.endpoint(["me"])?, creds.obo_token()?)
            .await?;
        Ok(me.display_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds() -> GraphCredentials {
        GraphCredentials {
            site_id: Some("site-1".to_string()),
            access_token: Some("app-token".to_string()),
            obo_access_token: Some("obo-token".to_string()),
        }
    }

    async fn client(server: &MockServer) -> GraphClient {
        let base = Url::parse(&format!("{}/v1.0/", server.uri())).unwrap();
        GraphClient::new(base, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn drive_lookup_ignores_case() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/sites/site-1/drives"))
            .and(bearer_token("app-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"id": "drive-a", "name": "Policies"},
                    {"id": "drive-b", "name": "Documents"}
                ]
            })))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let found = client.drive_id_by_name(&creds(), "documents").await.unwrap();
        assert_eq!(found.as_deref(), Some("drive-b"));

        let missing = client.drive_id_by_name(&creds(), "Archive").await.unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn folder_lookup_uses_root_for_empty_path_and_404_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/drives/d1/root"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "root-id"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/drives/d1/root:/Reports/Q1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "q1-id"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/drives/d1/root:/Nope"))
            .respond_with(ResponseTemplate::new(404).set_body_string("itemNotFound"))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let root = client.folder_id(&creds(), "d1", "").await.unwrap();
        assert_eq!(root.as_deref(), Some("root-id"));
        let nested = client.folder_id(&creds(), "d1", "/Reports/Q1/").await.unwrap();
        assert_eq!(nested.as_deref(), Some("q1-id"));
        let missing = client.folder_id(&creds(), "d1", "Nope").await.unwrap();
        assert_eq!(missing, None);
        assert_eq!(client.folder_id(&creds(), "", "x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn search_follows_next_link_and_skips_folders() {
        let server = MockServer::start().await;
        let next = format!("{}/v1.0/page-2", server.uri());
        Mock::given(method("GET"))
            .and(path("/v1.0/drives/d1/root/search(q='report')"))
            .and(query_param("$top", "20"))
            .and(bearer_token("obo-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"id": "f1", "name": "report.docx", "file": {"mimeType": "application/msword"}},
                    {"id": "dir", "name": "reports", "folder": {"childCount": 2}}
                ],
                "@odata.nextLink": next
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"id": "f2", "name": "report-2.pdf", "file": {"mimeType": "application/pdf"}},
                    {"id": "f3", "name": "report-3.pdf", "file": {"mimeType": "application/pdf"}}
                ]
            })))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let files = client
            .recent_drive_files(&creds(), "d1", "report", 2)
            .await
            .unwrap();
        let ids: Vec<_> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2"]);
    }

    #[tokio::test]
    async fn search_surfaces_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/me/drive/root/search(q='.')"))
            .respond_with(ResponseTemplate::new(403).set_body_string("accessDenied"))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let err = client.recent_my_files(&creds(), ".", 5).await.unwrap_err();
        assert!(matches!(err, GraphError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn copy_requires_accepted_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1.0/me/drive/items/file-1/copy"))
            .and(query_param("@microsoft.graph.conflictBehavior", "replace"))
            .and(body_json(json!({"parentReference": {"driveId": "d2", "id": "folder-9"}})))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1.0/me/drive/items/file-2/copy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = client(&server).await;
        client
            .copy_item(&creds(), "file-1", "d2", "folder-9")
            .await
            .unwrap();
        let err = client
            .copy_item(&creds(), "file-2", "d2", "folder-9")
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Status { status: 200, .. }));
    }

    #[tokio::test]
    async fn metadata_update_chains_three_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/drives/d1/items/file-1"))
            .and(query_param("expand", "listItem"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "file-1", "listItem": {"id": "42"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/drives/d1/list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "list-7"})))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/v1.0/sites/site-1/lists/list-7/items/42/fields"))
            .and(body_json(json!({"Summary": "Title|Body"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"Summary": "Title|Body"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let mut fields = Map::new();
        fields.insert("Summary".to_string(), json!("Title|Body"));
        let patched = client
            .update_item_fields(&creds(), "d1", "file-1", &fields)
            .await
            .unwrap();
        assert_eq!(patched["Summary"], "Title|Body");
    }

    #[tokio::test]
    async fn metadata_update_stops_when_list_lookup_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.0/drives/d1/items/file-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "file-1", "listItem": {"id": "42"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/drives/d1/list"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let err = client
            .update_item_fields(&creds(), "d1", "file-1", &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn download_by_name_fetches_bytes_without_bearer() {
        let server = MockServer::start().await;
        let download = format!("{}/blob/notes.txt", server.uri());
        Mock::given(method("GET"))
            .and(path("/v1.0/drives/d1/root:/notes.txt"))
            .and(bearer_token("app-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "n1",
                "name": "notes.txt",
                "file": {"mimeType": "text/plain"},
                "@microsoft.graph.downloadUrl": download
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blob/notes.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .mount(&server)
            .await;

        let client = client(&server).await;
        let file = client
            .download_by_name(&creds(), "d1", "notes.txt")
            .await
            .unwrap();
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.bytes, b"hello");
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server).await;
        let err = client
            .my_drive_id(&GraphCredentials::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GraphError::MissingCredential(crate::context::ContextKey::OboAccessToken)
        ));
    }
}
