// Configuration file and section endpoints
//
// Paths are relative to the directory holding the device's `config.yaml`.
// The device only serves `.yaml`, `.yml` and `.json` files.

use crate::client::BoneioClient;
use crate::error::Error;
use crate::models::{FileContent, FileItem, FilesResponse, StatusResponse};

impl BoneioClient {
    /// List the YAML tree, rooted at `path` when given.
    ///
    /// `GET /api/files?path=`
    pub async fn list_files(&self, path: Option<&str>) -> Result<Vec<FileItem>, Error> {
        let mut url = self.api_url(&["files"])?;
        if let Some(path) = path.filter(|p| !p.is_empty()) {
            url.query_pairs_mut().append_pair("path", path);
        }
        let resp: FilesResponse = self.get(url).await?;
        Ok(resp.items)
    }

    /// `GET /api/files/{path}`
    pub async fn get_file(&self, path: &str) -> Result<String, Error> {
        let url = self.file_url(path)?;
        let resp: FileContent = self.get(url).await?;
        Ok(resp.content)
    }

    /// Overwrite an existing file. The device refuses to create new files.
    ///
    /// `PUT /api/files/{path}`
    pub async fn put_file(&self, path: &str, content: &str) -> Result<StatusResponse, Error> {
        let url = self.file_url(path)?;
        self.put(
            url,
            &FileContent {
                content: content.to_owned(),
            },
        )
        .await
    }

    /// Replace one top-level section (`output`, `cover`, `mqtt`, ...) of
    /// `config.yaml`. The body is the section's new content.
    ///
    /// `PUT /api/config/{section}`
    pub async fn put_config_section(
        &self,
        section: &str,
        data: &serde_json::Value,
    ) -> Result<StatusResponse, Error> {
        let url = self.api_url(&["config", section])?;
        self.put(url, data).await
    }

    fn file_url(&self, path: &str) -> Result<url::Url, Error> {
        let mut segments = vec!["files"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        self.api_url(&segments)
    }
}
