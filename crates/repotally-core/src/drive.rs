//! Google Drive publishing for the private-repo report.
//!
//! Only the three calls the report needs are modelled. Authentication is a
//! pre-issued OAuth access token; obtaining one is left to the caller.

use camino::Utf8Path;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::DriveConfig;
use crate::http::{ApiError, Auth, HttpClient, Method, decode_json};

/// Environment variable holding a Drive access token.
pub const TOKEN_ENV: &str = "REPOTALLY_DRIVE_TOKEN";

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const BOUNDARY: &str = "repotally-report-boundary";

/// Errors from publishing to Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    /// A Drive API call failed.
    #[error("Google Drive request failed: {0}")]
    Api(#[from] ApiError),

    /// The token file could not be read.
    #[error("unable to read Drive token file {path}: {source}")]
    TokenFile {
        /// Token file path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// No token was supplied.
    #[error("no Google Drive access token; pass --drive-token-file or set {TOKEN_ENV}")]
    MissingToken,

    /// No destination folder was supplied.
    #[error("no Google Drive folder id; pass --folder-id or set drive.folder_id")]
    MissingFolder,
}

/// A file in Drive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File id.
    pub id: String,
    /// File name (`title` in the v2 API).
    pub name: String,
    /// MIME type; folders use `application/vnd.google-apps.folder`.
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl DriveFile {
    /// Whether this entry is a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// The Drive operations the report needs.
pub trait DriveApi {
    /// Non-trashed files directly inside a folder.
    fn list_folder(&self, folder_id: &str) -> Result<Vec<DriveFile>, DriveError>;

    /// Move a file to the trash.
    fn trash(&self, file_id: &str) -> Result<(), DriveError>;

    /// Upload a new plain-text file into a folder.
    fn upload(&self, folder_id: &str, name: &str, contents: &[u8]) -> Result<DriveFile, DriveError>;
}

/// [`DriveApi`] over the Drive v3 REST API.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: HttpClient,
    api_base: String,
    upload_base: String,
    auth: Auth,
}

impl DriveClient {
    /// Client using the configured endpoints and a bearer token.
    pub fn new(http: HttpClient, config: &DriveConfig, token: String) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
            auth: Auth::Bearer(token),
        }
    }
}

impl DriveApi for DriveClient {
    #[instrument(skip(self))]
    fn list_folder(&self, folder_id: &str) -> Result<Vec<DriveFile>, DriveError> {
        let url = format!("{}/files", self.api_base);
        let q = format!("'{folder_id}' in parents and trashed=false");
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("q", q.as_str()),
                ("fields", "nextPageToken,files(id,name,mimeType)"),
            ];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }
            let page: FileList = self.http.get_json(&url, &query, &self.auth)?;
            files.extend(page.files);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        debug!(files = files.len(), "folder listed");
        Ok(files)
    }

    #[instrument(skip(self))]
    fn trash(&self, file_id: &str) -> Result<(), DriveError> {
        let url = format!("{}/files/{file_id}", self.api_base);
        let body = json!({ "trashed": true }).to_string();
        self.http.send(
            Method::Patch,
            &url,
            &[],
            &self.auth,
            "application/json",
            body.as_bytes(),
        )?;
        Ok(())
    }

    #[instrument(skip(self, contents), fields(bytes = contents.len()))]
    fn upload(&self, folder_id: &str, name: &str, contents: &[u8]) -> Result<DriveFile, DriveError> {
        let url = format!("{}/files", self.upload_base);
        let body = multipart_body(folder_id, name, contents);
        let content_type = format!("multipart/related; boundary={BOUNDARY}");
        let text = self.http.send(
            Method::Post,
            &url,
            &[("uploadType", "multipart")],
            &self.auth,
            &content_type,
            &body,
        )?;
        Ok(decode_json(&url, &text)?)
    }
}

fn multipart_body(folder_id: &str, name: &str, contents: &[u8]) -> Vec<u8> {
    let metadata = json!({ "name": name, "parents": [folder_id], "mimeType": "text/plain" });
    let mut body = Vec::with_capacity(contents.len() + 256);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
             --{BOUNDARY}\r\nContent-Type: text/plain; charset=UTF-8\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Upload the report, then trash older same-named files in the folder.
/// A failed upload leaves the previous copy in place.
#[instrument(skip(api, contents), fields(bytes = contents.len()))]
pub fn publish_report(
    api: &dyn DriveApi,
    folder_id: &str,
    name: &str,
    contents: &[u8],
) -> Result<DriveFile, DriveError> {
    let uploaded = api.upload(folder_id, name, contents)?;
    info!(id = %uploaded.id, name = %uploaded.name, "report uploaded");
    for existing in api.list_folder(folder_id)? {
        if existing.name == name && !existing.is_folder() && existing.id != uploaded.id {
            debug!(id = %existing.id, "trashing previous report");
            api.trash(&existing.id)?;
        }
    }
    Ok(uploaded)
}

/// Pick the access token: a token file wins over the environment value.
pub fn resolve_token(file: Option<&Utf8Path>, env: Option<String>) -> Result<String, DriveError> {
    let token = match file {
        Some(path) => std::fs::read_to_string(path).map_err(|source| DriveError::TokenFile {
            path: path.to_string(),
            source,
        })?,
        None => env.unwrap_or_default(),
    };
    let token = token.trim();
    if token.is_empty() {
        return Err(DriveError::MissingToken);
    }
    Ok(token.to_string())
}
