use super::propfind::{parse_multistatus, propfind_body};
use super::{E2eeTransport, FolderEntry, FolderProperty, LockResponse, MetadataResponse};
use crate::{DropError, FolderId, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::Deserialize;

const E2EE_API: [&str; 6] = [
    "ocs",
    "v2.php",
    "apps",
    "end_to_end_encryption",
    "api",
    "v1",
];

const TOKEN_HEADER: &str = "e2e-token";

/// HTTP transport for the WebDAV listing and the OCS end-to-end encryption
/// API of one account.
#[derive(Clone)]
pub struct OcsClient {
    client: Client,
    server_url: Url,
    user: String,
    password: String,
}

impl std::fmt::Debug for OcsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcsClient")
            .field("server_url", &self.server_url.as_str())
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct OcsEnvelope<T> {
    ocs: OcsBody<T>,
}

#[derive(Debug, Deserialize)]
struct OcsBody<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct LockData {
    #[serde(rename = "e2e-token")]
    token: String,
}

#[derive(Debug, Deserialize)]
struct MetadataData {
    #[serde(rename = "meta-data")]
    meta_data: String,
}

impl OcsClient {
    pub fn new(client: Client, server_url: Url, user: String, password: String) -> Self {
        Self {
            client,
            server_url,
            user,
            password,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.server_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DropError::Config(format!(
                    "server url '{}' cannot be used as a base url",
                    self.server_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn dav_url(&self, path: &str) -> Result<Url> {
        let components = path.split('/').filter(|component| !component.is_empty());
        self.endpoint(
            ["remote.php", "dav", "files", self.user.as_str()]
                .into_iter()
                .chain(components),
        )
    }

    fn e2ee_url(&self, resource: &str, folder_id: &FolderId) -> Result<Url> {
        let folder_id = folder_id.to_string();
        let mut segments = E2EE_API.to_vec();
        segments.push(resource);
        segments.push(folder_id.as_str());

        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut().append_pair("format", "json");
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response> {
        let request = self
            .client
            .request(method, url)
            .basic_auth(&self.user, Some(&self.password))
            .header("OCS-APIREQUEST", "true");

        Ok(build(request).send().await?)
    }
}

async fn ensure_success(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(DropError::Http {
        status: status.as_u16(),
        message: format!("{} failed: {}", context, body.trim()),
    })
}

async fn decode_ocs<T: serde::de::DeserializeOwned>(response: Response, context: &str) -> Result<T> {
    let body = response.bytes().await?;
    let envelope: OcsEnvelope<T> = serde_json::from_slice(&body).inspect_err(|error| {
        tracing::warn!("{} returned an invalid body: {}", context, error);
    })?;
    Ok(envelope.ocs.data)
}

fn token_str(token: &[u8]) -> Result<&str> {
    std::str::from_utf8(token)
        .map_err(|_| DropError::InvalidRequest("lock token is not valid utf-8".to_string()))
}

#[async_trait]
impl E2eeTransport for OcsClient {
    async fn list_folder(
        &self,
        path: &str,
        properties: &[FolderProperty],
    ) -> Result<Vec<FolderEntry>> {
        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|error| DropError::Internal(format!("invalid method: {}", error)))?;
        let url = self.dav_url(path)?;
        let body = propfind_body(properties);

        let response = self
            .send(method, url, |request| {
                request
                    .header("Depth", "0")
                    .header(reqwest::header::CONTENT_TYPE, "application/xml; charset=utf-8")
                    .body(body)
            })
            .await?;
        let response = ensure_success(response, "PROPFIND").await?;

        let text = response.text().await?;
        parse_multistatus(&text)
    }

    async fn lock_folder(&self, folder_id: &FolderId) -> Result<LockResponse> {
        let url = self.e2ee_url("lock", folder_id)?;
        let response = self.send(Method::POST, url, |request| request).await?;
        let response = ensure_success(response, "lock").await?;

        let data: LockData = decode_ocs(response, "lock").await?;
        if data.token.is_empty() {
            // The server may still hold the lock; only a manual unlock can clear it.
            tracing::error!(
                "lock of folder_id={} returned an empty token, folder may stay locked",
                folder_id
            );
            return Err(DropError::Deserialization(format!(
                "lock of folder {} returned an empty token",
                folder_id
            )));
        }

        Ok(LockResponse {
            folder_id: folder_id.clone(),
            token: Bytes::from(data.token),
        })
    }

    async fn unlock_folder(&self, folder_id: &FolderId, token: &[u8]) -> Result<FolderId> {
        let token = token_str(token)?.to_string();
        let url = self.e2ee_url("lock", folder_id)?;
        let response = self
            .send(Method::DELETE, url, |request| request.header(TOKEN_HEADER, token))
            .await?;
        ensure_success(response, "unlock").await?;

        Ok(folder_id.clone())
    }

    async fn get_metadata(&self, folder_id: &FolderId) -> Result<MetadataResponse> {
        let url = self.e2ee_url("meta-data", folder_id)?;
        let response = self.send(Method::GET, url, |request| request).await?;
        let response = ensure_success(response, "get metadata").await?;
        let status = response.status().as_u16();

        let data: MetadataData = decode_ocs(response, "get metadata").await?;
        Ok(MetadataResponse {
            document: Bytes::from(data.meta_data),
            status,
        })
    }

    async fn update_metadata(
        &self,
        folder_id: &FolderId,
        document: &Bytes,
        token: &[u8],
    ) -> Result<FolderId> {
        let token = token_str(token)?.to_string();
        let document = std::str::from_utf8(document)
            .map_err(|_| DropError::InvalidRequest("metadata is not valid utf-8".to_string()))?
            .to_string();

        let url = self.e2ee_url("meta-data", folder_id)?;
        let response = self
            .send(Method::PUT, url, |request| {
                request.form(&[("metaData", document), (TOKEN_HEADER, token)])
            })
            .await?;
        ensure_success(response, "update metadata").await?;

        Ok(folder_id.clone())
    }
}
