//! Azure block-blob uploads against a SAS URI.

use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::BoxFuture;
use crate::error::ApiError;

const BLOB_TYPE_HEADER: &str = "x-ms-blob-type";

/// Staged block upload to a pre-authorized blob URI.
pub trait BlobStorage: Send + Sync {
    /// Stages one block under `block_id`.
    fn put_block<'a>(
        &'a self,
        sas_uri: &'a str,
        block_id: &'a str,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), ApiError>>;

    /// Commits the staged blocks listed in `block_list_xml`.
    fn put_block_list<'a>(
        &'a self,
        sas_uri: &'a str,
        block_list_xml: String,
    ) -> BoxFuture<'a, Result<(), ApiError>>;
}

/// `reqwest`-backed [`BlobStorage`]. The SAS URI is the only credential.
#[derive(Clone)]
pub struct HttpBlobStorage {
    http: reqwest::Client,
}

impl HttpBlobStorage {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

async fn check(resp: reqwest::Response) -> Result<(), ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}

impl BlobStorage for HttpBlobStorage {
    fn put_block<'a>(
        &'a self,
        sas_uri: &'a str,
        block_id: &'a str,
        data: Vec<u8>,
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            let len = data.len();
            let resp = self
                .http
                .put(sas_uri)
                .query(&[("comp", "block"), ("blockid", block_id)])
                .header(BLOB_TYPE_HEADER, "BlockBlob")
                .body(data)
                .send()
                .await?;
            check(resp).await?;
            debug!(block_id, bytes = len, "block staged");
            Ok(())
        })
    }

    fn put_block_list<'a>(
        &'a self,
        sas_uri: &'a str,
        block_list_xml: String,
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            let resp = self
                .http
                .put(sas_uri)
                .query(&[("comp", "blocklist")])
                .header(CONTENT_TYPE, "application/xml")
                .body(block_list_xml)
                .send()
                .await?;
            check(resp).await
        })
    }
}
