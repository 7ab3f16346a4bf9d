use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::DownloadError;

/// Streams `url` to `dest`, returning the number of bytes written.
///
/// The body is written to `<dest>.part` first and renamed on success, so an
/// interrupted download never leaves a file at `dest`.
pub async fn download_file(
    http: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<u64, DownloadError> {
    let mut resp = http.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let part = part_path(dest);
    let mut file = tokio::fs::File::create(&part).await?;
    let mut written: u64 = 0;

    let result = async {
        while let Some(chunk) = resp.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok::<(), DownloadError>(())
    }
    .await;

    drop(file);
    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(e);
    }

    tokio::fs::rename(&part, dest).await?;
    debug!(url, dest = %dest.display(), bytes = written, "download complete");
    Ok(written)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
