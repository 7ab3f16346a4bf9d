//! HTTP clients for the Microsoft Graph endpoints the uploader drives and
//! for Azure block-blob uploads.
//!
//! Both sit behind object-safe traits ([`GraphApi`], [`BlobStorage`]) so
//! the upload pipeline can be exercised against in-memory mocks.

mod blob;
mod client;
mod error;

use std::future::Future;
use std::pin::Pin;

pub use blob::{BlobStorage, HttpBlobStorage};
pub use client::{DEFAULT_BASE_URL, GraphApi, GraphClient};
pub use error::ApiError;

/// Boxed future returned by the client traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[cfg(test)]
pub(crate) mod testutil {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    /// Reads one HTTP/1.1 request (head plus `Content-Length` body).
    pub(crate) async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let len = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Serves `responses` in order, one per connection, forwarding each raw
    /// request to the returned channel.
    pub(crate) async fn mock_server(
        responses: Vec<(u16, String)>,
    ) -> (String, mpsc::UnboundedReceiver<String>, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}");
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let _ = tx.send(read_request(&mut stream).await);
                let resp = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, rx, handle)
    }
}
