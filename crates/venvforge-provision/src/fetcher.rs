//! Archive fetcher: HTTP body → gunzip → untar, in one streaming pass.

use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use futures_util::StreamExt;
use tokio_util::io::{StreamReader, SyncIoBridge};
use tokio_util::sync::CancellationToken;

use crate::error::{ProvisionError, Result};
use crate::pipeline::Stage;
use crate::sink::{Action, ProgressEvent, ProvisionSink};

#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    http: reqwest::Client,
}

impl ArchiveFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Replace `destination` with the unpacked contents of the `.tar.gz` at `url`.
    pub async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        sink: &dyn ProvisionSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        remove_dir_if_exists(destination).map_err(|source| {
            ProvisionError::StagingCleanupFailed {
                path: destination.to_path_buf(),
                source,
            }
        })?;

        sink.on_progress(&ProgressEvent::new(Action::Downloading, url));
        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProvisionError::Cancelled { stage: Stage::Fetching }),
            resp = self.http.get(url).send() => resp,
        }
        .and_then(|r| r.error_for_status())
        .map_err(|e| ProvisionError::network(url, e))?;

        std::fs::create_dir_all(destination).map_err(|source| ProvisionError::Extraction {
            path: destination.to_path_buf(),
            source,
        })?;
        sink.on_progress(&ProgressEvent::new(Action::Extracting, url));

        // Ending the body early on cancel makes the untar worker fail fast
        // instead of draining the whole download.
        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(io::Error::other))
            .take_until(cancel.clone().cancelled_owned());
        let reader = SyncIoBridge::new(StreamReader::new(Box::pin(body)));
        let dest = destination.to_path_buf();
        let unpacked = tokio::task::spawn_blocking(move || unpack(reader, &dest))
            .await
            .map_err(|e| ProvisionError::Extraction {
                path: destination.to_path_buf(),
                source: io::Error::other(e),
            })?;

        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled {
                stage: Stage::Fetching,
            });
        }
        unpacked.map_err(|source| classify(url, destination.to_path_buf(), source))
    }
}

fn unpack<R: io::Read>(reader: R, dest: &Path) -> io::Result<()> {
    let mut archive = tar::Archive::new(GzDecoder::new(reader));
    archive.unpack(dest)
}

/// Transport errors tunnel through the gzip/tar readers as `io::Error`;
/// walk the chain so they surface as network failures.
fn classify(url: &str, path: PathBuf, err: io::Error) -> ProvisionError {
    let mut current: Option<&(dyn StdError + 'static)> =
        err.get_ref().map(|e| e as &(dyn StdError + 'static));
    while let Some(e) = current {
        if let Some(transport) = e.downcast_ref::<reqwest::Error>() {
            return ProvisionError::network(url, transport);
        }
        current = match e.downcast_ref::<io::Error>() {
            Some(inner) => inner.get_ref().map(|e| e as &(dyn StdError + 'static)),
            None => e.source(),
        };
    }
    ProvisionError::Extraction { path, source: err }
}

pub(crate) fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    async fn serve(route: &str, body: Vec<u8>, status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_bytes(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_fetch_replaces_staging_contents() {
        let server = serve(
            "/virtualenv-1.2.0.tar.gz",
            tarball(&[("virtualenv-1.2.0/virtualenv.py", "print('hi')\n")]),
            200,
        )
        .await;
        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path().join("sources");
        std::fs::create_dir_all(staging.join("virtualenv-1.0.0")).unwrap();
        std::fs::write(staging.join("virtualenv-1.0.0/stale.txt"), "old").unwrap();

        let sink = MemorySink::default();
        let url = format!("{}/virtualenv-1.2.0.tar.gz", server.uri());
        ArchiveFetcher::new(reqwest::Client::new())
            .fetch(&url, &staging, &sink, &CancellationToken::new())
            .await
            .unwrap();

        assert!(staging.join("virtualenv-1.2.0/virtualenv.py").is_file());
        assert!(!staging.join("virtualenv-1.0.0").exists());
        assert_eq!(sink.actions(), vec![Action::Downloading, Action::Extracting]);
    }

    #[tokio::test]
    async fn test_http_error_is_network_error() {
        let server = serve("/missing.tar.gz", Vec::new(), 404).await;
        let tmp = tempfile::tempdir().unwrap();
        let url = format!("{}/missing.tar.gz", server.uri());
        let err = ArchiveFetcher::new(reqwest::Client::new())
            .fetch(&url, &tmp.path().join("sources"), &MemorySink::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Network { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_extraction_error() {
        let server = serve("/broken.tar.gz", b"definitely not gzip".to_vec(), 200).await;
        let tmp = tempfile::tempdir().unwrap();
        let url = format!("{}/broken.tar.gz", server.uri());
        let err = ArchiveFetcher::new(reqwest::Client::new())
            .fetch(&url, &tmp.path().join("sources"), &MemorySink::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Extraction { .. }));
    }

    /// Serve `body` once with its full Content-Length, but close the
    /// connection after sending only the first half.
    async fn serve_truncated(body: Vec<u8>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/gzip\r\nContent-Length: {}\r\n\r\n",
                body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&body[..body.len() / 2]).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}/virtualenv-1.2.0.tar.gz", addr)
    }

    #[tokio::test]
    async fn test_connection_lost_mid_extraction_is_network_error() {
        // Poorly compressible content so the cut lands inside file data.
        let mut seed = 0x2545_f491_u32;
        let content: String = (0..256 * 1024)
            .map(|_| {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                char::from(b'a' + (seed >> 16) as u8 % 26)
            })
            .collect();
        let url = serve_truncated(tarball(&[("virtualenv-1.2.0/virtualenv.py", &content)])).await;

        let tmp = tempfile::tempdir().unwrap();
        let err = ArchiveFetcher::new(reqwest::Client::new())
            .fetch(&url, &tmp.path().join("sources"), &MemorySink::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::Network { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_cancelled_before_download() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let tmp = tempfile::tempdir().unwrap();
        let err = ArchiveFetcher::new(reqwest::Client::new())
            .fetch("http://127.0.0.1:9/never.tar.gz", &tmp.path().join("sources"), &MemorySink::default(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
