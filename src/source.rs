//! Document byte sources.
//!
//! A [`ContentSource`] is a local path, a remote URI or a readable stream.
//! Its bytes are loaded on first use and kept for the life of the source.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;
use url::Url;

use crate::error::{ExtractError, Result};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

enum Origin {
    Path(PathBuf),
    Uri(Url),
    /// Taken on the first read; later reads use the cached buffer.
    Stream(Mutex<Option<BoxedReader>>),
}

/// Where a document's bytes come from.
pub struct ContentSource {
    origin: Origin,
    data: OnceCell<Vec<u8>>,
}

impl fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ContentSource");
        match &self.origin {
            Origin::Path(p) => s.field("path", p),
            Origin::Uri(u) => s.field("uri", &u.as_str()),
            Origin::Stream(_) => s.field("stream", &true),
        };
        s.field("loaded", &self.data.initialized()).finish()
    }
}

impl ContentSource {
    /// Classify a string input.
    ///
    /// An absolute URI with a scheme and host wins over a filesystem entry of
    /// the same name; anything else must be an existing path.
    pub fn resolve(input: &str) -> Result<Self> {
        if let Some(uri) = absolute_uri(input) {
            return match uri.scheme() {
                "http" | "https" => Ok(Self::with_origin(Origin::Uri(uri))),
                scheme => Err(ExtractError::UnsupportedInput(format!(
                    "cannot fetch {scheme} URI {input}"
                ))),
            };
        }

        let path = Path::new(input);
        if path.exists() {
            Ok(Self::with_origin(Origin::Path(path.to_path_buf())))
        } else {
            Err(ExtractError::NotFound(input.to_string()))
        }
    }

    /// Source reading `reader` to exhaustion once.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self::with_origin(Origin::Stream(Mutex::new(Some(Box::new(reader)))))
    }

    /// Source over an already buffered stream.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            origin: Origin::Stream(Mutex::new(None)),
            data: OnceCell::new_with(Some(data)),
        }
    }

    fn with_origin(origin: Origin) -> Self {
        Self {
            origin,
            data: OnceCell::new(),
        }
    }

    pub fn is_path(&self) -> bool {
        matches!(self.origin, Origin::Path(_))
    }

    pub fn is_uri(&self) -> bool {
        matches!(self.origin, Origin::Uri(_))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.origin, Origin::Stream(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            Origin::Path(p) => Some(p.as_path()),
            _ => None,
        }
    }

    pub fn uri(&self) -> Option<&Url> {
        match &self.origin {
            Origin::Uri(u) => Some(u),
            _ => None,
        }
    }

    /// The document bytes, loaded at most once.
    pub async fn bytes(&self, http: &reqwest::Client, fetch_timeout: Duration) -> Result<&[u8]> {
        self.data
            .get_or_try_init(|| self.load(http, fetch_timeout))
            .await
            .map(Vec::as_slice)
    }

    async fn load(&self, http: &reqwest::Client, fetch_timeout: Duration) -> Result<Vec<u8>> {
        match &self.origin {
            Origin::Path(path) => {
                debug!(name: "source.read", path = %path.display(), "Reading document file");
                Ok(tokio::fs::read(path).await?)
            }
            Origin::Uri(uri) => fetch(http, uri, fetch_timeout).await,
            Origin::Stream(reader) => {
                let mut reader = reader.lock().await.take().ok_or_else(|| {
                    ExtractError::Io(std::io::Error::other(
                        "stream was consumed by an earlier failed read",
                    ))
                })?;
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                debug!(name: "source.stream", bytes = buf.len(), "Read document stream");
                Ok(buf)
            }
        }
    }
}

fn absolute_uri(input: &str) -> Option<Url> {
    Url::parse(input)
        .ok()
        .filter(|u| u.host_str().is_some_and(|h| !h.is_empty()))
}

async fn fetch(http: &reqwest::Client, uri: &Url, timeout: Duration) -> Result<Vec<u8>> {
    debug!(name: "source.fetch", uri = %uri, "Fetching remote document");

    let response = http
        .get(uri.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ExtractError::Fetch(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ExtractError::Fetch(format!(
            "GET {uri} returned {}",
            response.status()
        )));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ExtractError::Fetch(e.to_string()))?;
    Ok(body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    /// Serve one canned HTTP response on an ephemeral port.
    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/sample.docx")
    }

    #[test]
    fn test_resolve_existing_path() {
        let file = NamedTempFile::with_suffix(".pages").unwrap();
        let source = ContentSource::resolve(file.path().to_str().unwrap()).unwrap();

        assert!(source.is_path());
        assert!(!source.is_uri());
        assert!(!source.is_stream());
        assert_eq!(source.path(), Some(file.path()));
        assert!(source.uri().is_none());
    }

    #[test]
    fn test_resolve_path_with_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample filename with spaces.pages");
        std::fs::write(&path, b"data").unwrap();

        let source = ContentSource::resolve(path.to_str().unwrap()).unwrap();
        assert!(source.is_path());
    }

    #[test]
    fn test_resolve_uri() {
        let source = ContentSource::resolve(
            "http://svn.apache.org/repos/asf/poi/trunk/test-data/document/sample.docx",
        )
        .unwrap();

        assert!(source.is_uri());
        assert!(!source.is_path());
        assert!(!source.is_stream());
        assert_eq!(source.uri().unwrap().host_str(), Some("svn.apache.org"));
        assert!(source.path().is_none());
    }

    #[test]
    fn test_resolve_missing_path() {
        let err = ContentSource::resolve("test/sample/missing.pages").unwrap_err();
        assert!(matches!(err, ExtractError::NotFound(ref s) if s == "test/sample/missing.pages"));
    }

    #[test]
    fn test_resolve_unfetchable_scheme() {
        let err = ContentSource::resolve("ftp://example.com/sample.docx").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedInput(_)));
    }

    #[test]
    fn test_resolve_hostless_uri_is_treated_as_path() {
        assert!(matches!(
            ContentSource::resolve("mailto:someone"),
            Err(ExtractError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_path_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello document").unwrap();

        let source = ContentSource::resolve(file.path().to_str().unwrap()).unwrap();
        let http = client();
        assert_eq!(source.bytes(&http, TIMEOUT).await.unwrap(), b"hello document");
    }

    #[tokio::test]
    async fn test_stream_is_read_once() {
        let source = ContentSource::from_reader(Cursor::new(b"streamed".to_vec()));
        let http = client();

        assert!(source.is_stream());
        assert_eq!(source.bytes(&http, TIMEOUT).await.unwrap(), b"streamed");
        // The reader is exhausted; the cached buffer answers.
        assert_eq!(source.bytes(&http, TIMEOUT).await.unwrap(), b"streamed");
    }

    #[tokio::test]
    async fn test_from_bytes() {
        let source = ContentSource::from_bytes(b"buffered".to_vec());
        let http = client();

        assert!(source.is_stream());
        assert_eq!(source.bytes(&http, TIMEOUT).await.unwrap(), b"buffered");
    }

    #[tokio::test]
    async fn test_uri_bytes() {
        let uri = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        )
        .await;
        let source = ContentSource::resolve(&uri).unwrap();
        let http = client();

        assert_eq!(source.bytes(&http, TIMEOUT).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_uri_error_status() {
        let uri = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let source = ContentSource::resolve(&uri).unwrap();
        let http = client();

        let err = source.bytes(&http, TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ExtractError::Fetch(ref msg) if msg.contains("404")));
    }
}
