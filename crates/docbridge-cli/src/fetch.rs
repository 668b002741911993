use std::fs;
use std::time::Duration;

use docbridge_core::{FetchError, PictureFetcher};
use tracing::debug;

/// Fetches `http(s)://` sources over the network and `file://` sources from disk.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| FetchError(format!("failed to build http client: {err}")))?;
        Ok(Self { client })
    }
}

impl PictureFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(path) = url.strip_prefix("file://") {
            debug!(path, "reading picture from disk");
            return fs::read(path).map_err(|err| FetchError(format!("{path}: {err}")));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FetchError(format!("unsupported url scheme in '{url}'")));
        }

        debug!(url, "downloading picture");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| FetchError(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError(format!("server answered {status}")));
        }
        let bytes = response.bytes().map_err(|err| FetchError(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}
