//! Remote file retrieval for metadata.

use url::Url;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

/// Fetches a URL. Failures are reported as remote errors.
pub trait Downloader: Send + Sync {
    fn download_file(&self, url: &Url) -> Result<DownloadedFile>;
}

#[cfg(feature = "network")]
pub use http::{is_transient_error, is_transient_status, HttpDownloader, HttpDownloaderConfig};

#[cfg(feature = "network")]
mod http {
    use std::time::{Duration, Instant};

    use backoff::ExponentialBackoff;
    use reqwest::blocking::Client;
    use reqwest::StatusCode;
    use tracing::{debug, warn};
    use url::Url;

    use super::{DownloadedFile, Downloader};
    use crate::error::{FidelisError, Result};

    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    const MAX_RETRIES: u32 = 3;
    const INITIAL_INTERVAL: Duration = Duration::from_millis(200);
    const MAX_INTERVAL: Duration = Duration::from_secs(5);

    #[derive(Debug, Clone)]
    pub struct HttpDownloaderConfig {
        /// Request timeout.
        pub timeout: Duration,
        /// Maximum retry attempts for transient errors.
        pub max_retries: u32,
        pub initial_interval: Duration,
        pub max_interval: Duration,
    }

    impl Default for HttpDownloaderConfig {
        fn default() -> Self {
            Self {
                timeout: DEFAULT_TIMEOUT,
                max_retries: MAX_RETRIES,
                initial_interval: INITIAL_INTERVAL,
                max_interval: MAX_INTERVAL,
            }
        }
    }

    /// HTTPS-only blocking downloader with exponential backoff on transient failures.
    pub struct HttpDownloader {
        client: Client,
        config: HttpDownloaderConfig,
    }

    impl HttpDownloader {
        pub fn new(config: HttpDownloaderConfig) -> Result<Self> {
            let client = Client::builder()
                .timeout(config.timeout)
                .https_only(true)
                .min_tls_version(reqwest::tls::Version::TLS_1_2)
                .build()
                .map_err(|e| FidelisError::remote(format!("Failed to create HTTP client: {e}")))?;
            Ok(Self { client, config })
        }

        fn download_once(
            &self,
            url: &Url,
        ) -> std::result::Result<DownloadedFile, backoff::Error<FidelisError>> {
            let start = Instant::now();

            let response = self.client.get(url.clone()).send().map_err(|e| {
                let latency_ms = start.elapsed().as_millis() as u64;
                if is_transient_error(&e) {
                    warn!(error = %e, latency_ms, "Transient error, will retry");
                    backoff::Error::transient(FidelisError::remote(format!(
                        "Transient error (will retry): {e}"
                    )))
                } else {
                    warn!(error = %e, latency_ms, "Permanent error, aborting");
                    backoff::Error::permanent(FidelisError::remote(format!(
                        "Download of {} failed: {e}",
                        url.path()
                    )))
                }
            })?;

            let status = response.status();
            debug!(status = %status, "Received HTTP response");
            if !status.is_success() {
                let err = FidelisError::remote(format!(
                    "Download of {} returned status: {status}",
                    url.path()
                ));
                return if is_transient_status(status) {
                    warn!(status = %status, "Transient HTTP status, will retry");
                    Err(backoff::Error::transient(err))
                } else {
                    Err(backoff::Error::permanent(err))
                };
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let data = response.bytes().map_err(|e| {
                backoff::Error::permanent(FidelisError::remote(format!(
                    "Failed to read response body: {e}"
                )))
            })?;

            debug!(
                latency_ms = start.elapsed().as_millis() as u64,
                bytes = data.len(),
                "Download completed"
            );
            Ok(DownloadedFile {
                data: data.to_vec(),
                content_type,
            })
        }

        fn build_backoff(&self) -> ExponentialBackoff {
            ExponentialBackoff {
                initial_interval: self.config.initial_interval,
                max_interval: self.config.max_interval,
                max_elapsed_time: Some(self.config.timeout * self.config.max_retries),
                ..Default::default()
            }
        }
    }

    impl Downloader for HttpDownloader {
        fn download_file(&self, url: &Url) -> Result<DownloadedFile> {
            backoff::retry_notify(
                self.build_backoff(),
                || self.download_once(url),
                |err: FidelisError, duration: Duration| {
                    warn!(
                        error = %err,
                        retry_after_ms = duration.as_millis() as u64,
                        "Retry scheduled"
                    );
                },
            )
            .map_err(|e| match e {
                backoff::Error::Permanent(err) => err,
                backoff::Error::Transient { err, .. } => err,
            })
        }
    }

    /// Check if a reqwest error is transient and should be retried.
    pub fn is_transient_error(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request()
    }

    /// Check if an HTTP status code indicates a transient error.
    pub fn is_transient_status(status: StatusCode) -> bool {
        matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
                | StatusCode::BAD_GATEWAY
        )
    }

}
