//! Delivery backends for telemetry batches.
//!
//! `HttpSink` posts the JSON array to `{base_url}/ingest_event` with a
//! blocking `reqwest` client. Only the HTTP status is interpreted: 2xx is
//! success, anything else (or a transport error) is a failed delivery that
//! the uploader requeues.

use crate::error::Result;

use super::record::TelemetryRecord;

/// Contract for telemetry delivery.
///
/// Called only from the flush path, never from the frame path, so
/// implementations may block on I/O.
pub trait TelemetrySink: Send + 'static {
    /// Deliver one batch as a single request.
    ///
    /// # Errors
    /// `Delivery` for a non-success status, `Transport` for network errors.
    fn deliver(&mut self, batch: &[TelemetryRecord<'_>]) -> Result<()>;
}

#[cfg(feature = "http")]
pub use http::HttpSink;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use tracing::debug;

    use crate::error::{Result, WayfinderError};
    use crate::telemetry::record::TelemetryRecord;
    use crate::telemetry::TelemetrySink;

    /// Path appended to the configured base URL.
    pub const INGEST_PATH: &str = "/ingest_event";

    pub struct HttpSink {
        client: reqwest::blocking::Client,
        url: String,
    }

    impl HttpSink {
        /// Build a sink for `base_url` with `timeout` applied to connect and
        /// to the whole request.
        pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
            let base = base_url.trim().trim_end_matches('/');
            if !(base.starts_with("http://") || base.starts_with("https://")) {
                return Err(WayfinderError::InvalidEndpoint(base_url.to_string()));
            }

            let client = reqwest::blocking::Client::builder()
                .connect_timeout(timeout)
                .timeout(timeout)
                .build()
                .map_err(|e| WayfinderError::Transport(e.to_string()))?;

            Ok(Self {
                client,
                url: format!("{base}{INGEST_PATH}"),
            })
        }

        pub fn url(&self) -> &str {
            &self.url
        }
    }

    impl TelemetrySink for HttpSink {
        fn deliver(&mut self, batch: &[TelemetryRecord<'_>]) -> Result<()> {
            let response = self
                .client
                .post(&self.url)
                .json(batch)
                .send()
                .map_err(|e| WayfinderError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(WayfinderError::Delivery {
                    status: status.as_u16(),
                });
            }
            debug!(status = %status, records = batch.len(), "telemetry batch accepted");
            Ok(())
        }
    }

    impl std::fmt::Debug for HttpSink {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("HttpSink").field("url", &self.url).finish()
        }
    }

}
