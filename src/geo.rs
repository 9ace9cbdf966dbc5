use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info};

use crate::error::KiraError;
use crate::fs_util;

pub const DEFAULT_RETRIES: usize = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub trait Downloader: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, KiraError>;

    fn fetch_decoded(&self, url: &str) -> Result<Vec<u8>, KiraError> {
        let bytes = self.fetch(url)?;
        if url.ends_with(".gz") {
            return gunzip(&bytes);
        }
        Ok(bytes)
    }

    fn fetch_to_file(&self, url: &str, destination: &Path) -> Result<(), KiraError> {
        let bytes = self.fetch(url)?;
        fs_util::write_atomic(destination, |file| {
            file.write_all(&bytes)
                .map_err(|err| KiraError::Filesystem(err.to_string()))
        })
    }
}

impl<D: Downloader + ?Sized> Downloader for &D {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, KiraError> {
        (**self).fetch(url)
    }
}

#[derive(Clone)]
pub struct GeoHttpClient {
    client: Client,
    retries: usize,
}

impl GeoHttpClient {
    pub fn new() -> Result<Self, KiraError> {
        Self::with_settings(DEFAULT_RETRIES, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_settings(retries: usize, timeout: Duration) -> Result<Self, KiraError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-geo/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| KiraError::GeoHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| KiraError::GeoHttp(err.to_string()))?;
        Ok(Self { client, retries })
    }

    fn normalize_url(url: &str) -> String {
        if let Some(rest) = url.strip_prefix("ftp://ftp.ncbi.nlm.nih.gov/") {
            return format!("https://ftp.ncbi.nlm.nih.gov/{}", rest);
        }
        url.to_string()
    }

    fn send_with_retries(&self, url: &str) -> Result<reqwest::blocking::Response, KiraError> {
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.retries && is_retryable_status(status) {
                        debug!(url, status, attempt, "retrying GEO request");
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.retries && is_retryable_error(&err) {
                        debug!(url, attempt, error = %err, "retrying GEO request");
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(KiraError::GeoHttp(err.to_string()));
                }
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, KiraError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "GEO request failed".to_string());
        Err(KiraError::GeoStatus { status, message })
    }
}

impl Downloader for GeoHttpClient {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, KiraError> {
        let url = Self::normalize_url(url);
        info!(url = %url, "fetching");
        let response = self.send_with_retries(&url)?;
        let response = Self::handle_status(response)?;
        let bytes = response
            .bytes()
            .map_err(|err| KiraError::GeoHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn fetch_to_file(&self, url: &str, destination: &Path) -> Result<(), KiraError> {
        let url = Self::normalize_url(url);
        info!(url = %url, destination = %destination.display(), "downloading");
        let response = self.send_with_retries(&url)?;
        let mut response = Self::handle_status(response)?;
        fs_util::write_atomic(destination, |file| {
            std::io::copy(&mut response, file)
                .map(|_| ())
                .map_err(|err| KiraError::GeoHttp(err.to_string()))
        })
    }
}

pub fn gunzip(bytes: &[u8]) -> Result<Vec<u8>, KiraError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|err| KiraError::GeoHttp(format!("invalid gzip payload: {err}")))?;
    Ok(out)
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    #[test]
    fn ftp_urls_are_served_over_https() {
        assert_eq!(
            GeoHttpClient::normalize_url(
                "ftp://ftp.ncbi.nlm.nih.gov/geo/series/GSE73nnn/GSE73091/suppl/GSE73091_RAW.tar"
            ),
            "https://ftp.ncbi.nlm.nih.gov/geo/series/GSE73nnn/GSE73091/suppl/GSE73091_RAW.tar"
        );
    }

    #[test]
    fn gunzip_roundtrip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"ID_REF\tGSM1\n").unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(gunzip(&compressed).unwrap(), b"ID_REF\tGSM1\n");
        assert!(gunzip(b"plain").is_err());
    }

    struct Canned(Vec<u8>);

    impl Downloader for Canned {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, KiraError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn fetch_decoded_inflates_only_gz_urls() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"!Series_title\n").unwrap();
        let downloader = Canned(encoder.finish().unwrap());

        assert_eq!(
            downloader.fetch_decoded("https://host/x_series_matrix.txt.gz").unwrap(),
            b"!Series_title\n"
        );
        assert_eq!(
            downloader.fetch_decoded("https://host/x.xml").unwrap(),
            downloader.0
        );
    }

    #[test]
    fn client_builds_with_defaults() {
        let client = GeoHttpClient::new().unwrap();
        assert_eq!(client.retries, DEFAULT_RETRIES);
    }
}
