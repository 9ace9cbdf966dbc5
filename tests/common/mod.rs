#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use flate2::Compression;
use flate2::write::GzEncoder;

use kira_geo_alchemy::error::KiraError;
use kira_geo_alchemy::geo::Downloader;

pub const GSE73091_QUICK: &str =
    "https://www.ncbi.nlm.nih.gov/geo/query/acc.cgi?acc=GSE73091&targ=all&form=xml&view=quick";
pub const GSM1885279_QUICK: &str =
    "https://www.ncbi.nlm.nih.gov/geo/query/acc.cgi?acc=GSM1885279&targ=self&form=xml&view=quick";
pub const GSM1885281_QUICK: &str =
    "https://www.ncbi.nlm.nih.gov/geo/query/acc.cgi?acc=GSM1885281&targ=self&form=xml&view=quick";
pub const GPL570_QUICK: &str =
    "https://www.ncbi.nlm.nih.gov/geo/query/acc.cgi?acc=GPL570&targ=self&form=xml&view=quick";
pub const GPL570_FULL: &str =
    "https://www.ncbi.nlm.nih.gov/geo/query/acc.cgi?acc=GPL570&targ=self&form=xml&view=full";
pub const GSE73091_MATRIX: &str =
    "https://ftp.ncbi.nlm.nih.gov/geo/series/GSE73nnn/GSE73091/matrix/GSE73091_series_matrix.txt.gz";

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture(name: &str) -> Vec<u8> {
    std::fs::read(fixture_path(name)).unwrap()
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

#[derive(Default)]
pub struct MockDownloader {
    responses: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MockDownloader {
    pub fn geo() -> Self {
        Self::default()
            .with(GSE73091_QUICK, fixture("GSE73091.xml"))
            .with(GSM1885279_QUICK, fixture("GSM1885279.xml"))
            .with(GSM1885281_QUICK, fixture("GSM1885281.xml"))
            .with(GPL570_QUICK, fixture("GPL570.xml"))
            .with(GPL570_FULL, fixture("GPL570.xml"))
            .with(GSE73091_MATRIX, gzip(&fixture("GSE73091_series_matrix.txt")))
    }

    pub fn with(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), body);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Downloader for MockDownloader {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, KiraError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| KiraError::GeoStatus {
                status: 404,
                message: format!("no fixture for {url}"),
            })
    }
}
