use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde_json::Value;

use crate::cache::IdentityCache;
use crate::error::KiraError;
use crate::fs_util;
use crate::model::{Entity, Series};
use crate::parsers::SeriesParser;

#[derive(Debug, Clone)]
pub struct Store {
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, KiraError> {
        Ok(Self {
            cache_root: default_cache_root()?,
        })
    }

    pub fn new_with_root(cache_root: Utf8PathBuf) -> Self {
        Self { cache_root }
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn platform_path(&self, accession: &str) -> Utf8PathBuf {
        self.cache_root
            .join("platforms")
            .join(format!("{accession}.xml"))
    }

    pub fn matrix_path(&self, url: &str) -> Utf8PathBuf {
        let file = url.rsplit('/').next().unwrap_or(url);
        self.cache_root.join("matrices").join(file)
    }

    pub fn ensure_cache_root(&self) -> Result<(), KiraError> {
        fs::create_dir_all(self.cache_root.as_std_path())
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    }
}

pub fn default_cache_root() -> Result<Utf8PathBuf, KiraError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("kira-geo-alchemy"))
                .ok()
        })
        .ok_or_else(|| KiraError::Filesystem("unable to resolve cache directory".to_string()))
}

pub fn write_records<T: Entity>(path: &Path, entities: &[Arc<T>]) -> Result<(), KiraError> {
    let mut lines = Vec::with_capacity(entities.len());
    for entity in entities {
        let record = entity.to_record()?;
        lines.push(
            serde_json::to_string(&record)
                .map_err(|err| KiraError::RecordParse(err.to_string()))?,
        );
    }
    fs_util::write_atomic(path, |file| {
        for line in &lines {
            writeln!(file, "{line}").map_err(|err| KiraError::Filesystem(err.to_string()))?;
        }
        Ok(())
    })
}

pub fn read_records(path: &Path) -> Result<Vec<Value>, KiraError> {
    let file = fs::File::open(path)
        .map_err(|err| KiraError::Filesystem(format!("open {}: {err}", path.display())))?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|err| KiraError::Filesystem(err.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|err| {
            KiraError::RecordParse(format!("{} line {}: {err}", path.display(), idx + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

pub fn read_series_records(
    path: &Path,
    cache: &mut IdentityCache,
) -> Result<Vec<Arc<Series>>, KiraError> {
    read_records(path)?
        .into_iter()
        .map(|record| SeriesParser::from_record(record, cache))
        .collect()
}
