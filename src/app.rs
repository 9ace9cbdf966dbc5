use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::domain::{AggregateFunction, EntityKind, PlatformAccession, SeriesAccession};
use crate::error::KiraError;
use crate::expression::{self, ProbeMatrix};
use crate::fs_util;
use crate::geo::Downloader;
use crate::model::{Entity, Platform, ProbeGeneMapping, Series};
use crate::output;
use crate::router::DetailQuery;
use crate::session::Session;
use crate::store::{self, Store};
use crate::xml::MinimlDocument;

#[derive(Debug, Clone)]
pub enum SeriesSource {
    Accession(SeriesAccession),
    RecordFile(PathBuf),
}

#[derive(Debug, Clone)]
pub enum MappingSource {
    GeneColumn(usize),
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    pub series: SeriesSource,
    pub platform: Option<PlatformAccession>,
    pub mapping: MappingSource,
    pub aggregate: AggregateFunction,
    pub clinical_file: String,
    pub expression_file: String,
}

impl PreprocessOptions {
    pub fn new(series: SeriesSource, mapping: MappingSource) -> Self {
        Self {
            series,
            platform: None,
            mapping,
            aggregate: AggregateFunction::Median,
            clinical_file: "{accession}_clinical.txt".to_string(),
            expression_file: "{accession}_expression.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreprocessResult {
    pub accession: String,
    pub platform_accession: String,
    pub probe_count: usize,
    pub sample_count: usize,
    pub gene_count: usize,
    pub clinical_path: String,
    pub expression_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetadataResult {
    pub accession: String,
    pub title: Option<String>,
    pub sample_count: usize,
    pub platforms: Vec<String>,
    pub organisms: Vec<String>,
    pub output_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MappingResult {
    pub platform_accession: String,
    pub gene_column: String,
    pub probe_count: usize,
    pub output_path: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<D: Downloader> {
    store: Store,
    session: Session<D>,
    max_age_seconds: u64,
}

impl<D: Downloader> App<D> {
    pub fn new(store: Store, downloader: D, max_age_seconds: u64) -> Self {
        Self {
            store,
            session: Session::new(downloader),
            max_age_seconds,
        }
    }

    pub fn session(&self) -> &Session<D> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<D> {
        &mut self.session
    }

    pub fn preprocess(
        &mut self,
        options: PreprocessOptions,
        sink: &dyn ProgressSink,
    ) -> Result<PreprocessResult, KiraError> {
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: "phase=Resolve; loading series".to_string(),
            elapsed: None,
        });
        let series = self.load_series(&options.series)?;
        if series.is_malformed() {
            return Err(KiraError::InvalidArgument(format!(
                "malformed series {}",
                series.accession
            )));
        }
        if !series.is_expression_profiling_by_array() {
            return Err(KiraError::InvalidArgument(format!(
                "{} is not an expression profiling by array series",
                series.accession
            )));
        }
        let platform =
            series.select_platform(options.platform.as_ref().map(PlatformAccession::as_str))?;
        let clinical = series.platform_clinical(&platform);
        info!(
            series = %series.accession,
            platform = %platform.accession,
            samples = clinical.len(),
            "resolved series"
        );

        sink.event(ProgressEvent {
            message: format!("phase=Mapping; platform {}", platform.accession),
            elapsed: Some(started.elapsed()),
        });
        let (mapping, index_label) = match &options.mapping {
            MappingSource::File(path) => {
                let text = fs_util::read_text(path)?;
                (expression::read_mapping(&text)?, "gene".to_string())
            }
            MappingSource::GeneColumn(column) => {
                let full = self.full_platform(&platform.accession)?;
                let mapping = gene_mapping(&full, *column)?;
                let label = full.columns[*column - 1].name.clone();
                (mapping, label)
            }
        };

        sink.event(ProgressEvent {
            message: format!("phase=Matrix; series {}", series.accession),
            elapsed: Some(started.elapsed()),
        });
        let matrix = self.series_matrix(&series, &platform)?;
        let genes = matrix.collapse(&mapping, options.aggregate);

        let clinical_path = expand_template(&options.clinical_file, &series.accession);
        let expression_path = expand_template(&options.expression_file, &series.accession);
        output::write_table_file(Path::new(&clinical_path), |out| {
            output::write_clinical(out, &clinical)
        })?;
        output::write_table_file(Path::new(&expression_path), |out| {
            output::write_expression(out, &genes, &index_label)
        })?;
        sink.event(ProgressEvent {
            message: format!("phase=Done; {} genes", genes.gene_count()),
            elapsed: Some(started.elapsed()),
        });

        Ok(PreprocessResult {
            accession: series.accession.clone(),
            platform_accession: platform.accession.clone(),
            probe_count: matrix.probe_count(),
            sample_count: matrix.sample_count(),
            gene_count: genes.gene_count(),
            clinical_path,
            expression_path,
        })
    }

    pub fn metadata(
        &mut self,
        accession: &SeriesAccession,
        output: Option<&Path>,
        sink: &dyn ProgressSink,
    ) -> Result<MetadataResult, KiraError> {
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; series {accession}"),
            elapsed: None,
        });
        let series = self.session.series(accession.as_str())?;
        let output_path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(format!("{accession}.jsonl")));
        store::write_records(&output_path, std::slice::from_ref(&series))?;
        sink.event(ProgressEvent {
            message: format!("phase=Done; {} samples", series.sample_count()),
            elapsed: Some(started.elapsed()),
        });
        Ok(MetadataResult {
            accession: series.accession.clone(),
            title: series.title.clone(),
            sample_count: series.sample_count(),
            platforms: series
                .platforms()
                .iter()
                .map(|platform| platform.accession.clone())
                .collect(),
            organisms: series
                .organisms()
                .into_iter()
                .map(|organism| organism.sciname)
                .collect(),
            output_path: output_path.display().to_string(),
        })
    }

    pub fn platform_mapping(
        &mut self,
        accession: &PlatformAccession,
        gene_column: usize,
        output: Option<&Path>,
        sink: &dyn ProgressSink,
    ) -> Result<MappingResult, KiraError> {
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; platform {accession}"),
            elapsed: None,
        });
        let platform = self.full_platform(accession.as_str())?;
        let mapping = gene_mapping(&platform, gene_column)?;
        let gene_label = platform.columns[gene_column - 1].name.clone();
        let output_path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(format!("{accession}_mapping.txt")));
        output::write_table_file(&output_path, |out| {
            output::write_mapping(out, &mapping, &gene_label)
        })?;
        Ok(MappingResult {
            platform_accession: platform.accession.clone(),
            gene_column: gene_label,
            probe_count: mapping.len(),
            output_path: output_path.display().to_string(),
        })
    }

    fn load_series(&mut self, source: &SeriesSource) -> Result<Arc<Series>, KiraError> {
        match source {
            SeriesSource::Accession(accession) => self.session.series(accession.as_str()),
            SeriesSource::RecordFile(path) => {
                store::read_series_records(path, self.session.cache_mut())?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        KiraError::InvalidArgument(format!(
                            "no series record found in {}",
                            path.display()
                        ))
                    })
            }
        }
    }

    fn full_platform(&mut self, accession: &str) -> Result<Arc<Platform>, KiraError> {
        EntityKind::Platform.check(accession)?;
        let path = self.store.platform_path(accession);
        if !fs_util::is_fresh(path.as_std_path(), self.max_age_seconds) {
            let url = self.session.router().detail(
                EntityKind::Platform,
                accession,
                &DetailQuery::full(EntityKind::Platform),
            )?;
            self.session
                .downloader()
                .fetch_to_file(&url, path.as_std_path())?;
        } else {
            info!(path = %path, "using cached platform annotation");
        }
        let bytes = fs::read(path.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("read {path}: {err}")))?;
        let document = MinimlDocument::parse(&bytes).map_err(|err| err.for_accession(accession))?;
        self.session.platform_from_document(&document, true)
    }

    fn series_matrix(
        &self,
        series: &Series,
        platform: &Platform,
    ) -> Result<ProbeMatrix, KiraError> {
        let per_platform = series.platforms().len() > 1;
        let url = self.session.router().series_matrix(
            &series.accession,
            per_platform.then_some(platform.accession.as_str()),
        )?;
        let path = self.store.matrix_path(&url);
        if !fs_util::is_fresh(path.as_std_path(), self.max_age_seconds) {
            self.session
                .downloader()
                .fetch_to_file(&url, path.as_std_path())?;
        } else {
            info!(path = %path, "using cached series matrix");
        }
        let text = fs_util::read_text(path.as_std_path())?;
        ProbeMatrix::read(&text)
    }
}

fn gene_mapping(platform: &Platform, gene_column: usize) -> Result<ProbeGeneMapping, KiraError> {
    if gene_column < 2 {
        return Err(KiraError::InvalidArgument(format!(
            "gene column must be 2 or greater, got {gene_column}"
        )));
    }
    platform.probe_gene_mapping(gene_column - 1)
}

fn expand_template(template: &str, accession: &str) -> String {
    template.replace("{accession}", accession)
}
