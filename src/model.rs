use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::clinical::{self, ClinicalRecord};
use crate::error::KiraError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Organism {
    pub taxid: String,
    pub sciname: String,
}

impl Organism {
    pub fn new(taxid: impl Into<String>, sciname: impl Into<String>) -> Self {
        Self {
            taxid: taxid.into(),
            sciname: sciname.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentType {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub position: u32,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristic {
    pub tag: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplementaryDataItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub position: u32,
    pub source: String,
    pub organisms: Vec<Organism>,
    pub characteristics: Vec<Characteristic>,
    pub treatment_protocol: Option<String>,
    pub growth_protocol: Option<String>,
    pub molecule: Option<String>,
    pub extract_protocol: Option<String>,
    pub label: Option<String>,
    pub label_protocol: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub accession: String,
    pub title: Option<String>,
    pub technology: Option<String>,
    pub distribution: Option<String>,
    pub organisms: Vec<Organism>,
    pub manufacturer: Option<String>,
    pub manufacturer_protocol: Option<String>,
    pub description: Option<String>,
    pub columns: Vec<Column>,
    pub internal_data: Vec<Vec<String>>,
    pub release_date: Option<NaiveDate>,
    pub last_update_date: Option<NaiveDate>,
    pub submission_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub accession: String,
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub sample_type: Option<String>,
    pub channel_count: Option<u32>,
    pub channels: Vec<Channel>,
    pub hybridization_protocol: Option<String>,
    pub scan_protocol: Option<String>,
    pub description: Option<String>,
    pub data_processing: Option<String>,
    pub supplementary_data: Vec<SupplementaryDataItem>,
    pub columns: Vec<Column>,
    pub internal_data: Vec<Vec<String>>,
    pub release_date: Option<NaiveDate>,
    pub last_update_date: Option<NaiveDate>,
    pub submission_date: Option<NaiveDate>,
    pub platform: Option<Arc<Platform>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub accession: String,
    pub title: Option<String>,
    pub pmids: Vec<String>,
    pub summary: Option<String>,
    pub overall_design: Option<String>,
    pub experiment_types: Vec<ExperimentType>,
    pub supplementary_data: Vec<SupplementaryDataItem>,
    pub release_date: Option<NaiveDate>,
    pub last_update_date: Option<NaiveDate>,
    pub submission_date: Option<NaiveDate>,
    pub samples: Vec<Arc<Sample>>,
}

pub trait Entity: Serialize {
    fn accession(&self) -> &str;

    fn is_malformed(&self) -> bool;

    fn to_record(&self) -> Result<Value, KiraError> {
        serde_json::to_value(self).map_err(|err| KiraError::RecordParse(err.to_string()))
    }
}

impl Entity for Platform {
    fn accession(&self) -> &str {
        &self.accession
    }

    fn is_malformed(&self) -> bool {
        self.title.is_none()
    }
}

impl Entity for Sample {
    fn accession(&self) -> &str {
        &self.accession
    }

    fn is_malformed(&self) -> bool {
        self.title.is_none()
    }
}

impl Entity for Series {
    fn accession(&self) -> &str {
        &self.accession
    }

    fn is_malformed(&self) -> bool {
        self.title.is_none()
    }
}

// A probe listed twice keeps its first position and its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeGeneMapping {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl ProbeGeneMapping {
    pub fn insert(&mut self, probe: impl Into<String>, gene: impl Into<String>) {
        let probe = probe.into();
        let gene = gene.into();
        match self.index.get(&probe) {
            Some(&slot) => self.entries[slot].1 = gene,
            None => {
                self.index.insert(probe.clone(), self.entries.len());
                self.entries.push((probe, gene));
            }
        }
    }

    pub fn get(&self, probe: &str) -> Option<&str> {
        self.index
            .get(probe)
            .map(|&slot| self.entries[slot].1.as_str())
    }

    pub fn contains(&self, probe: &str) -> bool {
        self.index.contains_key(probe)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(probe, gene)| (probe.as_str(), gene.as_str()))
    }
}

impl<P: Into<String>, G: Into<String>> FromIterator<(P, G)> for ProbeGeneMapping {
    fn from_iter<I: IntoIterator<Item = (P, G)>>(iter: I) -> Self {
        let mut mapping = ProbeGeneMapping::default();
        for (probe, gene) in iter {
            mapping.insert(probe, gene);
        }
        mapping
    }
}

impl Platform {
    pub fn probe_gene_mapping(&self, gene_column: usize) -> Result<ProbeGeneMapping, KiraError> {
        let malformed = |reason: String| KiraError::MalformedPlatform {
            accession: self.accession.clone(),
            reason,
        };
        if self.columns.is_empty() || self.internal_data.is_empty() {
            return Err(malformed("no annotation columns or rows".to_string()));
        }
        let width = self.columns.len();
        if gene_column >= width {
            return Err(malformed(format!(
                "gene column {} requested, but only {width} columns present",
                gene_column + 1
            )));
        }
        if !self.internal_data.iter().any(|row| row.len() == width) {
            return Err(malformed(format!(
                "no annotation row has the declared {width} columns"
            )));
        }

        let mut mapping = ProbeGeneMapping::default();
        for (idx, row) in self.internal_data.iter().enumerate() {
            if row.len() != width {
                warn!(
                    platform = %self.accession,
                    row = idx,
                    found = row.len(),
                    expected = width,
                    "skipping malformed annotation row"
                );
                continue;
            }
            mapping.insert(row[0].as_str(), row[gene_column].as_str());
        }
        Ok(mapping)
    }

    pub fn column(&self, position: u32) -> Option<&Column> {
        self.columns.iter().find(|column| column.position == position)
    }
}

impl Sample {
    pub fn organisms(&self) -> Vec<Organism> {
        dedup_organisms(self.channels.iter().flat_map(|channel| &channel.organisms))
    }

    pub fn platform_accession(&self) -> Option<&str> {
        self.platform.as_deref().map(|platform| platform.accession.as_str())
    }

    pub fn clinical(&self) -> ClinicalRecord {
        clinical::flatten_sample(self)
    }
}

impl Series {
    pub fn organisms(&self) -> Vec<Organism> {
        dedup_organisms(
            self.samples
                .iter()
                .flat_map(|sample| &sample.channels)
                .flat_map(|channel| &channel.organisms),
        )
    }

    pub fn platforms(&self) -> Vec<Arc<Platform>> {
        let mut seen = HashSet::new();
        self.samples
            .iter()
            .filter_map(|sample| sample.platform.as_ref())
            .filter(|platform| seen.insert(platform.accession.clone()))
            .cloned()
            .collect()
    }

    pub fn platform(&self, accession: &str) -> Option<Arc<Platform>> {
        self.platforms()
            .into_iter()
            .find(|platform| platform.accession == accession)
    }

    pub fn select_platform(&self, requested: Option<&str>) -> Result<Arc<Platform>, KiraError> {
        let platforms = self.platforms();
        if let Some(accession) = requested {
            return platforms
                .into_iter()
                .find(|platform| platform.accession == accession)
                .ok_or_else(|| {
                    KiraError::InvalidArgument(format!(
                        "platform {accession} not found in series {}",
                        self.accession
                    ))
                });
        }
        match platforms.len() {
            0 => Err(KiraError::MalformedRecord {
                accession: self.accession.clone(),
                reason: "series references no platform".to_string(),
            }),
            1 => Ok(platforms[0].clone()),
            _ => Err(KiraError::InvalidArgument(format!(
                "multiple platforms found in {}, a platform accession must be provided",
                self.accession
            ))),
        }
    }

    pub fn clinical(&self) -> Vec<ClinicalRecord> {
        self.samples.iter().map(|sample| sample.clinical()).collect()
    }

    pub fn platform_clinical(&self, platform: &Platform) -> Vec<ClinicalRecord> {
        self.samples
            .iter()
            .filter(|sample| sample.platform_accession() == Some(platform.accession.as_str()))
            .map(|sample| sample.clinical())
            .collect()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn add_sample(&mut self, sample: Arc<Sample>) {
        self.samples.push(sample);
    }

    pub fn set_samples(&mut self, samples: Vec<Arc<Sample>>) {
        self.samples = samples;
    }

    pub fn is_expression_profiling_by_array(&self) -> bool {
        self.experiment_types
            .iter()
            .any(|kind| kind.title == "Expression profiling by array")
    }
}

pub(crate) fn dedup_organisms<'a>(organisms: impl IntoIterator<Item = &'a Organism>) -> Vec<Organism> {
    let mut seen = HashSet::new();
    organisms
        .into_iter()
        .filter(|organism| seen.insert(organism.taxid.clone()))
        .cloned()
        .collect()
}
