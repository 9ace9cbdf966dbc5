use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::domain::AggregateFunction;
use crate::error::KiraError;
use crate::model::ProbeGeneMapping;

const COMMENT_CHAR: u8 = b'!';
const MISSING: [&str; 7] = ["", "null", "NULL", "NA", "N/A", "NaN", "nan"];

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeMatrix {
    pub id_column: String,
    pub samples: Vec<String>,
    pub probes: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl ProbeMatrix {
    pub fn read(text: &str) -> Result<Self, KiraError> {
        let mut reader = tsv_reader(text, false);
        let mut records = reader.records();

        let header = records
            .next()
            .transpose()
            .map_err(|err| KiraError::InvalidMatrix(err.to_string()))?
            .ok_or_else(|| KiraError::InvalidMatrix("no header line found".to_string()))?;
        let mut header = header.iter().map(str::to_string);
        let id_column = header.next().unwrap_or_default();
        let samples: Vec<String> = header.collect();
        if samples.is_empty() {
            return Err(KiraError::InvalidMatrix(
                "header declares no sample columns".to_string(),
            ));
        }

        let mut probes = Vec::new();
        let mut values = Vec::new();
        for record in records {
            let record = record.map_err(|err| KiraError::InvalidMatrix(err.to_string()))?;
            let line_no = line_of(&record);
            let mut cells = record.iter();
            let probe = cells.next().unwrap_or_default().to_string();
            let mut row = Vec::with_capacity(samples.len());
            for cell in cells {
                row.push(parse_value(cell, line_no)?);
            }
            if row.len() > samples.len() {
                return Err(KiraError::InvalidMatrix(format!(
                    "line {line_no} has {} values, header declares {}",
                    row.len(),
                    samples.len()
                )));
            }
            row.resize(samples.len(), None);
            probes.push(probe);
            values.push(row);
        }
        debug!(probes = probes.len(), samples = samples.len(), "read series matrix");
        Ok(Self {
            id_column,
            samples,
            probes,
            values,
        })
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn row(&self, probe: &str) -> Option<&[Option<f64>]> {
        self.probes
            .iter()
            .position(|candidate| candidate == probe)
            .map(|idx| self.values[idx].as_slice())
    }

    pub fn collapse(&self, mapping: &ProbeGeneMapping, aggregate: AggregateFunction) -> GeneMatrix {
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, probe) in self.probes.iter().enumerate() {
            match mapping.get(probe) {
                Some(gene) if !gene.trim().is_empty() => groups.entry(gene).or_default().push(idx),
                _ => {}
            }
        }

        let mut genes = Vec::with_capacity(groups.len());
        let mut values = Vec::with_capacity(groups.len());
        for (gene, rows) in groups {
            let merged = (0..self.samples.len())
                .map(|col| {
                    let column: Vec<f64> =
                        rows.iter().filter_map(|&row| self.values[row][col]).collect();
                    aggregate_values(&column, aggregate)
                })
                .collect();
            genes.push(gene.to_string());
            values.push(merged);
        }
        info!(
            probes = self.probes.len(),
            genes = genes.len(),
            aggregate = %aggregate,
            "collapsed probes to genes"
        );
        GeneMatrix {
            samples: self.samples.clone(),
            genes,
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneMatrix {
    pub samples: Vec<String>,
    pub genes: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl GeneMatrix {
    pub fn gene_count(&self) -> usize {
        self.genes.len()
    }

    pub fn get(&self, gene: &str) -> Option<&[Option<f64>]> {
        self.genes
            .binary_search_by(|candidate| candidate.as_str().cmp(gene))
            .ok()
            .map(|idx| self.values[idx].as_slice())
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.genes
            .iter()
            .zip(&self.values)
            .map(|(gene, row)| (gene.as_str(), row.as_slice()))
    }
}

pub fn aggregate_values(values: &[f64], aggregate: AggregateFunction) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let value = match aggregate {
        AggregateFunction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregateFunction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregateFunction::First => values[0],
        AggregateFunction::Last => values[values.len() - 1],
        AggregateFunction::Mean => values.iter().sum::<f64>() / values.len() as f64,
        AggregateFunction::Median => {
            let mut sorted = values.to_vec();
            sorted.sort_by(f64::total_cmp);
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                (sorted[mid - 1] + sorted[mid]) / 2.0
            } else {
                sorted[mid]
            }
        }
    };
    Some(value)
}

pub fn read_mapping(text: &str) -> Result<ProbeGeneMapping, KiraError> {
    let mut mapping = ProbeGeneMapping::default();
    let mut reader = tsv_reader(text, true);
    for record in reader.records() {
        let record = record
            .map_err(|err| KiraError::InvalidArgument(format!("invalid mapping file: {err}")))?;
        match (record.get(0), record.get(1), record.len()) {
            (Some(probe), Some(gene), 2) => mapping.insert(probe.to_string(), gene.to_string()),
            (_, _, 1) => {
                return Err(KiraError::InvalidArgument(format!(
                    "invalid mapping file: line {} has no tab separated gene column",
                    line_of(&record)
                )));
            }
            _ => {
                return Err(KiraError::InvalidArgument(format!(
                    "invalid mapping file: line {} has more than two columns",
                    line_of(&record)
                )));
            }
        }
    }
    Ok(mapping)
}

fn tsv_reader(text: &str, has_headers: bool) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(COMMENT_CHAR))
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes())
}

fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map(|pos| pos.line()).unwrap_or_default()
}

fn parse_value(cell: &str, line_no: u64) -> Result<Option<f64>, KiraError> {
    if MISSING.contains(&cell) {
        return Ok(None);
    }
    cell.parse::<f64>().map(Some).map_err(|_| {
        KiraError::InvalidMatrix(format!("line {line_no}: {cell:?} is not a number"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_of_even_group_averages_middle_values() {
        assert_eq!(
            aggregate_values(&[4.0, 1.0, 3.0, 2.0], AggregateFunction::Median),
            Some(2.5)
        );
        assert_eq!(aggregate_values(&[], AggregateFunction::Max), None);
    }
}
