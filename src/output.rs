use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

use crate::app::{MappingResult, MetadataResult, PreprocessResult};
use crate::clinical::ClinicalRecord;
use crate::error::KiraError;
use crate::expression::GeneMatrix;
use crate::fs_util;
use crate::model::ProbeGeneMapping;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_preprocess(result: &PreprocessResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_metadata(result: &MetadataResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_mapping(result: &MappingResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl crate::app::ProgressSink for JsonOutput {
    fn event(&self, _event: crate::app::ProgressEvent) {}
}

pub fn write_clinical<W: Write>(out: &mut W, records: &[ClinicalRecord]) -> io::Result<()> {
    let mut header: Vec<&str> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !header.contains(&key) {
                header.push(key);
            }
        }
    }
    let mut writer = tsv_writer(out);
    writer.write_record(&header)?;
    for record in records {
        writer.write_record(header.iter().map(|key| record.get(key).unwrap_or_default()))?;
    }
    writer.flush()
}

pub fn write_expression<W: Write>(
    out: &mut W,
    matrix: &GeneMatrix,
    index_label: &str,
) -> io::Result<()> {
    let mut writer = tsv_writer(out);
    writer.write_record(
        std::iter::once(index_label).chain(matrix.samples.iter().map(String::as_str)),
    )?;
    for (gene, values) in matrix.rows() {
        let cells = values
            .iter()
            .map(|value| value.map(|value| value.to_string()).unwrap_or_default());
        writer.write_record(std::iter::once(gene.to_string()).chain(cells))?;
    }
    writer.flush()
}

pub fn write_mapping<W: Write>(
    out: &mut W,
    mapping: &ProbeGeneMapping,
    gene_label: &str,
) -> io::Result<()> {
    let mut writer = tsv_writer(out);
    writer.write_record(["ID", gene_label])?;
    for (probe, gene) in mapping.iter() {
        writer.write_record([probe, gene])?;
    }
    writer.flush()
}

pub fn write_table_file<F>(path: &Path, render: F) -> Result<(), KiraError>
where
    F: FnOnce(&mut io::BufWriter<&mut std::fs::File>) -> io::Result<()>,
{
    fs_util::write_atomic(path, |file| {
        let mut writer = io::BufWriter::new(file);
        render(&mut writer)
            .and_then(|_| writer.flush())
            .map_err(|err| KiraError::Filesystem(format!("write {}: {err}", path.display())))
    })
}

fn tsv_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new().delimiter(b'\t').from_writer(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clinical_header_is_union_of_keys() {
        let mut first = ClinicalRecord::default();
        first.set("accession", Some("GSM1".to_string()));
        first.set("age", Some("10".to_string()));
        let mut second = ClinicalRecord::default();
        second.set("accession", Some("GSM2".to_string()));
        second.set("sex", Some("F\tM".to_string()));

        let mut out = Vec::new();
        write_clinical(&mut out, &[first, second]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "accession\tage\tsex\nGSM1\t10\t\nGSM2\t\t\"F\tM\"\n"
        );
    }
}
