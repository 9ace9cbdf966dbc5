use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::sample::canonical_sample;
use super::{ExperimentTypeParser, PlatformParser, SampleParser, StatusDates, parse_supplementary_data};
use crate::cache::IdentityCache;
use crate::error::KiraError;
use crate::geo::Downloader;
use crate::model::{ExperimentType, Sample, Series};
use crate::session::Session;
use crate::xml::Element;

#[derive(Debug)]
pub struct SeriesParser<'a> {
    element: &'a Element,
    root: &'a Element,
}

impl<'a> SeriesParser<'a> {
    pub fn new(element: &'a Element, root: &'a Element) -> Self {
        Self { element, root }
    }

    pub fn accession(&self) -> Result<String, KiraError> {
        self.element.required_text("Series", "Accession")
    }

    pub fn title(&self) -> Option<String> {
        self.element.first_text("Title")
    }

    pub fn pmids(&self) -> Vec<String> {
        self.element
            .find_all("Pubmed-ID")
            .into_iter()
            .filter_map(Element::text)
            .map(str::to_string)
            .collect()
    }

    pub fn summary(&self) -> Option<String> {
        self.element.first_text("Summary")
    }

    pub fn overall_design(&self) -> Option<String> {
        self.element.first_text("Overall-Design")
    }

    pub fn experiment_types(&self) -> Vec<ExperimentType> {
        self.element
            .find_all("Type")
            .into_iter()
            .map(|element| ExperimentTypeParser::new(element).parse())
            .collect()
    }

    pub fn sample_accessions(&self) -> Vec<String> {
        self.element
            .find_all("Sample-Ref")
            .into_iter()
            .filter_map(|element| element.attr("ref"))
            .map(|accession| accession.trim().to_string())
            .filter(|accession| !accession.is_empty())
            .collect()
    }

    fn parse_inline<D: Downloader>(&self, session: &mut Session<D>) -> Result<(), KiraError> {
        if std::ptr::eq(self.element, self.root) {
            return Ok(());
        }
        for element in self.root.children_named("Platform") {
            PlatformParser::new(element).parse(session.cache_mut(), false)?;
        }
        for element in self.root.children_named("Sample") {
            SampleParser::new(element).parse(session, false)?;
        }
        Ok(())
    }

    fn samples<D: Downloader>(&self, session: &mut Session<D>) -> Result<Vec<Arc<Sample>>, KiraError> {
        self.sample_accessions()
            .iter()
            .map(|accession| session.sample(accession))
            .collect()
    }

    pub fn build<D: Downloader>(&self, session: &mut Session<D>) -> Result<Series, KiraError> {
        let accession = self.accession()?;
        self.parse_inline(session)?;
        self.build_fields(&accession, session)
            .map_err(|err| err.for_accession(&accession))
    }

    fn build_fields<D: Downloader>(
        &self,
        accession: &str,
        session: &mut Session<D>,
    ) -> Result<Series, KiraError> {
        let dates = StatusDates::parse(self.element)?;
        Ok(Series {
            accession: accession.to_string(),
            title: self.title(),
            pmids: self.pmids(),
            summary: self.summary(),
            overall_design: self.overall_design(),
            experiment_types: self.experiment_types(),
            supplementary_data: parse_supplementary_data(self.element),
            release_date: dates.release,
            last_update_date: dates.last_update,
            submission_date: dates.submission,
            samples: self.samples(session)?,
        })
    }

    pub fn parse<D: Downloader>(
        &self,
        session: &mut Session<D>,
        eager: bool,
    ) -> Result<Arc<Series>, KiraError> {
        let accession = self.accession()?;
        if !eager && let Some(cached) = session.cache().series.lookup(&accession) {
            debug!(accession = %accession, "series already parsed");
            return Ok(cached);
        }
        let series = Arc::new(self.build(session)?);
        let canonical = session.cache_mut().series.register(series.clone());
        Ok(if eager { series } else { canonical })
    }

    pub fn from_record(record: Value, cache: &mut IdentityCache) -> Result<Arc<Series>, KiraError> {
        let mut series: Series =
            serde_json::from_value(record).map_err(|err| KiraError::RecordParse(err.to_string()))?;
        if let Some(cached) = cache.series.lookup(&series.accession) {
            return Ok(cached);
        }
        let samples = std::mem::take(&mut series.samples);
        series.samples = samples
            .into_iter()
            .map(|sample| canonical_sample(sample, cache))
            .collect();
        Ok(cache.series.register(Arc::new(series)))
    }
}
