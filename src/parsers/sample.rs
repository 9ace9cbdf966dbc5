use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{
    ChannelParser, StatusDates, parse_columns, parse_internal_data, parse_number,
    parse_supplementary_data,
};
use crate::cache::IdentityCache;
use crate::error::KiraError;
use crate::geo::Downloader;
use crate::model::{Channel, Sample};
use crate::session::Session;
use crate::xml::Element;

#[derive(Debug)]
pub struct SampleParser<'a> {
    element: &'a Element,
}

impl<'a> SampleParser<'a> {
    pub fn new(element: &'a Element) -> Self {
        Self { element }
    }

    pub fn accession(&self) -> Result<String, KiraError> {
        self.element.required_text("Sample", "Accession")
    }

    pub fn title(&self) -> Option<String> {
        self.element.first_text("Title")
    }

    pub fn sample_type(&self) -> Option<String> {
        self.element.first_text("Type")
    }

    pub fn channel_count(&self) -> Result<Option<u32>, KiraError> {
        self.element
            .first_text("Channel-Count")
            .map(|text| parse_number("Channel-Count", &text))
            .transpose()
    }

    pub fn channels(&self) -> Result<Vec<Channel>, KiraError> {
        self.element
            .find_all("Channel")
            .into_iter()
            .map(|element| ChannelParser::new(element).parse())
            .collect()
    }

    pub fn platform_accession(&self) -> Option<String> {
        self.element
            .first_attr("Platform-Ref", "ref")
            .filter(|accession| !accession.is_empty())
    }

    pub fn build<D: Downloader>(&self, session: &mut Session<D>) -> Result<Sample, KiraError> {
        let accession = self.accession()?;
        let mut sample = self
            .build_fields(&accession)
            .map_err(|err| err.for_accession(&accession))?;
        if let Some(platform) = self.platform_accession() {
            sample.platform = Some(session.platform(&platform)?);
        }
        Ok(sample)
    }

    fn build_fields(&self, accession: &str) -> Result<Sample, KiraError> {
        let columns = parse_columns(self.element)?;
        let internal_data = parse_internal_data(self.element, columns.len(), accession);
        let dates = StatusDates::parse(self.element)?;
        Ok(Sample {
            accession: accession.to_string(),
            title: self.title(),
            sample_type: self.sample_type(),
            channel_count: self.channel_count()?,
            channels: self.channels()?,
            hybridization_protocol: self.element.first_text("Hybridization-Protocol"),
            scan_protocol: self.element.first_text("Scan-Protocol"),
            description: self.element.first_text("Description"),
            data_processing: self.element.first_text("Data-Processing"),
            supplementary_data: parse_supplementary_data(self.element),
            columns,
            internal_data,
            release_date: dates.release,
            last_update_date: dates.last_update,
            submission_date: dates.submission,
            platform: None,
        })
    }

    pub fn parse<D: Downloader>(
        &self,
        session: &mut Session<D>,
        eager: bool,
    ) -> Result<Arc<Sample>, KiraError> {
        let accession = self.accession()?;
        if !eager && let Some(cached) = session.cache().samples.lookup(&accession) {
            debug!(accession = %accession, "sample already parsed");
            return Ok(cached);
        }
        let sample = Arc::new(self.build(session)?);
        let canonical = session.cache_mut().samples.register(sample.clone());
        Ok(if eager { sample } else { canonical })
    }

    pub fn from_record(record: Value, cache: &mut IdentityCache) -> Result<Arc<Sample>, KiraError> {
        let sample: Sample =
            serde_json::from_value(record).map_err(|err| KiraError::RecordParse(err.to_string()))?;
        Ok(canonical_sample(Arc::new(sample), cache))
    }
}

pub(crate) fn canonical_sample(sample: Arc<Sample>, cache: &mut IdentityCache) -> Arc<Sample> {
    if let Some(cached) = cache.samples.lookup(&sample.accession) {
        return cached;
    }
    let mut sample = Arc::unwrap_or_clone(sample);
    sample.platform = sample
        .platform
        .take()
        .map(|platform| cache.platforms.register(platform));
    cache.samples.register(Arc::new(sample))
}
