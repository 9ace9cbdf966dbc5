use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{StatusDates, parse_columns, parse_internal_data, parse_organisms};
use crate::cache::IdentityCache;
use crate::error::KiraError;
use crate::model::{Column, Organism, Platform};
use crate::xml::Element;

pub struct PlatformParser<'a> {
    element: &'a Element,
}

impl<'a> PlatformParser<'a> {
    pub fn new(element: &'a Element) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    pub fn accession(&self) -> Result<String, KiraError> {
        self.element.required_text("Platform", "Accession")
    }

    pub fn title(&self) -> Option<String> {
        self.element.first_text("Title")
    }

    pub fn technology(&self) -> Option<String> {
        self.element.first_text("Technology")
    }

    pub fn distribution(&self) -> Option<String> {
        self.element.first_text("Distribution")
    }

    pub fn organisms(&self) -> Result<Vec<Organism>, KiraError> {
        parse_organisms(self.element)
    }

    pub fn manufacturer(&self) -> Option<String> {
        self.element.first_text("Manufacturer")
    }

    pub fn manufacturer_protocol(&self) -> Option<String> {
        self.element.first_text("Manufacture-Protocol")
    }

    pub fn description(&self) -> Option<String> {
        self.element.first_text("Description")
    }

    pub fn columns(&self) -> Result<Vec<Column>, KiraError> {
        parse_columns(self.element)
    }

    pub fn build(&self) -> Result<Platform, KiraError> {
        let accession = self.accession()?;
        self.build_fields(&accession)
            .map_err(|err| err.for_accession(&accession))
    }

    fn build_fields(&self, accession: &str) -> Result<Platform, KiraError> {
        let columns = self.columns()?;
        let internal_data = parse_internal_data(self.element, columns.len(), accession);
        let dates = StatusDates::parse(self.element)?;
        Ok(Platform {
            accession: accession.to_string(),
            title: self.title(),
            technology: self.technology(),
            distribution: self.distribution(),
            organisms: self.organisms()?,
            manufacturer: self.manufacturer(),
            manufacturer_protocol: self.manufacturer_protocol(),
            description: self.description(),
            columns,
            internal_data,
            release_date: dates.release,
            last_update_date: dates.last_update,
            submission_date: dates.submission,
        })
    }

    // An eager parse is returned as built but never replaces a cached entry.
    pub fn parse(&self, cache: &mut IdentityCache, eager: bool) -> Result<Arc<Platform>, KiraError> {
        let accession = self.accession()?;
        if !eager && let Some(cached) = cache.platforms.lookup(&accession) {
            debug!(accession = %accession, "platform already parsed");
            return Ok(cached);
        }
        let platform = Arc::new(self.build()?);
        let canonical = cache.platforms.register(platform.clone());
        Ok(if eager { platform } else { canonical })
    }

    pub fn from_record(record: Value, cache: &mut IdentityCache) -> Result<Arc<Platform>, KiraError> {
        let platform: Platform =
            serde_json::from_value(record).map_err(|err| KiraError::RecordParse(err.to_string()))?;
        Ok(cache.platforms.register(Arc::new(platform)))
    }
}
