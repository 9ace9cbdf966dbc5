use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::KiraError;
use crate::model::{Entity, Platform, Sample, Series};

#[derive(Debug)]
pub struct Registry<T> {
    entries: HashMap<String, Arc<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: Entity> Registry<T> {
    pub fn register(&mut self, entity: Arc<T>) -> Arc<T> {
        if entity.is_malformed() {
            debug!(accession = entity.accession(), "not caching malformed entity");
            return entity;
        }
        if let Some(existing) = self.entries.get(entity.accession()) {
            return existing.clone();
        }
        debug!(accession = entity.accession(), "cached entity");
        self.entries
            .insert(entity.accession().to_string(), entity.clone());
        entity
    }

    pub fn lookup(&self, accession: &str) -> Option<Arc<T>> {
        self.entries.get(accession).cloned()
    }

    pub fn get_or_parse<F>(&mut self, accession: &str, parse: F) -> Result<Arc<T>, KiraError>
    where
        F: FnOnce() -> Result<T, KiraError>,
    {
        if let Some(existing) = self.lookup(accession) {
            debug!(accession, "identity cache hit");
            return Ok(existing);
        }
        let entity = parse()?;
        Ok(self.register(Arc::new(entity)))
    }

    pub fn contains(&self, accession: &str) -> bool {
        self.entries.contains_key(accession)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct IdentityCache {
    pub platforms: Registry<Platform>,
    pub samples: Registry<Sample>,
    pub series: Registry<Series>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.platforms.clear();
        self.samples.clear();
        self.series.clear();
    }
}
