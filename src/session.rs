use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::IdentityCache;
use crate::domain::EntityKind;
use crate::error::KiraError;
use crate::geo::Downloader;
use crate::model::{Platform, Sample, Series};
use crate::router::{DetailQuery, GeoRouter};
use crate::xml::MinimlDocument;

pub struct Session<D> {
    cache: IdentityCache,
    downloader: D,
    router: GeoRouter,
}

impl<D: Downloader> Session<D> {
    pub fn new(downloader: D) -> Self {
        Self::with_cache(downloader, IdentityCache::new())
    }

    pub fn with_cache(downloader: D, cache: IdentityCache) -> Self {
        Self {
            cache,
            downloader,
            router: GeoRouter::default(),
        }
    }

    pub fn with_router(mut self, router: GeoRouter) -> Self {
        self.router = router;
        self
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut IdentityCache {
        &mut self.cache
    }

    pub fn into_cache(self) -> IdentityCache {
        self.cache
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    pub fn router(&self) -> &GeoRouter {
        &self.router
    }

    pub fn fetch_document(
        &self,
        kind: EntityKind,
        accession: &str,
    ) -> Result<MinimlDocument, KiraError> {
        self.fetch_with(kind, accession, &DetailQuery::for_kind(kind))
    }

    fn fetch_with(
        &self,
        kind: EntityKind,
        accession: &str,
        query: &DetailQuery,
    ) -> Result<MinimlDocument, KiraError> {
        let url = self.router.detail(kind, accession, query)?;
        info!(accession, kind = %kind, "fetching MINiML record");
        let bytes = self.downloader.fetch(&url)?;
        MinimlDocument::parse(&bytes).map_err(|err| err.for_accession(accession))
    }

    pub fn platform(&mut self, accession: &str) -> Result<Arc<Platform>, KiraError> {
        EntityKind::Platform.check(accession)?;
        let (router, downloader) = (&self.router, &self.downloader);
        self.cache.platforms.get_or_parse(accession, || {
            let url = router.platform_detail(accession)?;
            info!(accession, "fetching MINiML record");
            let bytes = downloader.fetch(&url)?;
            let document =
                MinimlDocument::parse(&bytes).map_err(|err| err.for_accession(accession))?;
            document
                .platform_parser()
                .and_then(|parser| parser.build())
                .map_err(|err| err.for_accession(accession))
        })
    }

    pub fn platform_full(&mut self, accession: &str) -> Result<Arc<Platform>, KiraError> {
        EntityKind::Platform.check(accession)?;
        let document = self.fetch_with(
            EntityKind::Platform,
            accession,
            &DetailQuery::full(EntityKind::Platform),
        )?;
        document.platform_parser()?.parse(&mut self.cache, true)
    }

    pub fn sample(&mut self, accession: &str) -> Result<Arc<Sample>, KiraError> {
        EntityKind::Sample.check(accession)?;
        if let Some(cached) = self.cache.samples.lookup(accession) {
            debug!(accession, "sample cache hit");
            return Ok(cached);
        }
        let document = self.fetch_document(EntityKind::Sample, accession)?;
        document.sample_parser()?.parse(self, false)
    }

    pub fn series(&mut self, accession: &str) -> Result<Arc<Series>, KiraError> {
        EntityKind::Series.check(accession)?;
        if let Some(cached) = self.cache.series.lookup(accession) {
            debug!(accession, "series cache hit");
            return Ok(cached);
        }
        let document = self.fetch_document(EntityKind::Series, accession)?;
        document.series_parser()?.parse(self, false)
    }

    pub fn series_from_document(
        &mut self,
        document: &MinimlDocument,
        eager: bool,
    ) -> Result<Arc<Series>, KiraError> {
        document.series_parser()?.parse(self, eager)
    }

    pub fn sample_from_document(
        &mut self,
        document: &MinimlDocument,
        eager: bool,
    ) -> Result<Arc<Sample>, KiraError> {
        document.sample_parser()?.parse(self, eager)
    }

    pub fn platform_from_document(
        &mut self,
        document: &MinimlDocument,
        eager: bool,
    ) -> Result<Arc<Platform>, KiraError> {
        document.platform_parser()?.parse(&mut self.cache, eager)
    }
}
