use reqwest::Url;

use crate::domain::EntityKind;
use crate::error::KiraError;

pub const LIST_URL: &str = "https://www.ncbi.nlm.nih.gov/geo/browse";
pub const DETAIL_URL: &str = "https://www.ncbi.nlm.nih.gov/geo/query/acc.cgi";
pub const FTP_URL: &str = "https://ftp.ncbi.nlm.nih.gov";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub sort: String,
    pub display: u32,
    pub page: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            sort: "date".to_string(),
            display: 20,
            page: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailQuery {
    pub targ: String,
    pub form: String,
    pub view: String,
}

impl DetailQuery {
    pub fn for_kind(kind: EntityKind) -> Self {
        let targ = match kind {
            EntityKind::Series => "all",
            EntityKind::Platform | EntityKind::Sample => "self",
        };
        Self {
            targ: targ.to_string(),
            form: "xml".to_string(),
            view: "quick".to_string(),
        }
    }

    pub fn full(kind: EntityKind) -> Self {
        Self {
            view: "full".to_string(),
            ..Self::for_kind(kind)
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeoRouter {
    list_url: String,
    detail_url: String,
    ftp_url: String,
}

impl Default for GeoRouter {
    fn default() -> Self {
        Self {
            list_url: LIST_URL.to_string(),
            detail_url: DETAIL_URL.to_string(),
            ftp_url: FTP_URL.to_string(),
        }
    }
}

impl GeoRouter {
    pub fn new(
        list_url: impl Into<String>,
        detail_url: impl Into<String>,
        ftp_url: impl Into<String>,
    ) -> Self {
        Self {
            list_url: list_url.into(),
            detail_url: detail_url.into(),
            ftp_url: ftp_url.into(),
        }
    }

    pub fn list(&self, kind: EntityKind, query: &ListQuery) -> Result<String, KiraError> {
        let view = match kind {
            EntityKind::Platform => "platforms",
            EntityKind::Sample => "samples",
            EntityKind::Series => "series",
        };
        let display = query.display.to_string();
        let page = query.page.to_string();
        build_url(
            &self.list_url,
            &[
                ("view", view),
                ("zsort", query.sort.as_str()),
                ("display", display.as_str()),
                ("page", page.as_str()),
            ],
        )
    }

    pub fn series_list(&self, query: &ListQuery) -> Result<String, KiraError> {
        self.list(EntityKind::Series, query)
    }

    pub fn sample_list(&self, query: &ListQuery) -> Result<String, KiraError> {
        self.list(EntityKind::Sample, query)
    }

    pub fn platform_list(&self, query: &ListQuery) -> Result<String, KiraError> {
        self.list(EntityKind::Platform, query)
    }

    pub fn detail(
        &self,
        kind: EntityKind,
        accession: &str,
        query: &DetailQuery,
    ) -> Result<String, KiraError> {
        kind.check(accession)?;
        build_url(
            &self.detail_url,
            &[
                ("acc", accession),
                ("targ", query.targ.as_str()),
                ("form", query.form.as_str()),
                ("view", query.view.as_str()),
            ],
        )
    }

    pub fn route_detail(&self, kind: EntityKind, accession: &str) -> Result<String, KiraError> {
        self.detail(kind, accession, &DetailQuery::for_kind(kind))
    }

    pub fn series_detail(&self, accession: &str) -> Result<String, KiraError> {
        self.route_detail(EntityKind::Series, accession)
    }

    pub fn sample_detail(&self, accession: &str) -> Result<String, KiraError> {
        self.route_detail(EntityKind::Sample, accession)
    }

    pub fn platform_detail(&self, accession: &str) -> Result<String, KiraError> {
        self.route_detail(EntityKind::Platform, accession)
    }

    pub fn series_matrix(
        &self,
        accession: &str,
        platform: Option<&str>,
    ) -> Result<String, KiraError> {
        EntityKind::Series.check_number(accession)?;
        let file = match platform {
            Some(platform) => {
                EntityKind::Platform.check_number(platform)?;
                format!("{accession}-{platform}_series_matrix.txt.gz")
            }
            None => format!("{accession}_series_matrix.txt.gz"),
        };
        Ok(format!(
            "{}/geo/series/{}/{accession}/matrix/{file}",
            self.ftp_url,
            series_stem(accession)
        ))
    }
}

fn series_stem(accession: &str) -> String {
    let digits = accession.trim_start_matches("GSE");
    match digits.len().checked_sub(3).and_then(|end| digits.get(..end)) {
        Some(bucket) if !bucket.is_empty() => format!("GSE{bucket}nnn"),
        _ => "GSEnnn".to_string(),
    }
}

fn build_url(base: &str, params: &[(&str, &str)]) -> Result<String, KiraError> {
    Url::parse_with_params(base, params)
        .map(String::from)
        .map_err(|err| KiraError::InvalidArgument(format!("invalid URL {base}: {err}")))
}
