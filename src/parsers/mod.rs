mod platform;
mod sample;
mod series;

pub use platform::PlatformParser;
pub use sample::SampleParser;
pub use series::SeriesParser;

use chrono::NaiveDate;
use tracing::warn;

use crate::domain::EntityKind;
use crate::error::KiraError;
use crate::model::{
    Channel, Characteristic, Column, ExperimentType, Organism, SupplementaryDataItem,
};
use crate::xml::{Element, MinimlDocument};

const DATE_FORMAT: &str = "%Y-%m-%d";

impl MinimlDocument {
    pub fn platform_parser(&self) -> Result<PlatformParser<'_>, KiraError> {
        self.first(EntityKind::Platform).map(PlatformParser::new)
    }

    pub fn sample_parser(&self) -> Result<SampleParser<'_>, KiraError> {
        self.first(EntityKind::Sample).map(SampleParser::new)
    }

    pub fn series_parser(&self) -> Result<SeriesParser<'_>, KiraError> {
        let element = self.first(EntityKind::Series)?;
        Ok(SeriesParser::new(element, self.root()))
    }
}

pub struct OrganismParser<'a> {
    element: &'a Element,
}

impl<'a> OrganismParser<'a> {
    pub fn new(element: &'a Element) -> Self {
        Self { element }
    }

    pub fn taxid(&self) -> Result<String, KiraError> {
        self.element.required_attr("Organism", "taxid")
    }

    pub fn sciname(&self) -> String {
        self.element.text().unwrap_or_default().to_string()
    }

    pub fn parse(&self) -> Result<Organism, KiraError> {
        Ok(Organism {
            taxid: self.taxid()?,
            sciname: self.sciname(),
        })
    }
}

pub struct ExperimentTypeParser<'a> {
    element: &'a Element,
}

impl<'a> ExperimentTypeParser<'a> {
    pub fn new(element: &'a Element) -> Self {
        Self { element }
    }

    pub fn parse(&self) -> ExperimentType {
        ExperimentType {
            title: self.element.text().unwrap_or_default().to_string(),
        }
    }
}

pub struct ColumnParser<'a> {
    element: &'a Element,
}

impl<'a> ColumnParser<'a> {
    pub fn new(element: &'a Element) -> Self {
        Self { element }
    }

    pub fn position(&self) -> Result<u32, KiraError> {
        let raw = self.element.required_attr("Column", "position")?;
        parse_number("Column/@position", &raw)
    }

    pub fn name(&self) -> Result<String, KiraError> {
        self.element.required_text("Column", "Name")
    }

    pub fn description(&self) -> Option<String> {
        self.element.first_text("Description")
    }

    pub fn parse(&self) -> Result<Column, KiraError> {
        Ok(Column {
            position: self.position()?,
            name: self.name()?,
            description: self.description(),
        })
    }
}

pub struct CharacteristicParser<'a> {
    element: &'a Element,
}

impl<'a> CharacteristicParser<'a> {
    pub fn new(element: &'a Element) -> Self {
        Self { element }
    }

    pub fn tag(&self) -> String {
        self.element
            .attr("tag")
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .unwrap_or("characteristics")
            .to_string()
    }

    pub fn value(&self) -> String {
        self.element.text().unwrap_or_default().to_string()
    }

    pub fn parse(&self) -> Characteristic {
        Characteristic {
            tag: self.tag(),
            value: self.value(),
        }
    }
}

pub struct SupplementaryDataItemParser<'a> {
    element: &'a Element,
}

impl<'a> SupplementaryDataItemParser<'a> {
    pub fn new(element: &'a Element) -> Self {
        Self { element }
    }

    pub fn parse(&self) -> SupplementaryDataItem {
        SupplementaryDataItem {
            kind: self
                .element
                .attr("type")
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            url: self.element.text().unwrap_or_default().to_string(),
        }
    }
}

pub struct ChannelParser<'a> {
    element: &'a Element,
}

impl<'a> ChannelParser<'a> {
    pub fn new(element: &'a Element) -> Self {
        Self { element }
    }

    pub fn position(&self) -> Result<u32, KiraError> {
        let raw = self.element.required_attr("Channel", "position")?;
        parse_number("Channel/@position", &raw)
    }

    pub fn source(&self) -> Result<String, KiraError> {
        self.element.required_text("Channel", "Source")
    }

    pub fn organisms(&self) -> Result<Vec<Organism>, KiraError> {
        parse_organisms(self.element)
    }

    pub fn characteristics(&self) -> Vec<Characteristic> {
        self.element
            .find_all("Characteristics")
            .into_iter()
            .map(|element| CharacteristicParser::new(element).parse())
            .collect()
    }

    pub fn parse(&self) -> Result<Channel, KiraError> {
        Ok(Channel {
            position: self.position()?,
            source: self.source()?,
            organisms: self.organisms()?,
            characteristics: self.characteristics(),
            treatment_protocol: self.element.first_text("Treatment-Protocol"),
            growth_protocol: self.element.first_text("Growth-Protocol"),
            molecule: self.element.first_text("Molecule"),
            extract_protocol: self.element.first_text("Extract-Protocol"),
            label: self.element.first_text("Label"),
            label_protocol: self.element.first_text("Label-Protocol"),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StatusDates {
    pub release: Option<NaiveDate>,
    pub last_update: Option<NaiveDate>,
    pub submission: Option<NaiveDate>,
}

impl StatusDates {
    pub(crate) fn parse(element: &Element) -> Result<Self, KiraError> {
        Ok(Self {
            release: parse_date(element, "Status/Release-Date")?,
            last_update: parse_date(element, "Status/Last-Update-Date")?,
            submission: parse_date(element, "Status/Submission-Date")?,
        })
    }
}

pub(crate) fn parse_date(element: &Element, path: &str) -> Result<Option<NaiveDate>, KiraError> {
    element
        .first_text(path)
        .map(|text| {
            NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|_| KiraError::InvalidValue {
                field: path.to_string(),
                value: text.clone(),
            })
        })
        .transpose()
}

pub(crate) fn parse_number(field: &str, text: &str) -> Result<u32, KiraError> {
    text.trim().parse().map_err(|_| KiraError::InvalidValue {
        field: field.to_string(),
        value: text.to_string(),
    })
}

pub(crate) fn parse_organisms(element: &Element) -> Result<Vec<Organism>, KiraError> {
    element
        .find_all("Organism")
        .into_iter()
        .map(|element| OrganismParser::new(element).parse())
        .collect()
}

pub(crate) fn parse_columns(element: &Element) -> Result<Vec<Column>, KiraError> {
    element
        .find_all("Data-Table/Column")
        .into_iter()
        .map(|element| ColumnParser::new(element).parse())
        .collect()
}

pub(crate) fn parse_supplementary_data(element: &Element) -> Vec<SupplementaryDataItem> {
    element
        .find_all("Supplementary-Data")
        .into_iter()
        .map(|element| SupplementaryDataItemParser::new(element).parse())
        .collect()
}

pub(crate) fn parse_internal_data(
    element: &Element,
    width: usize,
    accession: &str,
) -> Vec<Vec<String>> {
    let Some(block) = element.find("Data-Table/Internal-Data") else {
        return Vec::new();
    };
    let mut rows = Vec::new();
    for (idx, line) in block.text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let row: Vec<String> = line.split('\t').map(str::to_string).collect();
        if width > 0 && row.len() != width {
            warn!(
                accession,
                line = idx,
                found = row.len(),
                expected = width,
                "dropping internal data row with unexpected field count"
            );
            continue;
        }
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn internal_data(text: &str) -> Element {
        Element::new("Platform").with_child(
            Element::new("Data-Table").with_child(Element::new("Internal-Data").with_text(text)),
        )
    }

    #[test]
    fn internal_data_drops_rows_with_wrong_width() {
        let element = internal_data("\n1007_s_at\tDDR1\tx\n1053_at\tRFC2\n\n117_at\tHSPA6\ty\n");
        let rows = parse_internal_data(&element, 3, "GPL1");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["1007_s_at", "DDR1", "x"]);
        assert_eq!(rows[1][0], "117_at");
    }

    #[test]
    fn internal_data_keeps_empty_trailing_fields() {
        let element = internal_data("1552256_a_at\t\t\n");
        let rows = parse_internal_data(&element, 3, "GPL1");
        assert_eq!(rows, vec![vec!["1552256_a_at", "", ""]]);
    }

    #[test]
    fn dates_use_iso_format() {
        let element = Element::new("Sample").with_child(
            Element::new("Status")
                .with_child(Element::new("Release-Date").with_text("2017-12-19"))
                .with_child(Element::new("Submission-Date").with_text("19/12/2017")),
        );
        assert_eq!(
            parse_date(&element, "Status/Release-Date").unwrap(),
            NaiveDate::from_ymd_opt(2017, 12, 19)
        );
        assert_eq!(parse_date(&element, "Status/Last-Update-Date").unwrap(), None);
        assert_matches!(
            parse_date(&element, "Status/Submission-Date"),
            Err(KiraError::InvalidValue { .. })
        );
    }

    #[test]
    fn characteristic_without_tag_uses_generic_name() {
        let element = Element::new("Characteristics").with_text(" age: 10 ");
        let parsed = CharacteristicParser::new(&element).parse();
        assert_eq!(parsed.tag, "characteristics");
        assert_eq!(parsed.value, "age: 10");
    }
}
