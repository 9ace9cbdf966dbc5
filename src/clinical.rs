use std::collections::HashMap;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::model::{Channel, Characteristic, Sample};

pub const DELIMITER: &str = " || ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClinicalRecord {
    fields: Vec<(String, Option<String>)>,
}

impl ClinicalRecord {
    pub fn set(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        match self.fields.iter_mut().find(|(name, _)| *name == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Option<String>> {
        let idx = self.fields.iter().position(|(name, _)| name == key)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for ClinicalRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

pub(crate) fn flatten_sample(sample: &Sample) -> ClinicalRecord {
    let mut record = ClinicalRecord::default();
    record.set("accession", Some(sample.accession.clone()));
    record.set("title", sample.title.clone());
    record.set(
        "platform",
        sample.platform_accession().map(|accession| accession.to_string()),
    );

    match sample.channels.as_slice() {
        [] => {}
        [channel] => {
            record.set("source", Some(channel.source.clone()));
            record.set("organism", Some(joined_scinames(&sample.channels)));
            let mut counts = HashMap::new();
            for characteristic in &channel.characteristics {
                push_characteristic(&mut record, &mut counts, characteristic, None);
            }
            record.set("molecule", channel.molecule.clone());
        }
        channels => {
            record.set(
                "source",
                merge_values(channels.iter().map(|ch| Some(ch.source.as_str()))),
            );
            record.set("organism", Some(joined_scinames(channels)));
            let mut counts = HashMap::new();
            for (idx, channel) in channels.iter().enumerate() {
                let prefix = format!("ch{}_", idx + 1);
                for characteristic in &channel.characteristics {
                    push_characteristic(&mut record, &mut counts, characteristic, Some(&prefix));
                }
            }
            record.set(
                "molecule",
                merge_values(channels.iter().map(|ch| ch.molecule.as_deref())),
            );
        }
    }
    record
}

// A repeated tag renames its first occurrence to `<tag>_1` at the end of the
// record and numbers later ones `<tag>_2`, `<tag>_3`.
fn push_characteristic(
    record: &mut ClinicalRecord,
    counts: &mut HashMap<String, u32>,
    characteristic: &Characteristic,
    prefix: Option<&str>,
) {
    let tag = match prefix {
        Some(prefix) => format!("{prefix}{}", characteristic.tag),
        None => characteristic.tag.clone(),
    };
    let value = Some(characteristic.value.clone());
    match counts.get_mut(&tag) {
        None => {
            counts.insert(tag.clone(), 1);
            record.set(tag, value);
        }
        Some(count) => {
            if *count == 1 {
                let first = record.remove(&tag).flatten();
                record.set(format!("{tag}_1"), first);
            }
            *count += 1;
            record.set(format!("{tag}_{count}"), value);
        }
    }
}

fn joined_scinames(channels: &[Channel]) -> String {
    let mut names: Vec<&str> = Vec::new();
    for organism in channels.iter().flat_map(|channel| &channel.organisms) {
        if !names.contains(&organism.sciname.as_str()) {
            names.push(&organism.sciname);
        }
    }
    names.join(DELIMITER)
}

fn merge_values<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Option<String> {
    let values: Vec<Option<&str>> = values.collect();
    let first = *values.first()?;
    if values.iter().all(|value| *value == first) {
        return first.map(|value| value.to_string());
    }
    let present: Vec<&str> = values.into_iter().flatten().collect();
    (!present.is_empty()).then(|| present.join(DELIMITER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Organism;

    fn characteristic(tag: &str, value: &str) -> Characteristic {
        Characteristic {
            tag: tag.to_string(),
            value: value.to_string(),
        }
    }

    fn channel(position: u32, source: &str, characteristics: Vec<Characteristic>) -> Channel {
        Channel {
            position,
            source: source.to_string(),
            organisms: vec![Organism::new("9606", "Homo sapiens")],
            characteristics,
            molecule: Some("total RNA".to_string()),
            ..Channel::default()
        }
    }

    fn sample(channels: Vec<Channel>) -> Sample {
        Sample {
            accession: "GSM1".to_string(),
            title: Some("sample one".to_string()),
            channel_count: Some(channels.len() as u32),
            channels,
            ..Sample::default()
        }
    }

    #[test]
    fn repeated_tag_is_numbered() {
        let record = sample(vec![channel(
            1,
            "tumor",
            vec![
                characteristic("age", "10"),
                characteristic("sex", "F"),
                characteristic("age", "20"),
            ],
        )])
        .clinical();
        assert_eq!(record.get("age_1"), Some("10"));
        assert_eq!(record.get("age_2"), Some("20"));
        assert!(!record.contains_key("age"));
        assert_eq!(record.get("sex"), Some("F"));
        assert_eq!(record.get("organism"), Some("Homo sapiens"));
        assert_eq!(record.get("molecule"), Some("total RNA"));
    }

    #[test]
    fn dual_channel_prefixes_and_merges() {
        let record = sample(vec![
            channel(1, "tumor", vec![characteristic("grade", "2")]),
            channel(2, "reference", vec![characteristic("grade", "0")]),
        ])
        .clinical();
        assert_eq!(record.get("source"), Some("tumor || reference"));
        assert_eq!(record.get("ch1_grade"), Some("2"));
        assert_eq!(record.get("ch2_grade"), Some("0"));
        assert_eq!(record.get("molecule"), Some("total RNA"));
        assert_eq!(record.get("organism"), Some("Homo sapiens"));
    }

    #[test]
    fn organism_names_are_unique_by_name() {
        let mut first = channel(1, "tumor", Vec::new());
        first.organisms = vec![
            Organism::new("1", "Mus musculus"),
            Organism::new("9606", "Homo sapiens"),
        ];
        let mut second = channel(2, "reference", Vec::new());
        second.organisms = vec![
            Organism::new("1", "Rattus norvegicus"),
            Organism::new("10090", "Mus musculus"),
        ];
        let record = sample(vec![first, second]).clinical();
        assert_eq!(
            record.get("organism"),
            Some("Mus musculus || Homo sapiens || Rattus norvegicus")
        );
    }

    #[test]
    fn no_channels_keeps_base_fields() {
        let record = sample(Vec::new()).clinical();
        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["accession", "title", "platform"]);
        assert_eq!(record.get("platform"), None);
    }

    #[test]
    fn serializes_in_insertion_order() {
        let mut record = ClinicalRecord::default();
        record.set("b", Some("1".to_string()));
        record.set("a", None);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"b":"1","a":null}"#);
    }
}
