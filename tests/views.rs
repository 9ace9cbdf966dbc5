use std::sync::Arc;

use assert_matches::assert_matches;

use kira_geo_alchemy::clinical::DELIMITER;
use kira_geo_alchemy::error::KiraError;
use kira_geo_alchemy::model::{
    Channel, Characteristic, Column, Organism, Platform, ProbeGeneMapping, Sample, Series,
};

fn organism(taxid: &str, name: &str) -> Organism {
    Organism::new(taxid, name)
}

fn characteristic(tag: &str, value: &str) -> Characteristic {
    Characteristic {
        tag: tag.to_string(),
        value: value.to_string(),
    }
}

fn channel(position: u32, source: &str, organisms: Vec<Organism>) -> Channel {
    Channel {
        position,
        source: source.to_string(),
        organisms,
        ..Channel::default()
    }
}

fn platform(accession: &str) -> Arc<Platform> {
    Arc::new(Platform {
        accession: accession.to_string(),
        title: Some(format!("{accession} array")),
        ..Platform::default()
    })
}

fn sample(accession: &str, channels: Vec<Channel>, platform: Option<Arc<Platform>>) -> Arc<Sample> {
    Arc::new(Sample {
        accession: accession.to_string(),
        title: Some(accession.to_lowercase()),
        channel_count: Some(channels.len() as u32),
        channels,
        platform,
        ..Sample::default()
    })
}

fn series(samples: Vec<Arc<Sample>>) -> Series {
    Series {
        accession: "GSE1".to_string(),
        title: Some("series".to_string()),
        samples,
        ..Series::default()
    }
}

fn columns(names: &[&str]) -> Vec<Column> {
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| Column {
            position: idx as u32 + 1,
            name: name.to_string(),
            description: None,
        })
        .collect()
}

#[test]
fn organisms_deduplicate_in_first_seen_order() {
    let a = organism("9606", "Homo sapiens");
    let b = organism("10090", "Mus musculus");
    let c = organism("10116", "Rattus norvegicus");
    let first = sample(
        "GSM1",
        vec![channel(1, "x", vec![a.clone(), b.clone()])],
        None,
    );
    let second = sample(
        "GSM2",
        vec![channel(1, "y", vec![b.clone(), c.clone()])],
        None,
    );

    assert_eq!(series(vec![first, second]).organisms(), vec![a, b, c]);
}

#[test]
fn sample_organisms_span_channels() {
    let human = organism("9606", "Homo sapiens");
    let mouse = organism("10090", "Mus musculus");
    let two_channel = sample(
        "GSM1",
        vec![
            channel(1, "x", vec![human.clone()]),
            channel(2, "y", vec![human.clone(), mouse.clone()]),
        ],
        None,
    );
    assert_eq!(two_channel.organisms(), vec![human, mouse]);
}

#[test]
fn sample_organisms_merge_channels_in_order() {
    let a = organism("9606", "Homo sapiens");
    let b = organism("10090", "Mus musculus");
    let c = organism("10116", "Rattus norvegicus");
    let two_channel = sample(
        "GSM1",
        vec![
            channel(1, "x", vec![a.clone(), b.clone()]),
            channel(2, "y", vec![b.clone(), c.clone()]),
        ],
        None,
    );
    assert_eq!(two_channel.organisms(), vec![a, b, c]);
}

#[test]
fn repeated_tag_in_one_channel_of_two() {
    let human = vec![organism("9606", "Homo sapiens")];
    let mut first = channel(1, "tumor", human.clone());
    first.characteristics = vec![characteristic("age", "10"), characteristic("age", "20")];
    let mut second = channel(2, "reference", human);
    second.characteristics = vec![characteristic("age", "30")];
    let record = sample("GSM1", vec![first, second], None).clinical();

    assert!(!record.contains_key("ch1_age"));
    assert_eq!(record.get("ch1_age_1"), Some("10"));
    assert_eq!(record.get("ch1_age_2"), Some("20"));
    assert_eq!(record.get("ch2_age"), Some("30"));
    assert!(!record.contains_key("ch2_age_1"));
}

#[test]
fn repeated_tags_are_numbered() {
    let mut ch = channel(1, "blood", vec![organism("9606", "Homo sapiens")]);
    ch.characteristics = vec![
        characteristic("age", "10"),
        characteristic("sex", "F"),
        characteristic("age", "20"),
        characteristic("age", "30"),
    ];
    let record = sample("GSM1", vec![ch], None).clinical();

    assert!(!record.contains_key("age"));
    assert_eq!(record.get("age_1"), Some("10"));
    assert_eq!(record.get("age_2"), Some("20"));
    assert_eq!(record.get("age_3"), Some("30"));
    assert_eq!(record.get("sex"), Some("F"));

    let keys: Vec<&str> = record.keys().collect();
    let sex = keys.iter().position(|key| *key == "sex").unwrap();
    let age_1 = keys.iter().position(|key| *key == "age_1").unwrap();
    assert!(age_1 > sex);
}

#[test]
fn two_channel_sample_merges_shared_values() {
    let human = vec![organism("9606", "Homo sapiens")];
    let mut first = channel(1, "liver", human.clone());
    first.characteristics = vec![characteristic("treatment", "none")];
    first.molecule = Some("total RNA".to_string());
    let mut second = channel(2, "liver", human.clone());
    second.characteristics = vec![characteristic("treatment", "drug")];
    second.molecule = Some("total RNA".to_string());

    let record = sample("GSM1", vec![first, second], None).clinical();
    assert_eq!(record.get("source"), Some("liver"));
    assert_eq!(record.get("molecule"), Some("total RNA"));
    assert_eq!(record.get("organism"), Some("Homo sapiens"));
    assert_eq!(record.get("ch1_treatment"), Some("none"));
    assert_eq!(record.get("ch2_treatment"), Some("drug"));
}

#[test]
fn two_channel_sample_joins_differing_values() {
    let first = channel(1, "tumor", vec![organism("9606", "Homo sapiens")]);
    let second = channel(2, "reference", vec![organism("10090", "Mus musculus")]);

    let record = sample("GSM1", vec![first, second], None).clinical();
    assert_eq!(
        record.get("source"),
        Some(format!("tumor{DELIMITER}reference").as_str())
    );
    assert_eq!(
        record.get("organism"),
        Some(format!("Homo sapiens{DELIMITER}Mus musculus").as_str())
    );
}

#[test]
fn clinical_record_starts_with_identity_fields() {
    let gpl = platform("GPL570");
    let record = sample("GSM7", vec![channel(1, "x", Vec::new())], Some(gpl)).clinical();
    let keys: Vec<&str> = record.keys().take(3).collect();
    assert_eq!(keys, ["accession", "title", "platform"]);
    assert_eq!(record.get("platform"), Some("GPL570"));
}

#[test]
fn probe_mapping_skips_short_rows() {
    let annotated = Platform {
        accession: "GPL1".to_string(),
        title: Some("array".to_string()),
        columns: columns(&["ID", "GB_ACC", "Gene Symbol"]),
        internal_data: vec![
            vec!["p1".to_string(), "a1".to_string(), "TP53".to_string()],
            vec!["p2".to_string(), "a2".to_string()],
            vec!["p3".to_string(), "a3".to_string(), "EGFR".to_string()],
        ],
        ..Platform::default()
    };

    let mapping = annotated.probe_gene_mapping(2).unwrap();
    let expected: ProbeGeneMapping = [("p1", "TP53"), ("p3", "EGFR")].into_iter().collect();
    assert_eq!(mapping, expected);

    assert_matches!(
        annotated.probe_gene_mapping(3),
        Err(KiraError::MalformedPlatform { ref accession, .. }) if accession == "GPL1"
    );
}

#[test]
fn probe_mapping_needs_annotation_table() {
    let bare = platform("GPL2");
    assert_matches!(
        bare.probe_gene_mapping(1),
        Err(KiraError::MalformedPlatform { .. })
    );

    let ragged = Platform {
        accession: "GPL3".to_string(),
        columns: columns(&["ID", "Gene Symbol"]),
        internal_data: vec![vec!["p1".to_string()]],
        ..Platform::default()
    };
    assert_matches!(
        ragged.probe_gene_mapping(1),
        Err(KiraError::MalformedPlatform { .. })
    );
}

#[test]
fn platforms_are_distinct_by_accession() {
    let gpl1 = platform("GPL1");
    let gpl2 = platform("GPL2");
    let value = series(vec![
        sample("GSM1", Vec::new(), Some(gpl1.clone())),
        sample("GSM2", Vec::new(), Some(gpl2.clone())),
        sample("GSM3", Vec::new(), Some(gpl1.clone())),
        sample("GSM4", Vec::new(), None),
    ]);

    let accessions: Vec<String> = value
        .platforms()
        .iter()
        .map(|platform| platform.accession.clone())
        .collect();
    assert_eq!(accessions, ["GPL1", "GPL2"]);
    assert!(Arc::ptr_eq(&value.platform("GPL2").unwrap(), &gpl2));
    assert!(value.platform("GPL9").is_none());
    assert_eq!(value.platform_clinical(&gpl1).len(), 2);
}

#[test]
fn platform_selection() {
    let gpl1 = platform("GPL1");
    let single = series(vec![sample("GSM1", Vec::new(), Some(gpl1.clone()))]);
    assert!(Arc::ptr_eq(&single.select_platform(None).unwrap(), &gpl1));

    let multi = series(vec![
        sample("GSM1", Vec::new(), Some(gpl1.clone())),
        sample("GSM2", Vec::new(), Some(platform("GPL2"))),
    ]);
    assert_matches!(multi.select_platform(None), Err(KiraError::InvalidArgument(_)));
    assert_eq!(multi.select_platform(Some("GPL2")).unwrap().accession, "GPL2");
    assert_matches!(
        multi.select_platform(Some("GPL3")),
        Err(KiraError::InvalidArgument(_))
    );

    let empty = series(vec![sample("GSM1", Vec::new(), None)]);
    assert_matches!(
        empty.select_platform(None),
        Err(KiraError::MalformedRecord { .. })
    );
}

#[test]
fn expression_array_detection() {
    let mut value = series(Vec::new());
    assert!(!value.is_expression_profiling_by_array());
    value.experiment_types = vec![kira_geo_alchemy::model::ExperimentType {
        title: "Expression profiling by array".to_string(),
    }];
    assert!(value.is_expression_profiling_by_array());

    value.add_sample(sample("GSM1", Vec::new(), None));
    assert_eq!(value.sample_count(), 1);
    value.set_samples(Vec::new());
    assert_eq!(value.sample_count(), 0);
}
