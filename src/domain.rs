use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;

static ACCESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(GPL|GSM|GSE)\d+$").expect("valid accession pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Platform,
    Sample,
    Series,
}

impl EntityKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Platform => "GPL",
            EntityKind::Sample => "GSM",
            EntityKind::Series => "GSE",
        }
    }

    pub fn element_name(&self) -> &'static str {
        match self {
            EntityKind::Platform => "Platform",
            EntityKind::Sample => "Sample",
            EntityKind::Series => "Series",
        }
    }

    pub fn of_accession(accession: &str) -> Option<Self> {
        [EntityKind::Platform, EntityKind::Sample, EntityKind::Series]
            .into_iter()
            .find(|kind| accession.starts_with(kind.prefix()))
    }

    pub fn check(&self, accession: &str) -> Result<(), KiraError> {
        if accession.starts_with(self.prefix()) {
            return Ok(());
        }
        Err(KiraError::InvalidAccession {
            expected: *self,
            accession: accession.to_string(),
        })
    }

    pub fn check_number(&self, accession: &str) -> Result<(), KiraError> {
        self.check(accession)?;
        let digits = &accession[self.prefix().len()..];
        if !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit()) {
            return Ok(());
        }
        Err(KiraError::InvalidAccession {
            expected: *self,
            accession: accession.to_string(),
        })
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.element_name())
    }
}

fn parse_accession(value: &str, kind: EntityKind) -> Result<String, KiraError> {
    let normalized = value.trim().to_uppercase();
    if !ACCESSION_RE.is_match(&normalized) {
        return Err(KiraError::InvalidAccession {
            expected: kind,
            accession: value.to_string(),
        });
    }
    kind.check(&normalized)?;
    Ok(normalized)
}

macro_rules! accession_type {
    ($name:ident, $kind:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = KiraError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                parse_accession(value, $kind).map(Self)
            }
        }
    };
}

accession_type!(PlatformAccession, EntityKind::Platform);
accession_type!(SampleAccession, EntityKind::Sample);
accession_type!(SeriesAccession, EntityKind::Series);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Min,
    Max,
    First,
    Last,
    Mean,
    Median,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Min => write!(f, "min"),
            AggregateFunction::Max => write!(f, "max"),
            AggregateFunction::First => write!(f, "first"),
            AggregateFunction::Last => write!(f, "last"),
            AggregateFunction::Mean => write!(f, "mean"),
            AggregateFunction::Median => write!(f, "median"),
        }
    }
}
