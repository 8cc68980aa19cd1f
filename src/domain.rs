use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ReadsError;

/// Archive-internal numeric identifier, as returned by `esearch` and `elink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Uid(u64);

impl Uid {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Uid {
    type Err = ReadsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ReadsError::UpstreamQuery(format!("invalid UID: {value}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    Illumina,
    LongRead,
    Other,
}

impl Technology {
    /// Classifies a raw SRA platform tag (`ILLUMINA`, `OXFORD_NANOPORE`,
    /// `PACBIO_SMRT`, ...) by case-insensitive substring.
    pub fn from_platform(platform: &str) -> Self {
        let platform = platform.to_lowercase();
        if platform.contains("illumina") {
            Technology::Illumina
        } else if platform.contains("nanopore") || platform.contains("pacbio") {
            Technology::LongRead
        } else {
            Technology::Other
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Technology::Illumina => write!(f, "Illumina"),
            Technology::LongRead => write!(f, "long read"),
            Technology::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessionKind {
    Project,
    Sample,
    Experiment,
    Run,
}

impl AccessionKind {
    /// Check order used when classifying free text.
    pub const ALL: [AccessionKind; 4] = [
        AccessionKind::Project,
        AccessionKind::Sample,
        AccessionKind::Experiment,
        AccessionKind::Run,
    ];

    fn type_suffix(self) -> char {
        match self {
            AccessionKind::Project => 'P',
            AccessionKind::Sample => 'S',
            AccessionKind::Experiment => 'X',
            AccessionKind::Run => 'R',
        }
    }
}

impl fmt::Display for AccessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessionKind::Project => write!(f, "project"),
            AccessionKind::Sample => write!(f, "sample"),
            AccessionKind::Experiment => write!(f, "experiment"),
            AccessionKind::Run => write!(f, "run"),
        }
    }
}

// DDBJ, ENA and SRA source prefixes.
const SOURCE_PREFIXES: [&str; 3] = ["DR", "ER", "SR"];

static VALIDATORS: LazyLock<Vec<(AccessionKind, Regex)>> = LazyLock::new(|| {
    AccessionKind::ALL
        .into_iter()
        .map(|kind| {
            let pattern = format!(
                r"^(?:{}){}[0-9]+$",
                SOURCE_PREFIXES.join("|"),
                kind.type_suffix()
            );
            let regex = Regex::new(&pattern).expect("accession pattern is a valid regex");
            (kind, regex)
        })
        .collect()
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Accession {
    kind: AccessionKind,
    value: String,
}

impl Accession {
    pub fn kind(&self) -> AccessionKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for Accession {
    type Err = ReadsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        VALIDATORS
            .iter()
            .find(|(_, regex)| regex.is_match(trimmed))
            .map(|(kind, _)| Accession {
                kind: *kind,
                value: trimmed.to_string(),
            })
            .ok_or_else(|| ReadsError::UnclassifiableAccession(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifiedAccessions {
    pub project: Vec<String>,
    pub sample: Vec<String>,
    pub experiment: Vec<String>,
    pub run: Vec<String>,
    pub unclassified: Vec<String>,
}

impl ClassifiedAccessions {
    pub fn of_kind(&self, kind: AccessionKind) -> &[String] {
        match kind {
            AccessionKind::Project => &self.project,
            AccessionKind::Sample => &self.sample,
            AccessionKind::Experiment => &self.experiment,
            AccessionKind::Run => &self.run,
        }
    }

    pub fn is_empty(&self) -> bool {
        AccessionKind::ALL
            .iter()
            .all(|kind| self.of_kind(*kind).is_empty())
            && self.unclassified.is_empty()
    }

    fn push(&mut self, accession: Accession) {
        let bucket = match accession.kind {
            AccessionKind::Project => &mut self.project,
            AccessionKind::Sample => &mut self.sample,
            AccessionKind::Experiment => &mut self.experiment,
            AccessionKind::Run => &mut self.run,
        };
        bucket.push(accession.value);
    }
}

/// Sorts free-text lines into accession kinds. Blank lines are skipped,
/// duplicates keep their first position, and lines matching no grammar are
/// logged and set aside rather than failing the batch.
pub fn classify_accessions<I, S>(lines: I) -> ClassifiedAccessions
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut classified = ClassifiedAccessions::default();
    for line in lines {
        let line = line.as_ref().trim();
        if line.is_empty() || !seen.insert(line.to_string()) {
            continue;
        }
        match line.parse::<Accession>() {
            Ok(accession) => classified.push(accession),
            Err(err) => {
                tracing::warn!("{err}");
                classified.unclassified.push(line.to_string());
            }
        }
    }
    classified
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn classify_known_prefixes() {
        let acc: Accession = "SRP012345".parse().unwrap();
        assert_eq!(acc.kind(), AccessionKind::Project);
        let acc: Accession = "DRS000001".parse().unwrap();
        assert_eq!(acc.kind(), AccessionKind::Sample);
        let acc: Accession = "SRX012345".parse().unwrap();
        assert_eq!(acc.kind(), AccessionKind::Experiment);
        let acc: Accession = "ERR999999".parse().unwrap();
        assert_eq!(acc.kind(), AccessionKind::Run);
    }

    #[test]
    fn reject_unknown_grammar() {
        let err = "SAMN00000000".parse::<Accession>().unwrap_err();
        assert_matches!(err, ReadsError::UnclassifiableAccession(value) if value == "SAMN00000000");
        assert!("SRR".parse::<Accession>().is_err());
        assert!("XXR123".parse::<Accession>().is_err());
        assert!("SRR123a".parse::<Accession>().is_err());
    }

    #[test]
    fn platform_classification() {
        assert_eq!(Technology::from_platform("ILLUMINA"), Technology::Illumina);
        assert_eq!(
            Technology::from_platform("OXFORD_NANOPORE"),
            Technology::LongRead
        );
        assert_eq!(Technology::from_platform("PACBIO_SMRT"), Technology::LongRead);
        assert_eq!(Technology::from_platform("ION_TORRENT"), Technology::Other);
    }

    #[test]
    fn uid_parse() {
        let uid: Uid = " 12345 ".parse().unwrap();
        assert_eq!(uid.get(), 12345);
        assert_matches!("abc".parse::<Uid>(), Err(ReadsError::UpstreamQuery(_)));
    }
}
