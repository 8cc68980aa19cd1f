use std::fmt;

use serde::Serialize;

use crate::domain::{Technology, Uid};

/// A BioSample and the SRA experiments joined to it, partitioned by technology.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub uid: Uid,
    pub accession: String,
    pub submission_date: Option<String>,
    pub last_update: Option<String>,
    pub title: String,
    pub taxonomy_id: Option<u64>,
    pub taxonomy_name: Option<String>,
    pub sra_sample_accession: Option<String>,
    pub illumina_experiments: Vec<Experiment>,
    pub long_read_experiments: Vec<Experiment>,
    pub other_experiments: Vec<Experiment>,
}

impl Sample {
    /// Files an experiment under the bucket its platform classifies into.
    pub fn add_experiment(&mut self, experiment: Experiment) {
        match experiment.technology() {
            Technology::Illumina => self.illumina_experiments.push(experiment),
            Technology::LongRead => self.long_read_experiments.push(experiment),
            Technology::Other => self.other_experiments.push(experiment),
        }
    }

    pub fn experiments(&self) -> impl Iterator<Item = &Experiment> {
        self.illumina_experiments
            .iter()
            .chain(&self.long_read_experiments)
            .chain(&self.other_experiments)
    }

    pub fn experiment_count(&self) -> usize {
        self.illumina_experiments.len()
            + self.long_read_experiments.len()
            + self.other_experiments.len()
    }

    pub fn sample_ref(&self) -> SampleRef {
        SampleRef {
            biosample_accession: self.accession.clone(),
            sra_sample_accession: self.sra_sample_accession.clone(),
        }
    }

    /// Points every run under this sample back at it.
    pub fn link_runs(&mut self) {
        let sample_ref = self.sample_ref();
        for experiment in self
            .illumina_experiments
            .iter_mut()
            .chain(self.long_read_experiments.iter_mut())
            .chain(self.other_experiments.iter_mut())
        {
            for run in &mut experiment.runs {
                run.sample = Some(sample_ref.clone());
            }
        }
    }

    pub fn technology_summary(&self) -> &'static str {
        match (
            self.illumina_experiments.is_empty(),
            self.long_read_experiments.is_empty(),
        ) {
            (false, false) => "hybrid",
            (false, true) => "Illumina",
            (true, false) => "long read",
            (true, true) => "unknown",
        }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.accession,
            self.taxonomy_name.as_deref().unwrap_or("unknown organism"),
            self.technology_summary()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Experiment {
    pub accession: String,
    pub alias: Option<String>,
    /// Only used to join the experiment to its sample.
    pub biosample_accession: String,
    pub library_name: Option<String>,
    pub library_strategy: String,
    pub library_source: String,
    pub library_selection: String,
    pub library_layout: String,
    pub platform: String,
    pub instrument_model: String,
    pub runs: Vec<Run>,
}

impl Experiment {
    pub fn technology(&self) -> Technology {
        Technology::from_platform(&self.platform)
    }
}

/// Non-owning pointer from a run back to the sample it was joined to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleRef {
    pub biosample_accession: String,
    pub sra_sample_accession: Option<String>,
}

impl SampleRef {
    /// Name used for downloaded files; BioSample accession when the sample
    /// has no SRA cross-reference.
    pub fn display_accession(&self) -> &str {
        self.sra_sample_accession
            .as_deref()
            .unwrap_or(&self.biosample_accession)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    pub accession: String,
    pub alias: Option<String>,
    pub experiment_accession: String,
    /// Set by the linking pass once experiments are joined to samples.
    pub sample: Option<SampleRef>,
    pub total_spots: u64,
    pub total_bases: u64,
    pub size: u64,
    pub published_date: String,
    pub read_file_count: usize,
    pub read_counts: Vec<u64>,
    pub read_average_lengths: Vec<f64>,
    pub read_stdevs: Vec<f64>,
}

impl Run {
    /// `{sra sample}_{run}_{platform}`, falling back to the run accession
    /// alone before the run is linked.
    pub fn display_name(&self, platform: &str) -> String {
        match &self.sample {
            Some(sample) => format!(
                "{}_{}_{}",
                sample.display_accession(),
                self.accession,
                platform
            ),
            None => format!("{}_{}", self.accession, platform),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn sample(accession: &str) -> Sample {
        Sample {
            uid: Uid::new(1),
            accession: accession.to_string(),
            submission_date: None,
            last_update: None,
            title: format!("{accession} title"),
            taxonomy_id: Some(562),
            taxonomy_name: Some("Escherichia coli".to_string()),
            sra_sample_accession: Some(format!("SRS{}", &accession[4..])),
            illumina_experiments: Vec::new(),
            long_read_experiments: Vec::new(),
            other_experiments: Vec::new(),
        }
    }

    pub fn experiment(accession: &str, biosample: &str, platform: &str, runs: Vec<Run>) -> Experiment {
        let runs = runs
            .into_iter()
            .map(|mut run| {
                run.experiment_accession = accession.to_string();
                run
            })
            .collect();
        Experiment {
            accession: accession.to_string(),
            alias: None,
            biosample_accession: biosample.to_string(),
            library_name: None,
            library_strategy: "WGS".to_string(),
            library_source: "GENOMIC".to_string(),
            library_selection: "RANDOM".to_string(),
            library_layout: "PAIRED".to_string(),
            platform: platform.to_string(),
            instrument_model: "unspecified".to_string(),
            runs,
        }
    }

    pub fn run(accession: &str, published: &str) -> Run {
        Run {
            accession: accession.to_string(),
            alias: None,
            experiment_accession: String::new(),
            sample: None,
            total_spots: 100,
            total_bases: 15_000,
            size: 4_096,
            published_date: published.to_string(),
            read_file_count: 1,
            read_counts: vec![100],
            read_average_lengths: vec![150.0],
            read_stdevs: vec![0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{experiment, run, sample};
    use super::*;

    #[test]
    fn experiments_are_partitioned_by_platform() {
        let mut biosample = sample("SAMN0001");
        biosample.add_experiment(experiment("SRX1", "SAMN0001", "ILLUMINA", vec![]));
        biosample.add_experiment(experiment("SRX2", "SAMN0001", "OXFORD_NANOPORE", vec![]));
        biosample.add_experiment(experiment("SRX3", "SAMN0001", "PACBIO_SMRT", vec![]));
        biosample.add_experiment(experiment("SRX4", "SAMN0001", "LS454", vec![]));

        assert_eq!(biosample.illumina_experiments.len(), 1);
        assert_eq!(biosample.long_read_experiments.len(), 2);
        assert_eq!(biosample.other_experiments.len(), 1);
        assert_eq!(biosample.experiment_count(), 4);
        assert_eq!(biosample.technology_summary(), "hybrid");
        assert_eq!(biosample.to_string(), "SAMN0001 (Escherichia coli, hybrid)");
    }

    #[test]
    fn link_runs_sets_sample_on_every_run() {
        let mut biosample = sample("SAMN0001");
        biosample.add_experiment(experiment(
            "SRX1",
            "SAMN0001",
            "ILLUMINA",
            vec![run("SRR1", "2020-01-01"), run("SRR2", "2020-01-02")],
        ));
        biosample.add_experiment(experiment(
            "SRX2",
            "SAMN0001",
            "ION_TORRENT",
            vec![run("SRR3", "2020-01-03")],
        ));
        biosample.link_runs();

        for experiment in biosample.experiments() {
            for run in &experiment.runs {
                assert_eq!(run.experiment_accession, experiment.accession);
                let linked = run.sample.as_ref().unwrap();
                assert_eq!(linked.biosample_accession, "SAMN0001");
                assert_eq!(linked.sra_sample_accession.as_deref(), Some("SRS0001"));
            }
        }
    }

    #[test]
    fn display_name_falls_back_to_biosample() {
        let mut run = run("SRR9", "2020-01-01");
        assert_eq!(run.display_name("ILLUMINA"), "SRR9_ILLUMINA");
        run.sample = Some(SampleRef {
            biosample_accession: "SAMN9".to_string(),
            sra_sample_accession: None,
        });
        assert_eq!(run.display_name("ILLUMINA"), "SAMN9_SRR9_ILLUMINA");
        run.sample = Some(SampleRef {
            biosample_accession: "SAMN9".to_string(),
            sra_sample_accession: Some("SRS9".to_string()),
        });
        assert_eq!(run.display_name("ILLUMINA"), "SRS9_SRR9_ILLUMINA");
    }
}
