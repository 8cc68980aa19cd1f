use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::domain::Technology;
use crate::model::{Experiment, Run, Sample};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedRun {
    pub run: Run,
    pub technology: Technology,
    pub platform: String,
}

impl SelectedRun {
    pub fn accession(&self) -> &str {
        &self.run.accession
    }

    pub fn display_name(&self) -> String {
        self.run.display_name(&self.platform)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionWarning {
    /// More than one run of a technology; only the most recent was kept.
    MultipleRuns {
        technology: Technology,
        sample: String,
        selected: String,
        ignored: Vec<String>,
    },
    /// Runs whose platform is neither Illumina nor long read.
    OtherPlatform { sample: String, ignored: Vec<String> },
}

impl fmt::Display for SelectionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionWarning::MultipleRuns {
                technology,
                sample,
                selected,
                ignored,
            } => write!(
                f,
                "There were multiple {technology} runs for sample {sample}. Only the most recent \
                 ({selected}) was downloaded. These additional runs were ignored: {}",
                ignored.join(", ")
            ),
            SelectionWarning::OtherPlatform { sample, ignored } => write!(
                f,
                "There were runs associated with sample {sample} which were neither Illumina \
                 reads nor long reads. They were ignored: {}",
                ignored.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSelection {
    pub selected: Vec<SelectedRun>,
    pub warnings: Vec<SelectionWarning>,
}

/// Picks the most recently published Illumina run and the most recently
/// published long-read run of `sample`. Equal dates keep experiment/run
/// order. Runs on any other platform are never selected.
pub fn select_runs_for_sample(sample: &Sample) -> SampleSelection {
    let mut selection = SampleSelection::default();

    let illumina = most_recent_first(&sample.illumina_experiments);
    pick_most_recent(&illumina, Technology::Illumina, sample, &mut selection);

    let long_read = most_recent_first(&sample.long_read_experiments);
    pick_most_recent(&long_read, Technology::LongRead, sample, &mut selection);

    let other = flatten_runs(&sample.other_experiments);
    if !other.is_empty() {
        selection.warnings.push(SelectionWarning::OtherPlatform {
            sample: sample.accession.clone(),
            ignored: other.iter().map(|(_, run)| run.accession.clone()).collect(),
        });
    }

    tracing::debug!(
        sample = %sample,
        selected = selection.selected.len(),
        warnings = selection.warnings.len(),
        "selected runs"
    );
    selection
}

fn flatten_runs(experiments: &[Experiment]) -> Vec<(&Experiment, &Run)> {
    experiments
        .iter()
        .flat_map(|experiment| experiment.runs.iter().map(move |run| (experiment, run)))
        .collect()
}

fn most_recent_first(experiments: &[Experiment]) -> Vec<(&Experiment, &Run)> {
    let mut runs = flatten_runs(experiments);
    // stable: ties keep input order
    runs.sort_by(|a, b| b.1.published_date.cmp(&a.1.published_date));
    runs
}

fn pick_most_recent(
    runs: &[(&Experiment, &Run)],
    technology: Technology,
    sample: &Sample,
    selection: &mut SampleSelection,
) {
    let Some((experiment, run)) = runs.first() else {
        return;
    };
    selection.selected.push(SelectedRun {
        run: (*run).clone(),
        technology,
        platform: experiment.platform.clone(),
    });
    if runs.len() > 1 {
        selection.warnings.push(SelectionWarning::MultipleRuns {
            technology,
            sample: sample.accession.clone(),
            selected: run.accession.clone(),
            ignored: runs[1..]
                .iter()
                .map(|(_, run)| run.accession.clone())
                .collect(),
        });
    }
}

/// Selection over every sample, flattened for the download stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSelection {
    pub runs: Vec<SelectedRun>,
    /// Run accession → `{sample}_{run}_{platform}`.
    pub run_names: BTreeMap<String, String>,
    /// BioSample accession → SRA sample accession.
    pub sample_names: BTreeMap<String, Option<String>>,
    pub warnings: Vec<String>,
}

impl RunSelection {
    pub fn run_accessions(&self) -> Vec<&str> {
        self.runs.iter().map(SelectedRun::accession).collect()
    }
}

pub fn select_runs(samples: &[Sample]) -> RunSelection {
    let mut output = RunSelection::default();
    for sample in samples {
        let selection = select_runs_for_sample(sample);
        output.sample_names.insert(
            sample.accession.clone(),
            sample.sra_sample_accession.clone(),
        );
        for selected in selection.selected {
            output
                .run_names
                .insert(selected.run.accession.clone(), selected.display_name());
            output.runs.push(selected);
        }
        output
            .warnings
            .extend(selection.warnings.iter().map(ToString::to_string));
    }
    tracing::info!(
        samples = samples.len(),
        runs = output.runs.len(),
        warnings = output.warnings.len(),
        "run selection complete"
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{experiment, run, sample};

    #[test]
    fn empty_sample_selects_nothing() {
        let selection = select_runs_for_sample(&sample("SAMN0001"));
        assert!(selection.selected.is_empty());
        assert!(selection.warnings.is_empty());
    }

    #[test]
    fn equal_dates_keep_input_order() {
        let mut biosample = sample("SAMN0001");
        biosample.add_experiment(experiment(
            "SRX1",
            "SAMN0001",
            "ILLUMINA",
            vec![run("SRR1", "2021-01-01"), run("SRR2", "2021-01-01")],
        ));
        biosample.add_experiment(experiment(
            "SRX2",
            "SAMN0001",
            "ILLUMINA",
            vec![run("SRR3", "2021-01-01")],
        ));
        let selection = select_runs_for_sample(&biosample);
        assert_eq!(selection.selected[0].accession(), "SRR1");
        assert_eq!(
            selection.warnings,
            vec![SelectionWarning::MultipleRuns {
                technology: Technology::Illumina,
                sample: "SAMN0001".to_string(),
                selected: "SRR1".to_string(),
                ignored: vec!["SRR2".to_string(), "SRR3".to_string()],
            }]
        );
    }

    #[test]
    fn long_read_warning_lists_long_read_runs() {
        let mut biosample = sample("SAMN0001");
        biosample.add_experiment(experiment(
            "SRX1",
            "SAMN0001",
            "ILLUMINA",
            vec![run("SRR1", "2021-01-01")],
        ));
        biosample.add_experiment(experiment(
            "SRX2",
            "SAMN0001",
            "PACBIO_SMRT",
            vec![run("SRR2", "2019-05-01"), run("SRR3", "2020-05-01")],
        ));
        let selection = select_runs_for_sample(&biosample);
        assert_eq!(selection.selected.len(), 2);
        assert_eq!(selection.selected[1].accession(), "SRR3");
        assert_eq!(selection.selected[1].technology, Technology::LongRead);
        assert_eq!(
            selection.warnings[0].to_string(),
            "There were multiple long read runs for sample SAMN0001. Only the most recent \
             (SRR3) was downloaded. These additional runs were ignored: SRR2"
        );
    }

    #[test]
    fn other_platforms_are_reported_once() {
        let mut biosample = sample("SAMN0001");
        biosample.add_experiment(experiment(
            "SRX1",
            "SAMN0001",
            "ION_TORRENT",
            vec![run("SRR1", "2021-01-01")],
        ));
        biosample.add_experiment(experiment(
            "SRX2",
            "SAMN0001",
            "LS454",
            vec![run("SRR2", "2022-01-01")],
        ));
        let selection = select_runs_for_sample(&biosample);
        assert!(selection.selected.is_empty());
        assert_eq!(
            selection.warnings,
            vec![SelectionWarning::OtherPlatform {
                sample: "SAMN0001".to_string(),
                ignored: vec!["SRR1".to_string(), "SRR2".to_string()],
            }]
        );
    }
}
