use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::domain::{ClassifiedAccessions, Technology, classify_accessions};
use crate::error::ReadsError;
use crate::eutils::EutilsClient;
use crate::model::Sample;
use crate::pipeline::Resolver;
use crate::select::{RunSelection, select_runs};

#[derive(Debug, Clone, Default)]
pub struct LocateRequest {
    pub accession_list: Option<Utf8PathBuf>,
    pub bioprojects: Vec<String>,
    /// Species-level collection name. Not queried yet.
    pub genome_trackr: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocateResult {
    pub generated_at: String,
    pub accessions: ClassifiedAccessions,
    pub samples: Vec<SampleSummary>,
    pub runs: Vec<RunEntry>,
    pub run_names: BTreeMap<String, String>,
    pub sample_names: BTreeMap<String, Option<String>>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleSummary {
    pub accession: String,
    pub sra_sample_accession: Option<String>,
    pub title: String,
    pub taxonomy_name: Option<String>,
    pub technology: String,
    pub experiments: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunEntry {
    pub accession: String,
    pub display_name: String,
    pub biosample_accession: Option<String>,
    pub technology: Technology,
    pub platform: String,
    pub published_date: String,
    pub total_bases: u64,
}

impl LocateResult {
    fn new(accessions: ClassifiedAccessions, samples: &[Sample], selection: RunSelection) -> Self {
        let samples = samples
            .iter()
            .map(|sample| SampleSummary {
                accession: sample.accession.clone(),
                sra_sample_accession: sample.sra_sample_accession.clone(),
                title: sample.title.clone(),
                taxonomy_name: sample.taxonomy_name.clone(),
                technology: sample.technology_summary().to_string(),
                experiments: sample.experiment_count(),
            })
            .collect();
        let runs = selection
            .runs
            .iter()
            .map(|selected| RunEntry {
                accession: selected.run.accession.clone(),
                display_name: selected.display_name(),
                biosample_accession: selected
                    .run
                    .sample
                    .as_ref()
                    .map(|sample| sample.biosample_accession.clone()),
                technology: selected.technology,
                platform: selected.platform.clone(),
                published_date: selected.run.published_date.clone(),
                total_bases: selected.run.total_bases,
            })
            .collect();
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            accessions,
            samples,
            runs,
            run_names: selection.run_names,
            sample_names: selection.sample_names,
            warnings: selection.warnings,
        }
    }
}

pub struct App<C: EutilsClient> {
    resolver: Resolver<C>,
}

impl<C: EutilsClient> App<C> {
    pub fn new(resolver: Resolver<C>) -> Self {
        Self { resolver }
    }

    pub fn locate(&self, request: &LocateRequest) -> Result<LocateResult, ReadsError> {
        let accessions = match &request.accession_list {
            Some(path) => read_accession_list(path)?,
            None => ClassifiedAccessions::default(),
        };

        let samples = if request.bioprojects.is_empty() {
            Vec::new()
        } else {
            tracing::info!(projects = ?request.bioprojects, "resolving BioProjects");
            self.resolver
                .samples_from_bioproject_accessions(&request.bioprojects)?
        };

        if let Some(species) = &request.genome_trackr {
            tracing::warn!(species = %species, "species collection lookup is not implemented; skipping");
        }

        let selection = select_runs(&samples);
        Ok(LocateResult::new(accessions, &samples, selection))
    }
}

/// Reads a newline-delimited accession file and sorts its lines by kind.
pub fn read_accession_list(path: &Utf8Path) -> Result<ClassifiedAccessions, ReadsError> {
    tracing::info!(%path, "reading accession list");
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| ReadsError::Filesystem(format!("read {path}: {err}")))?;
    let classified = classify_accessions(content.lines());
    tracing::info!(
        projects = classified.project.len(),
        samples = classified.sample.len(),
        experiments = classified.experiment.len(),
        runs = classified.run.len(),
        unclassified = classified.unclassified.len(),
        "classified accession list"
    );
    Ok(classified)
}
