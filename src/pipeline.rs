//! Project → sample → experiment → run resolution.
//!
//! Every stage finishes before the next one starts. UID lists are split into
//! requests of at most `batch_size` ids when a batch size is configured;
//! otherwise each stage issues a single request.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;

use crate::domain::Uid;
use crate::error::ReadsError;
use crate::eutils::{EutilsClient, EutilsUrls};
use crate::model::{Experiment, Sample};
use crate::parse::{
    parse_biosample_set, parse_elink_result, parse_esearch_page, parse_experiment_package_set,
};

pub const BIOPROJECT_BIOSAMPLE_LINK: &str = "bioproject_biosample_all";

/// esearch page size; the server caps `retmax` at 10 000.
pub const SEARCH_PAGE_SIZE: usize = 10_000;

pub struct Resolver<C: EutilsClient> {
    client: C,
    urls: EutilsUrls,
    batch_size: Option<usize>,
    search_page_size: NonZeroUsize,
}

impl<C: EutilsClient> Resolver<C> {
    pub fn new(client: C, urls: EutilsUrls) -> Self {
        Self {
            client,
            urls,
            batch_size: None,
            search_page_size: NonZeroUsize::new(SEARCH_PAGE_SIZE).unwrap_or(NonZeroUsize::MIN),
        }
    }

    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Result<Self, ReadsError> {
        if let Some(0) = batch_size {
            return Err(ReadsError::InvalidBatchSize(0));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn with_search_page_size(mut self, page_size: NonZeroUsize) -> Self {
        self.search_page_size = page_size;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn samples_from_bioproject_accessions(
        &self,
        accessions: &[String],
    ) -> Result<Vec<Sample>, ReadsError> {
        let project_uids = self.resolve_uids(accessions, "bioproject")?;
        let sample_uids = self.link_biosample_uids_from_bioproject_uids(&project_uids)?;
        self.fetch_samples_and_link_experiments(&sample_uids)
    }

    /// Looks up the UIDs of `accessions` in `database`. No match is an empty
    /// list, not an error. Results are paged until the server's `Count` is
    /// reached; a short page before that fails with `UpstreamQuery`.
    pub fn resolve_uids(
        &self,
        accessions: &[String],
        database: &str,
    ) -> Result<Vec<Uid>, ReadsError> {
        let page_size = self.search_page_size.get();
        let mut uids = Vec::new();
        for batch in self.batches(accessions) {
            let mut retstart = 0;
            loop {
                let url = self.urls.esearch(database, batch, retstart, page_size)?;
                tracing::debug!(%url, "esearch");
                let page = parse_esearch_page(&self.client.fetch(&url)?)?;
                let received = page.ids.len();
                uids.extend(page.ids);
                retstart += received;
                if retstart >= page.count {
                    break;
                }
                if received < page_size {
                    return Err(ReadsError::UpstreamQuery(format!(
                        "esearch in {database} reported {} matches but returned {retstart}",
                        page.count
                    )));
                }
            }
        }
        let uids = dedup(uids);
        tracing::info!(
            database,
            accessions = accessions.len(),
            uids = uids.len(),
            "resolved accessions"
        );
        Ok(uids)
    }

    /// Follows the `bioproject_biosample_all` link set. A response without
    /// that link set means the projects have no samples.
    pub fn link_biosample_uids_from_bioproject_uids(
        &self,
        project_uids: &[Uid],
    ) -> Result<Vec<Uid>, ReadsError> {
        let mut sample_uids = Vec::new();
        for batch in self.batches(project_uids) {
            let url = self.urls.elink("bioproject", "biosample", batch)?;
            tracing::debug!(%url, "elink");
            let link_sets = parse_elink_result(&self.client.fetch(&url)?)?;
            sample_uids.extend(
                link_sets
                    .into_iter()
                    .flat_map(|link_set| link_set.dbs)
                    .filter(|db| db.link_name.as_deref() == Some(BIOPROJECT_BIOSAMPLE_LINK))
                    .flat_map(|db| db.ids),
            );
        }
        let sample_uids = dedup(sample_uids);
        tracing::info!(
            projects = project_uids.len(),
            samples = sample_uids.len(),
            "linked projects to samples"
        );
        Ok(sample_uids)
    }

    /// Fetches samples, then their SRA experiments and runs, joins each
    /// experiment to its sample and finally links every run back to the
    /// sample that owns it.
    pub fn fetch_samples_and_link_experiments(
        &self,
        sample_uids: &[Uid],
    ) -> Result<Vec<Sample>, ReadsError> {
        let mut samples = self.fetch_samples(sample_uids)?;
        let fetched_uids = samples.iter().map(|sample| sample.uid).collect::<Vec<_>>();
        let experiment_uids = self.link_sra_uids_from_biosample_uids(&fetched_uids)?;
        let experiments = self.fetch_experiments(&experiment_uids)?;
        tracing::info!(
            samples = samples.len(),
            experiments = experiments.len(),
            "fetched samples and experiments"
        );
        attach_experiments(&mut samples, experiments)?;
        link_runs_to_samples(&mut samples);
        Ok(samples)
    }

    fn fetch_samples(&self, sample_uids: &[Uid]) -> Result<Vec<Sample>, ReadsError> {
        let mut samples = Vec::new();
        for batch in self.batches(sample_uids) {
            let url = self.urls.efetch("biosample", batch)?;
            tracing::debug!(%url, "efetch");
            samples.extend(parse_biosample_set(&self.client.fetch(&url)?)?);
        }
        Ok(samples)
    }

    fn link_sra_uids_from_biosample_uids(
        &self,
        sample_uids: &[Uid],
    ) -> Result<Vec<Uid>, ReadsError> {
        let mut experiment_uids = Vec::new();
        for batch in self.batches(sample_uids) {
            let url = self.urls.elink("biosample", "sra", batch)?;
            tracing::debug!(%url, "elink");
            let link_sets = parse_elink_result(&self.client.fetch(&url)?)?;
            experiment_uids.extend(
                link_sets
                    .into_iter()
                    .flat_map(|link_set| link_set.dbs)
                    .flat_map(|db| db.ids),
            );
        }
        Ok(dedup(experiment_uids))
    }

    fn fetch_experiments(&self, experiment_uids: &[Uid]) -> Result<Vec<Experiment>, ReadsError> {
        let mut experiments = Vec::new();
        for batch in self.batches(experiment_uids) {
            let url = self.urls.efetch("sra", batch)?;
            tracing::debug!(%url, "efetch");
            experiments.extend(parse_experiment_package_set(&self.client.fetch(&url)?)?);
        }
        Ok(experiments)
    }

    fn batches<'a, T>(&self, items: &'a [T]) -> std::slice::Chunks<'a, T> {
        let size = self.batch_size.unwrap_or(items.len()).max(1);
        items.chunks(size)
    }
}

/// Joins experiments to samples by BioSample accession and files each one
/// under its technology bucket. An experiment naming a sample that was not
/// fetched fails the whole join.
pub fn attach_experiments(
    samples: &mut [Sample],
    experiments: Vec<Experiment>,
) -> Result<(), ReadsError> {
    let index = samples
        .iter()
        .enumerate()
        .map(|(idx, sample)| (sample.accession.clone(), idx))
        .collect::<HashMap<_, _>>();
    for experiment in experiments {
        let Some(&idx) = index.get(&experiment.biosample_accession) else {
            return Err(ReadsError::UnresolvedJoin {
                experiment: experiment.accession,
                biosample: experiment.biosample_accession,
            });
        };
        samples[idx].add_experiment(experiment);
    }
    Ok(())
}

pub fn link_runs_to_samples(samples: &mut [Sample]) {
    for sample in samples {
        sample.link_runs();
    }
}

fn dedup(uids: Vec<Uid>) -> Vec<Uid> {
    let mut seen = HashSet::new();
    uids.into_iter().filter(|uid| seen.insert(*uid)).collect()
}
