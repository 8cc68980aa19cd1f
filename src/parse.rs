//! Decoders for E-utilities XML responses.
//!
//! Element-level decoders turn one `roxmltree` node into a typed record and
//! fail with [`ReadsError::MalformedRecord`] naming the offending field. No
//! tree node outlives these functions.

use std::str::FromStr;

use roxmltree::{Document, Node, ParsingOptions};

use crate::domain::Uid;
use crate::error::ReadsError;
use crate::model::{Experiment, Run, Sample};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSet {
    pub db_from: Option<String>,
    pub dbs: Vec<LinkSetDb>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSetDb {
    pub link_name: Option<String>,
    pub ids: Vec<Uid>,
}

/// One page of an esearch response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    /// Total number of matches on the server, across all pages.
    pub count: usize,
    pub ids: Vec<Uid>,
}

/// `eSearchResult/Count` and `eSearchResult/IdList/Id`.
pub fn parse_esearch_page(xml: &[u8]) -> Result<SearchPage, ReadsError> {
    let text = decode_utf8(xml)?;
    let doc = parse_document(text)?;
    let root = expect_root(&doc, "eSearchResult")?;
    let count = child_text(root, "Count")
        .ok_or_else(|| ReadsError::UpstreamQuery("esearch response has no Count".to_string()))?;
    let count = count
        .parse()
        .map_err(|_| ReadsError::UpstreamQuery(format!("invalid esearch Count: {count}")))?;
    let ids = match child(root, "IdList") {
        Some(id_list) => id_list
            .children()
            .filter(|node| node.has_tag_name("Id"))
            .map(|node| node.text().unwrap_or_default().parse())
            .collect::<Result<Vec<Uid>, ReadsError>>()?,
        None => Vec::new(),
    };
    Ok(SearchPage { count, ids })
}

pub fn parse_elink_result(xml: &[u8]) -> Result<Vec<LinkSet>, ReadsError> {
    let text = decode_utf8(xml)?;
    let doc = parse_document(text)?;
    let root = expect_root(&doc, "eLinkResult")?;
    let mut link_sets = Vec::new();
    for link_set in root.children().filter(|node| node.has_tag_name("LinkSet")) {
        let mut dbs = Vec::new();
        for db in link_set
            .children()
            .filter(|node| node.has_tag_name("LinkSetDb"))
        {
            let ids = db
                .children()
                .filter(|node| node.has_tag_name("Link"))
                .filter_map(|link| child(link, "Id"))
                .map(|id| id.text().unwrap_or_default().parse())
                .collect::<Result<Vec<Uid>, ReadsError>>()?;
            dbs.push(LinkSetDb {
                link_name: child_text(db, "LinkName"),
                ids,
            });
        }
        link_sets.push(LinkSet {
            db_from: child_text(link_set, "DbFrom"),
            dbs,
        });
    }
    Ok(link_sets)
}

pub fn parse_biosample_set(xml: &[u8]) -> Result<Vec<Sample>, ReadsError> {
    let text = decode_utf8(xml)?;
    let doc = parse_document(text)?;
    let root = expect_root(&doc, "BioSampleSet")?;
    root.children()
        .filter(|node| node.has_tag_name("BioSample"))
        .map(parse_sample)
        .collect()
}

pub fn parse_experiment_package_set(xml: &[u8]) -> Result<Vec<Experiment>, ReadsError> {
    let text = decode_utf8(xml)?;
    let doc = parse_document(text)?;
    let root = expect_root(&doc, "EXPERIMENT_PACKAGE_SET")?;
    root.children()
        .filter(|node| node.has_tag_name("EXPERIMENT_PACKAGE"))
        .map(parse_experiment_package)
        .collect()
}

pub fn parse_sample(node: Node<'_, '_>) -> Result<Sample, ReadsError> {
    let accession = node.attribute("accession");
    let record = Record::new("BioSample", accession);
    let accession = accession.ok_or_else(|| record.missing("@accession"))?;
    let uid = record.number::<u64>("@id", record.attr(node, "id")?)?;

    let sra_sample_accession = node
        .descendants()
        .filter(|n| n.has_tag_name("Id") && n.attribute("db") == Some("SRA"))
        .filter_map(element_text)
        .last();

    let description = record.child(node, "Description")?;
    let title = record.text(description, "Title")?;
    let organism = record.child(description, "Organism")?;
    let taxonomy_id = organism
        .attribute("taxonomy_id")
        .map(|value| record.number::<u64>("Organism/@taxonomy_id", value))
        .transpose()?;

    Ok(Sample {
        uid: Uid::new(uid),
        accession: accession.to_string(),
        submission_date: node.attribute("submission_date").map(str::to_string),
        last_update: node.attribute("last_update").map(str::to_string),
        title,
        taxonomy_id,
        taxonomy_name: organism.attribute("taxonomy_name").map(str::to_string),
        sra_sample_accession,
        illumina_experiments: Vec::new(),
        long_read_experiments: Vec::new(),
        other_experiments: Vec::new(),
    })
}

pub fn parse_experiment_package(node: Node<'_, '_>) -> Result<Experiment, ReadsError> {
    let experiment = Record::new("EXPERIMENT_PACKAGE", None).child(node, "EXPERIMENT")?;
    let accession = experiment.attribute("accession");
    let record = Record::new("EXPERIMENT", accession);
    let accession = accession.ok_or_else(|| record.missing("@accession"))?;

    let design = record.child(experiment, "DESIGN")?;
    let biosample_accession = design
        .descendants()
        .filter(|n| n.has_tag_name("EXTERNAL_ID") && n.attribute("namespace") == Some("BioSample"))
        .filter_map(element_text)
        .last()
        .ok_or_else(|| record.missing("DESIGN//EXTERNAL_ID[@namespace=BioSample]"))?;

    let library = record.child(design, "LIBRARY_DESCRIPTOR")?;
    let library_layout = first_element_child(record.child(library, "LIBRARY_LAYOUT")?)
        .ok_or_else(|| record.missing("LIBRARY_LAYOUT/*"))?
        .tag_name()
        .name()
        .to_string();

    let platform_node = first_element_child(record.child(experiment, "PLATFORM")?)
        .ok_or_else(|| record.missing("PLATFORM/*"))?;

    let runs = match child(node, "RUN_SET") {
        Some(run_set) => run_set
            .children()
            .filter(|n| n.has_tag_name("RUN"))
            .map(|run| parse_run(run, accession))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(Experiment {
        accession: accession.to_string(),
        alias: experiment.attribute("alias").map(str::to_string),
        biosample_accession,
        library_name: child_text(library, "LIBRARY_NAME"),
        library_strategy: record.text(library, "LIBRARY_STRATEGY")?,
        library_source: record.text(library, "LIBRARY_SOURCE")?,
        library_selection: record.text(library, "LIBRARY_SELECTION")?,
        library_layout,
        platform: platform_node.tag_name().name().to_string(),
        instrument_model: record.text(platform_node, "INSTRUMENT_MODEL")?,
        runs,
    })
}

/// Decodes one `RUN` element belonging to `experiment_accession`.
pub fn parse_run(node: Node<'_, '_>, experiment_accession: &str) -> Result<Run, ReadsError> {
    let accession = node.attribute("accession");
    let record = Record::new("RUN", accession);
    let accession = accession.ok_or_else(|| record.missing("@accession"))?;

    let total_spots = record.number("@total_spots", record.attr(node, "total_spots")?)?;
    let total_bases = record.number("@total_bases", record.attr(node, "total_bases")?)?;
    let size = record.number("@size", record.attr(node, "size")?)?;
    let published_date = record.attr(node, "published")?.to_string();

    let statistics = record.child(node, "Statistics")?;
    let read_file_count: usize =
        record.number("Statistics/@nreads", record.attr(statistics, "nreads")?)?;

    let mut read_counts: Vec<u64> = Vec::new();
    let mut read_average_lengths: Vec<f64> = Vec::new();
    let mut read_stdevs: Vec<f64> = Vec::new();
    for read in statistics.children().filter(|n| n.has_tag_name("Read")) {
        read_counts.push(record.number("Read/@count", record.attr(read, "count")?)?);
        read_average_lengths.push(record.number("Read/@average", record.attr(read, "average")?)?);
        read_stdevs.push(record.number("Read/@stdev", record.attr(read, "stdev")?)?);
    }
    if read_counts.len() != read_file_count {
        return Err(record.invalid(
            "Statistics/Read",
            format!(
                "nreads declares {read_file_count} reads but {} Read elements are present",
                read_counts.len()
            ),
        ));
    }

    Ok(Run {
        accession: accession.to_string(),
        alias: node.attribute("alias").map(str::to_string),
        experiment_accession: experiment_accession.to_string(),
        sample: None,
        total_spots,
        total_bases,
        size,
        published_date,
        read_file_count,
        read_counts,
        read_average_lengths,
        read_stdevs,
    })
}

#[derive(Clone, Copy)]
struct Record<'a> {
    kind: &'static str,
    id: Option<&'a str>,
}

impl<'a> Record<'a> {
    fn new(kind: &'static str, id: Option<&'a str>) -> Self {
        Self { kind, id }
    }

    fn invalid(&self, field: &str, reason: impl Into<String>) -> ReadsError {
        ReadsError::MalformedRecord {
            record: self.kind,
            id: self.id.unwrap_or("<unknown>").to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    fn missing(&self, field: &str) -> ReadsError {
        self.invalid(field, "missing")
    }

    fn child<'n, 'i>(&self, node: Node<'n, 'i>, tag: &str) -> Result<Node<'n, 'i>, ReadsError> {
        child(node, tag).ok_or_else(|| self.missing(tag))
    }

    /// Required element; its text may be empty.
    fn text(&self, node: Node<'_, '_>, tag: &str) -> Result<String, ReadsError> {
        let element = self.child(node, tag)?;
        Ok(element.text().map(str::trim).unwrap_or_default().to_string())
    }

    fn attr<'n>(&self, node: Node<'n, '_>, name: &str) -> Result<&'n str, ReadsError> {
        node.attribute(name)
            .ok_or_else(|| self.missing(&format!("@{name}")))
    }

    fn number<T: FromStr>(&self, field: &str, value: &str) -> Result<T, ReadsError> {
        value
            .trim()
            .parse()
            .map_err(|_| self.invalid(field, format!("expected a number, got {value:?}")))
    }
}

fn decode_utf8(xml: &[u8]) -> Result<&str, ReadsError> {
    std::str::from_utf8(xml)
        .map_err(|err| ReadsError::UpstreamQuery(format!("response is not UTF-8: {err}")))
}

// E-utilities responses carry a DOCTYPE declaration.
fn parse_document(text: &str) -> Result<Document<'_>, ReadsError> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(text, options)
        .map_err(|err| ReadsError::UpstreamQuery(format!("invalid XML response: {err}")))
}

fn expect_root<'a, 'i>(doc: &'a Document<'i>, tag: &str) -> Result<Node<'a, 'i>, ReadsError> {
    let root = doc.root_element();
    if let Some(message) = child_text(root, "ERROR") {
        return Err(ReadsError::UpstreamQuery(message));
    }
    if !root.has_tag_name(tag) {
        return Err(ReadsError::UpstreamQuery(format!(
            "expected <{tag}> response, got <{}>",
            root.tag_name().name()
        )));
    }
    Ok(root)
}

fn child<'a, 'i>(node: Node<'a, 'i>, tag: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.has_tag_name(tag))
}

fn first_element_child<'a, 'i>(node: Node<'a, 'i>) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.is_element())
}

fn element_text(node: Node<'_, '_>) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag).and_then(element_text)
}
