use std::fs;
use std::io::{self, Write};

use camino::Utf8Path;
use serde::Serialize;

use crate::app::LocateResult;
use crate::error::ReadsError;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_locate(result: &LocateResult) -> io::Result<()> {
        Self::print_json(result)
    }

    /// Writes the report next to `path` and renames it into place.
    pub fn write_report(path: &Utf8Path, result: &LocateResult) -> Result<(), ReadsError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| ReadsError::Filesystem(err.to_string()))?;
        let content = serde_json::to_vec_pretty(result)
            .map_err(|err| ReadsError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix("sra-reads-report")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| ReadsError::Filesystem(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| ReadsError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| ReadsError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_locate(result: &LocateResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_locate(&mut stdout, result)
    }

    /// One display name per selected run, then the warnings.
    pub fn write_locate<W: Write>(out: &mut W, result: &LocateResult) -> io::Result<()> {
        for run in &result.runs {
            writeln!(out, "{}", run.display_name)?;
        }
        if !result.accessions.unclassified.is_empty() {
            writeln!(
                out,
                "unclassified accessions: {}",
                result.accessions.unclassified.join(", ")
            )?;
        }
        for warning in &result.warnings {
            writeln!(out, "warning: {warning}")?;
        }
        Ok(())
    }
}
