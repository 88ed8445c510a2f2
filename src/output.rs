use std::io::{self, Write};

use indexmap::IndexMap;
use serde::Serialize;

use crate::db::Counts;
use crate::manager::{PathwayEnrichment, PopulateSummary, ProgressEvent, ProgressSink};

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_populate(summary: &PopulateSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_summary(counts: &Counts) -> io::Result<()> {
        Self::print_json(counts)
    }

    pub fn print_query(result: &IndexMap<String, PathwayEnrichment>) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
