use std::io::{self, Write};

use serde::Serialize;

use crate::coordinator::Snapshot;
use crate::domain::SpeciesRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub state: String,
    pub pages_requested: u32,
    pub next_page: u32,
    pub has_more_pages: bool,
    pub cached_total: usize,
    pub remote_total: Option<u64>,
    pub error_message: Option<String>,
}

impl SyncSummary {
    pub fn from_snapshot(snapshot: &Snapshot, pages_requested: u32) -> Self {
        Self {
            state: snapshot.state.to_string(),
            pages_requested,
            next_page: snapshot.current_page,
            has_more_pages: snapshot.has_more_pages,
            cached_total: snapshot.cached_total,
            remote_total: snapshot.remote_total,
            error_message: snapshot.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResult {
    pub cleared: usize,
}

pub struct Printer {
    mode: OutputMode,
}

impl Printer {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }

    pub fn print_species(&self, records: &[SpeciesRecord]) -> io::Result<()> {
        match self.mode {
            OutputMode::Json => print_json(&records),
            OutputMode::Text => {
                let mut stdout = io::stdout().lock();
                for record in records {
                    writeln!(stdout, "{}", species_line(record))?;
                }
                Ok(())
            }
        }
    }

    pub fn print_record(&self, record: &SpeciesRecord) -> io::Result<()> {
        match self.mode {
            OutputMode::Json => print_json(record),
            OutputMode::Text => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "id:              {}", record.id)?;
                writeln!(stdout, "common name:     {}", record.common_name)?;
                writeln!(stdout, "scientific name: {}", record.scientific_name)?;
                writeln!(stdout, "group:           {}", record.group)?;
                writeln!(
                    stdout,
                    "status:          {} ({})",
                    record.conservation_status,
                    record.conservation_status.description()
                )?;
                writeln!(stdout, "iso code:        {}", record.iso_code)?;
                writeln!(stdout, "fetched on page: {}", record.fetched_on_page)?;
                writeln!(stdout, "last updated:    {}", record.last_updated.to_rfc3339())
            }
        }
    }

    pub fn print_sync(&self, summary: &SyncSummary) -> io::Result<()> {
        match self.mode {
            OutputMode::Json => print_json(summary),
            OutputMode::Text => {
                let mut stdout = io::stdout().lock();
                writeln!(
                    stdout,
                    "{}: {} species cached, next page {}",
                    summary.state, summary.cached_total, summary.next_page
                )?;
                if let Some(total) = summary.remote_total {
                    writeln!(stdout, "remote reports {total} species")?;
                }
                if let Some(message) = &summary.error_message {
                    writeln!(stdout, "error: {message}")?;
                }
                Ok(())
            }
        }
    }

    pub fn print_clear(&self, result: &ClearResult) -> io::Result<()> {
        match self.mode {
            OutputMode::Json => print_json(result),
            OutputMode::Text => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "removed {} cached species", result.cleared)
            }
        }
    }
}

pub fn to_json<T: Serialize>(value: &T) -> io::Result<String> {
    serde_json::to_string_pretty(value).map_err(io::Error::other)
}

pub fn species_line(record: &SpeciesRecord) -> String {
    format!(
        "{:>6}  {:<2}  {} ({}) [{}, {}]",
        record.id,
        record.conservation_status.code(),
        record.common_name,
        record.scientific_name,
        record.group,
        record.iso_code
    )
}

fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let json = to_json(value)?;
    let mut stdout = io::stdout();
    stdout.write_all(json.as_bytes())?;
    stdout.write_all(b"\n")?;
    Ok(())
}
