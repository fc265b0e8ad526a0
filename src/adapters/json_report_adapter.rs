//! JSON report adapter implementing ReportPort.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::domain::error::JournalError;
use crate::domain::journal::JournalReport;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, report: &JournalReport) -> Result<String, JournalError> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &JournalReport, output_path: &str) -> Result<(), JournalError> {
        let json = self.render(report)?;
        let write_err = |e: std::io::Error| JournalError::ReportWrite {
            path: output_path.to_string(),
            reason: e.to_string(),
        };

        if output_path == "-" {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{}", json).map_err(write_err)?;
            return Ok(());
        }

        let path = Path::new(output_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, json).map_err(write_err)?;

        Ok(())
    }
}
