//! Report output port trait.

use crate::domain::error::JournalError;
use crate::domain::journal::JournalReport;

/// Port for writing journal reports. An `output_path` of `-` means stdout.
pub trait ReportPort {
    fn write(&self, report: &JournalReport, output_path: &str) -> Result<(), JournalError>;
}
