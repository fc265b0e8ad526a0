//! Port traits for the collaborators around the journal core.

pub mod config_port;
pub mod trade_source_port;
pub mod price_port;
pub mod balance_port;
pub mod report_port;
