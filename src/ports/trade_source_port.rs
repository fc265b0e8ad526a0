//! Trade source port trait.

use crate::domain::error::JournalError;
use crate::domain::trade::RawTrade;

/// A broker export or feed yielding untyped trade records.
///
/// Records are validated by the core, so a source hands over whatever it
/// read. Only failures to read the source at all are errors.
pub trait TradeSourcePort {
    fn name(&self) -> &str;

    fn fetch_trades(&self) -> Result<Vec<RawTrade>, JournalError>;
}
