pub mod ledger;
pub mod report;

pub use self::ledger::ProcessedLedger;
pub use self::report::ReportWriter;
