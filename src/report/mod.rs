pub mod job_report;
pub mod status;

pub use job_report::{JobReport, ReportSummary, StatusCallback};
pub use status::{Stage, StatusLine};
