pub mod check;
pub mod convert;
pub mod copy;
pub mod extract;
pub mod merge;
pub mod prune;
pub mod rename;
pub mod unpack;

pub use check::PreflightCheck;
pub use convert::DocumentConverterJob;
pub use copy::{CopyStats, TreeCopier};
pub use extract::FolderExtractor;
pub use merge::PdfMerger;
pub use prune::{FolderPruner, MatchKind};
pub use rename::FileRenamer;
pub use unpack::ArchiveUnpacker;

use crate::error::Result;
use crate::ui::GracefulShutdown;

/// Jobs only stop between items; a pending Ctrl+C surfaces as `Cancelled`.
pub(crate) fn check_shutdown(shutdown: &Option<GracefulShutdown>) -> Result<()> {
    match shutdown {
        Some(shutdown) => shutdown.check_shutdown(),
        None => Ok(()),
    }
}
