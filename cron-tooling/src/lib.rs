//! Idempotent management of named entries in cron schedule files.
//!
//! An entry managed by this crate is encoded in the schedule file as exactly
//! two consecutive lines: a marker comment carrying the entry's name,
//! followed by the schedule/command line itself. Everything else in the file
//! is foreign content and is preserved byte-for-byte across every operation.
//!
//! Two store backends are supported: the per-user crontab (read and written
//! through the `crontab` binary) and a named drop-in file under a directory
//! such as `/etc/cron.d` (read and written directly, installed atomically).

use std::path::PathBuf;
use std::string::FromUtf8Error;

use thiserror::Error;

mod codec;
mod reconcile;
mod store;

pub use codec::CronEntry;
pub use codec::append_entry;
pub use codec::marker_line;
pub use codec::parse_entries;
pub use codec::remove_entry;
pub use codec::replace_entry;
pub use reconcile::DesiredState;
pub use reconcile::ReconcileOutcome;
pub use reconcile::ReconcileRequest;
pub use reconcile::Reconciler;
pub use store::CronStore;
pub use store::DEFAULT_CRONTAB_BIN;
pub use store::DEFAULT_DROP_IN_DIR;

/// Literal token that opens a marker comment; the rest of the line is the
/// entry's name.
pub const MARKER_PREFIX: &str = "#cronctl: ";

/// Errors returned while reconciling cron schedule files.
#[derive(Debug, Error)]
pub enum CronToolingError {
    #[error("crontab command `{command}` failed with status {status}: {stderr}")]
    CrontabCommand {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("crontab command `{command}` produced non-UTF-8 output")]
    CrontabOutputUtf8 {
        command: String,
        #[source]
        source: FromUtf8Error,
    },
    #[error("a reboot schedule cannot be combined with explicit time fields")]
    RebootWithTimeFields,
    #[error("state `present` requires a command to schedule")]
    MissingCommand,
    #[error("drop-in file {file:?} requires an explicit principal")]
    DropInRequiresPrincipal { file: String },
    #[error("failed to retain backup snapshot at {path:?}")]
    BackupRetention {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
