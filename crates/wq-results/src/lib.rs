//! wq-results: binary interchange with the hydraulic solver and the
//! reporting pipeline.
//!
//! Two fixed-layout little-endian streams share one magic number: the
//! hydraulics record stream consumed per interval ([`hyd`]), and the
//! quality results stream produced per reporting period ([`out`]).

pub mod hyd;
pub mod out;

mod bytes;

pub use hyd::{HydReader, HydWriter, HYD_VERSION};
pub use out::{CompletionStatus, OutReader, OutWriter, StatKind, OUT_VERSION};

/// "HQGM" as a little-endian u32; opens and closes both streams.
pub const MAGIC: u32 = 0x4D47_5148;

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad magic number: got {got:#010x}, want {want:#010x}")]
    BadMagic { got: u32, want: u32 },

    #[error("unsupported format version {got} (this build reads {want})")]
    Version { got: u32, want: u32 },

    #[error("{what} count mismatch: stream has {got}, network has {want}")]
    CountMismatch {
        what: &'static str,
        got: usize,
        want: usize,
    },

    #[error("{what} has {got} values, expected {want}")]
    BadLength {
        what: &'static str,
        got: usize,
        want: usize,
    },

    #[error("period {got} out of range ({want} stored)")]
    PeriodOutOfRange { got: usize, want: usize },
}
