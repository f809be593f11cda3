//! # babymaker-core
//!
//! Reduction of CMS scouting trees to displaced-dimuon "baby" ntuples.
//!
//! Every input event carries a list of displaced vertices and a list of muons, each muon
//! claiming association with some of the vertices. The [`looper`] walks the events, picks the
//! best vertex and its two muons with [`selection::pick_best_objects`], computes the derived
//! quantities in [`kinematics`] and fills one [`baby::BabyRecord`] per accepted event.
#![warn(clippy::perf, clippy::style)]
#![allow(clippy::excessive_precision)]

use thiserror::Error;

/// The reduced output record, its columnar buffer and the ROOT/Parquet writers.
pub mod baby;
/// Input event model and the flat-tree reader.
pub mod data;
/// Generator-level truth selection and matching.
pub mod gen;
/// Beamspot, pixel-module and track-propagation lookups.
pub mod geometry;
/// Derived per-candidate quantities and selection flags.
pub mod kinematics;
/// The job driver which ties reading, selection and writing together.
pub mod looper;
/// Vertex/muon association and best-candidate selection.
pub mod selection;
/// Level-1 seed bookkeeping.
pub mod triggers;
/// Vector types, enums and small helpers.
pub mod utils;

pub use crate::baby::{BabyColumns, BabyRecord};
pub use crate::data::{read_events, ReadOptions, ScoutingEvent};
pub use crate::looper::{Looper, LooperOptions, RunSummary};
pub use crate::selection::{pick_best_objects, Candidate, Selection, SelectionFailure};
pub use crate::utils::enums::Year;
pub use crate::utils::vectors::{Vec3, Vec4};

/// Muon mass in GeV used for every reconstructed four-momentum.
pub const MUON_MASS: f64 = 0.10566;

/// Placeholder written to numeric branches which were not filled for an event.
pub const SENTINEL: f32 = 999.0;

pub type BabyResult<T> = Result<T, BabyError>;

/// The error type used by all `babymaker` internal methods
#[derive(Error, Debug)]
pub enum BabyError {
    /// An alias for [`std::io::Error`].
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
    /// An alias for [`parquet::errors::ParquetError`].
    #[error("Parquet Error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),
    /// An alias for [`arrow::error::ArrowError`].
    #[error("Arrow Error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),
    /// An alias for [`shellexpand::LookupError`].
    #[error("Failed to expand path: {0}")]
    LookupError(#[from] shellexpand::LookupError<std::env::VarError>),
    /// An input name contained an invalid wildcard pattern.
    #[error("Invalid input pattern: {0}")]
    PatternError(#[from] glob::PatternError),
    /// A path matched by a wildcard pattern could not be read.
    #[error("Failed to expand input pattern: {0}")]
    GlobError(#[from] glob::GlobError),
    /// An error returned by the Python pickle (de)serializer
    #[error("Pickle conversion error: {0}")]
    PickleError(#[from] serde_pickle::Error),
    /// A branch required by the reader is absent from the input tree.
    #[error("Missing branch \"{name}\"")]
    MissingColumn {
        /// Name of the branch which failed lookup
        name: String,
    },
    /// Two columns which must describe the same set of objects have different lengths.
    #[error("{context}: expected {expected} entries but found {actual}")]
    LengthMismatch {
        /// Where the mismatch was found
        context: String,
        /// The length implied by the rest of the input
        expected: usize,
        /// The length actually read
        actual: usize,
    },
    /// An error which occurs when the user tries to parse an invalid string of text, typically
    /// into an enum variant.
    #[error("Failed to parse string: \"{name}\" does not correspond to a valid \"{object}\"!")]
    ParseError {
        /// The string which was parsed
        name: String,
        /// The name of the object it failed to parse into
        object: String,
    },
    /// The job looped over a different number of events than it was supposed to. The batch
    /// layer retries jobs which end with this error.
    #[error("Looped over {processed} events but expected {expected}")]
    Integrity {
        /// Number of events actually looped over
        processed: usize,
        /// Number of events the job should have looped over
        expected: usize,
    },
    /// A custom fallback error for errors too complex or too infrequent to warrant their own error
    /// category.
    #[error("{0}")]
    Custom(String),
}

impl BabyError {
    /// Exit status the command-line tool should report for this error.
    ///
    /// Integrity failures map to `2` so that job wrappers can tell them apart from crashes.
    pub fn exit_code(&self) -> u8 {
        match self {
            BabyError::Integrity { .. } => 2,
            _ => 1,
        }
    }
}
