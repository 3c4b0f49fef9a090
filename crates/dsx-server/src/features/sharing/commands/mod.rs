pub mod share;

pub use share::{ShareDatasetCommand, ShareDatasetError, ShareOutcome};
