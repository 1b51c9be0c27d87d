pub mod types;
pub mod classification;

pub use types::{HeraldError, Result};
pub use classification::{ErrorClassification, ErrorKind};
