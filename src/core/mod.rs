pub mod decoder;
pub mod encoder;
pub mod enrichment;
pub mod etl;
pub mod filter;
pub mod progress;
pub mod reshaper;

pub use crate::domain::model::{ExportOutput, Record};
pub use crate::domain::ports::{AttributeLookup, Storage};
pub use crate::utils::error::Result;
