//! Transformation module.
//!
//! This module handles the gradebook column transforms:
//! - Selector: keep or drop one trimester's columns
//! - Recoder: rename coded columns, group by category, derive averages
//! - Pipeline: upload bytes to CSV or workbook download

pub mod pipeline;
pub mod recoder;
pub mod selector;

pub use pipeline::*;
pub use recoder::{recode, RecodeOptions, Recoded};
pub use selector::{detect_terms, select, term_range, SelectionMode};
