//! Utility functions for string comparison and formatting.

pub mod format;

pub use format::{cmp_locale, format_size};
