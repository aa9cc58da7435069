//! Resolution of IBS/CBS tax benefits and cClassTrib classification codes
//! for merchandise (NCM) codes.

pub mod core;

pub use crate::core::*;
