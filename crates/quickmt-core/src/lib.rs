//! # quickmt-core
//!
//! Shared domain types for the translation gateway: language pairs,
//! decoding parameters, request fingerprints, and the scalar-or-list
//! JSON shape used by the HTTP surface.

#![deny(unsafe_code)]

pub mod lang;
pub mod params;
pub mod shape;

pub use lang::LangPair;
pub use params::{ParamsError, RequestFingerprint, TranslationParams};
pub use shape::OneOrMany;
