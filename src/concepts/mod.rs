//! Concept dictionary and observation codec
//!
//! The dictionary resolves human-facing concept names to canonical UUIDs;
//! the codec translates whole observation maps between the two keyings.

mod codec;
mod dictionary;

pub use codec::{decode, encode, patch};
pub use dictionary::ConceptDictionary;
