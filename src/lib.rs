//! Natural-language to Mermaid diagram pipeline.
//!
//! A prompt is classified into a diagram type, turned into schema-checked
//! structured data by a generative model, and rendered deterministically to
//! Mermaid. Every change (a natural-language edit or hand-edited code) is
//! stored as a new immutable version in the diagram's lineage.

pub mod config;
pub mod db;
pub mod diagram;
pub mod error;
pub mod llm;
pub mod rate_limit;
pub mod services;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;
