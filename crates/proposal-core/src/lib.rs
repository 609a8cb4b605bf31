pub mod analysis;
pub mod error;
pub mod expand;
pub mod gaps;
pub mod index;
pub mod model;
pub mod parser;
pub mod pricing;
pub mod rfp;
pub mod sanitize;
pub mod scoring;
pub mod search;
pub mod store;
pub mod tfidf;

#[cfg(test)]
pub(crate) mod testutil;
