//! Content analysis for scanned books.
//!
//! A [`Pipeline`] is built from a declarative [`PipelineSpec`](bookgenome_shared::PipelineSpec).
//! Running it against a [`Document`] tokenizes the full text, parses the page
//! layout, drives every module over its view and assembles a
//! [`Genome`](bookgenome_shared::Genome).

pub mod document;
pub mod isbn;
pub mod modules;
pub mod pagexml;
pub mod pipeline;
pub mod processor;
pub mod stopwords;
pub mod tokenizer;

pub use document::Document;
pub use pagexml::{Page, PageTree};
pub use pipeline::{Pipeline, VERSION};
pub use processor::Processor;
pub use stopwords::StopWords;
