//! Text indexing and BM25 ranking over an in-memory inverted index,
//! with snapshot persistence for restarts.

pub mod index;
pub mod persist;
pub mod tokenizer;

pub use index::{Document, SearchHit, SearchIndex};
pub use persist::IndexPaths;
pub use tokenizer::Tokenizer;
