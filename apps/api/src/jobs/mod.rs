//! Job description management. Embeddings are computed in the background by
//! the analysis worker.

pub mod handlers;
