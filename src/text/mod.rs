//! Text canonicalization shared by training and inference: stop words,
//! Porter stemming, and the normalization pipeline.

pub mod normalize;
pub mod stem;
pub mod stopwords;

pub use normalize::{Normalizer, NormalizerConfig, StemmerKind, StopWords};
