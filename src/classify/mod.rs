//! Feature encoding, fitted models, and the verdict pipeline.

pub mod artifact;
pub mod model;
pub mod pipeline;
pub mod vectorizer;
pub mod verdict;

pub use model::FittedClassifier;
pub use pipeline::{Analysis, PhishingClassifier};
pub use vectorizer::{FeatureVector, FittedVectorizer};
pub use verdict::Verdict;
