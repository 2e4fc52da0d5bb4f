//! Feature encoding: canonical text → fixed-length sparse vector.
//!
//! The vocabulary and weights come from a fitted artifact and are never
//! recomputed here.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Default token pattern of the fitted TF-IDF vectorizer: two or more word characters.
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("valid token pattern"));

/// Sparse numeric feature vector with a fixed dimension.
///
/// Entries are kept sorted by index with no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    dim: usize,
    entries: Vec<(usize, f64)>,
}

impl FeatureVector {
    /// Build from `(index, value)` pairs. Duplicate indices are summed,
    /// indices outside `dim` and explicit zeros are dropped.
    pub fn from_pairs(dim: usize, pairs: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut entries: Vec<(usize, f64)> = pairs.into_iter().filter(|(i, _)| *i < dim).collect();
        entries.sort_by_key(|(i, _)| *i);

        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(entries.len());
        for (index, value) in entries {
            match merged.last_mut() {
                Some((last, acc)) if *last == index => *acc += value,
                _ => merged.push((index, value)),
            }
        }
        merged.retain(|(_, v)| *v != 0.0);
        Self {
            dim,
            entries: merged,
        }
    }

    /// Build from a dense slice.
    pub fn from_dense(values: &[f64]) -> Self {
        Self::from_pairs(values.len(), values.iter().copied().enumerate())
    }

    /// All-zero vector.
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            entries: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Value at `index` (zero when absent).
    pub fn get(&self, index: usize) -> f64 {
        self.entries
            .binary_search_by_key(&index, |(i, _)| *i)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().copied()
    }

    /// Dot product with a dense weight vector.
    pub fn dot(&self, weights: &[f64]) -> f64 {
        self.entries
            .iter()
            .filter_map(|(i, v)| weights.get(*i).map(|w| w * v))
            .sum()
    }

    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.dim];
        for (i, v) in &self.entries {
            dense[*i] = *v;
        }
        dense
    }
}

/// A fitted text vectorizer. Read-only after load; shared across workers.
pub trait FittedVectorizer: Send + Sync {
    /// Length of every vector this vectorizer produces.
    fn dimension(&self) -> usize;

    /// Encode one canonical text.
    fn transform(&self, text: &str) -> FeatureVector;

    /// Encode many texts, one row per input.
    fn transform_batch(&self, texts: &[&str]) -> Vec<FeatureVector> {
        texts.iter().map(|t| self.transform(t)).collect()
    }
}

/// Row normalization applied after weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

fn default_true() -> bool {
    true
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_norm() -> Option<Norm> {
    Some(Norm::L2)
}

/// Fitted TF-IDF vectorizer exported from training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Term → column index.
    pub vocabulary: HashMap<String, usize>,
    /// Inverse document frequency per column; `None` when IDF was disabled.
    #[serde(default)]
    pub idf: Option<Vec<f64>>,
    #[serde(default = "default_norm")]
    pub norm: Option<Norm>,
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default)]
    pub binary: bool,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
}

impl TfidfVectorizer {
    /// Check internal consistency of a freshly loaded artifact.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let dim = self.vocabulary.len();
        if dim == 0 {
            return Err("vocabulary is empty".into());
        }
        let mut seen = vec![false; dim];
        for (term, &index) in &self.vocabulary {
            if index >= dim {
                return Err(format!("term '{term}' has index {index} outside 0..{dim}"));
            }
            if std::mem::replace(&mut seen[index], true) {
                return Err(format!("index {index} is used by more than one term"));
            }
        }
        if let Some(idf) = &self.idf {
            if idf.len() != dim {
                return Err(format!(
                    "idf has {} weights for {dim} vocabulary terms",
                    idf.len()
                ));
            }
        }
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(format!("invalid ngram_range ({min_n}, {max_n})"));
        }
        Ok(())
    }

    /// Terms the fitted analyzer would extract, n-grams joined by a space.
    fn analyze(&self, text: &str) -> Vec<String> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        let tokens: Vec<&str> = TOKEN_RE.find_iter(&text).map(|m| m.as_str()).collect();
        let (min_n, max_n) = self.ngram_range;

        let mut terms = Vec::new();
        for n in min_n..=max_n.min(tokens.len()) {
            terms.extend(tokens.windows(n).map(|w| w.join(" ")));
        }
        terms
    }
}

impl FittedVectorizer for TfidfVectorizer {
    fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    fn transform(&self, text: &str) -> FeatureVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in self.analyze(text) {
            if let Some(&index) = self.vocabulary.get(&term) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut weighted: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(index, count)| {
                let mut tf = if self.binary { 1.0 } else { count };
                if self.sublinear_tf {
                    tf = 1.0 + tf.ln();
                }
                let idf = self.idf.as_ref().map_or(1.0, |idf| idf[index]);
                (index, tf * idf)
            })
            .collect();

        let scale = match self.norm {
            Some(Norm::L2) => weighted.iter().map(|(_, v)| v * v).sum::<f64>().sqrt(),
            Some(Norm::L1) => weighted.iter().map(|(_, v)| v.abs()).sum::<f64>(),
            None => 1.0,
        };
        if scale > 0.0 {
            for (_, v) in &mut weighted {
                *v /= scale;
            }
        }

        FeatureVector::from_pairs(self.dimension(), weighted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vectorizer(terms: &[&str]) -> TfidfVectorizer {
        TfidfVectorizer {
            vocabulary: terms
                .iter()
                .enumerate()
                .map(|(i, t)| (t.to_string(), i))
                .collect(),
            idf: None,
            norm: None,
            sublinear_tf: false,
            lowercase: true,
            binary: false,
            ngram_range: (1, 1),
        }
    }

    #[test]
    fn test_feature_vector_merges_and_sorts() {
        let v = FeatureVector::from_pairs(4, vec![(2, 1.0), (0, 0.5), (2, 1.0), (9, 3.0)]);
        assert_eq!(v.dim(), 4);
        assert_eq!(v.nnz(), 2);
        assert_eq!(v.get(2), 2.0);
        assert_eq!(v.get(1), 0.0);
        assert_eq!(v.to_dense(), vec![0.5, 0.0, 2.0, 0.0]);
        assert_eq!(v.dot(&[2.0, 0.0, 1.0, 0.0]), 3.0);
    }

    #[test]
    fn test_raw_counts_without_idf_or_norm() {
        let v = vectorizer(&["account", "verifi", "bank"]);
        let fv = v.transform("verifi account verifi a");
        assert_eq!(fv.to_dense(), vec![1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_l2_norm_and_idf() {
        let mut v = vectorizer(&["aa", "bb"]);
        v.idf = Some(vec![3.0, 4.0]);
        v.norm = Some(Norm::L2);
        let fv = v.transform("aa bb");
        assert!((fv.get(0) - 0.6).abs() < 1e-12);
        assert!((fv.get(1) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_bigrams() {
        let mut v = vectorizer(&["click", "click link"]);
        v.ngram_range = (1, 2);
        let fv = v.transform("click link");
        assert_eq!(fv.to_dense(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = vectorizer(&["aa"]);
        assert_eq!(v.transform("").nnz(), 0);
        assert_eq!(v.transform("").dim(), 1);
    }

    #[test]
    fn test_validate_rejects_bad_artifacts() {
        let mut v = vectorizer(&["aa", "bb"]);
        v.idf = Some(vec![1.0]);
        assert!(v.validate().is_err());

        let mut v = vectorizer(&["aa", "bb"]);
        v.vocabulary.insert("bb".into(), 7);
        assert!(v.validate().is_err());

        let mut v = vectorizer(&["aa"]);
        v.ngram_range = (2, 1);
        assert!(v.validate().is_err());

        assert!(vectorizer(&["aa", "bb"]).validate().is_ok());
    }
}
