//! Loading fitted artifacts from disk.
//!
//! Artifacts are stored as JSON or, for faster startup, as `bincode` of the
//! same structure (chosen by the `.bin` / `.bincode` extension). Every
//! failure here is fatal at startup: nothing can be classified without both
//! artifacts.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::model::{FittedClassifier, LinearModel, RandomForest};
use super::vectorizer::{FeatureVector, FittedVectorizer, TfidfVectorizer};
use crate::error::{Result, TriageError};

/// On-disk encoding of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Json,
    Bincode,
}

impl ArtifactFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") | Some("bincode") => Self::Bincode,
            _ => Self::Json,
        }
    }
}

/// Any supported fitted vectorizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorizerArtifact {
    Tfidf(TfidfVectorizer),
}

impl VectorizerArtifact {
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Self::Tfidf(v) => v.validate(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tfidf(_) => "tfidf",
        }
    }
}

impl FittedVectorizer for VectorizerArtifact {
    fn dimension(&self) -> usize {
        match self {
            Self::Tfidf(v) => v.dimension(),
        }
    }

    fn transform(&self, text: &str) -> FeatureVector {
        match self {
            Self::Tfidf(v) => v.transform(text),
        }
    }
}

/// Any supported fitted classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierArtifact {
    RandomForest(RandomForest),
    Linear(LinearModel),
}

impl ClassifierArtifact {
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            Self::RandomForest(m) => m.validate(),
            Self::Linear(m) => m.validate(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::RandomForest(_) => "random_forest",
            Self::Linear(_) => "linear",
        }
    }
}

impl FittedClassifier for ClassifierArtifact {
    fn n_features(&self) -> usize {
        match self {
            Self::RandomForest(m) => m.n_features(),
            Self::Linear(m) => m.n_features(),
        }
    }

    fn classes(&self) -> &[i64] {
        match self {
            Self::RandomForest(m) => m.classes(),
            Self::Linear(m) => m.classes(),
        }
    }

    fn predict(&self, features: &FeatureVector) -> i64 {
        match self {
            Self::RandomForest(m) => m.predict(features),
            Self::Linear(m) => m.predict(features),
        }
    }
}

/// An artifact together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedArtifact<T> {
    pub value: T,
    pub path: PathBuf,
    /// Hex SHA-256 of the file contents.
    pub sha256: String,
    pub size: u64,
}

/// Load and validate a vectorizer artifact.
pub fn load_vectorizer(
    path: &Path,
    expected_sha256: Option<&str>,
) -> Result<LoadedArtifact<VectorizerArtifact>> {
    let loaded = load::<VectorizerArtifact>(path, expected_sha256)?;
    loaded
        .value
        .validate()
        .map_err(|reason| TriageError::artifact(path, reason))?;
    info!(
        path = %path.display(),
        kind = loaded.value.kind(),
        dimension = loaded.value.dimension(),
        "Loaded vectorizer"
    );
    Ok(loaded)
}

/// Load and validate a classifier artifact.
pub fn load_classifier(
    path: &Path,
    expected_sha256: Option<&str>,
) -> Result<LoadedArtifact<ClassifierArtifact>> {
    let loaded = load::<ClassifierArtifact>(path, expected_sha256)?;
    loaded
        .value
        .validate()
        .map_err(|reason| TriageError::artifact(path, reason))?;
    info!(
        path = %path.display(),
        kind = loaded.value.kind(),
        n_features = loaded.value.n_features(),
        "Loaded classifier"
    );
    Ok(loaded)
}

/// Write an artifact in the format implied by `path`.
pub fn save_artifact<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let bytes = match ArtifactFormat::from_path(path) {
        ArtifactFormat::Json => {
            serde_json::to_vec_pretty(value).map_err(|e| TriageError::artifact(path, e))?
        }
        ArtifactFormat::Bincode => {
            bincode::serialize(value).map_err(|e| TriageError::artifact(path, e))?
        }
    };
    std::fs::write(path, bytes).map_err(|e| TriageError::io(path, e))?;
    debug!(path = %path.display(), "Wrote artifact");
    Ok(())
}

/// Hex SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn load<T: DeserializeOwned>(
    path: &Path,
    expected_sha256: Option<&str>,
) -> Result<LoadedArtifact<T>> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TriageError::artifact(path, "file not found")
        } else {
            TriageError::artifact(path, e)
        }
    })?;

    let sha256 = sha256_hex(&bytes);
    if let Some(expected) = expected_sha256 {
        if !expected.trim().eq_ignore_ascii_case(&sha256) {
            return Err(TriageError::artifact(
                path,
                format!("SHA-256 mismatch: expected {expected}, found {sha256}"),
            ));
        }
    }

    let value = match ArtifactFormat::from_path(path) {
        ArtifactFormat::Json => {
            serde_json::from_slice(&bytes).map_err(|e| TriageError::artifact(path, e))?
        }
        ArtifactFormat::Bincode => {
            bincode::deserialize(&bytes).map_err(|e| TriageError::artifact(path, e))?
        }
    };

    Ok(LoadedArtifact {
        value,
        path: path.to_path_buf(),
        sha256,
        size: bytes.len() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINEAR_JSON: &str = r#"{"linear": {"classes": [0, 1], "coef": [1.0], "intercept": 0.0}}"#;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ArtifactFormat::from_path(Path::new("m.json")), ArtifactFormat::Json);
        assert_eq!(ArtifactFormat::from_path(Path::new("m.bin")), ArtifactFormat::Bincode);
        assert_eq!(ArtifactFormat::from_path(Path::new("m")), ArtifactFormat::Json);
    }

    #[test]
    fn test_missing_file_is_artifact_error() {
        let err = load_classifier(Path::new("/nonexistent/model.json"), None).unwrap_err();
        assert!(matches!(err, TriageError::ArtifactLoad { .. }));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_digest_pinning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, LINEAR_JSON).unwrap();

        let loaded = load_classifier(&path, None).unwrap();
        assert_eq!(loaded.sha256, sha256_hex(LINEAR_JSON.as_bytes()));
        assert!(load_classifier(&path, Some(&loaded.sha256.to_uppercase())).is_ok());

        let err = load_classifier(&path, Some("00ff")).unwrap_err();
        assert!(err.to_string().contains("SHA-256 mismatch"));
    }

    #[test]
    fn test_bincode_copy_loads_the_same_model() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("model.json");
        std::fs::write(&json_path, LINEAR_JSON).unwrap();
        let loaded = load_classifier(&json_path, None).unwrap();

        let bin_path = dir.path().join("model.bin");
        save_artifact(&loaded.value, &bin_path).unwrap();
        let reloaded = load_classifier(&bin_path, None).unwrap();
        assert_eq!(reloaded.value.kind(), "linear");
        assert_eq!(reloaded.value.n_features(), 1);
    }

    #[test]
    fn test_corrupt_json_is_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectorizer.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            load_vectorizer(&path, None),
            Err(TriageError::ArtifactLoad { .. })
        ));
    }
}
