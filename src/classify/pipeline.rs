//! Text → verdict: normalize, encode, predict.

use std::path::PathBuf;

use rayon::prelude::*;
use serde::Serialize;
use tracing::error;

use super::artifact::{load_classifier, load_vectorizer};
use super::model::FittedClassifier;
use super::vectorizer::FittedVectorizer;
use super::verdict::Verdict;
use crate::config::ModelConfig;
use crate::error::{Result, TriageError};
use crate::reasons::{extract_reasons, Reason};
use crate::text::Normalizer;

/// Everything known about one text after classification.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub verdict: Verdict,
    pub reasons: Vec<Reason>,
    /// The canonical text the vectorizer saw.
    pub canonical: String,
}

/// The loaded model: immutable, cheap to share behind an `Arc`.
pub struct PhishingClassifier {
    normalizer: Normalizer,
    vectorizer: Box<dyn FittedVectorizer>,
    classifier: Box<dyn FittedClassifier>,
}

impl std::fmt::Debug for PhishingClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhishingClassifier")
            .field("normalizer", &self.normalizer)
            .field("dimension", &self.vectorizer.dimension())
            .field("classes", &self.classifier.classes())
            .finish()
    }
}

impl PhishingClassifier {
    /// Combine already-fitted parts, checking they fit together.
    pub fn new(
        normalizer: Normalizer,
        vectorizer: Box<dyn FittedVectorizer>,
        classifier: Box<dyn FittedClassifier>,
    ) -> Result<Self> {
        check_compatible(
            vectorizer.as_ref(),
            classifier.as_ref(),
            PathBuf::from("<classifier>"),
        )?;
        Ok(Self {
            normalizer,
            vectorizer,
            classifier,
        })
    }

    /// Load both artifacts named by the model config.
    pub fn load(config: &ModelConfig, normalizer: Normalizer) -> Result<Self> {
        let vectorizer = load_vectorizer(
            &config.vectorizer_path,
            config.vectorizer_sha256.as_deref(),
        )?;
        let classifier = load_classifier(
            &config.classifier_path,
            config.classifier_sha256.as_deref(),
        )?;
        check_compatible(
            &vectorizer.value,
            &classifier.value,
            config.classifier_path.clone(),
        )?;
        Ok(Self {
            normalizer,
            vectorizer: Box::new(vectorizer.value),
            classifier: Box::new(classifier.value),
        })
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn dimension(&self) -> usize {
        self.vectorizer.dimension()
    }

    /// Classify free text.
    pub fn classify(&self, text: &str) -> Verdict {
        self.classify_canonical(&self.normalizer.normalize(text))
    }

    /// Classify many texts in parallel; output order matches input order.
    pub fn classify_batch(&self, texts: &[&str]) -> Vec<Verdict> {
        texts.par_iter().map(|text| self.classify(text)).collect()
    }

    /// Verdict, reasons and canonical text for one message body.
    pub fn analyze(&self, text: &str) -> Analysis {
        let canonical = self.normalizer.normalize(text);
        Analysis {
            verdict: self.classify_canonical(&canonical),
            reasons: extract_reasons(text),
            canonical,
        }
    }

    fn classify_canonical(&self, canonical: &str) -> Verdict {
        let features = self.vectorizer.transform(canonical);
        let label = self.classifier.predict(&features);
        Verdict::from_label(label).unwrap_or_else(|| {
            // Unreachable for validated artifacts; a custom classifier broke its contract.
            error!(label, "Classifier returned a label outside its classes");
            Verdict::Legitimate
        })
    }
}

fn check_compatible(
    vectorizer: &dyn FittedVectorizer,
    classifier: &dyn FittedClassifier,
    path: PathBuf,
) -> Result<()> {
    let classes = classifier.classes();
    if classes != [Verdict::LEGITIMATE_LABEL, Verdict::PHISHING_LABEL] {
        return Err(TriageError::artifact(
            path,
            format!("classifier classes must be [0, 1], found {classes:?}"),
        ));
    }
    if vectorizer.dimension() != classifier.n_features() {
        return Err(TriageError::artifact(
            path,
            format!(
                "vectorizer produces {} features but classifier expects {}",
                vectorizer.dimension(),
                classifier.n_features()
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::model::LinearModel;
    use crate::classify::vectorizer::TfidfVectorizer;

    fn keyword_classifier(classes: Vec<i64>, coef: Vec<f64>) -> Result<PhishingClassifier> {
        let vectorizer = TfidfVectorizer {
            vocabulary: [("verifi", 0), ("password", 1)]
                .into_iter()
                .map(|(t, i)| (t.to_string(), i))
                .collect(),
            idf: None,
            norm: None,
            sublinear_tf: false,
            lowercase: true,
            binary: false,
            ngram_range: (1, 1),
        };
        let model = LinearModel {
            classes,
            coef,
            intercept: -0.5,
        };
        PhishingClassifier::new(Normalizer::default(), Box::new(vectorizer), Box::new(model))
    }

    #[test]
    fn test_classify_through_normalizer() {
        let c = keyword_classifier(vec![0, 1], vec![1.0, 1.0]).unwrap();
        assert_eq!(c.classify("Please VERIFY your password"), Verdict::Phishing);
        assert_eq!(c.classify("Lunch on Friday?"), Verdict::Legitimate);
        assert_eq!(c.classify(""), Verdict::Legitimate);
    }

    #[test]
    fn test_batch_preserves_order() {
        let c = keyword_classifier(vec![0, 1], vec![1.0, 1.0]).unwrap();
        let verdicts = c.classify_batch(&["hi", "verify now", "hello", "password"]);
        assert_eq!(
            verdicts,
            vec![
                Verdict::Legitimate,
                Verdict::Phishing,
                Verdict::Legitimate,
                Verdict::Phishing
            ]
        );
    }

    #[test]
    fn test_analyze_reports_reasons_on_raw_text() {
        let c = keyword_classifier(vec![0, 1], vec![1.0, 1.0]).unwrap();
        let a = c.analyze("Click here: http://10.0.0.1/x to reset your password");
        assert_eq!(a.verdict, Verdict::Phishing);
        assert_eq!(
            a.reasons,
            vec![
                Reason::SuspiciousLink,
                Reason::UrgentLanguage,
                Reason::SensitiveRequest
            ]
        );
        assert!(!a.canonical.contains("http"));
    }

    #[test]
    fn test_rejects_unexpected_classes() {
        let err = keyword_classifier(vec![1, 2], vec![1.0, 1.0]).unwrap_err();
        assert!(err.to_string().contains("classes"));
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let err = keyword_classifier(vec![0, 1], vec![1.0, 1.0, 1.0]).unwrap_err();
        assert!(err.to_string().contains("features"));
    }
}
