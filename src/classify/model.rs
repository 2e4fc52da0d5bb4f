//! Fitted binary classifiers: a random forest (what the training script
//! fits) and a linear model.

use serde::{Deserialize, Serialize};

use super::vectorizer::FeatureVector;

/// A fitted classifier. Read-only after load; shared across workers.
pub trait FittedClassifier: Send + Sync {
    /// Number of input features the model was fitted on.
    fn n_features(&self) -> usize;

    /// Class labels in the order the model was fitted with.
    fn classes(&self) -> &[i64];

    /// Predict the class label of one row.
    fn predict(&self, features: &FeatureVector) -> i64;

    /// Predict one label per row.
    fn predict_batch(&self, rows: &[FeatureVector]) -> Vec<i64> {
        rows.iter().map(|r| self.predict(r)).collect()
    }
}

/// One decision tree in parallel-array form.
///
/// Node `i` is a leaf when `children_left[i] == -1`; otherwise the row goes
/// left when `x[feature[i]] <= threshold[i]`. `value[i]` holds per-class
/// weights (counts or fractions) at the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    fn node_count(&self) -> usize {
        self.children_left.len()
    }

    fn validate(&self, n_features: usize, n_classes: usize) -> std::result::Result<(), String> {
        let n = self.node_count();
        if n == 0 {
            return Err("tree has no nodes".into());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&len| len != n)
        {
            return Err("tree arrays have different lengths".into());
        }
        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == -1 {
                if self.value[node].len() != n_classes {
                    return Err(format!(
                        "leaf {node} has {} class weights, expected {n_classes}",
                        self.value[node].len()
                    ));
                }
                continue;
            }
            // Children always come after their parent, so descent terminates.
            for child in [left, right] {
                if child <= node as i64 || child as usize >= n {
                    return Err(format!("node {node} has invalid child {child}"));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(format!("node {node} splits on invalid feature {feature}"));
            }
        }
        Ok(())
    }

    /// Class probabilities at the leaf reached by `x`.
    fn leaf_proba(&self, x: &FeatureVector) -> Vec<f64> {
        let mut node = 0usize;
        while self.children_left[node] != -1 {
            // Rows are compared in single precision, as they were at fit time.
            let value = x.get(self.feature[node] as usize) as f32 as f64;
            node = if value <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        let weights = &self.value[node];
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights.iter().map(|w| w / total).collect()
        } else {
            weights.clone()
        }
    }
}

/// Averaged ensemble of decision trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub classes: Vec<i64>,
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".into());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.classes.len())
                .map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }

    /// Mean class probabilities over all trees.
    pub fn predict_proba(&self, x: &FeatureVector) -> Vec<f64> {
        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.leaf_proba(x)) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }
}

/// Index of the first maximum.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

impl FittedClassifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict(&self, features: &FeatureVector) -> i64 {
        self.classes[argmax(&self.predict_proba(features))]
    }
}

/// Binary linear model: `classes[1]` when `coef · x + intercept > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub classes: Vec<i64>,
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.coef.is_empty() {
            return Err("linear model has no coefficients".into());
        }
        if self.classes.len() != 2 {
            return Err(format!(
                "linear model needs exactly 2 classes, found {}",
                self.classes.len()
            ));
        }
        Ok(())
    }

    pub fn decision_function(&self, x: &FeatureVector) -> f64 {
        x.dot(&self.coef) + self.intercept
    }
}

impl FittedClassifier for LinearModel {
    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn predict(&self, features: &FeatureVector) -> i64 {
        let positive = self.decision_function(features) > 0.0;
        self.classes[usize::from(positive)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Single split on feature 0 at 0.5: left → class 0, right → class 1.
    fn stump(left: [f64; 2], right: [f64; 2]) -> DecisionTree {
        DecisionTree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![0, -2, -2],
            threshold: vec![0.5, -2.0, -2.0],
            value: vec![vec![1.0, 1.0], left.to_vec(), right.to_vec()],
        }
    }

    fn forest(trees: Vec<DecisionTree>) -> RandomForest {
        RandomForest {
            classes: vec![0, 1],
            n_features: 2,
            trees,
        }
    }

    #[test]
    fn test_forest_predicts_by_threshold() {
        let f = forest(vec![stump([10.0, 0.0], [0.0, 10.0])]);
        assert!(f.validate().is_ok());
        assert_eq!(f.predict(&FeatureVector::from_dense(&[0.2, 0.0])), 0);
        assert_eq!(f.predict(&FeatureVector::from_dense(&[0.9, 0.0])), 1);
        // Equal to the threshold goes left.
        assert_eq!(f.predict(&FeatureVector::from_dense(&[0.5, 0.0])), 0);
    }

    #[test]
    fn test_forest_averages_probabilities() {
        let f = forest(vec![
            stump([0.0, 1.0], [0.0, 1.0]),
            stump([3.0, 1.0], [3.0, 1.0]),
            stump([3.0, 1.0], [3.0, 1.0]),
        ]);
        let proba = f.predict_proba(&FeatureVector::zeros(2));
        assert!((proba[0] - 0.5).abs() < 1e-12);
        // Tie resolves to the first class.
        assert_eq!(f.predict(&FeatureVector::zeros(2)), 0);
    }

    #[test]
    fn test_forest_validation() {
        let mut bad = stump([1.0, 0.0], [0.0, 1.0]);
        bad.feature[0] = 5;
        assert!(forest(vec![bad]).validate().is_err());

        let mut cyclic = stump([1.0, 0.0], [0.0, 1.0]);
        cyclic.children_left[0] = 0;
        assert!(forest(vec![cyclic]).validate().is_err());

        assert!(forest(vec![]).validate().is_err());
    }

    #[test]
    fn test_linear_model() {
        let m = LinearModel {
            classes: vec![0, 1],
            coef: vec![1.0, -1.0],
            intercept: -0.1,
        };
        assert_eq!(m.n_features(), 2);
        assert_eq!(m.predict(&FeatureVector::from_dense(&[1.0, 0.0])), 1);
        assert_eq!(m.predict(&FeatureVector::from_dense(&[0.0, 1.0])), 0);
        assert_eq!(m.predict(&FeatureVector::zeros(2)), 0);
        assert_eq!(
            m.predict_batch(&[FeatureVector::from_dense(&[1.0, 0.0]), FeatureVector::zeros(2)]),
            vec![1, 0]
        );
    }
}
