use anyhow::{anyhow, bail, ensure};
use serde::Deserialize;

/// A decision tree node. Splits send a sample left when its feature value is
/// less than or equal to the threshold.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

impl TreeNode {
    fn leaf_for(&self, features: &[f64]) -> anyhow::Result<&[f64]> {
        let mut node = self;
        loop {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let Some(value) = features.get(*feature) else {
                        bail!(
                            "split on feature {feature} but only {} features were given",
                            features.len()
                        );
                    };
                    node = if *value <= *threshold {
                        left.as_ref()
                    } else {
                        right.as_ref()
                    };
                }
                TreeNode::Leaf { distribution } => return Ok(distribution),
            }
        }
    }

    fn validate(&self, n_features: usize, n_classes: usize) -> anyhow::Result<()> {
        match self {
            TreeNode::Split {
                feature,
                left,
                right,
                ..
            } => {
                ensure!(
                    *feature < n_features,
                    "split on feature {feature} but only {n_features} features are configured"
                );
                left.validate(n_features, n_classes)?;
                right.validate(n_features, n_classes)
            }
            TreeNode::Leaf { distribution } => {
                ensure!(
                    distribution.len() == n_classes,
                    "leaf has {} class weights, expected {n_classes}",
                    distribution.len()
                );
                ensure!(
                    distribution.iter().all(|weight| weight.is_finite() && *weight >= 0.0),
                    "leaf weights must be finite and non-negative"
                );
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomForest {
    pub classes: Vec<String>,
    pub trees: Vec<TreeNode>,
}

impl RandomForest {
    pub fn validate(&self, n_features: usize) -> anyhow::Result<()> {
        if self.classes.is_empty() {
            bail!("forest has no classes");
        }
        if self.trees.is_empty() {
            bail!("forest has no trees");
        }
        for tree in &self.trees {
            tree.validate(n_features, self.classes.len())?;
        }
        Ok(())
    }

    pub fn predict_proba(&self, features: &[f64]) -> anyhow::Result<Vec<f64>> {
        let mut totals = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.leaf_for(features)?;
            let weight: f64 = leaf.iter().sum();
            if weight <= 0.0 {
                continue;
            }
            for (total, value) in totals.iter_mut().zip(leaf) {
                *total += value / weight;
            }
        }
        let tree_count = self.trees.len() as f64;
        totals.iter_mut().for_each(|total| *total /= tree_count);
        Ok(totals)
    }

    pub fn predict_label(&self, features: &[f64]) -> anyhow::Result<&str> {
        let probabilities = self.predict_proba(features)?;
        let mut best = 0;
        for (index, probability) in probabilities.iter().enumerate() {
            if *probability > probabilities[best] {
                best = index;
            }
        }
        self.classes
            .get(best)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("forest has no classes"))
    }
}
