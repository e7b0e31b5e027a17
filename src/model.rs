use serde::Deserialize;

use crate::error::InferenceError;
use crate::schema::EncodedRow;
use crate::types::Prediction;

/// A binary delay classifier over one aligned row.
pub trait Classifier: Send + Sync {
    /// Number of input columns the model was trained on.
    fn input_width(&self) -> usize;

    /// Training-time column names, when the artifact records them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// P(delayed) for a single row of `input_width()` values.
    fn delay_probability(&self, features: &[f32]) -> Result<f32, InferenceError>;

    fn describe(&self) -> String;
}

/// Runs the classifier on one aligned row.
pub fn predict(classifier: &dyn Classifier, row: &EncodedRow) -> Result<Prediction, InferenceError> {
    let expected = classifier.input_width();
    if row.len() != expected {
        return Err(InferenceError::WidthMismatch {
            got: row.len(),
            expected,
        });
    }
    if let Some(i) = row.values().iter().position(|v| !v.is_finite()) {
        return Err(InferenceError::NonFinite {
            column: row.columns().get(i).cloned().unwrap_or_else(|| format!("#{i}")),
        });
    }

    let p = classifier.delay_probability(row.values())?;
    if !p.is_finite() {
        return Err(InferenceError::Backend(format!(
            "classifier returned non-finite probability {p}"
        )));
    }
    Ok(Prediction::from_delay_probability(p))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ---------- Gradient-boosted trees (XGBoost JSON model) ----------

#[derive(Deserialize)]
struct XgbModelFile {
    learner: XgbLearner,
}

#[derive(Deserialize)]
struct XgbLearner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: XgbBooster,
    learner_model_param: XgbModelParam,
    objective: XgbObjective,
}

#[derive(Deserialize)]
struct XgbBooster {
    name: String,
    model: Option<XgbTrees>,
}

#[derive(Deserialize)]
struct XgbTrees {
    trees: Vec<XgbTree>,
}

#[derive(Deserialize)]
struct XgbTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<XgbFlag>,
}

// Older releases write 0/1, newer ones write booleans.
#[derive(Deserialize, Clone, Copy)]
#[serde(untagged)]
enum XgbFlag {
    Bool(bool),
    Int(u8),
}

impl XgbFlag {
    fn is_set(self) -> bool {
        match self {
            XgbFlag::Bool(b) => b,
            XgbFlag::Int(i) => i != 0,
        }
    }
}

#[derive(Deserialize)]
struct XgbModelParam {
    base_score: String,
    #[serde(default)]
    num_class: Option<String>,
    num_feature: String,
}

#[derive(Deserialize)]
struct XgbObjective {
    name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
    Leaf(f32),
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn leaf_value(&self, x: &[f32]) -> f32 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf(v) => return v,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let v = x[feature];
                    let go_left = if v.is_nan() { default_left } else { v < threshold };
                    idx = if go_left { left } else { right };
                }
            }
        }
    }
}

/// Error text for a rejected model file; wrapped into an `AssetError` by
/// the loader, which knows the path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelFormatError {
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    Unsupported(String),
}

/// A `gbtree` booster with a binary logistic objective.
#[derive(Debug, Clone)]
pub struct BoostedTrees {
    trees: Vec<Tree>,
    base_margin: f32,
    num_feature: usize,
    feature_names: Vec<String>,
    objective: String,
}

impl BoostedTrees {
    pub fn from_json(text: &str) -> Result<Self, ModelFormatError> {
        let file: XgbModelFile =
            serde_json::from_str(text).map_err(|e| ModelFormatError::Parse(e.to_string()))?;
        let learner = file.learner;

        let objective = learner.objective.name;
        if objective != "binary:logistic" && objective != "binary:logitraw" {
            return Err(ModelFormatError::Unsupported(format!(
                "objective {objective:?} is not a binary classifier"
            )));
        }
        if learner.gradient_booster.name != "gbtree" {
            return Err(ModelFormatError::Unsupported(format!(
                "booster {:?} (only gbtree is supported)",
                learner.gradient_booster.name
            )));
        }
        let params = learner.learner_model_param;
        if let Some(n) = params.num_class.as_deref() {
            if n.trim() != "0" && n.trim() != "1" {
                return Err(ModelFormatError::Unsupported(format!(
                    "num_class={n}, expected a binary model"
                )));
            }
        }

        let num_feature: usize = params
            .num_feature
            .trim()
            .parse()
            .map_err(|_| {
                ModelFormatError::Parse(format!("bad num_feature {:?}", params.num_feature))
            })?;
        let base_score = parse_base_score(&params.base_score)?;
        let base_margin = if objective == "binary:logistic" {
            if !(base_score > 0.0 && base_score < 1.0) {
                return Err(ModelFormatError::Parse(format!(
                    "base_score {base_score} outside (0, 1)"
                )));
            }
            (base_score / (1.0 - base_score)).ln()
        } else {
            base_score
        };

        let raw_trees = learner
            .gradient_booster
            .model
            .map(|m| m.trees)
            .unwrap_or_default();
        let trees = raw_trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                build_tree(t, num_feature)
                    .map_err(|e| ModelFormatError::Parse(format!("tree {i}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if !learner.feature_names.is_empty() && learner.feature_names.len() != num_feature {
            return Err(ModelFormatError::Parse(format!(
                "{} feature names for {num_feature} features",
                learner.feature_names.len()
            )));
        }

        Ok(Self {
            trees,
            base_margin,
            num_feature,
            feature_names: learner.feature_names,
            objective,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw score before the logistic link. `x` must hold `num_feature` values.
    fn margin(&self, x: &[f32]) -> f32 {
        self.base_margin + self.trees.iter().map(|t| t.leaf_value(x)).sum::<f32>()
    }
}

// "5E-1" in 1.x, "[5E-1]" in 3.x.
fn parse_base_score(raw: &str) -> Result<f32, ModelFormatError> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim()
        .parse()
        .map_err(|_| ModelFormatError::Parse(format!("bad base_score {raw:?}")))
}

fn build_tree(raw: XgbTree, num_feature: usize) -> Result<Tree, String> {
    let n = raw.left_children.len();
    if n == 0 {
        return Err("no nodes".into());
    }
    if [
        raw.right_children.len(),
        raw.split_indices.len(),
        raw.split_conditions.len(),
        raw.default_left.len(),
    ]
    .iter()
    .any(|&len| len != n)
    {
        return Err("node arrays differ in length".into());
    }

    let mut nodes = Vec::with_capacity(n);
    for i in 0..n {
        let (l, r) = (raw.left_children[i], raw.right_children[i]);
        if l == -1 {
            nodes.push(Node::Leaf(raw.split_conditions[i]));
            continue;
        }
        // Children always follow their parent, which also rules out cycles.
        let child = |c: i64| -> Result<usize, String> {
            usize::try_from(c)
                .ok()
                .filter(|&c| c > i && c < n)
                .ok_or_else(|| format!("node {i} has invalid child {c}"))
        };
        let feature = usize::try_from(raw.split_indices[i])
            .ok()
            .filter(|&f| f < num_feature)
            .ok_or_else(|| format!("node {i} splits on feature {}", raw.split_indices[i]))?;
        nodes.push(Node::Split {
            feature,
            threshold: raw.split_conditions[i],
            left: child(l)?,
            right: child(r)?,
            default_left: raw.default_left[i].is_set(),
        });
    }
    Ok(Tree { nodes })
}

impl Classifier for BoostedTrees {
    fn input_width(&self) -> usize {
        self.num_feature
    }

    fn feature_names(&self) -> Option<&[String]> {
        if self.feature_names.is_empty() {
            None
        } else {
            Some(&self.feature_names)
        }
    }

    fn delay_probability(&self, features: &[f32]) -> Result<f32, InferenceError> {
        if features.len() != self.num_feature {
            return Err(InferenceError::WidthMismatch {
                got: features.len(),
                expected: self.num_feature,
            });
        }
        Ok(sigmoid(self.margin(features)))
    }

    fn describe(&self) -> String {
        format!(
            "xgboost gbtree ({} trees, {} features, {})",
            self.trees.len(),
            self.num_feature,
            self.objective
        )
    }
}
