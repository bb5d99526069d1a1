//! Sentiment inference over frozen, externally trained artifacts.
//!
//! Two JSON artifacts are loaded once at startup:
//! - a TF-IDF vectorizer (vocabulary, idf weights, n-gram range, normalization)
//! - a linear classifier (one coefficient row and intercept per class)
//!
//! Nothing here trains or updates a model. Both artifacts are validated against
//! each other at load time so that `classify` itself cannot fail.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::ModelLoadError;

// Same token rule as the training side: runs of two or more word characters.
static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral];

    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    /// Case-insensitive parse; legacy rows store `Positive`, `NEGATIVE`, etc.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arg-max label and its probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Classification {
    pub label: Sentiment,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorizerArtifact {
    pub vocabulary: HashMap<String, usize>,
    pub idf: Vec<f64>,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default)]
    pub sublinear_tf: bool,
    #[serde(default = "default_norm")]
    pub norm: Option<Norm>,
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_norm() -> Option<Norm> {
    Some(Norm::L2)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiClass {
    #[default]
    Multinomial,
    Ovr,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierArtifact {
    pub classes: Vec<String>,
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
    #[serde(default)]
    pub multi_class: MultiClass,
}

/// Maps cleaned text to a sparse, weighted term vector.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    ngram_range: (usize, usize),
    sublinear_tf: bool,
    norm: Option<Norm>,
}

impl TfidfVectorizer {
    pub fn from_artifact(artifact: VectorizerArtifact) -> Result<Self, ModelLoadError> {
        let (min_n, max_n) = artifact.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(ModelLoadError::Incompatible(format!(
                "invalid ngram_range ({}, {})",
                min_n, max_n
            )));
        }
        if artifact.idf.len() != artifact.vocabulary.len() {
            return Err(ModelLoadError::Incompatible(format!(
                "vocabulary has {} terms but idf has {} weights",
                artifact.vocabulary.len(),
                artifact.idf.len()
            )));
        }
        let dimension = artifact.idf.len();
        if let Some((term, column)) = artifact.vocabulary.iter().find(|(_, c)| **c >= dimension) {
            return Err(ModelLoadError::Incompatible(format!(
                "term {:?} maps to column {} outside dimension {}",
                term, column, dimension
            )));
        }

        Ok(Self {
            vocabulary: artifact.vocabulary,
            idf: artifact.idf,
            ngram_range: artifact.ngram_range,
            sublinear_tf: artifact.sublinear_tf,
            norm: artifact.norm,
        })
    }

    pub fn dimension(&self) -> usize {
        self.idf.len()
    }

    /// Returns `(column, weight)` pairs sorted by column. Unknown terms are ignored.
    pub fn transform(&self, text: &str) -> Vec<(usize, f64)> {
        let tokens: Vec<&str> = TOKEN.find_iter(text).map(|m| m.as_str()).collect();
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();

        let (min_n, max_n) = self.ngram_range;
        for n in min_n..=max_n {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                let gram = window.join(" ");
                if let Some(&column) = self.vocabulary.get(&gram) {
                    *counts.entry(column).or_insert(0.0) += 1.0;
                }
            }
        }

        let mut features: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(column, tf)| {
                let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
                (column, tf * self.idf[column])
            })
            .collect();

        let scale = match self.norm {
            Some(Norm::L2) => features.iter().map(|(_, w)| w * w).sum::<f64>().sqrt(),
            Some(Norm::L1) => features.iter().map(|(_, w)| w.abs()).sum::<f64>(),
            None => 1.0,
        };
        if scale > 0.0 && scale != 1.0 {
            for (_, weight) in features.iter_mut() {
                *weight /= scale;
            }
        }
        features
    }
}

/// One coefficient row per sentiment class.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    classes: Vec<Sentiment>,
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
    multi_class: MultiClass,
}

impl LinearClassifier {
    pub fn from_artifact(artifact: ClassifierArtifact) -> Result<Self, ModelLoadError> {
        let classes = artifact
            .classes
            .iter()
            .map(|label| Sentiment::parse(label).ok_or_else(|| ModelLoadError::UnknownLabel(label.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let distinct: HashSet<Sentiment> = classes.iter().copied().collect();
        if classes.len() != Sentiment::ALL.len() || distinct.len() != Sentiment::ALL.len() {
            return Err(ModelLoadError::Incompatible(format!(
                "expected exactly the classes positive, negative, neutral; got {:?}",
                artifact.classes
            )));
        }
        if artifact.coef.len() != classes.len() || artifact.intercept.len() != classes.len() {
            return Err(ModelLoadError::Incompatible(format!(
                "{} classes but {} coefficient rows and {} intercepts",
                classes.len(),
                artifact.coef.len(),
                artifact.intercept.len()
            )));
        }
        let width = artifact.coef[0].len();
        if artifact.coef.iter().any(|row| row.len() != width) {
            return Err(ModelLoadError::Incompatible(
                "coefficient rows have different lengths".to_string(),
            ));
        }

        Ok(Self {
            classes,
            coef: artifact.coef,
            intercept: artifact.intercept,
            multi_class: artifact.multi_class,
        })
    }

    pub fn dimension(&self) -> usize {
        self.coef.first().map(Vec::len).unwrap_or(0)
    }

    /// Probability per class, in `self.classes` order. Always sums to 1.
    pub fn predict_proba(&self, features: &[(usize, f64)]) -> Vec<f64> {
        let scores: Vec<f64> = self
            .coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, bias)| bias + features.iter().map(|(j, w)| row[*j] * w).sum::<f64>())
            .collect();

        let raw: Vec<f64> = match self.multi_class {
            MultiClass::Multinomial => {
                let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                scores.iter().map(|z| (z - max).exp()).collect()
            }
            MultiClass::Ovr => scores.iter().map(|z| 1.0 / (1.0 + (-z).exp())).collect(),
        };

        let total: f64 = raw.iter().sum();
        if total > 0.0 && total.is_finite() {
            raw.iter().map(|p| p / total).collect()
        } else {
            vec![1.0 / raw.len() as f64; raw.len()]
        }
    }

    pub fn classes(&self) -> &[Sentiment] {
        &self.classes
    }
}

/// Read-only inference service, shared across requests behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SentimentClassifier {
    vectorizer: TfidfVectorizer,
    classifier: LinearClassifier,
}

impl SentimentClassifier {
    pub fn new(vectorizer: TfidfVectorizer, classifier: LinearClassifier) -> Result<Self, ModelLoadError> {
        if vectorizer.dimension() != classifier.dimension() {
            return Err(ModelLoadError::Incompatible(format!(
                "vectorizer produces {} features but classifier expects {}",
                vectorizer.dimension(),
                classifier.dimension()
            )));
        }
        Ok(Self { vectorizer, classifier })
    }

    pub fn load(vectorizer_path: &Path, classifier_path: &Path) -> Result<Self, ModelLoadError> {
        let vectorizer = TfidfVectorizer::from_artifact(read_artifact(vectorizer_path)?)?;
        let classifier = LinearClassifier::from_artifact(read_artifact(classifier_path)?)?;
        let model = Self::new(vectorizer, classifier)?;

        info!(
            features = model.vectorizer.dimension(),
            vectorizer = %vectorizer_path.display(),
            classifier = %classifier_path.display(),
            "sentiment model loaded"
        );
        Ok(model)
    }

    pub fn classify(&self, cleaned_text: &str) -> Classification {
        let features = self.vectorizer.transform(cleaned_text);
        let proba = self.classifier.predict_proba(&features);

        let mut best = 0;
        for (i, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = i;
            }
        }
        Classification {
            label: self.classifier.classes()[best],
            confidence: proba[best],
        }
    }
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, ModelLoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ModelLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
