//! Toy sentiment corpus and bag-of-words features.

use std::collections::BTreeMap;

use qnlp_classifier::EncodingType;

/// Sentences with a positive (`true`) or negative (`false`) label.
pub const CORPUS: &[(&str, bool)] = &[
    ("the movie was great and fun", true),
    ("a wonderful and moving story", true),
    ("great acting and a fun plot", true),
    ("i loved this wonderful film", true),
    ("fun from start to finish", true),
    ("a moving and great experience", true),
    ("the movie was boring and slow", false),
    ("a terrible and dull story", false),
    ("slow plot and bad acting", false),
    ("i hated this boring film", false),
    ("dull from start to finish", false),
    ("a terrible and bad experience", false),
];

/// Labelled data set in the shape the classifier trains on.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    /// Regression targets: `[1.0]` for positive, `[-1.0]` for negative.
    pub targets: Vec<Vec<f64>>,
    /// 0/1 labels for scoring.
    pub labels: Vec<f64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Hashes words into a fixed number of count buckets.
///
/// Bucket 0 is a constant bias so that no sentence maps to the zero vector.
#[derive(Debug, Clone)]
pub struct BagOfWords {
    vocabulary: BTreeMap<String, usize>,
    dim: usize,
}

impl BagOfWords {
    /// Build a vocabulary from `sentences`, folding words into `dim` buckets.
    pub fn fit<'a>(sentences: impl IntoIterator<Item = &'a str>, dim: usize) -> Self {
        let dim = dim.max(2);
        let mut vocabulary = BTreeMap::new();
        for word in sentences.into_iter().flat_map(str::split_whitespace) {
            let next = vocabulary.len();
            vocabulary.entry(word.to_lowercase()).or_insert(next);
        }
        Self { vocabulary, dim }
    }

    /// Feature width required by `encoding` on `n_qubits`.
    pub fn width_for(encoding: EncodingType, n_qubits: u32) -> usize {
        match encoding {
            EncodingType::Amplitude | EncodingType::Hybrid => 1usize << n_qubits,
            EncodingType::Angle | EncodingType::Basis => n_qubits as usize,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    /// Word counts per bucket, unknown words ignored.
    pub fn featurize(&self, sentence: &str) -> Vec<f64> {
        let mut features = vec![0.0; self.dim];
        features[0] = 1.0;
        for word in sentence.split_whitespace() {
            if let Some(&index) = self.vocabulary.get(&word.to_lowercase()) {
                features[1 + index % (self.dim - 1)] += 1.0;
            }
        }
        features
    }

    pub fn dataset(&self, corpus: &[(&str, bool)]) -> Dataset {
        let mut data = Dataset::default();
        for &(sentence, positive) in corpus {
            data.features.push(self.featurize(sentence));
            data.targets.push(vec![if positive { 1.0 } else { -1.0 }]);
            data.labels.push(if positive { 1.0 } else { 0.0 });
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_featurize_keeps_bias_and_counts() {
        let bow = BagOfWords::fit(CORPUS.iter().map(|(s, _)| *s), 8);
        let features = bow.featurize("great great unknownword");
        assert_eq!(features.len(), 8);
        assert_eq!(features[0], 1.0);
        assert_eq!(features.iter().sum::<f64>(), 3.0);
    }

    #[test]
    fn test_dataset_labels() {
        let bow = BagOfWords::fit(CORPUS.iter().map(|(s, _)| *s), 4);
        let data = bow.dataset(CORPUS);
        assert_eq!(data.len(), CORPUS.len());
        assert_eq!(data.labels.iter().filter(|&&l| l == 1.0).count(), 6);
        assert!(data.targets.iter().all(|t| t[0] == 1.0 || t[0] == -1.0));
    }

    #[test]
    fn test_width_for_encoding() {
        assert_eq!(BagOfWords::width_for(EncodingType::Amplitude, 3), 8);
        assert_eq!(BagOfWords::width_for(EncodingType::Angle, 3), 3);
    }
}
