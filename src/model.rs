//! TF-IDF weighting over the corpus and the sparse document-term matrix.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::text::tokenize;

/// One searchable document: compound title and normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub title: String,
    pub text: String,
}

/// Documents in matrix row order.
pub type Corpus = Vec<CorpusEntry>;

/// `(column, weight)` pairs sorted by column.
pub type SparseVector = Vec<(u32, f32)>;

/// Compressed sparse rows: documents x vocabulary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsrMatrix {
    pub cols: usize,
    pub indptr: Vec<usize>,
    pub indices: Vec<u32>,
    pub data: Vec<f32>,
}

impl CsrMatrix {
    pub fn from_rows(cols: usize, rows: impl IntoIterator<Item = SparseVector>) -> Self {
        let mut matrix = CsrMatrix {
            cols,
            indptr: vec![0],
            ..Default::default()
        };
        for row in rows {
            for (col, weight) in row {
                matrix.indices.push(col);
                matrix.data.push(weight);
            }
            matrix.indptr.push(matrix.indices.len());
        }
        matrix
    }

    pub fn rows(&self) -> usize {
        self.indptr.len().saturating_sub(1)
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn row(&self, i: usize) -> (&[u32], &[f32]) {
        let (start, end) = (self.indptr[i], self.indptr[i + 1]);
        (&self.indices[start..end], &self.data[start..end])
    }

    /// Dot product of every row with `query`.
    pub fn dot(&self, query: &SparseVector) -> Vec<f32> {
        (0..self.rows())
            .map(|i| {
                let (indices, data) = self.row(i);
                sparse_dot(indices, data, query)
            })
            .collect()
    }
}

fn sparse_dot(indices: &[u32], data: &[f32], query: &SparseVector) -> f32 {
    let (mut a, mut b) = (0, 0);
    let mut sum = 0.0f32;
    while a < indices.len() && b < query.len() {
        match indices[a].cmp(&query[b].0) {
            std::cmp::Ordering::Less => a += 1,
            std::cmp::Ordering::Greater => b += 1,
            std::cmp::Ordering::Equal => {
                sum += data[a] * query[b].1;
                a += 1;
                b += 1;
            }
        }
    }
    sum
}

fn l2_normalize(v: &mut SparseVector) {
    let norm = v.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        for (_, w) in v.iter_mut() {
            *w /= norm;
        }
    }
}

/// Vocabulary and smoothed inverse document frequencies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TfidfModel {
    terms: Vec<String>,
    vocabulary: HashMap<String, u32>,
    idf: Vec<f32>,
}

impl TfidfModel {
    /// Rebuild from persisted `(term, idf)` pairs in column order.
    pub fn from_parts(terms: Vec<String>, idf: Vec<f32>) -> Self {
        let vocabulary = terms
            .iter()
            .enumerate()
            .map(|(col, term)| (term.clone(), col as u32))
            .collect();
        TfidfModel {
            terms,
            vocabulary,
            idf,
        }
    }

    /// Learn the vocabulary from `texts` and weight them into a matrix.
    pub fn fit<'a>(texts: impl IntoIterator<Item = &'a str>) -> (Self, CsrMatrix) {
        let counts: Vec<HashMap<String, u32>> = texts.into_iter().map(term_counts).collect();

        let mut df: BTreeMap<&str, u32> = BTreeMap::new();
        for doc in &counts {
            for term in doc.keys() {
                *df.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let n = counts.len() as f32;
        let terms: Vec<String> = df.keys().map(|t| t.to_string()).collect();
        let idf = df
            .values()
            .map(|&d| ((1.0 + n) / (1.0 + d as f32)).ln() + 1.0)
            .collect();
        let model = TfidfModel::from_parts(terms, idf);

        let matrix = CsrMatrix::from_rows(model.terms.len(), counts.iter().map(|c| model.weigh(c)));
        (model, matrix)
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Weight `text` under the fitted vocabulary; unknown terms are dropped.
    pub fn transform(&self, text: &str) -> SparseVector {
        self.weigh(&term_counts(text))
    }

    fn weigh(&self, counts: &HashMap<String, u32>) -> SparseVector {
        let mut v: SparseVector = counts
            .iter()
            .filter_map(|(term, &tf)| {
                let col = *self.vocabulary.get(term)?;
                Some((col, tf as f32 * self.idf[col as usize]))
            })
            .collect();
        v.sort_unstable_by_key(|&(col, _)| col);
        l2_normalize(&mut v);
        v
    }
}

fn term_counts(text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for term in tokenize(text) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}
