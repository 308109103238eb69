use std::cmp::Ordering;

use crate::model::{Corpus, CsrMatrix, TfidfModel};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub doc_id: u32,
    pub title: String,
    pub score: f32,
}

/// A fitted model together with the corpus it was fitted on.
///
/// Row `i` of the matrix and entry `i` of the corpus are the same document.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    model: TfidfModel,
    matrix: CsrMatrix,
    corpus: Corpus,
}

impl SearchIndex {
    pub fn new(model: TfidfModel, matrix: CsrMatrix, corpus: Corpus) -> Self {
        debug_assert_eq!(matrix.rows(), corpus.len());
        SearchIndex {
            model,
            matrix,
            corpus,
        }
    }

    pub fn from_corpus(corpus: Corpus) -> Self {
        let (model, matrix) = TfidfModel::fit(corpus.iter().map(|e| e.text.as_str()));
        SearchIndex::new(model, matrix, corpus)
    }

    pub fn model(&self) -> &TfidfModel {
        &self.model
    }

    pub fn matrix(&self) -> &CsrMatrix {
        &self.matrix
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// The `count` documents most similar to `query`, best first.
    ///
    /// Equal scores keep corpus order.
    pub fn search_cosine(&self, query: &str, count: usize) -> Vec<SearchResult> {
        let query_vec = self.model.transform(query);
        let scores = self.matrix.dot(&query_vec);

        let mut ranked: Vec<(u32, f32)> = scores
            .into_iter()
            .enumerate()
            .map(|(doc_id, score)| (doc_id as u32, score))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        ranked
            .into_iter()
            .take(count)
            .map(|(doc_id, score)| SearchResult {
                doc_id,
                title: self.corpus[doc_id as usize].title.clone(),
                score,
            })
            .collect()
    }

    /// Cosine ranking followed by the literal-title rerank.
    pub fn search(&self, query: &str, count: usize) -> Vec<SearchResult> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        let mut results = self.search_cosine(query, count);
        rerank(query, &mut results);
        results
    }

    pub fn search_titles(&self, query: &str, count: usize) -> Vec<String> {
        self.search(query, count)
            .into_iter()
            .map(|r| r.title)
            .collect()
    }
}

/// Float literal title matches to the front.
///
/// A result whose first title word equals `query` moves to position 0; one
/// whose first word merely contains it moves to just after the matches
/// already promoted. Single pass, so promoted results keep their found order
/// except that each exact match jumps ahead of everything before it.
pub fn rerank(query: &str, results: &mut Vec<SearchResult>) {
    let mut match_count = 0;
    for idx in 0..results.len() {
        let head = results[idx].title.split_whitespace().next().unwrap_or("");
        if !head.contains(query) {
            continue;
        }
        let target = if head == query { 0 } else { match_count };
        let result = results.remove(idx);
        results.insert(target, result);
        match_count += 1;
    }
}
