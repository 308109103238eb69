//! The three co-located search artifacts: `.matrix`, `.corpus`, `.vectorizer`.
//!
//! They are only meaningful together. A missing or unreadable member makes
//! the whole set count as absent, and it is rebuilt from the cache file.

use std::fs::{self, File};
use std::io::{self, BufReader, Cursor};
use std::path::Path;

use memmap2::MmapOptions;
use tracing::{info, warn};

use crate::cache::PersistedCache;
use crate::config::CachePaths;
use crate::error::{Error, Result};
use crate::io_util::*;
use crate::model::{Corpus, CsrMatrix, TfidfModel};
use crate::search::SearchIndex;

pub fn save_matrix(path: &Path, matrix: &CsrMatrix) -> Result<()> {
    write_atomic(path, |w| {
        write_u32(w, matrix.rows() as u32)?;
        write_u32(w, matrix.cols as u32)?;
        write_u64(w, matrix.nnz() as u64)?;
        for &offset in &matrix.indptr {
            write_u64(w, offset as u64)?;
        }
        for (&col, &weight) in matrix.indices.iter().zip(&matrix.data) {
            write_u32(w, col)?;
            write_f32(w, weight)?;
        }
        Ok(())
    })?;
    Ok(())
}

fn decode_matrix(bytes: &[u8]) -> io::Result<std::result::Result<CsrMatrix, String>> {
    let mut r = Cursor::new(bytes);
    let rows = read_u32(&mut r)? as usize;
    let cols = read_u32(&mut r)? as usize;
    let nnz = read_u64(&mut r)? as usize;

    // 8 bytes per offset, 8 per entry
    let expected = (rows + 1)
        .checked_add(nnz)
        .and_then(|n| n.checked_mul(8))
        .and_then(|n| n.checked_add(16));
    if expected != Some(bytes.len()) {
        return Ok(Err(format!("header does not match {} byte file", bytes.len())));
    }

    let mut indptr = Vec::with_capacity(rows + 1);
    for _ in 0..=rows {
        indptr.push(read_u64(&mut r)? as usize);
    }
    if indptr.first() != Some(&0)
        || indptr.last() != Some(&nnz)
        || indptr.windows(2).any(|w| w[0] > w[1])
    {
        return Ok(Err("row offsets are not monotonic".to_string()));
    }

    let mut indices = Vec::with_capacity(nnz);
    let mut data = Vec::with_capacity(nnz);
    for _ in 0..nnz {
        let col = read_u32(&mut r)?;
        if col as usize >= cols {
            return Ok(Err(format!("column {col} out of range")));
        }
        indices.push(col);
        data.push(read_f32(&mut r)?);
    }

    Ok(Ok(CsrMatrix {
        cols,
        indptr,
        indices,
        data,
    }))
}

pub fn load_matrix(path: &Path) -> Result<CsrMatrix> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(Error::corrupt(path, "empty file"));
    }
    let mmap = unsafe { MmapOptions::new().map(&file)? };

    match decode_matrix(&mmap) {
        Ok(Ok(matrix)) => Ok(matrix),
        Ok(Err(reason)) => Err(Error::corrupt(path, reason)),
        Err(e) => Err(Error::corrupt(path, e.to_string())),
    }
}

pub fn save_vectorizer(path: &Path, model: &TfidfModel) -> Result<()> {
    write_atomic(path, |w| {
        write_u32(w, model.len() as u32)?;
        for (term, &idf) in model.terms().iter().zip(model.idf()) {
            write_str(w, term)?;
            write_f32(w, idf)?;
        }
        Ok(())
    })?;
    Ok(())
}

pub fn load_vectorizer(path: &Path) -> Result<TfidfModel> {
    let bytes = fs::read(path)?;
    let decode = || -> io::Result<TfidfModel> {
        let mut r = Cursor::new(bytes.as_slice());
        let len = read_u32(&mut r)? as usize;
        // 4-byte length prefix and 4-byte weight per term at minimum
        let remaining = bytes.len() - r.position() as usize;
        if len > remaining / 8 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{len} terms cannot fit in {remaining} bytes"),
            ));
        }
        let mut terms = Vec::with_capacity(len);
        let mut idf = Vec::with_capacity(len);
        for _ in 0..len {
            terms.push(read_str(&mut r)?);
            idf.push(read_f32(&mut r)?);
        }
        Ok(TfidfModel::from_parts(terms, idf))
    };
    decode().map_err(|e| Error::corrupt(path, e.to_string()))
}

pub fn save_corpus(path: &Path, corpus: &Corpus) -> Result<()> {
    write_atomic(path, |w| serde_json::to_writer(w, corpus).map_err(io::Error::from))?;
    Ok(())
}

pub fn load_corpus(path: &Path) -> Result<Corpus> {
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader).map_err(|e| Error::corrupt(path, e.to_string()))
}

pub fn save_artifacts(paths: &CachePaths, index: &SearchIndex) -> Result<()> {
    save_matrix(&paths.matrix(), index.matrix())?;
    save_corpus(&paths.corpus(), index.corpus())?;
    save_vectorizer(&paths.vectorizer(), index.model())?;
    Ok(())
}

/// Load all three artifacts; `None` when any of them is missing.
pub fn load_artifacts(paths: &CachePaths) -> Result<Option<SearchIndex>> {
    let (matrix_path, corpus_path, vectorizer_path) =
        (paths.matrix(), paths.corpus(), paths.vectorizer());
    if !(matrix_path.exists() && corpus_path.exists() && vectorizer_path.exists()) {
        return Ok(None);
    }

    let matrix = load_matrix(&matrix_path)?;
    let corpus = load_corpus(&corpus_path)?;
    let model = load_vectorizer(&vectorizer_path)?;

    if matrix.rows() != corpus.len() {
        return Err(Error::corrupt(
            &matrix_path,
            format!("{} rows for {} documents", matrix.rows(), corpus.len()),
        ));
    }
    if matrix.cols != model.len() {
        return Err(Error::corrupt(
            &matrix_path,
            format!("{} columns for {} terms", matrix.cols, model.len()),
        ));
    }
    Ok(Some(SearchIndex::new(model, matrix, corpus)))
}

/// Load the search artifacts, refitting them from the cache file when absent.
pub fn load_or_build(paths: &CachePaths) -> Result<SearchIndex> {
    match load_artifacts(paths) {
        Ok(Some(index)) => return Ok(index),
        Ok(None) => {}
        Err(e @ Error::CorruptArtifact { .. }) => warn!("{e}; rebuilding from cache"),
        Err(e) => return Err(e),
    }

    let cache = PersistedCache::load(paths.cache_file())?;
    let index = SearchIndex::from_corpus(cache.corpus());
    info!(
        documents = index.corpus().len(),
        terms = index.model().len(),
        "fitted search model from {}",
        paths.cache_file().display()
    );
    save_artifacts(paths, &index)?;
    Ok(index)
}
