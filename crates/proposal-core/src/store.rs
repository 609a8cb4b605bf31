/// The live knowledge base: documents, section index and embedding index as one snapshot.
///
/// A reload parses and indexes the directory without holding any lock, then swaps the
/// finished snapshot in under a short exclusive lock. Searches clone the current
/// snapshot handle and run against it, so they never observe a half-built index and a
/// reload never waits for in-flight searches.
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use proposal_common::embedding::EmbeddingProvider;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::CoreError;
use crate::index::EmbeddingIndex;
use crate::model::{KnowledgeDocument, SectionIndex};
use crate::parser::load_directory;
use crate::sanitize::sanitize;
use crate::search::{MergeStrategy, Retriever};

/// One immutable load of the knowledge base.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Loads performed by this process, starting at 1. Empty snapshot is 0.
    pub generation: u64,
    /// SHA-256 over every document's file name, section name and content. Identical
    /// corpora share a fingerprint across processes; empty until the first load.
    pub fingerprint: String,
    pub directory: Option<PathBuf>,
    pub documents: Vec<KnowledgeDocument>,
    pub sections: SectionIndex,
    pub index: EmbeddingIndex,
}

pub struct KnowledgeBase {
    embedder: Arc<dyn EmbeddingProvider>,
    merge: Arc<dyn MergeStrategy>,
    snapshot: RwLock<Arc<Snapshot>>,
}

/// Counts reported after a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub directory: PathBuf,
    pub generation: u64,
    pub documents: usize,
    pub sections: usize,
}

impl KnowledgeBase {
    /// An empty knowledge base; searches return nothing until `load` succeeds.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, merge: Arc<dyn MergeStrategy>) -> Self {
        Self {
            embedder,
            merge,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Handle to the current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the whole store with the contents of `directory`.
    ///
    /// On failure (embedding provider or directory I/O) the previous snapshot stays live.
    pub fn load(&self, directory: &Path) -> Result<LoadSummary, CoreError> {
        let corpus = load_directory(directory)?;
        let index = EmbeddingIndex::build(&corpus.documents, self.embedder.as_ref())?;
        let corpus_fingerprint = fingerprint(&corpus.documents);

        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        let generation = guard.generation + 1;
        let snapshot = Snapshot {
            generation,
            fingerprint: corpus_fingerprint,
            directory: Some(directory.to_path_buf()),
            documents: corpus.documents,
            sections: corpus.sections,
            index,
        };
        let summary = LoadSummary {
            directory: directory.to_path_buf(),
            generation,
            documents: snapshot.documents.len(),
            sections: snapshot.sections.len(),
        };
        *guard = Arc::new(snapshot);
        drop(guard);

        info!(
            directory = %directory.display(),
            generation,
            documents = summary.documents,
            sections = summary.sections,
            "knowledge base loaded"
        );
        Ok(summary)
    }

    /// Reload from the directory of the current snapshot, if one was ever loaded.
    pub fn reload(&self) -> Result<Option<LoadSummary>, CoreError> {
        match self.snapshot().directory.clone() {
            Some(directory) => self.load(&directory).map(Some),
            None => Ok(None),
        }
    }

    /// Every document whose section name equals the sanitized `name`, in load order.
    pub fn section_documents(&self, name: &str) -> Vec<KnowledgeDocument> {
        let snapshot = self.snapshot();
        snapshot
            .sections
            .get(&sanitize(name))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| snapshot.documents.get(*id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Distinct section names, sorted.
    pub fn section_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot().sections.keys().cloned().collect();
        names.sort();
        names
    }


    /// Retriever over a snapshot the caller already holds, so that several reads agree
    /// on one load.
    pub fn retriever<'a>(&'a self, snapshot: &'a Snapshot) -> Retriever<'a> {
        Retriever {
            documents: &snapshot.documents,
            index: &snapshot.index,
            embedder: self.embedder.as_ref(),
            merge: self.merge.as_ref(),
        }
    }
}

fn fingerprint(documents: &[KnowledgeDocument]) -> String {
    let mut hasher = Sha256::new();
    for document in documents {
        for field in [&document.filename, &document.section_name, &document.content] {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
        }
    }
    format!("{:x}", hasher.finalize())
}
