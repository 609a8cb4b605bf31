/// Knowledge-base loader.
///
/// Each `.md`/`.txt` file in the knowledge-base directory is split on markdown headers:
/// - `# Title` and `## Title` lines open a new section named after the header text
/// - every other line (including `###` and deeper) belongs to the open section's body
/// - text before the first header lives in an implicit "Introduction" section
///
/// Parser approach: line-by-line state machine, same as the header scan used for pricing.
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::CoreError;
use crate::model::{DocumentMetadata, KnowledgeDocument, SectionIndex};
use crate::sanitize::sanitize;

const IMPLICIT_SECTION: &str = "Introduction";

/// Documents and section index produced by one load.
#[derive(Debug, Clone, Default)]
pub struct LoadedCorpus {
    pub documents: Vec<KnowledgeDocument>,
    pub sections: SectionIndex,
}

/// Load every knowledge-base file in `directory` (non-recursive).
///
/// A missing directory is created and yields an empty corpus. Invalid UTF-8 is replaced
/// rather than rejected, and a file that cannot be read is skipped with a warning.
pub fn load_directory(directory: &Path) -> Result<LoadedCorpus, CoreError> {
    if !directory.exists() {
        std::fs::create_dir_all(directory).map_err(|source| CoreError::Io {
            path: directory.to_path_buf(),
            source,
        })?;
        info!(directory = %directory.display(), "created empty knowledge base directory");
        return Ok(LoadedCorpus::default());
    }

    let mut corpus = LoadedCorpus::default();
    for path in list_files(directory, &["md", "txt"])? {
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable knowledge base file, skipping");
                continue;
            }
        };
        let filename = path
            .file_name()
            .map(|n| sanitize(&n.to_string_lossy()))
            .unwrap_or_default();
        let content = sanitize(&String::from_utf8_lossy(&bytes));
        let metadata = parse_filename_metadata(&filename);

        for (section_name, body) in split_into_sections(&content) {
            let id = corpus.documents.len();
            corpus
                .sections
                .entry(section_name.clone())
                .or_default()
                .push(id);
            corpus.documents.push(KnowledgeDocument {
                id,
                filename: filename.clone(),
                section_name,
                content: body,
                metadata: metadata.clone(),
            });
        }
    }

    info!(
        directory = %directory.display(),
        documents = corpus.documents.len(),
        sections = corpus.sections.len(),
        "knowledge base parsed"
    );
    Ok(corpus)
}

/// Regular files directly under `directory` whose extension is in `extensions`,
/// sorted by file name so loads are reproducible.
pub(crate) fn list_files(directory: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, CoreError> {
    let entries = std::fs::read_dir(directory).map_err(|source| CoreError::Io {
        path: directory.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| extensions.contains(&e))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Split sanitized file content into `(section name, body)` pairs in first-seen order.
///
/// A section is only emitted if at least one body line was collected for it. When a
/// file repeats a section name, the later body replaces the earlier one in place.
pub fn split_into_sections(content: &str) -> Vec<(String, String)> {
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut current_name = IMPLICIT_SECTION.to_string();
    let mut current_lines: Vec<&str> = Vec::new();

    for line in content.split('\n') {
        let heading = line
            .strip_prefix("# ")
            .or_else(|| line.strip_prefix("## "));

        match heading {
            Some(title) => {
                flush_section(&mut sections, &current_name, &mut current_lines);
                current_name = title.trim().to_string();
            }
            None => current_lines.push(line),
        }
    }
    flush_section(&mut sections, &current_name, &mut current_lines);

    sections
}

fn flush_section(sections: &mut Vec<(String, String)>, name: &str, lines: &mut Vec<&str>) {
    if lines.is_empty() {
        return;
    }
    let name = sanitize(name);
    let body = lines.join("\n");
    lines.clear();

    match sections.iter_mut().find(|(existing, _)| *existing == name) {
        Some((_, existing_body)) => *existing_body = body,
        None => sections.push((name, body)),
    }
}

/// Parse `_success_<bool>_`, `_industry_<name>_` and `_size_<name>_` tags from a file name.
///
/// A tag's value runs up to the next `_` or the end of the name. Success is `true` only
/// for the exact value `True`. Absent tags keep their defaults.
pub fn parse_filename_metadata(filename: &str) -> DocumentMetadata {
    let mut metadata = DocumentMetadata::default();

    if let Some(value) = tag_value(filename, "success") {
        metadata.proposal_success = value == "True";
    }
    if let Some(value) = tag_value(filename, "industry") {
        metadata.client_industry = sanitize(value);
    }
    if let Some(value) = tag_value(filename, "size") {
        metadata.project_size = sanitize(value);
    }

    metadata
}

/// Value following the first `_<tag>_` marker in `filename`, if the marker is present.
fn tag_value<'a>(filename: &'a str, tag: &str) -> Option<&'a str> {
    let marker = format!("_{tag}_");
    let start = filename.find(&marker)? + marker.len();
    let rest = &filename[start..];
    Some(rest.split('_').next().unwrap_or(rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_top_and_second_level_headers() {
        let sections = split_into_sections("# Intro\nhello\n## Details\nworld");
        assert_eq!(
            sections,
            vec![
                ("Intro".to_string(), "hello".to_string()),
                ("Details".to_string(), "world".to_string()),
            ]
        );
    }

    #[test]
    fn test_implicit_introduction_and_deeper_headers_stay_in_body() {
        let sections = split_into_sections("preamble\n# Scope\n### Detail\ntext");
        assert_eq!(sections[0], ("Introduction".to_string(), "preamble".to_string()));
        assert_eq!(sections[1], ("Scope".to_string(), "### Detail\ntext".to_string()));
    }

    #[test]
    fn test_header_without_body_is_not_emitted() {
        let sections = split_into_sections("# Empty\n# Filled\nbody");
        assert_eq!(sections, vec![("Filled".to_string(), "body".to_string())]);
    }

    #[test]
    fn test_repeated_section_name_replaces_body_in_place() {
        let sections = split_into_sections("# A\none\n# B\ntwo\n# A\nthree");
        assert_eq!(
            sections,
            vec![
                ("A".to_string(), "three".to_string()),
                ("B".to_string(), "two".to_string()),
            ]
        );
    }

    #[test]
    fn test_hash_without_space_is_body() {
        let sections = split_into_sections("#hashtag\n#  Spaced  \nx");
        assert_eq!(sections[0], ("Introduction".to_string(), "#hashtag".to_string()));
        assert_eq!(sections[1], ("Spaced".to_string(), "x".to_string()));
    }

    #[test]
    fn test_filename_metadata_tags() {
        let m = parse_filename_metadata("acme_success_False_industry_banking_size_large_.md");
        assert!(!m.proposal_success);
        assert_eq!(m.client_industry, "banking");
        assert_eq!(m.project_size, "large");
        assert_eq!(m.key_differentiators, vec!["quality", "experience"]);
    }

    #[test]
    fn test_filename_metadata_defaults() {
        let m = parse_filename_metadata("plain_proposal.md");
        assert_eq!(m, DocumentMetadata::default());
        assert!(m.proposal_success);
        assert_eq!(m.client_industry, "general");
        assert_eq!(m.project_size, "medium");
    }

    #[test]
    fn test_trailing_tag_runs_to_end_of_name() {
        let m = parse_filename_metadata("x_size_small.md");
        assert_eq!(m.project_size, "small.md");
        let m = parse_filename_metadata("x_success_true_.md");
        assert!(!m.proposal_success, "only the exact value True counts as success");
    }

    #[test]
    fn test_load_directory_builds_documents_and_section_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a_industry_health_.md"),
            "# Intro\nhello\n## Details\nworld",
        )
        .unwrap();
        std::fs::write(dir.path().join("b.txt"), "# Intro\nsecond file").unwrap();
        std::fs::write(dir.path().join("ignored.json"), "{}").unwrap();

        let corpus = load_directory(dir.path()).unwrap();
        assert_eq!(corpus.documents.len(), 3);
        assert_eq!(corpus.documents[0].filename, "a_industry_health_.md");
        assert_eq!(corpus.documents[0].metadata.client_industry, "health");
        assert_eq!(corpus.documents[1].section_name, "Details");
        assert_eq!(corpus.documents[1].content, "world");
        assert_eq!(corpus.sections["Intro"], vec![0, 2]);
        for (i, doc) in corpus.documents.iter().enumerate() {
            assert_eq!(doc.id, i);
        }
    }

    #[test]
    fn test_load_directory_replaces_invalid_utf8_and_sanitizes() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = b"# Caf\xff\n".to_vec();
        bytes.extend_from_slice("It\u{2019}s fine".as_bytes());
        std::fs::write(dir.path().join("bad.md"), bytes).unwrap();

        let corpus = load_directory(dir.path()).unwrap();
        assert_eq!(corpus.documents.len(), 1);
        assert_eq!(corpus.documents[0].section_name, "Caf");
        assert_eq!(corpus.documents[0].content, "It's fine");
    }

    #[test]
    fn test_missing_directory_is_created_empty() {
        let dir = tempfile::tempdir().unwrap();
        let kb = dir.path().join("kb");
        let corpus = load_directory(&kb).unwrap();
        assert!(corpus.documents.is_empty());
        assert!(corpus.sections.is_empty());
        assert!(kb.is_dir());
    }
}
