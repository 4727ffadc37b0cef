//! All-or-nothing PDF merge engine
//!
//! One call to [`MergeEngine::run`] is a flush:
//! 1. List the source directory, keep files matching the pattern, sort by name
//! 2. Parse every candidate and append its pages to one document
//! 3. Write the document under a collision-safe name
//! 4. Delete the sources, only after the write is durable
//!
//! If any candidate fails to parse nothing is written and nothing deleted.

use crate::config::ScanConfig;
use crate::error::{MergeError, PatternError};
use crate::naming::FilenameGenerator;
use crate::pattern::FilePattern;
use crate::Result;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_ATTRIBUTES: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Upper bound on page tree depth when resolving inherited attributes
const MAX_TREE_DEPTH: usize = 64;

/// Outcome of a flush
#[derive(Debug, Default)]
pub struct MergeResult {
    /// Number of source files merged
    pub files_merged: usize,
    /// Total pages in the merged document
    pub total_pages: usize,
    /// Where the merged document was written (`None` when nothing matched)
    pub output_path: Option<PathBuf>,
    /// Sources that were merged but could not be removed afterwards
    pub failed_deletions: Vec<DeletionFailure>,
}

impl MergeResult {
    /// True when the flush found no candidates
    pub fn is_empty(&self) -> bool {
        self.files_merged == 0
    }
}

/// A merged source that is still on disk
#[derive(Debug)]
pub struct DeletionFailure {
    pub path: PathBuf,
    pub error: io::Error,
}

/// Merges every matching file of a directory into one document
#[derive(Debug)]
pub struct MergeEngine {
    source_dir: PathBuf,
    output_dir: PathBuf,
    pattern: FilePattern,
    base_name: String,
    filenames: FilenameGenerator,
}

impl MergeEngine {
    /// Create an engine using the system clock for output names
    pub fn new(
        source_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        pattern: FilePattern,
        base_name: impl Into<String>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            pattern,
            base_name: base_name.into(),
            filenames: FilenameGenerator::new(),
        }
    }

    /// Create an engine from a scan configuration
    pub fn from_config(config: &ScanConfig) -> Result<Self, PatternError> {
        Ok(Self::new(
            &config.scan_directory,
            &config.output_path,
            config.pattern()?,
            &config.default_output_base_name,
        ))
    }

    /// Replace the output name generator
    pub fn with_filenames(mut self, filenames: FilenameGenerator) -> Self {
        self.filenames = filenames;
        self
    }

    /// Directory sources are read from
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Directory merged documents are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Files the next flush would merge, in merge order
    pub fn pending_files(&self) -> Result<Vec<PathBuf>> {
        let listing_error = |source| MergeError::SourceListing {
            path: self.source_dir.clone(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.source_dir).map_err(listing_error)? {
            let entry = entry.map_err(listing_error)?;
            let path = entry.path();

            if path.is_file() && self.pattern.matches_name(&entry.file_name()) {
                files.push(path);
            }
        }

        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Run one flush
    pub fn run(&self) -> Result<MergeResult> {
        // 1. Collect candidates
        let candidates = self.pending_files()?;
        if candidates.is_empty() {
            debug!(dir = %self.source_dir.display(), "No files to merge");
            return Ok(MergeResult::default());
        }

        // 2. Parse and append every candidate; any failure aborts the flush
        let mut merged = PageAccumulator::new();
        for path in &candidates {
            let document = Document::load(path).map_err(|e| MergeError::UnreadableSource {
                path: path.clone(),
                reason: e.to_string(),
            })?;

            let pages = merged
                .append(document)
                .map_err(|reason| MergeError::UnreadableSource {
                    path: path.clone(),
                    reason,
                })?;

            debug!(path = %path.display(), pages, "Appended source");
        }

        let total_pages = merged.page_count();
        let mut document = merged.into_document();

        // 3. Write output
        let output_path = self.write_output(&mut document)?;
        info!(
            "Output successfully written to {}, number of pages: {}",
            output_path.display(),
            total_pages
        );

        // 4. Remove sources in merge order
        let failed_deletions = delete_sources(&candidates);

        Ok(MergeResult {
            files_merged: candidates.len(),
            total_pages,
            output_path: Some(output_path),
            failed_deletions,
        })
    }

    /// Serialize and persist the document without clobbering existing files
    fn write_output(&self, document: &mut Document) -> Result<PathBuf> {
        let mut bytes = Vec::new();
        document
            .save_to(&mut bytes)
            .map_err(|e| MergeError::OutputEncode(e.to_string()))?;

        fs::create_dir_all(&self.output_dir).map_err(|source| MergeError::OutputWrite {
            path: self.output_dir.clone(),
            source,
        })?;

        let target = self
            .filenames
            .make_unique_name(&self.base_name, &self.output_dir);
        let write_error = |source| MergeError::OutputWrite {
            path: target.clone(),
            source,
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".merge-")
            .suffix(".tmp")
            .tempfile_in(&self.output_dir)
            .map_err(write_error)?;
        tmp.write_all(&bytes).map_err(write_error)?;
        tmp.as_file().sync_all().map_err(write_error)?;

        tmp.persist_noclobber(&target)
            .map_err(|e| write_error(e.error))?;

        Ok(target)
    }
}

/// Delete every merged source, continuing past failures
fn delete_sources(sources: &[PathBuf]) -> Vec<DeletionFailure> {
    let mut failed = Vec::new();

    for path in sources {
        if let Err(error) = fs::remove_file(path) {
            warn!("Failed to delete merged source {}: {}", path.display(), error);
            failed.push(DeletionFailure {
                path: path.clone(),
                error,
            });
        }
    }

    failed
}

/// Accumulates pages of several documents into one object space
struct PageAccumulator {
    /// Non-structural objects of all appended documents
    objects: BTreeMap<ObjectId, Object>,
    /// Page dictionaries in final page order
    pages: Vec<(ObjectId, Dictionary)>,
    /// First free object number
    next_id: u32,
}

impl PageAccumulator {
    fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            pages: Vec::new(),
            next_id: 1,
        }
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Append all pages of `document`, returning how many were added
    fn append(&mut self, mut document: Document) -> std::result::Result<usize, String> {
        document.renumber_objects_with(self.next_id);
        self.next_id = document.max_id + 1;

        // A valid document without pages contributes nothing but is still consumed
        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();

        let mut pages = Vec::with_capacity(page_ids.len());
        for id in page_ids {
            let mut page = document
                .get_dictionary(id)
                .map_err(|e| format!("page object {} {}: {}", id.0, id.1, e))?
                .clone();
            inherit_attributes(&document, &mut page);
            pages.push((id, page));
        }

        // Catalogs, page tree nodes and outlines are rebuilt for the merged document
        for (id, object) in document.objects {
            let structural = matches!(
                object.type_name(),
                Ok("Catalog" | "Pages" | "Page" | "Outlines" | "Outline")
            );
            if !structural {
                self.objects.insert(id, object);
            }
        }

        let added = pages.len();
        self.pages.extend(pages);
        Ok(added)
    }

    /// Build the merged document with a single flat page tree
    fn into_document(self) -> Document {
        let pages_id = (self.next_id, 0);
        let catalog_id = (self.next_id + 1, 0);

        let mut document = Document::with_version("1.5");
        document.objects = self.objects;

        let kids: Vec<Object> = self
            .pages
            .iter()
            .map(|(id, _)| Object::Reference(*id))
            .collect();
        let count = kids.len() as i64;

        for (id, mut page) in self.pages {
            page.set("Parent", Object::Reference(pages_id));
            document.objects.insert(id, Object::Dictionary(page));
        }

        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(count),
            }),
        );
        document.objects.insert(
            catalog_id,
            Object::Dictionary(dictionary! {
                "Type" => "Catalog",
                "Pages" => Object::Reference(pages_id),
            }),
        );

        document.trailer.set("Root", Object::Reference(catalog_id));
        document.max_id = catalog_id.0;
        document.renumber_objects();
        document.compress();

        document
    }
}

/// Copy attributes a page inherits from its ancestors onto the page itself
///
/// Pages are re-parented under a new root, so anything only defined higher
/// up in the source page tree would otherwise be lost.
fn inherit_attributes(document: &Document, page: &mut Dictionary) {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(id) = parent {
        if depth >= MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = document.get_dictionary(id) else {
            break;
        };

        for key in INHERITABLE_ATTRIBUTES {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }

        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::tests::{date, FixedClock, FixedToken};
    use lopdf::{Stream, StringFormat};

    /// Write a PDF with `pages` pages, each tagged `<tag>-<n>`
    fn write_pdf(path: &Path, tag: &str, pages: usize) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for n in 1..=pages {
            let content_id = doc.add_object(Stream::new(dictionary! {}, b"0 0 m".to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
                "ScanTag" => Object::String(format!("{tag}-{n}").into_bytes(), StringFormat::Literal),
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(pages as i64),
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(595),
                    Object::Integer(842),
                ],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        doc.save(path).unwrap();
    }

    /// Page tags of a PDF in page order
    fn page_tags(path: &Path) -> Vec<String> {
        let doc = Document::load(path).unwrap();
        doc.get_pages()
            .into_values()
            .map(|id| {
                let page = doc.get_dictionary(id).unwrap();
                let tag = page.get(b"ScanTag").unwrap().as_str().unwrap();
                String::from_utf8(tag.to_vec()).unwrap()
            })
            .collect()
    }

    fn engine(source: &Path, output: &Path) -> MergeEngine {
        MergeEngine::new(source, output, FilePattern::new("*.pdf").unwrap(), "Merged")
            .with_filenames(FilenameGenerator::with_sources(
                FixedClock(date(2024, 1, 1)),
                FixedToken::new("tok"),
            ))
    }

    #[test]
    fn test_merge_sums_pages_and_removes_sources() {
        let scan = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_pdf(&scan.path().join("p1.pdf"), "p1", 1);
        write_pdf(&scan.path().join("p2.pdf"), "p2", 4);
        write_pdf(&scan.path().join("p3.pdf"), "p3", 2);

        let result = engine(scan.path(), out.path()).run().unwrap();

        assert_eq!(result.files_merged, 3);
        assert_eq!(result.total_pages, 7);
        assert!(result.failed_deletions.is_empty());
        assert_eq!(
            result.output_path.as_deref(),
            Some(out.path().join("Merged-2024-01-01.pdf").as_path())
        );

        assert_eq!(fs::read_dir(scan.path()).unwrap().count(), 0);
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_merge_preserves_name_order() {
        let scan = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        // Created out of order on purpose
        write_pdf(&scan.path().join("b.pdf"), "b", 3);
        write_pdf(&scan.path().join("a.pdf"), "a", 2);

        let result = engine(scan.path(), out.path()).run().unwrap();
        let output = result.output_path.unwrap();

        assert_eq!(result.total_pages, 5);
        assert_eq!(page_tags(&output), vec!["a-1", "a-2", "b-1", "b-2", "b-3"]);
        assert!(!scan.path().join("a.pdf").exists());
        assert!(!scan.path().join("b.pdf").exists());
    }

    #[test]
    fn test_merged_pages_keep_inherited_media_box() {
        let scan = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_pdf(&scan.path().join("a.pdf"), "a", 2);

        let output = engine(scan.path(), out.path())
            .run()
            .unwrap()
            .output_path
            .unwrap();

        let doc = Document::load(&output).unwrap();
        for id in doc.get_pages().into_values() {
            assert!(doc.get_dictionary(id).unwrap().has(b"MediaBox"));
        }
    }

    #[test]
    fn test_single_file_merge() {
        let scan = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_pdf(&scan.path().join("only.pdf"), "only", 1);

        let result = engine(scan.path(), out.path()).run().unwrap();

        assert_eq!(result.files_merged, 1);
        assert_eq!(result.total_pages, 1);
        assert!(result.output_path.unwrap().exists());
    }

    #[test]
    fn test_empty_directory_writes_nothing() {
        let scan = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(scan.path().join("notes.txt"), b"not a scan").unwrap();

        let result = engine(scan.path(), out.path()).run().unwrap();

        assert!(result.is_empty());
        assert_eq!(result.total_pages, 0);
        assert!(result.output_path.is_none());
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
        assert!(scan.path().join("notes.txt").exists());
    }

    #[test]
    fn test_unreadable_source_aborts_flush() {
        let scan = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_pdf(&scan.path().join("a.pdf"), "a", 2);
        fs::write(scan.path().join("b.pdf"), b"this is not a pdf").unwrap();
        write_pdf(&scan.path().join("c.pdf"), "c", 1);

        let err = engine(scan.path(), out.path()).run().unwrap_err();

        match err {
            MergeError::UnreadableSource { path, .. } => {
                assert_eq!(path, scan.path().join("b.pdf"));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Nothing written, nothing deleted
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
        assert!(scan.path().join("a.pdf").exists());
        assert!(scan.path().join("b.pdf").exists());
        assert!(scan.path().join("c.pdf").exists());
    }

    #[test]
    fn test_existing_output_gets_token() {
        let scan = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let existing = out.path().join("Merged-2024-01-01.pdf");
        fs::write(&existing, b"earlier session").unwrap();
        write_pdf(&scan.path().join("a.pdf"), "a", 1);

        let result = engine(scan.path(), out.path()).run().unwrap();

        assert_eq!(
            result.output_path.unwrap(),
            out.path().join("Merged-2024-01-01-tok.pdf")
        );
        assert_eq!(fs::read(&existing).unwrap(), b"earlier session");
    }

    #[test]
    fn test_nested_files_are_ignored() {
        let scan = tempfile::tempdir().unwrap();
        let nested = scan.path().join("merged");
        fs::create_dir(&nested).unwrap();
        write_pdf(&nested.join("old.pdf"), "old", 1);
        write_pdf(&scan.path().join("new.pdf"), "new", 1);

        let result = engine(scan.path(), &nested).run().unwrap();

        assert_eq!(result.files_merged, 1);
        assert!(nested.join("old.pdf").exists());
    }

    #[test]
    fn test_missing_source_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");

        let err = engine(&missing, dir.path()).run().unwrap_err();
        assert!(matches!(err, MergeError::SourceListing { .. }));
    }

    #[test]
    fn test_creates_output_directory() {
        let scan = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("archive/2024");
        write_pdf(&scan.path().join("a.pdf"), "a", 1);

        let result = engine(scan.path(), &target).run().unwrap();
        assert!(result.output_path.unwrap().starts_with(&target));
    }

    #[test]
    fn test_empty_document_is_consumed() {
        let scan = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_pdf(&scan.path().join("a.pdf"), "a", 2);
        write_pdf(&scan.path().join("blank.pdf"), "blank", 0);

        let result = engine(scan.path(), out.path()).run().unwrap();

        assert_eq!(result.files_merged, 2);
        assert_eq!(result.total_pages, 2);
        assert_eq!(page_tags(&result.output_path.unwrap()), vec!["a-1", "a-2"]);
        assert!(!scan.path().join("blank.pdf").exists());
    }

    #[test]
    fn test_delete_sources_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.pdf");
        let missing = dir.path().join("missing.pdf");
        let last = dir.path().join("c.pdf");
        fs::write(&first, b"a").unwrap();
        fs::write(&last, b"c").unwrap();

        let failed = delete_sources(&[first.clone(), missing.clone(), last.clone()]);

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].path, missing);
        assert_eq!(failed[0].error.kind(), io::ErrorKind::NotFound);
        assert!(!first.exists());
        assert!(!last.exists());
    }

    #[test]
    fn test_output_write_failure_keeps_sources() {
        let scan = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let blocked = out.path().join("not-a-dir");
        fs::write(&blocked, b"regular file").unwrap();
        write_pdf(&scan.path().join("a.pdf"), "a", 1);
        write_pdf(&scan.path().join("b.pdf"), "b", 2);

        let err = engine(scan.path(), &blocked).run().unwrap_err();

        assert!(matches!(err, MergeError::OutputWrite { .. }));
        assert!(scan.path().join("a.pdf").exists());
        assert!(scan.path().join("b.pdf").exists());
        assert_eq!(fs::read(&blocked).unwrap(), b"regular file");
    }

    #[test]
    fn test_pending_files_sorted() {
        let scan = tempfile::tempdir().unwrap();
        for name in ["c.pdf", "a.pdf", "b.pdf", "skip.txt"] {
            fs::write(scan.path().join(name), b"").unwrap();
        }

        let files = engine(scan.path(), scan.path()).pending_files().unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.pdf", "b.pdf", "c.pdf"]);
    }
}
