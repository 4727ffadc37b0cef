//! Scan directory fixtures
//!
//! PDFs are generated on the fly with lopdf; every page carries a `ScanTag`
//! string so tests can check page order after a merge.

use anyhow::Result;
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated scan/output/state directories plus a config file
pub struct ScanWorkspace {
    _temp: TempDir,
    pub scan_dir: PathBuf,
    pub output_dir: PathBuf,
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
}

impl ScanWorkspace {
    /// Output directory nested inside the scan directory, like a typical setup
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let scan_dir = temp.path().join("scans");
        let output_dir = scan_dir.join("merged");
        let state_dir = temp.path().join("state");
        let config_path = temp.path().join("config.toml");

        std::fs::create_dir_all(&scan_dir)?;

        std::fs::write(
            &config_path,
            format!(
                "scan_directory = {:?}\noutput_path = {:?}\ntimeout_secs = 1\n",
                scan_dir.display().to_string(),
                output_dir.display().to_string()
            ),
        )?;

        Ok(Self {
            _temp: temp,
            scan_dir,
            output_dir,
            state_dir,
            config_path,
        })
    }

    /// Write `<scan_dir>/<name>` with `pages` tagged pages
    pub fn add_scan(&self, name: &str, pages: usize) -> Result<PathBuf> {
        let path = self.scan_dir.join(name);
        let tag = name.trim_end_matches(".pdf");
        write_pdf(&path, tag, pages)?;
        Ok(path)
    }

    /// Files currently in the output directory
    pub fn outputs(&self) -> Result<Vec<PathBuf>> {
        if !self.output_dir.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.output_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        Ok(files)
    }
}

/// Write a PDF with `pages` pages tagged `<tag>-<n>`
pub fn write_pdf(path: &Path, tag: &str, pages: usize) -> Result<()> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for n in 1..=pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"0 0 m".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
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
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.save(path)?;
    Ok(())
}

/// Page tags of a PDF in page order
pub fn page_tags(path: &Path) -> Result<Vec<String>> {
    let doc = Document::load(path)?;
    let mut tags = Vec::new();
    for id in doc.get_pages().into_values() {
        let page = doc.get_dictionary(id)?;
        let tag = page.get(b"ScanTag")?.as_str()?;
        tags.push(String::from_utf8(tag.to_vec())?);
    }
    Ok(tags)
}
