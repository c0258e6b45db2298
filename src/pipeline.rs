//! Per-file and per-folder processing.
//!
//! [`Processor::reconstruct`] is the pure core: markup and stylesheet text in,
//! fragment and text out. [`Processor::process_file`] wraps it with decoding,
//! output artifacts and the source patch; [`Processor::process_folder`] runs
//! files strictly one after another in sorted order so progress and report
//! rows are deterministic.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::dom::{serialize_nodes, Document, Element, Node};
use crate::error::{ProcessError, Result};
use crate::layout::{self, tokens};
use crate::patch;
use crate::report;
use crate::structure::dom_table::{convert_tables, has_tables};
use crate::structure::extract::{content_root, extract_structure};
use crate::structure::footer::{extract_footer, Footer};
use crate::structure::heading::{inject_title, take_title};
use crate::structure::repair::{merge_streams, repair, RepairStats, TableStream};
use crate::text::linearize;

/// Suffix appended to the source stem for output artifacts.
pub const OUTPUT_SUFFIX: &str = "-reading-order";

const SOURCE_EXTENSIONS: &[&str] = &["html", "xhtml"];

/// Result of reconstructing one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    /// Final fragment, title first and footer last when present.
    pub fragment: Vec<Node>,
    pub title: Option<String>,
    pub footer: Footer,
    pub text: String,
    /// Which table stream fed the merge: `none`, `geometric` or `literal`.
    pub stream: &'static str,
    pub repairs: RepairStats,
}

impl Reconstruction {
    pub fn markup(&self) -> String {
        serialize_nodes(&self.fragment)
    }
}

/// One report row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub source_path: PathBuf,
    pub output_html_path: PathBuf,
    pub output_txt_path: PathBuf,
    pub has_footer: bool,
    pub page_number: Option<String>,
    pub patched: bool,
    pub patch_note: String,
}

/// Result of a folder run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderReport {
    pub rows: Vec<FileReport>,
    /// `reading_report.json`, absent when no file matched.
    pub summary_path: Option<PathBuf>,
}

/// Folder progress stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Starting,
    Processed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Starting => write!(f, "Starting"),
            Stage::Processed => write!(f, "Processed"),
        }
    }
}

/// A progress event: `current` of `total` files are finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub stage: Stage,
    pub file_name: String,
}

/// Reconstruction driver holding the run configuration.
#[derive(Debug, Clone, Default)]
pub struct Processor {
    config: Config,
}

impl Processor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Rebuild reading order for one document.
    ///
    /// `external_css` is appended after the document's inline `<style>`
    /// text. Literal tables bypass geometric detection.
    pub fn reconstruct(&self, source: &str, external_css: &str) -> Reconstruction {
        let config = &self.config;
        let doc = Document::parse(source);

        let structural = extract_structure(&doc, &config.structure, &config.feature_titles);
        let content = content_root(&doc, &config.structure);

        let stream = if has_tables(content) {
            TableStream::Literal(convert_tables(content))
        } else {
            let mut css = tokens::inline_stylesheets(&doc);
            css.push_str(external_css);
            let tokens = layout::extract_tokens(&doc, &css, &config.detector);
            let detection = layout::detect(&tokens, &config.detector);
            if detection.is_empty() {
                TableStream::Empty
            } else {
                debug!(blocks = detection.blocks.len(), "geometric blocks accepted");
                TableStream::Geometric(detection.nodes)
            }
        };
        let stream_label = stream.label();

        let mut fragment = merge_streams(structural, stream, &config.structure);
        let repairs = repair(&mut fragment, &config.structure);
        let footer = extract_footer(&mut fragment, &config.structure);

        let title = take_title(&mut fragment, &config.heading_candidates);
        if let Some(title) = &title {
            inject_title(&mut fragment, title);
        }
        if let Some(node) = &footer.node {
            fragment.push(node.clone());
        }

        let text = linearize(&fragment);
        Reconstruction {
            fragment,
            title,
            footer,
            text,
            stream: stream_label,
            repairs,
        }
    }

    /// Read, decode and reconstruct a source file without writing anything.
    ///
    /// Returns the decoded source alongside the reconstruction.
    pub fn reconstruct_file(&self, path: &Path) -> Result<(String, Reconstruction)> {
        let bytes = std::fs::read(path).map_err(|source| ProcessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = decode_source(&bytes).ok_or_else(|| ProcessError::Decode {
            path: path.to_path_buf(),
        })?;
        let css = read_linked_stylesheets(path, &Document::parse(&source));
        let result = self.reconstruct(&source, &css);
        Ok((source, result))
    }

    /// Process one source file into `output_dir` and patch it in place.
    pub fn process_file(&self, path: &Path, output_dir: &Path) -> Result<FileReport> {
        info!(path = %path.display(), "processing file");
        let (source, result) = self.reconstruct_file(path)?;

        std::fs::create_dir_all(output_dir).map_err(|source| ProcessError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let html_path = output_dir.join(format!("{stem}{OUTPUT_SUFFIX}.html"));
        let txt_path = output_dir.join(format!("{stem}{OUTPUT_SUFFIX}.txt"));

        let page_title = result.title.clone().unwrap_or_else(|| stem.clone());
        write_output(&html_path, &standalone_document(&page_title, &result.fragment))?;
        write_output(&txt_path, &format!("{}\n", result.text))?;

        let (patched, patch_note) = if self.config.patch.enabled {
            match patch::write_patch(path, &source, &result.fragment, &self.config.patch) {
                Ok(outcome) => (true, outcome.note(&self.config.patch.anchor_id)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "patch failed");
                    (false, format!("patch failed: {e}"))
                }
            }
        } else {
            (false, "patching disabled".to_string())
        };

        info!(
            path = %path.display(),
            stream = result.stream,
            page = result.footer.page_number.as_deref().unwrap_or("-"),
            patched,
            "file processed"
        );

        Ok(FileReport {
            source_path: path.to_path_buf(),
            output_html_path: html_path,
            output_txt_path: txt_path,
            has_footer: result.footer.found(),
            page_number: result.footer.page_number,
            patched,
            patch_note,
        })
    }

    /// Process every `.html`/`.xhtml` file under `input_dir`.
    ///
    /// Output mirrors the input's subdirectories. `progress` sees a
    /// `Starting` and a `Processed` event per file.
    pub fn process_folder(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        mut progress: Option<&mut dyn FnMut(&Progress)>,
    ) -> Result<FolderReport> {
        let files = discover_files(input_dir)?;
        let total = files.len();
        if total == 0 {
            info!(dir = %input_dir.display(), "no source files found");
            return Ok(FolderReport::default());
        }

        let mut rows = Vec::with_capacity(total);
        for (i, path) in files.iter().enumerate() {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut emit = |current: usize, stage: Stage| {
                if let Some(cb) = progress.as_mut() {
                    cb(&Progress {
                        current,
                        total,
                        stage,
                        file_name: file_name.clone(),
                    });
                }
            };

            emit(i, Stage::Starting);
            let target = path
                .parent()
                .and_then(|parent| parent.strip_prefix(input_dir).ok())
                .map_or_else(|| output_dir.to_path_buf(), |rel| output_dir.join(rel));
            rows.push(self.process_file(path, &target)?);
            emit(i + 1, Stage::Processed);
        }

        let summary_path = report::write_summary(output_dir, &rows)?;
        info!(files = total, summary = %summary_path.display(), "folder processed");
        Ok(FolderReport {
            rows,
            summary_path: Some(summary_path),
        })
    }
}

/// Source files under `dir`, sorted by lowercased path.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if entry.file_type().is_file() && is_source_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort_by_cached_key(|p| p.to_string_lossy().to_lowercase());
    Ok(files)
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

/// UTF-8 (BOM stripped), else Windows-1252.
pub fn decode_source(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.to_string());
    }
    warn!("source is not UTF-8, decoding as Windows-1252");
    encoding_rs::WINDOWS_1252
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(std::borrow::Cow::into_owned)
}

fn read_linked_stylesheets(path: &Path, doc: &Document) -> String {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let mut css = String::new();
    for href in tokens::linked_stylesheets(doc) {
        if href.contains("://") {
            debug!(%href, "remote stylesheet skipped");
            continue;
        }
        let local = href.split(['?', '#']).next().unwrap_or_default();
        let sheet = base.join(local);
        match std::fs::read(&sheet) {
            Ok(bytes) => {
                css.push('\n');
                css.push_str(&String::from_utf8_lossy(&bytes));
            }
            Err(e) => warn!(path = %sheet.display(), error = %e, "linked stylesheet unavailable"),
        }
    }
    css
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|source| ProcessError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Standalone XHTML document around the fragment.
fn standalone_document(title: &str, fragment: &[Node]) -> String {
    let head = Element::new("head")
        .with_child(Node::Element(Element::new("meta").with_attr("charset", "utf-8")))
        .with_child(Node::Element(Element::new("title").with_text(title)));
    let mut body = Element::new("body");
    body.children = fragment.to_vec();
    let html = Element::new("html")
        .with_attr("xmlns", "http://www.w3.org/1999/xhtml")
        .with_child(Node::Element(head))
        .with_child(Node::Element(body));
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n{}\n",
        crate::dom::to_markup(&html)
    )
}
