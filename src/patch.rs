//! In-place patching of the original source file.
//!
//! The reconstructed fragment is inserted as the first children of the
//! anchor element (falling back to the end of `<body>`, then the document
//! root) and every original `<span>` is hidden from assistive technology so
//! only the reconstruction is announced.
//!
//! Patching is not idempotent: running it twice on the same file inserts
//! the fragment twice. Callers patch each source once.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::config::PatchConfig;
use crate::dom::{walk_elements_mut, Document, Node};
use crate::error::PatchError;

static XML_ENCODING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<\?xml[^>]*?\bencoding\s*=\s*)(["'])[^"']*(["'])"#).expect("static regex")
});

static CONTENT_CHARSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(charset\s*=\s*)[\w-]+").expect("static regex"));

/// Where the fragment ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Anchor,
    Body,
    Root,
}

/// Summary of one patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub placement: Placement,
    /// Spans that received `aria-hidden="true"`.
    pub spans_hidden: usize,
    /// Spans that already carried `aria-hidden`.
    pub spans_already_hidden: usize,
    pub backup: Option<PathBuf>,
}

impl PatchOutcome {
    /// Human-readable note for the report row.
    pub fn note(&self, anchor_id: &str) -> String {
        let place = match self.placement {
            Placement::Anchor => format!("inserted into #{anchor_id}"),
            Placement::Body => format!("#{anchor_id} not found; appended to body"),
            Placement::Root => format!("#{anchor_id} not found; appended to document root"),
        };
        format!(
            "{place}; {} span(s) hidden, {} already hidden",
            self.spans_hidden, self.spans_already_hidden
        )
    }
}

/// Insert `fragment` into `source` and hide every original span.
///
/// Returns the patched markup and the outcome (without backup).
pub fn patch_source(source: &str, fragment: &[Node], anchor_id: &str) -> (String, PatchOutcome) {
    let mut doc = Document::parse(source);

    declare_utf8(&mut doc);

    let mut spans_hidden = 0;
    let mut spans_already_hidden = 0;
    walk_elements_mut(&mut doc.nodes, &mut |el| {
        if el.name != "span" {
            return;
        }
        if el.attr("aria-hidden") == Some("true") {
            spans_already_hidden += 1;
        } else {
            el.set_attr("aria-hidden", "true");
            spans_hidden += 1;
        }
    });

    let placement = if let Some(anchor) = doc.find_mut(&|el| el.id() == Some(anchor_id)) {
        anchor.children.splice(0..0, fragment.iter().cloned());
        Placement::Anchor
    } else if let Some(body) = doc.body_mut() {
        body.children.extend(fragment.iter().cloned());
        Placement::Body
    } else {
        doc.nodes.extend(fragment.iter().cloned());
        Placement::Root
    };
    debug!(?placement, spans_hidden, spans_already_hidden, "fragment inserted");

    (
        doc.to_markup(),
        PatchOutcome {
            placement,
            spans_hidden,
            spans_already_hidden,
            backup: None,
        },
    )
}

/// The patched file is always written as UTF-8, whatever the source was
/// decoded from; point the XML declaration and any `<meta>` charset at it.
fn declare_utf8(doc: &mut Document) {
    doc.prologue = XML_ENCODING_RE
        .replace(&doc.prologue, "${1}${2}UTF-8${3}")
        .into_owned();
    walk_elements_mut(&mut doc.nodes, &mut |el| {
        if el.name != "meta" {
            return;
        }
        if el.attr("charset").is_some() {
            el.set_attr("charset", "UTF-8");
        }
        let content = el
            .attr("http-equiv")
            .filter(|v| v.eq_ignore_ascii_case("content-type"))
            .and_then(|_| el.attr("content"))
            .map(|c| CONTENT_CHARSET_RE.replace(c, "${1}UTF-8").into_owned());
        if let Some(content) = content {
            el.set_attr("content", &content);
        }
    });
}

/// Patch the file at `path`, whose current contents are `source`.
pub fn write_patch(
    path: &Path,
    source: &str,
    fragment: &[Node],
    config: &PatchConfig,
) -> Result<PatchOutcome, PatchError> {
    let (patched, mut outcome) = patch_source(source, fragment, &config.anchor_id);

    if config.backup {
        let backup = backup_path(path);
        std::fs::write(&backup, source).map_err(|source| PatchError::Backup {
            path: backup.clone(),
            source,
        })?;
        outcome.backup = Some(backup);
    }

    std::fs::write(path, patched).map_err(|source| PatchError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), placement = ?outcome.placement, "source patched");
    Ok(outcome)
}

/// `chapter.xhtml` -> `chapter.xhtml.bak`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Element;

    fn fragment() -> Vec<Node> {
        vec![
            Node::Element(Element::new("h1").with_text("Title")),
            Node::Element(Element::new("p").with_text("Body.")),
        ]
    }

    #[test]
    fn inserts_before_existing_anchor_children() {
        let source = r#"<html><body><div id="reading-order"><p>old</p></div><span class="x">A</span></body></html>"#;
        let (out, outcome) = patch_source(source, &fragment(), "reading-order");
        assert_eq!(outcome.placement, Placement::Anchor);
        assert!(out.contains(r#"<div id="reading-order"><h1>Title</h1><p>Body.</p><p>old</p></div>"#));
        assert!(out.contains(r#"aria-hidden="true""#));
        assert_eq!(outcome.spans_hidden, 1);
    }

    #[test]
    fn falls_back_to_body() {
        let source = "<html><body><p>orig</p></body></html>";
        let (out, outcome) = patch_source(source, &fragment(), "reading-order");
        assert_eq!(outcome.placement, Placement::Body);
        assert!(out.ends_with("<p>orig</p><h1>Title</h1><p>Body.</p></body></html>"));
    }

    #[test]
    fn counts_already_hidden_spans() {
        let source = r#"<html><body><span aria-hidden="true">a</span><span>b</span><span>c</span></body></html>"#;
        let (_, outcome) = patch_source(source, &[], "reading-order");
        assert_eq!(outcome.spans_hidden, 2);
        assert_eq!(outcome.spans_already_hidden, 1);
        assert!(outcome.note("reading-order").contains("2 span(s) hidden, 1 already hidden"));
    }

    #[test]
    fn self_closed_page_break_does_not_hide_anchor() {
        let source = r#"<html><body><span epub:type="pagebreak" id="page_5" title="5"/><div id="reading-order"></div><p>Body text.</p></body></html>"#;
        let (out, outcome) = patch_source(source, &fragment(), "reading-order");
        assert_eq!(outcome.placement, Placement::Anchor);
        assert_eq!(outcome.spans_hidden, 1);

        let doc = Document::parse(&out);
        let span = doc.find(&|el| el.name == "span").unwrap();
        assert!(span.children.is_empty());
        assert_eq!(span.attr("aria-hidden"), Some("true"));
        let body = doc.body().unwrap();
        let names: Vec<&str> = body.child_elements().map(|el| el.name.as_str()).collect();
        assert_eq!(names, vec!["span", "div", "p"]);
        assert!(out.contains(r#"<div id="reading-order"><h1>Title</h1><p>Body.</p></div><p>Body text.</p>"#));
    }

    #[test]
    fn legacy_encoding_declarations_become_utf8() {
        let source = "<?xml version=\"1.0\" encoding='windows-1252'?>\n<html><head>\
            <meta charset=\"windows-1252\" />\
            <meta http-equiv=\"Content-Type\" content=\"text/html; charset=ISO-8859-1\" />\
            </head><body><p>caf\u{e9}</p></body></html>";
        let (out, _) = patch_source(source, &fragment(), "reading-order");
        assert!(out.starts_with("<?xml version=\"1.0\" encoding='UTF-8'?>"), "{out}");
        assert!(out.contains(r#"<meta charset="UTF-8" />"#));
        assert!(out.contains(r#"content="text/html; charset=UTF-8""#));
        assert!(!out.contains("1252"));
    }

    #[test]
    fn second_run_duplicates_fragment() {
        let source = r#"<html><body><div id="reading-order"></div></body></html>"#;
        let (once, _) = patch_source(source, &fragment(), "reading-order");
        let (twice, _) = patch_source(&once, &fragment(), "reading-order");
        assert_eq!(twice.matches("<h1>Title</h1>").count(), 2);
    }

    #[test]
    fn write_patch_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.xhtml");
        let source = "<html><body><p>orig</p></body></html>";
        std::fs::write(&path, source).unwrap();

        let config = PatchConfig {
            backup: true,
            ..PatchConfig::default()
        };
        let outcome = write_patch(&path, source, &fragment(), &config).unwrap();
        let backup = outcome.backup.unwrap();
        assert_eq!(backup, dir.path().join("page.xhtml.bak"));
        assert_eq!(std::fs::read_to_string(backup).unwrap(), source);
        assert!(std::fs::read_to_string(&path).unwrap().contains("<h1>Title</h1>"));
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("page.xhtml");
        let err = write_patch(&path, "<p>x</p>", &fragment(), &PatchConfig::default()).unwrap_err();
        assert!(matches!(err, PatchError::Write { .. }));
    }
}
