use camino::{Utf8Path, Utf8PathBuf};
use quick_xml::events::{BytesText, Event};
use quick_xml::escape::partial_escape;
use quick_xml::{Reader, Writer};
use std::fs;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

const ROOT_ELEMENT: &[u8] = b"root";
const DATA_ELEMENT: &[u8] = b"data";
const VALUE_ELEMENT: &[u8] = b"value";
const TYPE_ATTRIBUTE: &str = "type";

/// Structural problems found while relabelling a resource document
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Document is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Document has no root element")]
    MissingRoot,

    #[error("Expected root element <root>, found <{0}>")]
    UnexpectedRoot(String),

    #[error("Document has more than one top-level element")]
    MultipleRoots,

    #[error("Text content outside the root element")]
    TextOutsideRoot,

    #[error("Unexpected closing tag </{0}>")]
    UnexpectedEnd(String),

    #[error("Expected </{expected}>, found </{found}>")]
    MismatchedEnd { expected: String, found: String },

    #[error("Element <{0}> is never closed")]
    Unclosed(String),
}

/// Errors that can occur while rewriting one resource file
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: DocumentError,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RewriteError {
    /// Path of the file the error belongs to
    pub fn path(&self) -> &Utf8Path {
        match self {
            RewriteError::Read { path, .. }
            | RewriteError::Parse { path, .. }
            | RewriteError::Write { path, .. } => path,
        }
    }
}

/// Result of relabelling a document held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relabeled {
    /// Serialized document, byte-order mark included when the input had one
    pub bytes: Vec<u8>,
    /// Number of value nodes whose text changed
    pub values_changed: usize,
}

/// Rewrites string entries of `.resx` resource documents.
///
/// Only `<data>` entries below `<root>` whose `type` attribute is absent or
/// equal to the configured string marker are considered. Every `<value>`
/// below such an entry has its text run through a literal substring
/// replacement. Everything else in the document is written back exactly as
/// it was parsed, so the original indentation survives a rewrite.
#[derive(Debug, Clone)]
pub struct ResxRewriter {
    string_type: String,
}

impl ResxRewriter {
    /// Create a rewriter that treats entries typed `string_type` as plain strings
    pub fn new(string_type: impl Into<String>) -> Self {
        Self {
            string_type: string_type.into(),
        }
    }

    /// Relabel one file in place.
    ///
    /// # Returns
    /// `true` if at least one eligible value changed and the file was
    /// rewritten, `false` if the file was left untouched.
    ///
    /// # Errors
    /// Unreadable or malformed files are reported as [`RewriteError`]; the
    /// file on disk is never modified in that case.
    pub fn rewrite(&self, path: &Utf8Path, from: &str, to: &str) -> Result<bool, RewriteError> {
        let input = fs::read(path).map_err(|source| RewriteError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let relabeled = self
            .relabel_document(&input, from, to)
            .map_err(|source| RewriteError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let Some(relabeled) = relabeled else {
            tracing::debug!("No change in {}", path);
            return Ok(false);
        };

        write_via_temp(path, &relabeled.bytes).map_err(|source| RewriteError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(
            "Rewrote {} ({} value(s) changed)",
            path,
            relabeled.values_changed
        );
        Ok(true)
    }

    /// Relabel a document held in memory.
    ///
    /// Returns `Ok(None)` when no eligible value changes. The whole document
    /// is parsed either way, so malformed input is always reported.
    pub fn relabel_document(
        &self,
        input: &[u8],
        from: &str,
        to: &str,
    ) -> Result<Option<Relabeled>, DocumentError> {
        let (bom, body) = match input.strip_prefix(UTF8_BOM) {
            Some(rest) => (UTF8_BOM, rest),
            None => (&[][..], input),
        };
        let text = std::str::from_utf8(body)?;

        let mut reader = Reader::from_str(text);
        reader.trim_text(false);

        let mut writer = Writer::new(Vec::with_capacity(input.len()));
        writer.get_mut().extend_from_slice(bom);

        // One entry per open element: `true` when it is an eligible <data>.
        let mut open: Vec<(String, bool)> = Vec::new();
        let mut eligible_ancestors = 0usize;
        let mut seen_root = false;
        let mut capture: Option<ValueCapture> = None;
        let mut values_changed = 0usize;

        loop {
            let event = reader.read_event()?;

            match &event {
                Event::Eof => break,
                Event::Start(start) | Event::Empty(start) => {
                    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

                    if open.is_empty() {
                        if seen_root {
                            return Err(DocumentError::MultipleRoots);
                        }
                        if start.name().as_ref() != ROOT_ELEMENT {
                            return Err(DocumentError::UnexpectedRoot(name));
                        }
                        seen_root = true;
                    }

                    if matches!(event, Event::Start(_)) {
                        let eligible = start.name().as_ref() == DATA_ELEMENT
                            && self.is_eligible_entry(start)?;
                        if eligible {
                            eligible_ancestors += 1;
                        }

                        let opens_value = capture.is_none()
                            && eligible_ancestors > 0
                            && start.name().as_ref() == VALUE_ELEMENT;

                        open.push((name, eligible));

                        if opens_value {
                            write(&mut writer, &event)?;
                            capture = Some(ValueCapture::new(open.len()));
                            continue;
                        }
                    }
                }
                Event::End(end) => {
                    let found = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    let Some((expected, eligible)) = open.pop() else {
                        return Err(DocumentError::UnexpectedEnd(found));
                    };
                    if expected != found {
                        return Err(DocumentError::MismatchedEnd { expected, found });
                    }
                    if eligible {
                        eligible_ancestors -= 1;
                    }

                    if capture.as_ref().is_some_and(|c| c.depth == open.len() + 1) {
                        if let Some(finished) = capture.take() {
                            if finished.flush(&mut writer, from, to)? {
                                values_changed += 1;
                            }
                        }
                    }
                }
                Event::Text(text) if open.is_empty() => {
                    if !text.iter().all(u8::is_ascii_whitespace) {
                        return Err(DocumentError::TextOutsideRoot);
                    }
                }
                _ => {}
            }

            match capture.as_mut() {
                Some(active) => active.push(event)?,
                None => write(&mut writer, &event)?,
            }
        }

        if let Some((name, _)) = open.pop() {
            return Err(DocumentError::Unclosed(name));
        }
        if !seen_root {
            return Err(DocumentError::MissingRoot);
        }

        if values_changed == 0 {
            return Ok(None);
        }

        Ok(Some(Relabeled {
            bytes: writer.into_inner(),
            values_changed,
        }))
    }

    /// Check whether a `<data>` start tag selects a plain string entry
    fn is_eligible_entry(
        &self,
        start: &quick_xml::events::BytesStart<'_>,
    ) -> Result<bool, DocumentError> {
        let attribute = start
            .try_get_attribute(TYPE_ATTRIBUTE)
            .map_err(|err| DocumentError::Xml(err.into()))?;

        match attribute {
            None => Ok(true),
            Some(attribute) => {
                let value = attribute
                    .unescape_value()
                    .map_err(|err| DocumentError::Xml(err.into()))?;
                Ok(value == self.string_type)
            }
        }
    }
}

impl Default for ResxRewriter {
    fn default() -> Self {
        Self::new("String")
    }
}

/// Literal substring replacement of every non-overlapping occurrence.
///
/// Returns `None` when the value would not change. An empty `from` never
/// matches.
pub fn replace_literal(value: &str, from: &str, to: &str) -> Option<String> {
    if from.is_empty() || !value.contains(from) {
        return None;
    }
    let replaced = value.replace(from, to);
    (replaced != value).then_some(replaced)
}

/// Events of one `<value>` element, held back until its end tag is seen
struct ValueCapture {
    /// Number of open elements once the `<value>` start tag was pushed
    depth: usize,
    events: Vec<Event<'static>>,
    text: String,
}

impl ValueCapture {
    fn new(depth: usize) -> Self {
        Self {
            depth,
            events: Vec::new(),
            text: String::new(),
        }
    }

    fn push(&mut self, event: Event<'_>) -> Result<(), DocumentError> {
        match &event {
            Event::Text(text) => {
                let unescaped = text.unescape()?;
                self.text.push_str(&unescaped);
            }
            Event::CData(data) => {
                self.text.push_str(std::str::from_utf8(data)?);
            }
            _ => {}
        }
        self.events.push(event.into_owned());
        Ok(())
    }

    /// Write the captured content; the caller writes the closing `</value>`.
    /// Returns whether the text changed.
    fn flush(
        self,
        writer: &mut Writer<Vec<u8>>,
        from: &str,
        to: &str,
    ) -> Result<bool, DocumentError> {
        match replace_literal(&self.text, from, to) {
            Some(replaced) => {
                let escaped = partial_escape(&replaced);
                write(writer, &Event::Text(BytesText::from_escaped(escaped)))?;
                Ok(true)
            }
            None => {
                for event in &self.events {
                    write(writer, event)?;
                }
                Ok(false)
            }
        }
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: &Event<'_>) -> Result<(), DocumentError> {
    writer
        .write_event(event.clone())
        .map_err(|err| DocumentError::Xml(err.into()))
}

/// Replace `path` with `data` through a sibling temp file and a rename, so the
/// file is either fully old or fully new.
///
/// A symlink is resolved first; the file it points to is replaced and the
/// link stays in place.
fn write_via_temp(path: &Utf8Path, data: &[u8]) -> std::io::Result<()> {
    let target = path.canonicalize_utf8()?;
    let path = target.as_path();
    let base_dir = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let temp_path = base_dir.join(format!(
        ".slx-relabel-tmp-{}-{}",
        std::process::id(),
        nanos
    ));

    let permissions = fs::metadata(path)?.permissions();
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::set_permissions(&temp_path, permissions)?;

    fs::rename(&temp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&temp_path);
    })
}
