//! Anchor-based text patching
//!
//! A [`PatchSet`] is an ordered list of edits against one file. Each edit is
//! located by an [`Anchor`] (a literal or a regular expression) and must find
//! exactly one location; there is no global search-and-replace. Every mode
//! recognises its own output, so applying a set twice gives the same text as
//! applying it once.
//!
//! Sets are checked for that up front (two inserts on the same side of one
//! anchor are rejected) and again after staging: the staged output is run
//! through the set a second time, and any patch that would still fire or fail
//! there makes the whole set [`PatchError::MalformedPatch`].
//!
//! [`apply_to_file`] stages the whole set in memory and replaces the file in a
//! single rename, so a failing patch never leaves a half-edited file behind.

use super::write_atomic;
use regex::Regex;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where a patch applies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Exact text
    Literal(String),
    /// Regular expression, compiled when the patch set is validated
    Pattern(String),
}

impl Anchor {
    pub fn literal(text: impl Into<String>) -> Self {
        Anchor::Literal(text.into())
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Anchor::Pattern(pattern.into())
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Literal(text) => write!(f, "{:?}", text),
            Anchor::Pattern(pattern) => write!(f, "/{}/", pattern),
        }
    }
}

/// How a patch edits the text around its anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchMode {
    InsertAfter(Anchor),
    InsertBefore(Anchor),
    /// Replace from the start marker through the first end marker after it
    ReplaceBlock { start: Anchor, end: Anchor },
    /// Replace the full line containing the anchor
    ReplaceLine(Anchor),
}

/// One textual edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// Short name used in errors and logs
    pub label: String,
    pub mode: PatchMode,
    pub payload: String,
}

impl Patch {
    pub fn insert_after(label: &str, anchor: Anchor, payload: impl Into<String>) -> Self {
        Self::new(label, PatchMode::InsertAfter(anchor), payload)
    }

    pub fn insert_before(label: &str, anchor: Anchor, payload: impl Into<String>) -> Self {
        Self::new(label, PatchMode::InsertBefore(anchor), payload)
    }

    pub fn replace_block(
        label: &str,
        start: Anchor,
        end: Anchor,
        payload: impl Into<String>,
    ) -> Self {
        Self::new(label, PatchMode::ReplaceBlock { start, end }, payload)
    }

    pub fn replace_line(label: &str, anchor: Anchor, payload: impl Into<String>) -> Self {
        Self::new(label, PatchMode::ReplaceLine(anchor), payload)
    }

    fn new(label: &str, mode: PatchMode, payload: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            mode,
            payload: payload.into(),
        }
    }
}

/// Ordered patches for one target file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSet {
    patches: Vec<Patch>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, patch: Patch) {
        self.patches.push(patch);
    }

    pub fn extend(&mut self, other: PatchSet) {
        self.patches.extend(other.patches);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Patch> {
        self.patches.iter()
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }
}

impl FromIterator<Patch> for PatchSet {
    fn from_iter<I: IntoIterator<Item = Patch>>(iter: I) -> Self {
        Self {
            patches: iter.into_iter().collect(),
        }
    }
}

/// Patch application failure
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("patch '{label}': anchor {anchor} not found")]
    AnchorNotFound { label: String, anchor: String },

    #[error("patch '{label}': anchor {anchor} matches {count} locations, expected exactly one")]
    AmbiguousAnchor {
        label: String,
        anchor: String,
        count: usize,
    },

    #[error("patch '{label}' is malformed: {reason}")]
    MalformedPatch { label: String, reason: String },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Compiled form of an [`Anchor`]
enum Matcher<'a> {
    Literal(&'a str),
    Regex(Regex),
}

impl<'a> Matcher<'a> {
    fn compile(label: &str, anchor: &'a Anchor) -> Result<Self, PatchError> {
        let malformed = |reason: String| PatchError::MalformedPatch {
            label: label.to_string(),
            reason,
        };
        match anchor {
            Anchor::Literal(text) if text.is_empty() => Err(malformed("empty anchor".into())),
            Anchor::Literal(text) => Ok(Matcher::Literal(text)),
            Anchor::Pattern(pattern) => {
                let regex = Regex::new(pattern)
                    .map_err(|e| malformed(format!("invalid anchor pattern: {}", e)))?;
                if regex.is_match("") {
                    return Err(malformed(format!(
                        "anchor /{}/ can match the empty string",
                        pattern
                    )));
                }
                Ok(Matcher::Regex(regex))
            }
        }
    }

    fn find_all(&self, text: &str) -> Vec<Range<usize>> {
        match self {
            Matcher::Literal(needle) => text
                .match_indices(needle)
                .map(|(i, m)| i..i + m.len())
                .collect(),
            Matcher::Regex(regex) => regex.find_iter(text).map(|m| m.range()).collect(),
        }
    }

    fn find_from(&self, text: &str, from: usize) -> Option<Range<usize>> {
        match self {
            Matcher::Literal(needle) => text[from..]
                .find(needle)
                .map(|i| from + i..from + i + needle.len()),
            Matcher::Regex(regex) => regex.find_at(text, from).map(|m| m.range()),
        }
    }
}

enum Edit<'a> {
    InsertAfter(Matcher<'a>),
    InsertBefore(Matcher<'a>),
    ReplaceBlock(Matcher<'a>, Matcher<'a>),
    ReplaceLine(Matcher<'a>),
}

/// A validated patch ready to run
struct Compiled<'a> {
    patch: &'a Patch,
    edit: Edit<'a>,
}

impl<'a> Compiled<'a> {
    fn compile(patch: &'a Patch) -> Result<Self, PatchError> {
        let label = patch.label.as_str();
        let edit = match &patch.mode {
            PatchMode::InsertAfter(anchor) => Edit::InsertAfter(Matcher::compile(label, anchor)?),
            PatchMode::InsertBefore(anchor) => {
                Edit::InsertBefore(Matcher::compile(label, anchor)?)
            }
            PatchMode::ReplaceBlock { start, end } => Edit::ReplaceBlock(
                Matcher::compile(label, start)?,
                Matcher::compile(label, end)?,
            ),
            PatchMode::ReplaceLine(anchor) => Edit::ReplaceLine(Matcher::compile(label, anchor)?),
        };

        let compiled = Self { patch, edit };
        compiled.validate()?;
        Ok(compiled)
    }

    fn malformed(&self, reason: impl Into<String>) -> PatchError {
        PatchError::MalformedPatch {
            label: self.patch.label.clone(),
            reason: reason.into(),
        }
    }

    /// Reject payloads that would make the patch fire again on its own output
    fn validate(&self) -> Result<(), PatchError> {
        let payload = self.patch.payload.as_str();
        let primary = match &self.edit {
            Edit::InsertAfter(m) | Edit::InsertBefore(m) => {
                if payload.is_empty() {
                    return Err(self.malformed("empty payload"));
                }
                m
            }
            Edit::ReplaceBlock(start, _) => start,
            Edit::ReplaceLine(m) => m,
        };

        if primary.find_all(payload).is_empty() {
            return Ok(());
        }

        match self.apply(payload) {
            Ok(None) => Ok(()),
            _ => Err(self.malformed("payload reintroduces its own anchor")),
        }
    }

    fn anchor_of(&self, end: bool) -> String {
        match &self.patch.mode {
            PatchMode::InsertAfter(a) | PatchMode::InsertBefore(a) | PatchMode::ReplaceLine(a) => {
                a.to_string()
            }
            PatchMode::ReplaceBlock { start, end: e } => {
                if end {
                    e.to_string()
                } else {
                    start.to_string()
                }
            }
        }
    }

    fn not_found(&self, end: bool) -> PatchError {
        PatchError::AnchorNotFound {
            label: self.patch.label.clone(),
            anchor: self.anchor_of(end),
        }
    }

    fn ambiguous(&self, count: usize) -> PatchError {
        PatchError::AmbiguousAnchor {
            label: self.patch.label.clone(),
            anchor: self.anchor_of(false),
            count,
        }
    }

    fn unique(&self, matcher: &Matcher<'_>, text: &str) -> Result<Range<usize>, PatchError> {
        let mut matches = matcher.find_all(text);
        match matches.len() {
            0 => Err(self.not_found(false)),
            1 => Ok(matches.remove(0)),
            n => Err(self.ambiguous(n)),
        }
    }

    /// Returns `None` when the text already carries this patch
    fn apply(&self, text: &str) -> Result<Option<String>, PatchError> {
        let payload = self.patch.payload.as_str();
        match &self.edit {
            Edit::InsertAfter(m) => {
                let at = self.unique(m, text)?.end;
                if text[at..].starts_with(payload) {
                    return Ok(None);
                }
                Ok(Some(splice(text, at..at, payload)))
            }
            Edit::InsertBefore(m) => {
                let at = self.unique(m, text)?.start;
                if text[..at].ends_with(payload) {
                    return Ok(None);
                }
                Ok(Some(splice(text, at..at, payload)))
            }
            Edit::ReplaceBlock(start, end) => {
                let starts = start.find_all(text);
                let start_range = match starts.len() {
                    0 if contains_whole_lines(text, payload) => return Ok(None),
                    0 => return Err(self.not_found(false)),
                    1 => starts[0].clone(),
                    n => return Err(self.ambiguous(n)),
                };
                let end_range = end
                    .find_from(text, start_range.end)
                    .ok_or_else(|| self.not_found(true))?;
                let span = start_range.start..end_range.end;
                if &text[span.clone()] == payload {
                    return Ok(None);
                }
                Ok(Some(splice(text, span, payload)))
            }
            Edit::ReplaceLine(m) => {
                let mut lines: Vec<Range<usize>> = Vec::new();
                for found in m.find_all(text) {
                    let line = line_span(text, found);
                    if !lines.contains(&line) {
                        lines.push(line);
                    }
                }
                let line = match lines.len() {
                    0 if contains_whole_lines(text, payload) => return Ok(None),
                    0 => return Err(self.not_found(false)),
                    1 => lines.remove(0),
                    n => return Err(self.ambiguous(n)),
                };
                if &text[line.clone()] == payload {
                    return Ok(None);
                }
                Ok(Some(splice(text, line, payload)))
            }
        }
    }
}

fn splice(text: &str, range: Range<usize>, payload: &str) -> String {
    let mut out = String::with_capacity(text.len() + payload.len());
    out.push_str(&text[..range.start]);
    out.push_str(payload);
    out.push_str(&text[range.end..]);
    out
}

/// Widen `range` to the full lines it touches, without the trailing newline
fn line_span(text: &str, range: Range<usize>) -> Range<usize> {
    let start = text[..range.start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = text[range.end..]
        .find('\n')
        .map(|i| range.end + i)
        .unwrap_or(text.len());
    let end = if end > start && text[..end].ends_with('\r') {
        end - 1
    } else {
        end
    };
    start..end
}

/// Whether `needle` occurs in `text` starting and ending on line boundaries
fn contains_whole_lines(text: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    text.match_indices(needle).any(|(i, _)| {
        let end = i + needle.len();
        let starts_line = i == 0 || text[..i].ends_with('\n') || needle.starts_with('\n');
        let ends_line = end == text.len()
            || needle.ends_with('\n')
            || text[end..].starts_with('\n')
            || text[end..].starts_with("\r\n");
        starts_line && ends_line
    })
}

/// Compile every patch and reject combinations that cannot be re-applied
fn compile_set(patches: &PatchSet) -> Result<Vec<Compiled<'_>>, PatchError> {
    let compiled = patches
        .iter()
        .map(Compiled::compile)
        .collect::<Result<Vec<_>, _>>()?;

    // Only the payload next to the anchor is recognised as already applied
    for (i, later) in patches.iter().enumerate() {
        let clash = patches.iter().take(i).find(|earlier| {
            match (&earlier.mode, &later.mode) {
                (PatchMode::InsertAfter(a), PatchMode::InsertAfter(b))
                | (PatchMode::InsertBefore(a), PatchMode::InsertBefore(b)) => a == b,
                _ => false,
            }
        });
        if let Some(earlier) = clash {
            return Err(PatchError::MalformedPatch {
                label: later.label.clone(),
                reason: format!(
                    "inserts at the same anchor as '{}'; combine the payloads",
                    earlier.label
                ),
            });
        }
    }

    Ok(compiled)
}

/// Check every patch in the set without applying anything
pub fn validate(patches: &PatchSet) -> Result<(), PatchError> {
    compile_set(patches).map(|_| ())
}

/// Apply `patches` to `text` in order.
///
/// All patches are validated up front; the first failure aborts the whole set.
/// The result is a fixed point of the set: a set whose output it would change
/// again is rejected.
pub fn apply(text: &str, patches: &PatchSet) -> Result<String, PatchError> {
    let compiled = compile_set(patches)?;

    let mut current = text.to_string();
    for patch in &compiled {
        match patch.apply(&current)? {
            Some(next) => {
                tracing::debug!(patch = %patch.patch.label, "patch applied");
                current = next;
            }
            None => tracing::debug!(patch = %patch.patch.label, "patch already present"),
        }
    }

    for patch in &compiled {
        let reason = match patch.apply(&current) {
            Ok(None) => continue,
            Ok(Some(_)) => "applies again to its own output".to_string(),
            Err(e) => format!("cannot be re-applied to its own output: {}", e),
        };
        return Err(patch.malformed(reason));
    }
    Ok(current)
}

/// Patch a file in place.
///
/// The file is rewritten at most once and only when the content changes.
/// Returns whether it was rewritten.
pub fn apply_to_file(path: &Path, patches: &PatchSet) -> Result<bool, PatchError> {
    let io_err = |source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    };

    let original = std::fs::read_to_string(path).map_err(io_err)?;
    let patched = apply(&original, patches)?;
    if patched == original {
        return Ok(false);
    }

    write_atomic(path, patched.as_bytes()).map_err(io_err)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LIST: &str = "\
HEADER = 1
ITEMS = [
    'a',
    'b',
]

FOOTER = 2
";

    fn set(patches: Vec<Patch>) -> PatchSet {
        patches.into_iter().collect()
    }

    #[test]
    fn test_insert_after_and_before() {
        let patches = set(vec![
            Patch::insert_after("first", Anchor::literal("ITEMS = [\n"), "    'z',\n"),
            Patch::insert_before("comment", Anchor::literal("FOOTER = 2"), "# footer\n"),
        ]);
        let out = apply(LIST, &patches).unwrap();
        assert!(out.contains("ITEMS = [\n    'z',\n    'a',"));
        assert!(out.contains("# footer\nFOOTER = 2"));
    }

    #[test]
    fn test_missing_anchor() {
        let patches = set(vec![Patch::insert_after(
            "nope",
            Anchor::literal("MISSING"),
            "x",
        )]);
        let err = apply(LIST, &patches).unwrap_err();
        assert!(matches!(err, PatchError::AnchorNotFound { label, .. } if label == "nope"));
    }

    #[test]
    fn test_ambiguous_anchor_is_not_replaced_globally() {
        let patches = set(vec![Patch::insert_after(
            "item",
            Anchor::pattern(r"(?m)^    '[ab]',\n"),
            "    'c',\n",
        )]);
        let err = apply(LIST, &patches).unwrap_err();
        assert!(matches!(err, PatchError::AmbiguousAnchor { count: 2, .. }));
    }

    #[test]
    fn test_replace_block() {
        let patches = set(vec![Patch::replace_block(
            "items",
            Anchor::literal("ITEMS = [\n"),
            Anchor::pattern(r"(?m)^\]\n"),
            "ITEMS = []\n",
        )]);
        let out = apply(LIST, &patches).unwrap();
        assert_eq!(out, "HEADER = 1\nITEMS = []\n\nFOOTER = 2\n");
        assert_eq!(apply(&out, &patches).unwrap(), out);
    }

    #[test]
    fn test_replace_block_missing_end_marker() {
        let patches = set(vec![Patch::replace_block(
            "items",
            Anchor::literal("ITEMS = [\n"),
            Anchor::literal("END OF ITEMS"),
            "ITEMS = []\n",
        )]);
        let err = apply(LIST, &patches).unwrap_err();
        match err {
            PatchError::AnchorNotFound { anchor, .. } => assert!(anchor.contains("END OF ITEMS")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_replace_block_end_must_follow_start() {
        // The only end marker sits before the start marker
        let patches = set(vec![Patch::replace_block(
            "footer",
            Anchor::literal("FOOTER"),
            Anchor::literal("HEADER"),
            "X",
        )]);
        assert!(matches!(
            apply(LIST, &patches),
            Err(PatchError::AnchorNotFound { .. })
        ));
    }

    #[test]
    fn test_replace_line() {
        let patches = set(vec![Patch::replace_line(
            "header",
            Anchor::pattern(r"(?m)^HEADER = \d+$"),
            "HEADER = 'one'",
        )]);
        let out = apply(LIST, &patches).unwrap();
        assert!(out.starts_with("HEADER = 'one'\nITEMS = ["));
    }

    #[test]
    fn test_replace_line_by_partial_match_replaces_whole_line() {
        let patches = set(vec![Patch::replace_line(
            "footer",
            Anchor::literal("TER ="),
            "FOOTER = 3",
        )]);
        let out = apply(LIST, &patches).unwrap();
        assert!(out.ends_with("\nFOOTER = 3\n"));
    }

    #[test]
    fn test_replace_line_ambiguous_across_lines() {
        let patches = set(vec![Patch::replace_line(
            "quoted",
            Anchor::literal("'"),
            "    'q',",
        )]);
        assert!(matches!(
            apply(LIST, &patches),
            Err(PatchError::AmbiguousAnchor { count: 2, .. })
        ));
    }

    #[test]
    fn test_applying_twice_equals_applying_once() {
        let patches = set(vec![
            Patch::insert_after("first", Anchor::literal("ITEMS = [\n"), "    'z',\n"),
            Patch::insert_after("last", Anchor::literal("    'b',\n"), "    'c',\n"),
            Patch::insert_before("comment", Anchor::literal("FOOTER"), "# footer\n"),
            Patch::replace_line("header", Anchor::literal("HEADER = 1"), "HEADER = 'x'"),
            Patch::replace_line("footer", Anchor::pattern(r"(?m)^FOOTER = .*$"), "FOOTER = 9"),
        ]);
        let once = apply(LIST, &patches).unwrap();
        let twice = apply(&once, &patches).unwrap();
        assert_eq!(once, twice);
        assert!(once.contains("    'b',\n    'c',\n]"));
        assert!(once.ends_with("# footer\nFOOTER = 9\n"));
        assert!(once.starts_with("HEADER = 'x'\n"));
    }

    #[test]
    fn test_later_patch_can_anchor_on_earlier_payload() {
        let patches = set(vec![
            Patch::insert_after("marker", Anchor::literal("HEADER = 1\n"), "# BEGIN\n"),
            Patch::insert_after("content", Anchor::literal("# BEGIN\n"), "VALUE = 1\n"),
        ]);
        let out = apply(LIST, &patches).unwrap();
        assert!(out.starts_with("HEADER = 1\n# BEGIN\nVALUE = 1\nITEMS"));

        // Reversed order cannot work: the marker does not exist yet
        let reversed = set(patches.iter().rev().cloned().collect());
        assert!(matches!(
            apply(LIST, &reversed),
            Err(PatchError::AnchorNotFound { .. })
        ));
    }

    #[test]
    fn test_payload_reintroducing_anchor_is_malformed() {
        let patches = set(vec![Patch::insert_after(
            "loop",
            Anchor::literal("ITEMS = ["),
            "\nITEMS = [",
        )]);
        assert!(matches!(
            validate(&patches),
            Err(PatchError::MalformedPatch { .. })
        ));
    }

    #[test]
    fn test_self_delimited_block_is_not_malformed() {
        let patch = Patch::replace_block(
            "items",
            Anchor::literal("ITEMS = [\n"),
            Anchor::pattern(r"(?m)^\]\n"),
            "ITEMS = [\n    'only',\n]\n",
        );
        let patches = set(vec![patch]);
        validate(&patches).unwrap();
        let once = apply(LIST, &patches).unwrap();
        assert_eq!(apply(&once, &patches).unwrap(), once);
    }

    #[test]
    fn test_block_payload_with_unterminated_anchor_is_malformed() {
        // Re-running would pair the payload's start marker with some later end marker
        let patches = set(vec![Patch::replace_block(
            "items",
            Anchor::literal("ITEMS = ["),
            Anchor::pattern(r"(?m)^\]\n"),
            "ITEMS = ['x'",
        )]);
        assert!(matches!(
            validate(&patches),
            Err(PatchError::MalformedPatch { .. })
        ));
    }

    #[test]
    fn test_two_inserts_on_one_anchor_are_malformed() {
        let patches = set(vec![
            Patch::insert_after("x", Anchor::literal("ITEMS = [\n"), "    'x',\n"),
            Patch::insert_after("y", Anchor::literal("ITEMS = [\n"), "    'y',\n"),
        ]);
        match validate(&patches) {
            Err(PatchError::MalformedPatch { label, .. }) => assert_eq!(label, "y"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(apply(LIST, &patches).is_err());

        let before = set(vec![
            Patch::insert_before("x", Anchor::literal("FOOTER"), "# x\n"),
            Patch::insert_before("y", Anchor::literal("FOOTER"), "# y\n"),
        ]);
        assert!(validate(&before).is_err());

        // One payload on each side of the anchor re-applies cleanly
        let both_sides = set(vec![
            Patch::insert_before("x", Anchor::literal("FOOTER"), "# x\n"),
            Patch::insert_after("y", Anchor::literal("FOOTER = 2\n"), "# y\n"),
        ]);
        let once = apply(LIST, &both_sides).unwrap();
        assert_eq!(apply(&once, &both_sides).unwrap(), once);
    }

    #[test]
    fn test_equivalent_anchors_that_stack_inserts_are_rejected() {
        // Different anchors, same location: only the staged re-run can tell
        let patches = set(vec![
            Patch::insert_after("x", Anchor::literal("ITEMS = [\n"), "    'x',\n"),
            Patch::insert_after("y", Anchor::pattern(r"(?m)^ITEMS = \[\n"), "    'y',\n"),
        ]);
        validate(&patches).unwrap();
        match apply(LIST, &patches) {
            Err(PatchError::MalformedPatch { label, .. }) => assert_eq!(label, "x"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_partial_line_block_is_rejected_before_writing() {
        // Replacing inside a line removes the start marker without leaving a whole line behind
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.py");
        std::fs::write(&path, LIST).unwrap();

        let patches = set(vec![Patch::replace_block(
            "blk",
            Anchor::literal("EADER"),
            Anchor::literal("1"),
            "Z",
        )]);
        assert!(matches!(
            apply(LIST, &patches),
            Err(PatchError::MalformedPatch { label, .. }) if label == "blk"
        ));
        assert!(apply_to_file(&path, &patches).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), LIST);
    }

    #[test]
    fn test_invalid_patterns_are_malformed() {
        for anchor in [
            Anchor::pattern("(unclosed"),
            Anchor::pattern("x*"),
            Anchor::literal(""),
        ] {
            let patches = set(vec![Patch::insert_after("bad", anchor, "x")]);
            assert!(matches!(
                validate(&patches),
                Err(PatchError::MalformedPatch { .. })
            ));
        }

        let empty = set(vec![Patch::insert_after("empty", Anchor::literal("ITEMS"), "")]);
        assert!(validate(&empty).is_err());
    }

    #[test]
    fn test_output_is_deterministic() {
        let patches = set(vec![Patch::insert_after(
            "first",
            Anchor::literal("ITEMS = [\n"),
            "    'z',\n",
        )]);
        assert_eq!(
            apply(LIST, &patches).unwrap(),
            apply(LIST, &patches).unwrap()
        );
    }

    #[test]
    fn test_apply_to_file_rewrites_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.py");
        std::fs::write(&path, LIST).unwrap();

        let patches = set(vec![Patch::insert_after(
            "first",
            Anchor::literal("ITEMS = [\n"),
            "    'z',\n",
        )]);
        assert!(apply_to_file(&path, &patches).unwrap());
        assert!(!apply_to_file(&path, &patches).unwrap());
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("    'z',\n    'a',"));
    }

    #[test]
    fn test_failed_set_leaves_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.py");
        std::fs::write(&path, LIST).unwrap();

        let failing = [
            // Second patch fails after the first one succeeded in memory
            set(vec![
                Patch::insert_after("ok", Anchor::literal("ITEMS = [\n"), "    'z',\n"),
                Patch::insert_after("missing", Anchor::literal("NOWHERE"), "x"),
            ]),
            set(vec![
                Patch::insert_after("ok", Anchor::literal("ITEMS = [\n"), "    'z',\n"),
                Patch::insert_after("ambiguous", Anchor::literal("    '"), "x"),
            ]),
            set(vec![
                Patch::insert_after("ok", Anchor::literal("ITEMS = [\n"), "    'z',\n"),
                Patch::insert_after("malformed", Anchor::literal("X"), "X"),
            ]),
            set(vec![Patch::replace_block(
                "no-end",
                Anchor::literal("ITEMS = [\n"),
                Anchor::literal("<<END>>"),
                "ITEMS = []",
            )]),
        ];

        for patches in failing {
            assert!(apply_to_file(&path, &patches).is_err());
            assert_eq!(std::fs::read_to_string(&path).unwrap(), LIST);
        }
        // No temporary files left next to the target
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = apply_to_file(&tmp.path().join("nope.py"), &PatchSet::new()).unwrap_err();
        assert!(matches!(err, PatchError::Io { .. }));
    }
}
