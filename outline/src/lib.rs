//! Outline navigation over flat line sequences.
//!
//! Headings are lines that start with a run of marker characters (`*`, `**`, ...).
//! No tree is built up front: every relation (parent, siblings, children, subtree end)
//! is found by a linear scan the first time it is asked for and cached in a heading
//! arena, so each later read is a lookup.

pub mod core {
    use serde::{Deserialize, Serialize};

    /* ------------------------------- IDs ------------------------------- */

    /// Index of a heading in its document's arena.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct HeadingId(pub(crate) usize);

    /// Scan direction through the line sequence.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Direction {
        /// Toward the end of the document.
        Forward,
        /// Toward the beginning of the document.
        Backward,
    }

    /// Host cursor position. Hosts count lines from 1.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Cursor {
        pub line: usize,
    }

    impl Cursor {
        pub fn new(line: usize) -> Self {
            Self { line }
        }

        /// 0-based line index, `None` for line 0.
        pub fn index(self) -> Option<usize> {
            self.line.checked_sub(1)
        }
    }

    /* ----------------------------- Tri-state ----------------------------- */

    /// A lazily resolved relation.
    ///
    /// `Unsearched` and `Absent` are distinct so a confirmed "no such relation"
    /// never triggers another scan.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Slot<T> {
        Unsearched,
        Absent,
        Found(T),
    }

    impl<T> Default for Slot<T> {
        fn default() -> Self {
            Slot::Unsearched
        }
    }

    impl<T: Copy> Slot<T> {
        pub fn is_resolved(&self) -> bool {
            !matches!(self, Slot::Unsearched)
        }

        /// `None` while unsearched, otherwise the resolved value.
        pub fn resolved(&self) -> Option<Option<T>> {
            match self {
                Slot::Unsearched => None,
                Slot::Absent => Some(None),
                Slot::Found(v) => Some(Some(*v)),
            }
        }

        pub fn found(&self) -> Option<T> {
            match self {
                Slot::Found(v) => Some(*v),
                _ => None,
            }
        }

        /// Record a result unless one is already cached.
        pub(crate) fn settle(&mut self, value: Option<T>) {
            if let Slot::Unsearched = self {
                *self = match value {
                    Some(v) => Slot::Found(v),
                    None => Slot::Absent,
                };
            }
        }
    }

    /* ---------------------------- Errors (domain) ---------------------------- */

    #[derive(Debug, thiserror::Error)]
    pub enum OutlineError {
        #[error("line {line} does not contain a heading")]
        NotAHeading { line: usize },
        #[error("line {line} is out of range (document has {len} lines)")]
        LineOutOfRange { line: usize, len: usize },
        #[error("not a date literal: {0:?}")]
        InvalidDate(String),
        #[error("invalid settings: {0}")]
        Settings(#[from] serde_json::Error),
    }
}

pub mod lines {
    //! The line sequence the outline is read from and written to.

    use crate::core::OutlineError;
    use anyhow::{Context, Result};
    use std::{fs, path::Path};

    /// Ordered, 0-indexed, mutable lines owned by the host.
    pub trait LineSequence {
        fn len(&self) -> usize;

        fn is_empty(&self) -> bool {
            self.len() == 0
        }

        fn line(&self, index: usize) -> Option<&str>;

        fn set_line(&mut self, index: usize, text: String) -> Result<(), OutlineError>;
    }

    impl LineSequence for Vec<String> {
        fn len(&self) -> usize {
            Vec::len(self)
        }

        fn line(&self, index: usize) -> Option<&str> {
            self.get(index).map(String::as_str)
        }

        fn set_line(&mut self, index: usize, text: String) -> Result<(), OutlineError> {
            let len = Vec::len(self);
            let slot = self
                .get_mut(index)
                .ok_or(OutlineError::LineOutOfRange { line: index, len })?;
            *slot = text;
            Ok(())
        }
    }

    /// In-memory text buffer backed by a file or a string.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Buffer {
        lines: Vec<String>,
        trailing_newline: bool,
    }

    impl Buffer {
        pub fn from_text(text: &str) -> Self {
            Self {
                lines: text.lines().map(str::to_string).collect(),
                trailing_newline: text.ends_with('\n'),
            }
        }

        pub fn read(path: &Path) -> Result<Self> {
            let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
            Ok(Self::from_text(&text))
        }

        pub fn write(&self, path: &Path) -> Result<()> {
            fs::write(path, self.to_text()).with_context(|| format!("writing {:?}", path))
        }

        pub fn to_text(&self) -> String {
            let mut out = self.lines.join("\n");
            if self.trailing_newline {
                out.push('\n');
            }
            out
        }

        pub fn lines(&self) -> &[String] {
            &self.lines
        }
    }

    impl From<Vec<String>> for Buffer {
        fn from(lines: Vec<String>) -> Self {
            Self {
                lines,
                trailing_newline: true,
            }
        }
    }

    impl LineSequence for Buffer {
        fn len(&self) -> usize {
            self.lines.len()
        }

        fn line(&self, index: usize) -> Option<&str> {
            self.lines.line(index)
        }

        fn set_line(&mut self, index: usize, text: String) -> Result<(), OutlineError> {
            self.lines.set_line(index, text)
        }
    }

}

pub mod settings {
    //! Options that affect tag rendering.

    use crate::core::OutlineError;
    use anyhow::{Context, Result};
    use indexmap::IndexMap;
    use serde::{Deserialize, Serialize};
    use std::{fs, path::Path};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Settings {
        /// Column the last character of a tag group is aligned to.
        #[serde(default = "Settings::default_tags_column", alias = "org_tags_column")]
        pub tags_column: usize,

        /// Host tab-stop width.
        #[serde(default = "Settings::default_tab_stop", alias = "tabstop")]
        pub tab_stop: usize,

        /// Options this crate does not interpret, kept in file order.
        #[serde(flatten)]
        pub extra: IndexMap<String, serde_json::Value>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                tags_column: Self::default_tags_column(),
                tab_stop: Self::default_tab_stop(),
                extra: IndexMap::new(),
            }
        }
    }

    impl Settings {
        fn default_tags_column() -> usize {
            77
        }

        fn default_tab_stop() -> usize {
            8
        }

        pub fn from_json_str(text: &str) -> Result<Self, OutlineError> {
            Ok(serde_json::from_str(text)?)
        }

        pub fn load(path: &Path) -> Result<Self> {
            let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
            Self::from_json_str(&text).with_context(|| format!("parsing settings {:?}", path))
        }

        /// Tab-stop width, never zero.
        pub fn effective_tab_stop(&self) -> usize {
            self.tab_stop.max(1)
        }
    }

}

pub mod identify {
    //! Heading line recognition.

    /// Marker used when none is configured.
    pub const DEFAULT_MARKER: char = '*';

    /// Level of a heading line using the default marker.
    pub fn identify(line: &str) -> Option<usize> {
        identify_with(line, DEFAULT_MARKER)
    }

    /// Count leading `marker` characters; the line is a heading when at least one was
    /// counted and the run is followed by a space or tab.
    pub fn identify_with(line: &str, marker: char) -> Option<usize> {
        let mut level = 0;
        for c in line.chars() {
            if c == marker {
                level += 1;
                continue;
            }
            return (level > 0 && matches!(c, ' ' | '\t')).then_some(level);
        }
        None
    }

    /// Strategy that decides which lines are headings for a document.
    pub trait HeadingFactory {
        fn marker(&self) -> char;

        fn identify(&self, line: &str) -> Option<usize> {
            identify_with(line, self.marker())
        }
    }

    /// Single repeated marker character.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Marker(pub char);

    impl Default for Marker {
        fn default() -> Self {
            Self(DEFAULT_MARKER)
        }
    }

    impl HeadingFactory for Marker {
        fn marker(&self) -> char {
            self.0
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn recognizes_marker_runs() {
            assert_eq!(identify("* A"), Some(1));
            assert_eq!(identify("***\tdeep"), Some(3));
            assert_eq!(identify("** "), Some(2));
        }

        #[test]
        fn rejects_non_headings() {
            for line in ["", "*", "***", "*A", " * A", "text", "*-* x"] {
                assert_eq!(identify(line), None, "{line:?}");
            }
        }

        #[test]
        fn custom_marker() {
            let hashes = Marker('#');
            assert_eq!(hashes.identify("## Title"), Some(2));
            assert_eq!(hashes.identify("* Title"), None);
        }
    }
}

pub mod heading {
    use crate::core::{HeadingId, OutlineError, Slot};
    use crate::identify::HeadingFactory;

    /// One heading line and its cached relations.
    ///
    /// Relations are filled in by [`crate::document::Document`] while it scans; they
    /// are read-only from outside.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Heading {
        start: usize,
        level: usize,
        pub(crate) end: Option<usize>,
        pub(crate) parent: Slot<HeadingId>,
        pub(crate) previous_sibling: Slot<HeadingId>,
        pub(crate) next_sibling: Slot<HeadingId>,
        pub(crate) first_child: Slot<HeadingId>,
        pub(crate) last_child: Slot<HeadingId>,
        pub(crate) tags: Option<Vec<String>>,
        pub(crate) todo: Option<String>,
    }

    impl Heading {
        pub(crate) fn new(start: usize, level: usize) -> Self {
            Self {
                start,
                level,
                end: None,
                parent: Slot::Unsearched,
                previous_sibling: Slot::Unsearched,
                next_sibling: Slot::Unsearched,
                first_child: Slot::Unsearched,
                last_child: Slot::Unsearched,
                tags: None,
                todo: None,
            }
        }

        /// Build a heading for `line` found at index `start`.
        pub fn from_line<F>(start: usize, line: &str, factory: &F) -> Result<Self, OutlineError>
        where
            F: HeadingFactory + ?Sized,
        {
            let level = factory
                .identify(line)
                .ok_or(OutlineError::NotAHeading { line: start })?;
            Ok(Self::new(start, level))
        }

        pub fn start(&self) -> usize {
            self.start
        }

        /// 1-based line number for hosts.
        pub fn start_line_number(&self) -> usize {
            self.start + 1
        }

        pub fn level(&self) -> usize {
            self.level
        }

        pub fn cached_end(&self) -> Option<usize> {
            self.end
        }

        pub fn parent(&self) -> Slot<HeadingId> {
            self.parent
        }

        pub fn previous_sibling(&self) -> Slot<HeadingId> {
            self.previous_sibling
        }

        pub fn next_sibling(&self) -> Slot<HeadingId> {
            self.next_sibling
        }

        pub fn first_child(&self) -> Slot<HeadingId> {
            self.first_child
        }

        pub fn last_child(&self) -> Slot<HeadingId> {
            self.last_child
        }

        pub fn todo(&self) -> Option<&str> {
            self.todo.as_deref()
        }
    }

}

pub mod tags {
    //! Trailing `:tag:tag:` groups on heading lines.

    use crate::settings::Settings;

    /// Where a rendered tag group should end.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TagLayout {
        pub column: usize,
        pub tab_stop: usize,
    }

    impl From<&Settings> for TagLayout {
        fn from(settings: &Settings) -> Self {
            Self {
                column: settings.tags_column,
                tab_stop: settings.effective_tab_stop(),
            }
        }
    }

    /// Tags in the last whitespace-delimited token of `text`, if it is a `:a:b:` group.
    pub fn parse_tags(text: &str) -> Vec<String> {
        let Some(last) = text.split_whitespace().last() else {
            return vec![];
        };
        if last.chars().count() <= 2 || !last.starts_with(':') || !last.ends_with(':') {
            return vec![];
        }
        last.split(':')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// `text` without its tag group, trimmed.
    pub fn strip_tags(text: &str) -> &str {
        if parse_tags(text).is_empty() {
            return text.trim();
        }
        let text = text.trim_end();
        match text.rfind([' ', '\t']) {
            Some(idx) => text[..idx].trim(),
            None => "",
        }
    }

    /// Render a heading line with `tags` aligned toward `layout.column`.
    ///
    /// Columns are counted in characters.
    pub fn render_tagged_line(
        marker: char,
        level: usize,
        title: &str,
        tags: &[String],
        layout: TagLayout,
    ) -> String {
        let mut line: String = std::iter::repeat_n(marker, level).collect();
        line.push(' ');
        line.push_str(title);
        if tags.is_empty() {
            return line;
        }

        let group = format!(":{}:", tags.join(":"));
        let width = level + 1 + title.chars().count();
        let (tabs, spaces) = separator(width, group.chars().count(), layout);
        line.extend(std::iter::repeat_n('\t', tabs));
        line.extend(std::iter::repeat_n(' ', spaces));
        line.push_str(&group);
        line
    }

    /// Tabs then spaces that move from column `width` to where `group` ends at the target.
    fn separator(width: usize, group: usize, layout: TagLayout) -> (usize, usize) {
        let ts = layout.tab_stop.max(1);
        let remaining = layout.column.saturating_sub(width + group);
        if remaining == 0 {
            return (0, 1);
        }
        let first_tab = ts - width % ts;
        if width + first_tab + group < layout.column {
            let rest = layout.column - (width + first_tab + group);
            (rest / ts + 1, rest % ts)
        } else {
            (0, remaining)
        }
    }

}

pub mod document {
    //! Document index: directional heading search and lazy relation resolution.
    //!
    //! Resolution strategy:
    //! - `find_heading` scans line by line and interns each heading it returns in the arena.
    //! - Children are resolved by one forward pass with an explicit frame stack, so every
    //!   heading inside the subtree gets its parent, sibling and child links on the way.
    //! - Parent and previous sibling are resolved by backward passes that also fill the
    //!   inverse links of whatever they find.
    //! - Malformed level jumps never fail; deeper-than-expected headings are folded under
    //!   the nearest shallower heading.

    use crate::core::{Cursor, Direction, HeadingId, OutlineError, Slot};
    use crate::heading::Heading;
    use crate::identify::{HeadingFactory, Marker};
    use crate::lines::LineSequence;
    use crate::settings::Settings;
    use crate::tags::{TagLayout, parse_tags, render_tagged_line, strip_tags};
    use std::collections::HashMap;
    use tracing::{debug, trace};

    pub struct Document<L, F = Marker> {
        lines: L,
        factory: F,
        settings: Settings,
        nodes: Vec<Heading>,
        by_start: HashMap<usize, HeadingId>,
    }

    /// Open subtree during a children pass.
    struct Frame {
        id: HeadingId,
        level: usize,
        /// `None` until looked up; only the pass root needs a lookup.
        parent_level: Option<Option<usize>>,
        first: Option<HeadingId>,
        last: Option<HeadingId>,
    }

    impl<L: LineSequence> Document<L, Marker> {
        pub fn new(lines: L) -> Self {
            Self::with_factory(lines, Marker::default())
        }
    }

    impl<L: LineSequence, F: HeadingFactory> Document<L, F> {
        pub fn with_factory(lines: L, factory: F) -> Self {
            Self {
                lines,
                factory,
                settings: Settings::default(),
                nodes: Vec::new(),
                by_start: HashMap::new(),
            }
        }

        pub fn with_settings(mut self, settings: Settings) -> Self {
            self.settings = settings;
            self
        }

        pub fn settings(&self) -> &Settings {
            &self.settings
        }

        pub fn lines(&self) -> &L {
            &self.lines
        }

        pub fn into_lines(self) -> L {
            self.lines
        }

        /// # Panics
        ///
        /// Panics if `id` was not issued by this document since the last [`Self::invalidate`].
        pub fn heading(&self, id: HeadingId) -> &Heading {
            &self.nodes[id.0]
        }

        /// Drop every cached heading. Call after the lines were changed by someone else.
        pub fn invalidate(&mut self) {
            debug!(cached = self.nodes.len(), "invalidating heading cache");
            self.nodes.clear();
            self.by_start.clear();
        }

        /* ------------------------------ Search ------------------------------ */

        fn level_at(&self, index: usize) -> Option<usize> {
            self.lines
                .line(index)
                .and_then(|text| self.factory.identify(text))
        }

        fn intern(&mut self, start: usize, level: usize) -> HeadingId {
            if let Some(&id) = self.by_start.get(&start) {
                if self.nodes[id.0].level() == level {
                    return id;
                }
            }
            let id = HeadingId(self.nodes.len());
            self.nodes.push(Heading::new(start, level));
            self.by_start.insert(start, id);
            id
        }

        /// First heading at or after (`Forward`) / at or before (`Backward`) `start_line`.
        pub fn find_heading(&mut self, start_line: usize, direction: Direction) -> Option<HeadingId> {
            let len = self.lines.len();
            if start_line >= len {
                return None;
            }
            let found = match direction {
                Direction::Forward => {
                    (start_line..len).find_map(|i| self.level_at(i).map(|level| (i, level)))
                }
                Direction::Backward => (0..=start_line)
                    .rev()
                    .find_map(|i| self.level_at(i).map(|level| (i, level))),
            };
            trace!(start_line, ?direction, found = ?found.map(|(i, _)| i), "heading scan");
            found.map(|(start, level)| self.intern(start, level))
        }

        fn find_before(&mut self, line: usize) -> Option<HeadingId> {
            line.checked_sub(1)
                .and_then(|before| self.find_heading(before, Direction::Backward))
        }

        /// Heading starting exactly at `line`.
        pub fn heading_at(&mut self, line: usize) -> Result<HeadingId, OutlineError> {
            let len = self.lines.len();
            let text = self
                .lines
                .line(line)
                .ok_or(OutlineError::LineOutOfRange { line, len })?;
            let heading = Heading::from_line(line, text, &self.factory)?;
            Ok(self.intern(heading.start(), heading.level()))
        }

        /// Heading the cursor line belongs to.
        pub fn current_heading(&mut self, cursor: Cursor) -> Option<HeadingId> {
            self.find_heading(cursor.index()?, Direction::Backward)
        }

        /// First heading below the cursor line.
        pub fn next_heading(&mut self, cursor: Cursor) -> Option<HeadingId> {
            self.find_heading(cursor.index()? + 1, Direction::Forward)
        }

        /// Heading before the one the cursor belongs to.
        pub fn previous_heading(&mut self, cursor: Cursor) -> Option<HeadingId> {
            let current = self.current_heading(cursor)?;
            let start = self.nodes[current.0].start();
            self.find_before(start)
        }

        /// Every heading in line order, found lazily.
        pub fn headings(&mut self) -> Headings<'_, L, F> {
            Headings {
                document: self,
                next_line: Some(0),
            }
        }

        /* ------------------------------ Text ------------------------------ */

        /// Line text after the marker run and its separator.
        pub fn text(&self, id: HeadingId) -> Option<&str> {
            let heading = &self.nodes[id.0];
            let line = self.lines.line(heading.start())?;
            let offset = line
                .char_indices()
                .nth(heading.level() + 1)
                .map_or(line.len(), |(i, _)| i);
            Some(&line[offset..])
        }

        pub fn tags(&mut self, id: HeadingId) -> &[String] {
            if self.nodes[id.0].tags.is_none() {
                let tags = parse_tags(self.text(id).unwrap_or_default());
                self.nodes[id.0].tags = Some(tags);
            }
            self.nodes[id.0].tags.as_deref().unwrap_or(&[])
        }

        /// Rewrite the heading line with `tags`; an empty list removes the tag group.
        pub fn set_tags<S: AsRef<str>>(
            &mut self,
            id: HeadingId,
            tags: &[S],
        ) -> Result<(), OutlineError> {
            let tags: Vec<String> = tags.iter().map(|t| t.as_ref().to_string()).collect();
            let had_tags = !self.tags(id).is_empty();
            let start = self.nodes[id.0].start();
            let level = self.nodes[id.0].level();

            if tags.is_empty() && !had_tags {
                return Ok(());
            }

            let len = self.lines.len();
            let text = self
                .text(id)
                .ok_or(OutlineError::LineOutOfRange { line: start, len })?;
            let line = render_tagged_line(
                self.factory.marker(),
                level,
                strip_tags(text),
                &tags,
                TagLayout::from(&self.settings),
            );
            debug!(line = start, ?tags, "writing tags");
            self.lines.set_line(start, line)?;
            self.nodes[id.0].tags = Some(tags);
            Ok(())
        }

        pub fn todo(&self, id: HeadingId) -> Option<&str> {
            self.nodes[id.0].todo()
        }

        pub fn set_todo(&mut self, id: HeadingId, state: Option<String>) {
            self.nodes[id.0].todo = state;
        }

        /* ---------------------------- Relations ---------------------------- */

        pub fn parent(&mut self, id: HeadingId) -> Option<HeadingId> {
            if let Some(cached) = self.nodes[id.0].parent.resolved() {
                return cached;
            }
            self.resolve_parent(id);
            self.nodes[id.0].parent.found()
        }

        pub fn previous_sibling(&mut self, id: HeadingId) -> Option<HeadingId> {
            if let Some(cached) = self.nodes[id.0].previous_sibling.resolved() {
                return cached;
            }
            self.resolve_previous_sibling(id);
            self.nodes[id.0].previous_sibling.found()
        }

        pub fn next_sibling(&mut self, id: HeadingId) -> Option<HeadingId> {
            if let Some(cached) = self.nodes[id.0].next_sibling.resolved() {
                return cached;
            }
            self.resolve_children(id);
            self.nodes[id.0].next_sibling.found()
        }

        pub fn first_child(&mut self, id: HeadingId) -> Option<HeadingId> {
            if let Some(cached) = self.nodes[id.0].first_child.resolved() {
                return cached;
            }
            self.resolve_children(id);
            self.nodes[id.0].first_child.found()
        }

        pub fn last_child(&mut self, id: HeadingId) -> Option<HeadingId> {
            if let Some(cached) = self.nodes[id.0].last_child.resolved() {
                return cached;
            }
            self.resolve_children(id);
            self.nodes[id.0].last_child.found()
        }

        pub fn has_children(&mut self, id: HeadingId) -> bool {
            self.first_child(id).is_some()
        }

        pub fn children(&mut self, id: HeadingId) -> Vec<HeadingId> {
            let mut out = Vec::new();
            let Some(last) = self.last_child(id) else {
                return out;
            };
            let mut child = self.first_child(id);
            while let Some(c) = child {
                out.push(c);
                if c == last || out.len() > self.lines.len() {
                    break;
                }
                child = self.next_sibling(c);
            }
            out
        }

        /// Last line of the heading's own body, before any child or following heading.
        pub fn end(&mut self, id: HeadingId) -> usize {
            if let Some(end) = self.nodes[id.0].end {
                return end;
            }
            let end = if let Some(child) = self.first_child(id) {
                self.nodes[child.0].start() - 1
            } else if let Some(sibling) = self.next_sibling(id) {
                self.nodes[sibling.0].start() - 1
            } else {
                let mut end = self.lines.len().saturating_sub(1);
                let mut ancestor = self.parent(id);
                for _ in 0..self.lines.len() {
                    let Some(a) = ancestor else { break };
                    if let Some(sibling) = self.next_sibling(a) {
                        end = self.nodes[sibling.0].start() - 1;
                        break;
                    }
                    ancestor = self.parent(a);
                }
                end
            };
            self.nodes[id.0].end = Some(end);
            end
        }

        /// 1-based counterpart of [`Self::end`].
        pub fn end_line_number(&mut self, id: HeadingId) -> usize {
            self.end(id) + 1
        }

        /// Last line of the whole subtree, descendants included.
        pub fn end_of_last_child(&mut self, id: HeadingId) -> usize {
            let mut current = id;
            for _ in 0..self.lines.len() {
                match self.last_child(current) {
                    Some(child) => current = child,
                    None => break,
                }
            }
            self.end(current)
        }

        pub fn number_of_parents(&mut self, id: HeadingId) -> usize {
            let mut count = 0;
            let mut current = self.parent(id);
            while let Some(p) = current {
                count += 1;
                if count > self.lines.len() {
                    break;
                }
                current = self.parent(p);
            }
            count
        }

        /* ---------------------------- Resolution ---------------------------- */

        fn link_siblings(&mut self, previous: HeadingId, next: HeadingId) {
            self.nodes[previous.0].next_sibling.settle(Some(next));
            self.nodes[next.0].previous_sibling.settle(Some(previous));
        }

        /// Known run of siblings around `id`, first to last, without scanning.
        fn known_sibling_run(&self, id: HeadingId) -> Vec<HeadingId> {
            let bound = self.nodes.len();
            let mut earliest = id;
            for _ in 0..bound {
                match self.nodes[earliest.0].previous_sibling.found() {
                    Some(prev) => earliest = prev,
                    None => break,
                }
            }
            let mut run = vec![earliest];
            let mut current = earliest;
            for _ in 0..bound {
                match self.nodes[current.0].next_sibling.found() {
                    Some(next) => {
                        run.push(next);
                        current = next;
                    }
                    None => break,
                }
            }
            run
        }

        /// Give every member of `run` the same parent and fill the parent's child ends
        /// where the run is known to be complete.
        fn adopt_run(&mut self, run: &[HeadingId], parent: Option<HeadingId>) {
            for &member in run {
                self.nodes[member.0].parent.settle(parent);
            }
            let (Some(p), Some(&first), Some(&last)) = (parent, run.first(), run.last()) else {
                return;
            };
            if let Slot::Absent = self.nodes[first.0].previous_sibling {
                self.nodes[p.0].first_child.settle(Some(first));
            }
            if let Slot::Absent = self.nodes[last.0].next_sibling {
                self.nodes[p.0].last_child.settle(Some(last));
            }
        }

        fn resolve_parent(&mut self, id: HeadingId) {
            let level = self.nodes[id.0].level();
            if level == 1 {
                self.nodes[id.0].parent.settle(None);
                return;
            }
            let run = self.known_sibling_run(id);
            let mut line = self.nodes[run[0].0].start();
            let parent = loop {
                let Some(candidate) = self.find_before(line) else {
                    break None;
                };
                if self.nodes[candidate.0].level() < level {
                    break Some(candidate);
                }
                line = self.nodes[candidate.0].start();
            };
            trace!(start = self.nodes[id.0].start(), parent = ?parent, "resolved parent");
            self.adopt_run(&run, parent);
        }

        fn resolve_previous_sibling(&mut self, id: HeadingId) {
            let level = self.nodes[id.0].level();
            let mut line = self.nodes[id.0].start();
            // Shallowest deeper heading seen so far, latest among equals: the sibling
            // candidate if an ancestor turns up.
            let mut stray: Option<HeadingId> = None;
            // Deeper heading seen closest to the eventual ancestor.
            let mut earliest: Option<HeadingId> = None;
            loop {
                let Some(h) = self.find_before(line) else {
                    self.nodes[id.0].parent.settle(None);
                    self.settle_previous(id, stray);
                    for s in [stray, earliest].into_iter().flatten() {
                        self.nodes[s.0].parent.settle(None);
                    }
                    if let Some(e) = earliest {
                        self.nodes[e.0].previous_sibling.settle(None);
                    }
                    return;
                };
                let h_level = self.nodes[h.0].level();
                if h_level == level {
                    self.link_siblings(h, id);
                    return;
                }
                if h_level > level {
                    if stray.is_none_or(|s| h_level < self.nodes[s.0].level()) {
                        stray = Some(h);
                    }
                    earliest = Some(h);
                    line = self.nodes[h.0].start();
                    continue;
                }

                // `h` is the ancestor; the earliest deeper heading opens its child list.
                self.settle_previous(id, stray);
                let first = earliest.unwrap_or(id);
                self.nodes[first.0].previous_sibling.settle(None);
                let run = self.known_sibling_run(id);
                self.adopt_run(&run, Some(h));
                self.nodes[first.0].parent.settle(Some(h));
                self.nodes[h.0].first_child.settle(Some(first));
                return;
            }
        }

        fn settle_previous(&mut self, id: HeadingId, previous: Option<HeadingId>) {
            match previous {
                Some(p) => self.link_siblings(p, id),
                None => self.nodes[id.0].previous_sibling.settle(None),
            }
        }

        /// One forward pass over the subtree of `root`, linking every heading it meets.
        fn resolve_children(&mut self, root: HeadingId) {
            let mut frames = vec![Frame {
                id: root,
                level: self.nodes[root.0].level(),
                parent_level: None,
                first: None,
                last: None,
            }];
            let mut line = self.nodes[root.0].start() + 1;
            trace!(start = line - 1, "resolving children");

            loop {
                let Some(h) = self.find_heading(line, Direction::Forward) else {
                    while let Some(frame) = frames.pop() {
                        self.close_frame(frame, None);
                    }
                    return;
                };
                let h_level = self.nodes[h.0].level();

                loop {
                    let Some(top) = frames.last_mut() else {
                        return;
                    };
                    if h_level > top.level {
                        // Direct child, or a deeper jump folded in as one.
                        self.nodes[h.0].parent.settle(Some(top.id));
                        match top.last {
                            Some(prev) => {
                                self.nodes[prev.0].next_sibling.settle(Some(h));
                                self.nodes[h.0].previous_sibling.settle(Some(prev));
                            }
                            None => {
                                top.first = Some(h);
                                self.nodes[h.0].previous_sibling.settle(None);
                            }
                        }
                        top.last = Some(h);
                        let parent_level = top.level;
                        frames.push(Frame {
                            id: h,
                            level: h_level,
                            parent_level: Some(Some(parent_level)),
                            first: None,
                            last: None,
                        });
                        break;
                    }

                    let Some(frame) = frames.pop() else {
                        return;
                    };
                    let parent_level = match frame.parent_level {
                        Some(level) => level,
                        None => self.parent(frame.id).map(|p| self.nodes[p.0].level()),
                    };
                    let closes_as_sibling =
                        h_level == frame.level || parent_level.is_none_or(|pl| pl < h_level);
                    self.close_frame(frame, closes_as_sibling.then_some(h));
                }

                line = self.nodes[h.0].start() + 1;
            }
        }

        fn close_frame(&mut self, frame: Frame, sibling: Option<HeadingId>) {
            let node = &mut self.nodes[frame.id.0];
            node.first_child.settle(frame.first);
            node.last_child.settle(frame.last);
            if let Some(last) = frame.last {
                self.nodes[last.0].next_sibling.settle(None);
            }
            match sibling {
                Some(s) => self.link_siblings(frame.id, s),
                None => self.nodes[frame.id.0].next_sibling.settle(None),
            }
        }
    }

    /// Lazy, forward-only iterator over a document's headings.
    pub struct Headings<'d, L, F> {
        document: &'d mut Document<L, F>,
        next_line: Option<usize>,
    }

    impl<L: LineSequence, F: HeadingFactory> Iterator for Headings<'_, L, F> {
        type Item = HeadingId;

        fn next(&mut self) -> Option<HeadingId> {
            let line = self.next_line.take()?;
            let id = self.document.find_heading(line, Direction::Forward)?;
            self.next_line = Some(self.document.nodes[id.0].start() + 1);
            Some(id)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn doc(lines: &[&str]) -> Document<Vec<String>> {
            Document::new(lines.iter().map(|s| s.to_string()).collect())
        }

        fn at(d: &mut Document<Vec<String>>, line: usize) -> HeadingId {
            d.heading_at(line).expect("heading line")
        }

        #[test]
        fn basic_tree_scenario() {
            let mut d = doc(&["* A", "** B", "** C", "* D"]);
            let (a, b, c, dd) = (at(&mut d, 0), at(&mut d, 1), at(&mut d, 2), at(&mut d, 3));
            let levels: Vec<_> = [a, b, c, dd].iter().map(|&h| d.heading(h).level()).collect();
            assert_eq!(levels, vec![1, 2, 2, 1]);

            assert_eq!(d.first_child(a), Some(b));
            assert_eq!(d.next_sibling(b), Some(c));
            assert_eq!(d.parent(c), Some(a));
            assert_eq!(d.next_sibling(a), Some(dd));
            assert_eq!(d.parent(dd), None);
            assert_eq!(d.end(a), 0);
            // Whole-subtree end: the line before D.
            assert_eq!(d.end_of_last_child(a), 2);
            assert_eq!(d.end(c), 2);
            assert_eq!(d.end(dd), 3);
            assert_eq!(d.children(a), vec![b, c]);
            assert_eq!(d.last_child(a), Some(c));
        }

        #[test]
        fn children_pass_links_the_whole_subtree() {
            let mut d = doc(&["* A", "** B", "*** B1", "** C", "* D"]);
            let a = at(&mut d, 0);
            assert_eq!(d.first_child(a).map(|h| d.heading(h).start()), Some(1));

            let b1 = at(&mut d, 2);
            let c = at(&mut d, 3);
            assert_eq!(d.heading(b1).parent().found().map(|p| d.heading(p).start()), Some(1));
            assert_eq!(d.heading(b1).next_sibling(), Slot::Absent);
            assert_eq!(d.heading(c).parent(), Slot::Found(a));
            assert!(d.heading(c).previous_sibling().is_resolved());
        }

        #[test]
        fn malformed_level_jump_is_folded_in() {
            let mut d = doc(&["* A", "*** C", "* D"]);
            let (a, c, dd) = (at(&mut d, 0), at(&mut d, 1), at(&mut d, 2));
            assert_eq!(d.heading(c).level(), 3);
            assert_eq!(d.parent(c), Some(a));
            assert_eq!(d.next_sibling(a), Some(dd));
            assert_eq!(d.first_child(a), Some(c));
            assert_eq!(d.number_of_parents(c), 1);
        }

        #[test]
        fn shallower_heading_after_deep_jump_is_a_sibling() {
            let mut d = doc(&["* A", "*** C", "** D", "* E"]);
            let (a, c, dd) = (at(&mut d, 0), at(&mut d, 1), at(&mut d, 2));
            assert_eq!(d.previous_sibling(dd), Some(c));
            assert_eq!(d.next_sibling(c), Some(dd));
            assert_eq!(d.parent(dd), Some(a));
            assert_eq!(d.children(a), vec![c, dd]);
        }

        fn child_starts(d: &mut Document<Vec<String>>, id: HeadingId) -> Vec<usize> {
            let children = d.children(id);
            children.iter().map(|&c| d.heading(c).start()).collect()
        }

        fn next_starts(d: &mut Document<Vec<String>>) -> Vec<Option<usize>> {
            let ids: Vec<_> = d.headings().collect();
            ids.into_iter()
                .map(|id| d.next_sibling(id).map(|n| d.heading(n).start()))
                .collect()
        }

        #[test]
        fn tree_does_not_depend_on_query_order() {
            let lines = ["* A", "**** Z", "*** Y", "** C"];

            let mut forward = doc(&lines);
            let a = at(&mut forward, 0);
            assert_eq!(child_starts(&mut forward, a), vec![1, 2, 3]);

            let mut backward = doc(&lines);
            let c = at(&mut backward, 3);
            let y = backward.previous_sibling(c).expect("sibling");
            assert_eq!(backward.heading(y).start(), 2);
            let a = at(&mut backward, 0);
            assert_eq!(child_starts(&mut backward, a), vec![1, 2, 3]);

            assert_eq!(next_starts(&mut forward), next_starts(&mut backward));
            assert_eq!(
                next_starts(&mut backward),
                vec![None, Some(2), Some(3), None]
            );
        }

        #[test]
        fn latest_of_equal_deep_headings_is_the_sibling() {
            let lines = ["* A", "*** X1", "*** X2", "** C"];
            let mut d = doc(&lines);
            let c = at(&mut d, 3);
            let prev = d.previous_sibling(c).expect("sibling");
            assert_eq!(d.heading(prev).start(), 2);
            let a = d.parent(c).expect("parent");
            let first = d.heading(a).first_child().found().expect("first child");
            assert_eq!(d.heading(first).start(), 1);
            assert_eq!(child_starts(&mut d, a), vec![1, 2, 3]);

            let mut fresh = doc(&lines);
            let a = at(&mut fresh, 0);
            assert_eq!(child_starts(&mut fresh, a), vec![1, 2, 3]);
        }

        #[test]
        fn siblings_are_symmetric() {
            let lines = ["* A", "text", "** B", "** C", "*** x", "** D", "* E"];
            let mut d = doc(&lines);
            let ids: Vec<_> = d.headings().collect();
            for &id in &ids {
                if let Some(next) = d.next_sibling(id) {
                    assert_eq!(d.previous_sibling(next), Some(id));
                }
            }

            let mut fresh = doc(&lines);
            let ids: Vec<_> = fresh.headings().collect();
            for &id in &ids {
                if let Some(prev) = fresh.previous_sibling(id) {
                    assert_eq!(fresh.next_sibling(prev), Some(id));
                }
            }
        }

        #[test]
        fn previous_sibling_backfills_parent() {
            let mut d = doc(&["* A", "** B", "** C"]);
            let c = at(&mut d, 2);
            let b = d.previous_sibling(c).expect("sibling");
            assert_eq!(d.heading(b).start(), 1);
            assert_eq!(d.previous_sibling(b), None);
            let a = d.heading(b).parent().found().expect("parent filled");
            assert_eq!(d.heading(a).start(), 0);
            assert_eq!(d.heading(a).first_child(), Slot::Found(b));
            assert_eq!(d.parent(c), Some(a));
        }

        #[test]
        fn absent_results_are_cached() {
            let mut d = doc(&["* Only"]);
            let only = at(&mut d, 0);
            assert_eq!(d.heading(only).parent(), Slot::Unsearched);
            assert_eq!(d.heading(only).cached_end(), None);
            assert_eq!(d.parent(only), None);
            assert_eq!(d.heading(only).parent(), Slot::Absent);
            assert_eq!(d.next_sibling(only), None);
            assert_eq!(d.heading(only).next_sibling(), Slot::Absent);
            assert_eq!(d.end(only), 0);
            assert_eq!(d.heading(only).cached_end(), Some(0));
        }

        #[test]
        fn end_of_childless_heading() {
            let mut d = doc(&["* A", "body", "* B", "more", "more"]);
            let a = at(&mut d, 0);
            let b = at(&mut d, 2);
            assert_eq!(d.end(a), 1);
            assert_eq!(d.end(b), 4);
            assert_eq!(d.end_line_number(b), 5);
        }

        #[test]
        fn search_clamps_to_the_buffer() {
            let mut d = doc(&["intro", "* A", "body", "** B"]);
            assert_eq!(d.find_heading(10, Direction::Forward), None);
            assert_eq!(d.find_heading(4, Direction::Backward), None);
            let a = d.find_heading(0, Direction::Forward).expect("heading");
            assert_eq!(d.heading(a).start(), 1);
            assert_eq!(d.find_heading(0, Direction::Backward), None);
            assert_eq!(d.find_heading(2, Direction::Backward), Some(a));
        }

        #[test]
        fn cursor_queries() {
            let mut d = doc(&["* A", "body", "** B", "body", "* C"]);
            let b = d.current_heading(Cursor::new(4)).expect("current");
            assert_eq!(d.heading(b).start(), 2);
            assert_eq!(d.current_heading(Cursor::new(3)), Some(b));
            assert_eq!(d.current_heading(Cursor::new(0)), None);

            let c = d.next_heading(Cursor::new(3)).expect("next");
            assert_eq!(d.heading(c).start(), 4);
            assert_eq!(d.next_heading(Cursor::new(5)), None);

            let a = d.previous_heading(Cursor::new(4)).expect("previous");
            assert_eq!(d.heading(a).start(), 0);
            assert_eq!(d.previous_heading(Cursor::new(2)), None);
        }

        #[test]
        fn headings_iterates_in_line_order() {
            let mut d = doc(&["x", "* A", "** B", "y", "* C"]);
            let ids: Vec<_> = d.headings().collect();
            let starts: Vec<_> = ids.iter().map(|&id| d.heading(id).start()).collect();
            assert_eq!(starts, vec![1, 2, 4]);
            assert_eq!(doc(&["no", "headings"]).headings().count(), 0);
        }

        #[test]
        fn heading_at_rejects_other_lines() {
            let mut d = doc(&["* A", "body"]);
            assert!(matches!(
                d.heading_at(1),
                Err(OutlineError::NotAHeading { line: 1 })
            ));
            assert!(matches!(
                d.heading_at(5),
                Err(OutlineError::LineOutOfRange { line: 5, len: 2 })
            ));
            assert_eq!(d.heading_at(0).ok(), d.find_heading(0, Direction::Forward));
        }

        #[test]
        fn tag_write_scenario() {
            let settings = Settings {
                tags_column: 20,
                tab_stop: 4,
                ..Settings::default()
            };
            let mut d = doc(&["* Do thing", "body"]).with_settings(settings);
            let h = at(&mut d, 0);
            assert!(d.tags(h).is_empty());

            d.set_tags(h, &["work", "home"]).expect("write");
            let line = d.lines()[0].clone();
            assert!(line.ends_with(" :work:home:"));
            assert_eq!(d.tags(h), ["work", "home"]);

            let mut reread = Document::new(d.into_lines());
            let h = at(&mut reread, 0);
            assert_eq!(reread.tags(h), ["work", "home"]);

            reread.set_tags::<&str>(h, &[]).expect("clear");
            assert_eq!(reread.lines()[0], "* Do thing");
            assert!(reread.tags(h).is_empty());
        }

        #[test]
        fn tag_rewrite_replaces_previous_group() {
            let mut d = doc(&["** Title\t\t:old:"]);
            let h = at(&mut d, 0);
            assert_eq!(d.tags(h), ["old"]);
            d.set_tags(h, &["new"]).expect("write");
            assert_eq!(d.text(h).map(strip_tags), Some("Title"));
            assert_eq!(parse_tags(d.text(h).unwrap_or_default()), ["new"]);
        }

        #[test]
        fn custom_marker_factory() {
            let lines: Vec<String> = ["# A", "## B", "* not"].iter().map(|s| s.to_string()).collect();
            let mut d = Document::with_factory(lines, Marker('#'));
            let a = d.find_heading(0, Direction::Forward).expect("a");
            let b = d.first_child(a).expect("b");
            assert_eq!(d.heading(b).level(), 2);
            assert_eq!(d.end(b), 2);
            d.set_tags(a, &["t"]).expect("write");
            assert!(d.lines()[0].starts_with("# A"));
        }

        #[test]
        fn todo_state_is_stored() {
            let mut d = doc(&["* TODO thing"]);
            let h = at(&mut d, 0);
            assert_eq!(d.todo(h), None);
            d.set_todo(h, Some("DONE".into()));
            assert_eq!(d.todo(h), Some("DONE"));
        }

        #[test]
        fn invalidate_forgets_cached_relations() {
            let mut d = doc(&["* A", "** B"]);
            let a = at(&mut d, 0);
            assert!(d.has_children(a));
            d.invalidate();
            let a = at(&mut d, 0);
            assert_eq!(d.heading(a).first_child(), Slot::Unsearched);
        }
    }
}

pub mod date {
    //! Org date literals such as `<2011-08-29 Mon>`.

    use crate::core::OutlineError;
    use chrono::{Datelike, NaiveDate};
    use nom::{
        IResult,
        branch::alt,
        bytes::complete::take_while_m_n,
        character::complete::{char, satisfy},
        combinator::{map, map_res, recognize},
        error::VerboseError,
        sequence::{delimited, pair, terminated, tuple},
    };
    use serde_with::{DeserializeFromStr, SerializeDisplay};
    use std::{fmt, str::FromStr};

    /// Calendar date rendered as active (`<...>`) or inactive (`[...]`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
    pub struct OrgDate {
        date: NaiveDate,
        active: bool,
    }

    impl OrgDate {
        pub fn new(active: bool, year: i32, month: u32, day: u32) -> Option<Self> {
            NaiveDate::from_ymd_opt(year, month, day).map(|date| Self::from_date(date, active))
        }

        pub fn from_date(date: NaiveDate, active: bool) -> Self {
            Self { date, active }
        }

        pub fn date(&self) -> NaiveDate {
            self.date
        }

        pub fn is_active(&self) -> bool {
            self.active
        }

        pub fn year(&self) -> i32 {
            self.date.year()
        }

        pub fn month(&self) -> u32 {
            self.date.month()
        }

        pub fn day(&self) -> u32 {
            self.date.day()
        }
    }

    impl fmt::Display for OrgDate {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let (open, close) = if self.active { ('<', '>') } else { ('[', ']') };
            write!(f, "{open}{}{close}", self.date.format("%Y-%m-%d %a"))
        }
    }

    impl FromStr for OrgDate {
        type Err = OutlineError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let invalid = || OutlineError::InvalidDate(s.to_string());
            let (rest, (active, (y, m, d))) = alt((
                map(literal('<', '>'), |f| (true, f)),
                map(literal('[', ']'), |f| (false, f)),
            ))(s.trim())
            .map_err(|_| invalid())?;
            if !rest.is_empty() {
                return Err(invalid());
            }
            Self::new(active, y, m, d).ok_or_else(invalid)
        }
    }

    type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

    fn digits(n: usize) -> impl Fn(&str) -> PResult<'_, &str> {
        move |i: &str| take_while_m_n(n, n, |c: char| c.is_ascii_digit())(i)
    }

    fn date_fields(i: &str) -> PResult<'_, (i32, u32, u32)> {
        let (i, (y, _, m, _, d)) = tuple((
            map_res(digits(4), |s: &str| s.parse::<i32>()),
            char('-'),
            map_res(digits(2), |s: &str| s.parse::<u32>()),
            char('-'),
            map_res(digits(2), |s: &str| s.parse::<u32>()),
        ))(i)?;
        Ok((i, (y, m, d)))
    }

    // Capitalized three-letter day name; not checked against the date.
    fn weekday(i: &str) -> PResult<'_, &str> {
        recognize(pair(
            satisfy(|c: char| c.is_ascii_uppercase()),
            take_while_m_n(2, 2, |c: char| c.is_alphanumeric() || c == '_'),
        ))(i)
    }

    fn literal(open: char, close: char) -> impl Fn(&str) -> PResult<'_, (i32, u32, u32)> {
        move |i: &str| {
            delimited(
                char(open),
                terminated(date_fields, pair(char(' '), weekday)),
                char(close),
            )(i)
        }
    }

    /// First active date literal in `text`.
    ///
    /// A literal whose fields do not form a real date yields `None`; later literals are
    /// not considered.
    pub fn find_date(text: &str) -> Option<OrgDate> {
        text.match_indices('<').find_map(|(idx, _)| {
            literal('<', '>')(&text[idx..])
                .ok()
                .map(|(_, (y, m, d))| OrgDate::new(true, y, m, d))
        })?
    }

    /// Date from the first line that carries one.
    pub fn find_date_in<'a, I>(lines: I) -> Option<OrgDate>
    where
        I: IntoIterator<Item = &'a str>,
    {
        lines.into_iter().find_map(find_date)
    }

}

pub mod projectors {
    pub mod outline_projector {
        //! Walk the lazily resolved tree into an owned, serializable forest.

        use crate::core::{Direction, HeadingId};
        use crate::document::Document;
        use crate::identify::HeadingFactory;
        use crate::lines::LineSequence;
        use crate::tags::strip_tags;
        use serde::{Deserialize, Serialize};

        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        pub struct OutlineNode {
            pub level: usize,
            /// 0-based start line.
            pub start: usize,
            /// Last line of the heading's own body.
            pub end: usize,
            /// Last line including descendants.
            pub subtree_end: usize,
            pub title: String,
            #[serde(default)]
            pub tags: Vec<String>,
            #[serde(default)]
            pub children: Vec<OutlineNode>,
        }

        fn node<L, F>(doc: &mut Document<L, F>, id: HeadingId) -> OutlineNode
        where
            L: LineSequence,
            F: HeadingFactory,
        {
            OutlineNode {
                level: doc.heading(id).level(),
                start: doc.heading(id).start(),
                end: doc.end(id),
                subtree_end: doc.end_of_last_child(id),
                title: strip_tags(doc.text(id).unwrap_or_default()).to_string(),
                tags: doc.tags(id).to_vec(),
                children: vec![],
            }
        }

        /// Top-level headings with their descendants, in line order.
        pub fn project<L, F>(doc: &mut Document<L, F>) -> Vec<OutlineNode>
        where
            L: LineSequence,
            F: HeadingFactory,
        {
            let mut roots = Vec::new();
            let mut next = doc.find_heading(0, Direction::Forward);
            while let Some(id) = next {
                roots.push(id);
                next = doc.next_sibling(id);
            }

            let mut forest = Vec::new();
            for root in roots {
                let children = doc.children(root).into_iter();
                let mut stack = vec![(node(doc, root), children)];
                while let Some((_, pending)) = stack.last_mut() {
                    if let Some(child) = pending.next() {
                        let entry = (node(doc, child), doc.children(child).into_iter());
                        stack.push(entry);
                        continue;
                    }
                    let Some((done, _)) = stack.pop() else { break };
                    match stack.last_mut() {
                        Some((parent, _)) => parent.children.push(done),
                        None => forest.push(done),
                    }
                }
            }
            forest
        }

    }
}

pub use crate::core::{Cursor, Direction, HeadingId, OutlineError, Slot};
pub use date::{OrgDate, find_date, find_date_in};
pub use document::Document;
pub use heading::Heading;
pub use identify::{HeadingFactory, Marker, identify};
pub use lines::{Buffer, LineSequence};
pub use projectors::outline_projector::{OutlineNode, project};
pub use settings::Settings;
