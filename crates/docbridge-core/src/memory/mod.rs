//! In-process reference document.
//!
//! `MemoryDocument` behaves like a live word-processing body: ranges handed
//! out are tracked and shift as text is inserted or removed, characters carry
//! direct formatting on top of paragraph and character styles, and tables and
//! pictures sit in the text as object anchors. The command-line front end and
//! the test suites run the bridge against it.

mod format;
mod pattern;
mod table;

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::error::{ErrorKind, HostError, HostResult};
use crate::host::{
    CellRect, CharProperty, DocumentHost, Location, ParagraphProperty, PictureSpec, RangeRef,
    SearchOptions, StyleCategory, StyleInfo, TableRef, TableSeed, TableShape, TableStyling,
};

pub use format::{builtin_styles, CharFormat, ParagraphFormat, StyleDef, BASELINE_STYLE};
pub use table::{TableFlags, TableModel};

const OBJECT_ANCHOR: char = '\u{FFFC}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    end: usize,
}

impl Span {
    fn len(&self) -> usize {
        self.end - self.start
    }

    /// Position of this span after `start..end` was replaced by `inserted`
    /// characters. Text inserted exactly at a span's start lands before it;
    /// text inserted exactly at its end lands after it.
    fn shifted(self, start: usize, end: usize, inserted: usize) -> Span {
        let removed = end - start;
        let new_start = if self.start < start {
            self.start
        } else if self.start >= end {
            self.start - removed + inserted
        } else {
            start
        };
        let new_end = if self.end <= start {
            self.end
        } else if self.end >= end {
            self.end - removed + inserted
        } else {
            start + inserted
        };
        Span {
            start: new_start,
            end: new_end.max(new_start),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Embedded {
    Picture(u64),
    Table(u64),
}

#[derive(Debug, Clone)]
struct Glyph {
    ch: char,
    format: CharFormat,
    char_style: Option<String>,
    object: Option<Embedded>,
}

#[derive(Debug, Clone)]
struct Paragraph {
    style: String,
    format: ParagraphFormat,
}

impl Paragraph {
    fn baseline() -> Self {
        Self {
            style: BASELINE_STYLE.to_string(),
            format: ParagraphFormat::default(),
        }
    }
}

/// A stored inline picture.
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub base64: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub lock_aspect: bool,
    pub alt_text: Option<String>,
}

/// Failure to report from the next [`DocumentHost::sync`] call.
#[derive(Debug, Clone)]
pub enum SyncFault {
    Error(HostError),
    Panic(String),
}

#[derive(Debug)]
pub struct MemoryDocument {
    glyphs: Vec<Glyph>,
    paragraphs: Vec<Paragraph>,
    styles: Vec<StyleDef>,
    ranges: HashMap<u64, Span>,
    tables: HashMap<u64, TableModel>,
    pictures: HashMap<u64, Picture>,
    selection: Span,
    next_id: u64,
    protected: bool,
    /// Tracked ranges whose text cannot be edited.
    locked: Vec<u64>,
    disabled_properties: HashSet<&'static str>,
    pending: usize,
    commits: usize,
    sync_fault: Option<SyncFault>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            glyphs: Vec::new(),
            paragraphs: vec![Paragraph::baseline()],
            styles: builtin_styles(),
            ranges: HashMap::new(),
            tables: HashMap::new(),
            pictures: HashMap::new(),
            selection: Span { start: 0, end: 0 },
            next_id: 1,
            protected: false,
            locked: Vec::new(),
            disabled_properties: HashSet::new(),
            pending: 0,
            commits: 0,
            sync_fault: None,
        }
    }

    /// Builds a document with one paragraph per line of `text`.
    pub fn from_text(text: &str) -> Self {
        let mut document = Self::new();
        let normalized = text.replace("\r\n", "\n");
        let body = normalized.strip_suffix('\n').unwrap_or(&normalized);
        document.glyphs = body
            .chars()
            .map(|ch| Glyph {
                ch,
                format: CharFormat::default(),
                char_style: None,
                object: None,
            })
            .collect();
        let breaks = document.glyphs.iter().filter(|g| g.ch == '\n').count();
        document.paragraphs = vec![Paragraph::baseline(); breaks + 1];
        document
    }

    pub fn add_style(&mut self, style: StyleDef) {
        self.styles.retain(|existing| existing.name != style.name);
        self.styles.push(style);
    }

    /// Moves the selection to the character offsets `start..end`.
    pub fn set_selection(&mut self, start: usize, end: usize) -> HostResult<()> {
        if start > end || end > self.glyphs.len() {
            return Err(HostError::invalid(format!(
                "selection {start}..{end} is outside a body of {} characters",
                self.glyphs.len()
            )));
        }
        self.selection = Span { start, end };
        Ok(())
    }

    /// Makes every further mutation fail with `Permission`.
    pub fn set_protected(&mut self, protected: bool) {
        self.protected = protected;
    }

    /// Locks the characters `start..end` the way a locked content control
    /// does: text edits touching them fail with `Permission`.
    pub fn lock_text(&mut self, start: usize, end: usize) -> HostResult<()> {
        if start >= end || end > self.glyphs.len() {
            return Err(HostError::invalid(format!(
                "cannot lock {start}..{end} in a body of {} characters",
                self.glyphs.len()
            )));
        }
        let locked = self.track(Span { start, end });
        self.locked.push(locked.0);
        Ok(())
    }

    /// Makes `set_char_property` / `set_paragraph_property` reject a property by name.
    pub fn disable_property(&mut self, name: &'static str) {
        self.disabled_properties.insert(name);
    }

    pub fn inject_sync_fault(&mut self, fault: SyncFault) {
        self.sync_fault = Some(fault);
    }

    /// Body text with object anchors as U+FFFC.
    pub fn text(&self) -> String {
        self.glyphs.iter().map(|g| g.ch).collect()
    }

    /// Body text with pictures and tables rendered inline.
    pub fn plain_text(&self) -> String {
        let mut out = String::with_capacity(self.glyphs.len());
        for glyph in &self.glyphs {
            match glyph.object {
                Some(Embedded::Picture(id)) => {
                    let alt = self
                        .pictures
                        .get(&id)
                        .and_then(|p| p.alt_text.clone())
                        .unwrap_or_default();
                    out.push_str(&format!("[picture: {alt}]"));
                }
                Some(Embedded::Table(id)) => {
                    if let Some(table) = self.tables.get(&id) {
                        out.push_str(&table.render());
                    }
                }
                None => out.push(glyph.ch),
            }
        }
        out
    }

    pub fn paragraph_count(&self) -> usize {
        self.paragraphs.len()
    }

    pub fn paragraph_texts(&self) -> Vec<String> {
        self.text().split('\n').map(str::to_string).collect()
    }

    pub fn paragraph_style(&self, index: usize) -> Option<&str> {
        self.paragraphs.get(index).map(|p| p.style.as_str())
    }

    /// Paragraph formatting with style values filled in.
    pub fn paragraph_format(&self, index: usize) -> Option<ParagraphFormat> {
        let paragraph = self.paragraphs.get(index)?;
        let style = self.style(&paragraph.style).map(|s| s.paragraph.clone());
        Some(paragraph.format.or(&style.unwrap_or_default()))
    }

    /// Effective formatting shared by every character of the range; fields
    /// that differ between characters are `None`.
    pub fn range_format(&self, range: RangeRef) -> HostResult<CharFormat> {
        let span = self.span(range)?;
        let mut merged: Option<CharFormat> = None;
        let mut paragraph = self.paragraph_index_at(span.start);
        for offset in span.start..span.end {
            let glyph = &self.glyphs[offset];
            if glyph.ch == '\n' {
                paragraph += 1;
                continue;
            }
            let effective = self.effective_format(glyph, paragraph);
            merged = Some(match merged {
                Some(current) => current.intersect(&effective),
                None => effective,
            });
        }
        Ok(merged.unwrap_or_default())
    }

    pub fn table_cells(&self, table: TableRef) -> HostResult<Vec<Vec<String>>> {
        Ok(self.table(table)?.cells().to_vec())
    }

    pub fn table_model(&self, table: TableRef) -> HostResult<&TableModel> {
        self.table(table)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn pictures(&self) -> Vec<&Picture> {
        let mut ids: Vec<_> = self.pictures.keys().copied().collect();
        ids.sort_unstable();
        ids.iter().filter_map(|id| self.pictures.get(id)).collect()
    }

    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn pending_mutations(&self) -> usize {
        self.pending
    }

    /// Ranges the document is currently keeping up to date (table anchors included).
    pub fn tracked_range_count(&self) -> usize {
        self.ranges.len()
    }

    fn style(&self, name: &str) -> Option<&StyleDef> {
        self.styles
            .iter()
            .find(|style| style.name.eq_ignore_ascii_case(name))
    }

    fn effective_format(&self, glyph: &Glyph, paragraph: usize) -> CharFormat {
        let mut format = glyph.format.clone();
        if let Some(style) = glyph.char_style.as_deref().and_then(|name| self.style(name)) {
            format = format.or(&style.font);
        }
        if let Some(style) = self
            .paragraphs
            .get(paragraph)
            .and_then(|p| self.style(&p.style))
        {
            format = format.or(&style.font);
        }
        if let Some(style) = self.style(BASELINE_STYLE) {
            format = format.or(&style.font);
        }
        format
    }

    fn ensure_writable(&self) -> HostResult<()> {
        if self.protected {
            return Err(HostError::new(
                ErrorKind::Permission,
                "document is protected against editing",
            ));
        }
        Ok(())
    }

    fn span(&self, range: RangeRef) -> HostResult<Span> {
        self.ranges
            .get(&range.0)
            .copied()
            .ok_or_else(|| HostError::not_found(format!("range {} is no longer tracked", range.0)))
    }

    fn table(&self, table: TableRef) -> HostResult<&TableModel> {
        self.tables
            .get(&table.0)
            .ok_or_else(|| HostError::not_found(format!("table {} no longer exists", table.0)))
    }

    fn table_mut(&mut self, table: TableRef) -> HostResult<&mut TableModel> {
        self.ensure_writable()?;
        self.pending += 1;
        self.tables
            .get_mut(&table.0)
            .ok_or_else(|| HostError::not_found(format!("table {} no longer exists", table.0)))
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn track(&mut self, span: Span) -> RangeRef {
        let id = self.allocate_id();
        self.ranges.insert(id, span);
        RangeRef(id)
    }

    fn paragraph_index_at(&self, offset: usize) -> usize {
        self.glyphs[..offset.min(self.glyphs.len())]
            .iter()
            .filter(|g| g.ch == '\n')
            .count()
    }

    fn paragraph_start(&self, offset: usize) -> usize {
        self.glyphs[..offset]
            .iter()
            .rposition(|g| g.ch == '\n')
            .map(|idx| idx + 1)
            .unwrap_or(0)
    }

    fn paragraph_end(&self, offset: usize) -> usize {
        self.glyphs[offset..]
            .iter()
            .position(|g| g.ch == '\n')
            .map(|idx| offset + idx)
            .unwrap_or(self.glyphs.len())
    }

    /// Paragraph spans (without their break) overlapping `span`, with indexes.
    fn paragraph_spans(&self, span: Span) -> Vec<(usize, Span)> {
        let first = self.paragraph_index_at(span.start);
        let last = if span.end > span.start {
            self.paragraph_index_at(span.end - 1)
        } else {
            first
        };
        let mut spans = Vec::new();
        let mut start = self.paragraph_start(span.start);
        for index in first..=last {
            let end = self.paragraph_end(start);
            spans.push((index, Span { start, end }));
            start = end + 1;
        }
        spans
    }

    fn make_glyphs(&self, text: &str, template_at: usize) -> Vec<Glyph> {
        let template = self.template_glyph(template_at);
        text.chars()
            .map(|ch| Glyph {
                ch,
                format: template.format.clone(),
                char_style: template.char_style.clone(),
                object: None,
            })
            .collect()
    }

    fn template_glyph(&self, offset: usize) -> Glyph {
        let before = offset
            .checked_sub(1)
            .and_then(|idx| self.glyphs.get(idx))
            .filter(|g| g.ch != '\n' && g.object.is_none());
        let after = self
            .glyphs
            .get(offset)
            .filter(|g| g.ch != '\n' && g.object.is_none());
        before
            .or(after)
            .cloned()
            .map(|g| Glyph { object: None, ..g })
            .unwrap_or(Glyph {
                ch: ' ',
                format: CharFormat::default(),
                char_style: None,
                object: None,
            })
    }

    /// Replaces `start..end` with `inserted`, keeping paragraphs, embedded
    /// objects, tracked ranges and the selection consistent.
    fn splice(&mut self, start: usize, end: usize, inserted: Vec<Glyph>) -> Span {
        let paragraph = self.paragraph_index_at(start);
        let removed_breaks = self.glyphs[start..end]
            .iter()
            .filter(|g| g.ch == '\n')
            .count();
        let added_breaks = inserted.iter().filter(|g| g.ch == '\n').count();
        let inserted_len = inserted.len();

        let removed: Vec<Glyph> = self.glyphs.splice(start..end, inserted).collect();
        for glyph in removed {
            match glyph.object {
                Some(Embedded::Picture(id)) => {
                    self.pictures.remove(&id);
                }
                Some(Embedded::Table(id)) => {
                    if let Some(table) = self.tables.remove(&id) {
                        self.ranges.remove(&table.anchor.0);
                    }
                }
                None => {}
            }
        }

        if removed_breaks > 0 {
            self.paragraphs
                .drain(paragraph + 1..=paragraph + removed_breaks);
        }
        if added_breaks > 0 {
            let template = self.paragraphs[paragraph].clone();
            for _ in 0..added_breaks {
                self.paragraphs.insert(paragraph + 1, template.clone());
            }
        }

        for span in self.ranges.values_mut() {
            *span = span.shifted(start, end, inserted_len);
        }
        self.selection = self.selection.shifted(start, end, inserted_len);
        self.pending += 1;
        trace!(start, end, inserted_len, "memory document spliced");

        Span {
            start,
            end: start + inserted_len,
        }
    }

    /// Inserts `glyphs` relative to `target` following [`Location`] rules and
    /// returns the span they occupy.
    fn insert_at(&mut self, at: RangeRef, glyphs: Vec<Glyph>, location: Location) -> HostResult<Span> {
        let target = self.span(at)?;
        let (start, end) = match location {
            Location::Start | Location::Before => (target.start, target.start),
            Location::End | Location::After => (target.end, target.end),
            Location::Replace => (target.start, target.end),
        };
        self.ensure_unlocked(start, end)?;
        let count = glyphs.len();
        let inserted = self.splice(start, end, glyphs);
        if matches!(location, Location::Start | Location::End) {
            self.ranges.insert(
                at.0,
                Span {
                    start: target.start,
                    end: target.end + count,
                },
            );
        }
        Ok(inserted)
    }

    /// Inserts `glyphs` as a paragraph of their own before or after the
    /// paragraphs spanned by `target`.
    fn insert_block(&mut self, at: RangeRef, mut glyphs: Vec<Glyph>, location: Location) -> HostResult<Span> {
        let target = self.span(at)?;
        let break_glyph = Glyph {
            ch: '\n',
            format: CharFormat::default(),
            char_style: None,
            object: None,
        };
        let content_len = glyphs.len();
        if location.is_leading() {
            let position = self.paragraph_start(target.start);
            glyphs.push(break_glyph);
            let inserted = self.splice(position, position, glyphs);
            Ok(Span {
                start: inserted.start,
                end: inserted.start + content_len,
            })
        } else {
            let anchor = if target.end > target.start && self.glyphs[target.end - 1].ch == '\n' {
                target.end - 1
            } else {
                target.end
            };
            let position = self.paragraph_end(anchor);
            glyphs.insert(0, break_glyph);
            let inserted = self.splice(position, position, glyphs);
            Ok(Span {
                start: inserted.start + 1,
                end: inserted.end,
            })
        }
    }

    fn object_glyph(&self, object: Embedded) -> Glyph {
        Glyph {
            ch: OBJECT_ANCHOR,
            format: CharFormat::default(),
            char_style: None,
            object: Some(object),
        }
    }

    fn ensure_unlocked(&self, start: usize, end: usize) -> HostResult<()> {
        let touches = |span: &Span| {
            if start == end {
                span.start < start && start < span.end
            } else {
                start < span.end && span.start < end
            }
        };
        let blocked = self
            .locked
            .iter()
            .filter_map(|id| self.ranges.get(id))
            .any(touches);
        if blocked {
            return Err(HostError::new(
                ErrorKind::Permission,
                format!("text at {start}..{end} is locked"),
            ));
        }
        Ok(())
    }

    fn ensure_property_enabled(&self, name: &'static str) -> HostResult<()> {
        if self.disabled_properties.contains(name) {
            return Err(HostError::unsupported(format!(
                "property '{name}' is not supported by this document"
            )));
        }
        Ok(())
    }
}

impl DocumentHost for MemoryDocument {
    fn body(&mut self) -> HostResult<RangeRef> {
        let span = Span {
            start: 0,
            end: self.glyphs.len(),
        };
        Ok(self.track(span))
    }

    fn selection(&mut self) -> HostResult<RangeRef> {
        let span = self.selection;
        Ok(self.track(span))
    }

    fn range_text(&self, range: RangeRef) -> HostResult<String> {
        let span = self.span(range)?;
        Ok(self.glyphs[span.start..span.end].iter().map(|g| g.ch).collect())
    }

    fn range_offsets(&self, range: RangeRef) -> Option<(usize, usize)> {
        self.span(range).ok().map(|span| (span.start, span.end))
    }

    fn release_range(&mut self, range: RangeRef) {
        let is_anchor = self.tables.values().any(|table| table.anchor == range);
        if !is_anchor {
            self.ranges.remove(&range.0);
        }
    }

    fn release_table(&mut self, _table: TableRef) {}

    fn search(
        &mut self,
        scope: RangeRef,
        query: &str,
        options: &SearchOptions,
    ) -> HostResult<Vec<RangeRef>> {
        let span = self.span(scope)?;
        let regex = pattern::compile(query, options)?;
        let text: String = self.glyphs[span.start..span.end]
            .iter()
            .map(|g| g.ch)
            .collect();
        let byte_offsets: Vec<usize> = text.char_indices().map(|(byte, _)| byte).collect();
        let to_char = |byte: usize| byte_offsets.partition_point(|&b| b < byte);

        let hits: Vec<Span> = regex
            .find_iter(&text)
            .filter(|m| m.start() < m.end())
            .map(|m| Span {
                start: span.start + to_char(m.start()),
                end: span.start + to_char(m.end()),
            })
            .collect();
        Ok(hits.into_iter().map(|hit| self.track(hit)).collect())
    }

    fn insert_text(&mut self, at: RangeRef, text: &str, location: Location) -> HostResult<RangeRef> {
        self.ensure_writable()?;
        let target = self.span(at)?;
        let template_at = match location {
            Location::End | Location::After => target.end,
            _ => target.start,
        };
        let glyphs = self.make_glyphs(text, template_at);
        let inserted = self.insert_at(at, glyphs, location)?;
        Ok(self.track(inserted))
    }

    fn insert_paragraph(
        &mut self,
        at: RangeRef,
        text: &str,
        location: Location,
    ) -> HostResult<RangeRef> {
        self.ensure_writable()?;
        if location == Location::Replace {
            return Err(HostError::invalid(
                "a new paragraph can only go before or after existing content",
            ));
        }
        let target = self.span(at)?;
        let glyphs = self.make_glyphs(text, target.start);
        let inserted = self.insert_block(at, glyphs, location)?;
        Ok(self.track(inserted))
    }

    fn insert_picture(
        &mut self,
        at: RangeRef,
        picture: &PictureSpec,
        location: Location,
    ) -> HostResult<RangeRef> {
        self.ensure_writable()?;
        self.span(at)?;
        let id = self.allocate_id();
        self.pictures.insert(
            id,
            Picture {
                base64: picture.base64.clone(),
                width: picture.width,
                height: picture.height,
                lock_aspect: picture.lock_aspect,
                alt_text: picture.alt_text.clone(),
            },
        );
        let glyph = self.object_glyph(Embedded::Picture(id));
        let inserted = self.insert_at(at, vec![glyph], location)?;
        Ok(self.track(inserted))
    }

    fn paragraphs(&mut self, range: RangeRef) -> HostResult<Vec<RangeRef>> {
        let span = self.span(range)?;
        let spans = self.paragraph_spans(span);
        Ok(spans.into_iter().map(|(_, span)| self.track(span)).collect())
    }

    fn apply_named_style(&mut self, range: RangeRef, name: &str) -> HostResult<()> {
        self.ensure_writable()?;
        let span = self.span(range)?;
        let style = self
            .style(name)
            .cloned()
            .ok_or_else(|| HostError::not_found(format!("style '{name}' does not exist")))?;

        match style.category {
            StyleCategory::Paragraph => {
                for (index, paragraph_span) in self.paragraph_spans(span) {
                    let paragraph = &mut self.paragraphs[index];
                    paragraph.style = style.name.clone();
                    paragraph.format.clear_defined_by(&style.paragraph);
                    for glyph in &mut self.glyphs[paragraph_span.start..paragraph_span.end] {
                        glyph.format.clear_defined_by(&style.font);
                    }
                }
            }
            StyleCategory::Character => {
                for glyph in &mut self.glyphs[span.start..span.end] {
                    if glyph.ch != '\n' {
                        glyph.char_style = Some(style.name.clone());
                        glyph.format.clear_defined_by(&style.font);
                    }
                }
            }
            StyleCategory::Table => {
                return Err(HostError::invalid(format!(
                    "table style '{}' cannot be applied to text",
                    style.name
                )));
            }
        }
        self.pending += 1;
        Ok(())
    }

    fn reset_formatting(&mut self, range: RangeRef) -> HostResult<()> {
        self.ensure_writable()?;
        let span = self.span(range)?;
        for (index, _) in self.paragraph_spans(span) {
            self.paragraphs[index] = Paragraph::baseline();
        }
        for glyph in &mut self.glyphs[span.start..span.end] {
            glyph.format = CharFormat::default();
            glyph.char_style = None;
        }
        self.pending += 1;
        Ok(())
    }

    fn set_char_property(&mut self, range: RangeRef, property: &CharProperty) -> HostResult<()> {
        self.ensure_writable()?;
        self.ensure_property_enabled(property.name())?;
        let span = self.span(range)?;
        for glyph in &mut self.glyphs[span.start..span.end] {
            if glyph.ch != '\n' {
                glyph.format.set(property);
            }
        }
        self.pending += 1;
        Ok(())
    }

    fn set_paragraph_property(
        &mut self,
        paragraph: RangeRef,
        property: &ParagraphProperty,
    ) -> HostResult<()> {
        self.ensure_writable()?;
        self.ensure_property_enabled(property.name())?;
        let span = self.span(paragraph)?;
        let index = self.paragraph_index_at(span.start);
        self.paragraphs[index].format.set(property);
        if let ParagraphProperty::List(kind) = property {
            if *kind != crate::host::ListKind::None
                && self.paragraphs[index].style == BASELINE_STYLE
            {
                self.paragraphs[index].style = "List Paragraph".to_string();
            }
        }
        self.pending += 1;
        Ok(())
    }

    fn styles(&self) -> HostResult<Vec<StyleInfo>> {
        Ok(self.styles.iter().map(StyleDef::info).collect())
    }

    fn insert_table(
        &mut self,
        at: RangeRef,
        location: Location,
        seed: &TableSeed,
    ) -> HostResult<TableRef> {
        self.ensure_writable()?;
        self.span(at)?;
        let id = self.allocate_id();
        let glyph = self.object_glyph(Embedded::Table(id));
        let inserted = if location == Location::Replace {
            self.insert_at(at, vec![glyph], location)?
        } else {
            self.insert_block(at, vec![glyph], location)?
        };
        let anchor = self.track(inserted);
        self.tables.insert(id, TableModel::new(anchor, seed));
        Ok(TableRef(id))
    }

    fn table_shape(&self, table: TableRef) -> HostResult<TableShape> {
        Ok(self.table(table)?.shape())
    }

    fn insert_table_rows(&mut self, table: TableRef, at: usize, count: usize) -> HostResult<()> {
        self.table_mut(table)?.insert_rows(at, count)
    }

    fn insert_table_columns(
        &mut self,
        table: TableRef,
        at: usize,
        count: usize,
    ) -> HostResult<()> {
        self.table_mut(table)?.insert_columns(at, count)
    }

    fn delete_table_row(&mut self, table: TableRef, index: usize) -> HostResult<()> {
        self.table_mut(table)?.delete_row(index)
    }

    fn delete_table_column(&mut self, table: TableRef, index: usize) -> HostResult<()> {
        self.table_mut(table)?.delete_column(index)
    }

    fn set_cell_text(
        &mut self,
        table: TableRef,
        row: usize,
        column: usize,
        text: &str,
    ) -> HostResult<()> {
        self.table_mut(table)?.set_cell_text(row, column, text)
    }

    fn merge_cells(&mut self, table: TableRef, rect: CellRect) -> HostResult<()> {
        self.table_mut(table)?.merge(rect)
    }

    fn style_table(&mut self, table: TableRef, styling: &TableStyling) -> HostResult<()> {
        if let Some(name) = &styling.style_name {
            match self.style(name) {
                Some(style) if style.category == StyleCategory::Table => {}
                Some(_) => {
                    return Err(HostError::invalid(format!(
                        "style '{name}' is not a table style"
                    )))
                }
                None => {
                    return Err(HostError::not_found(format!(
                        "style '{name}' does not exist"
                    )))
                }
            }
        }
        self.table_mut(table)?.apply_styling(styling);
        Ok(())
    }

    fn sync(&mut self) -> HostResult<()> {
        match self.sync_fault.take() {
            Some(SyncFault::Error(err)) => Err(err),
            Some(SyncFault::Panic(message)) => panic!("{message}"),
            None => {
                self.pending = 0;
                self.commits += 1;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(document: &MemoryDocument, range: RangeRef) -> (usize, usize) {
        document.range_offsets(range).unwrap()
    }

    #[test]
    fn span_shifting_rules() {
        let span = Span { start: 4, end: 8 };
        assert_eq!(span.shifted(4, 4, 2), Span { start: 6, end: 10 });
        assert_eq!(span.shifted(8, 8, 2), span);
        assert_eq!(span.shifted(0, 2, 0), Span { start: 2, end: 6 });
        assert_eq!(span.shifted(4, 8, 1), Span { start: 4, end: 5 });
        assert_eq!(span.shifted(5, 6, 3), Span { start: 4, end: 10 });
        let point = Span { start: 3, end: 3 };
        assert_eq!(point.shifted(3, 3, 2), Span { start: 5, end: 5 });
    }

    #[test]
    fn tracked_ranges_follow_edits() {
        let mut document = MemoryDocument::from_text("hello world");
        let body = document.body().unwrap();
        let hits = document
            .search(body, "world", &SearchOptions::default())
            .unwrap();
        assert_eq!(offsets(&document, hits[0]), (6, 11));

        document.set_selection(0, 0).unwrap();
        let caret = document.selection().unwrap();
        document.insert_text(caret, ">> ", Location::Before).unwrap();
        assert_eq!(document.text(), ">> hello world");
        assert_eq!(document.range_text(hits[0]).unwrap(), "world");
    }

    #[test]
    fn start_and_end_expand_the_target() {
        let mut document = MemoryDocument::from_text("middle");
        let body = document.body().unwrap();
        document.insert_text(body, "<", Location::Start).unwrap();
        document.insert_text(body, ">", Location::End).unwrap();
        assert_eq!(document.range_text(body).unwrap(), "<middle>");
    }

    #[test]
    fn new_paragraphs_split_around_target() {
        let mut document = MemoryDocument::from_text("one\ntwo\nthree");
        let body = document.body().unwrap();
        let hits = document.search(body, "two", &SearchOptions::default()).unwrap();
        let inserted = document
            .insert_paragraph(hits[0], "between", Location::After)
            .unwrap();
        assert_eq!(document.paragraph_texts(), vec!["one", "two", "between", "three"]);
        assert_eq!(document.range_text(inserted).unwrap(), "between");
        assert_eq!(document.paragraph_count(), 4);

        document
            .insert_paragraph(hits[0], "first", Location::Before)
            .unwrap();
        assert_eq!(
            document.paragraph_texts(),
            vec!["one", "first", "two", "between", "three"]
        );
    }

    #[test]
    fn removing_breaks_merges_paragraphs() {
        let mut document = MemoryDocument::from_text("a\nb\nc");
        let body = document.body().unwrap();
        document.insert_text(body, "x", Location::Replace).unwrap();
        assert_eq!(document.text(), "x");
        assert_eq!(document.paragraph_count(), 1);
    }

    #[test]
    fn deleting_table_anchor_drops_table() {
        let mut document = MemoryDocument::from_text("intro");
        let body = document.body().unwrap();
        let table = document
            .insert_table(
                body,
                Location::After,
                &TableSeed {
                    rows: 1,
                    columns: 1,
                    values: vec![vec!["cell".into()]],
                    header_rows: 0,
                },
            )
            .unwrap();
        assert_eq!(document.plain_text(), "intro\ncell");

        let whole = document.body().unwrap();
        document.insert_text(whole, "", Location::Replace).unwrap();
        assert_eq!(document.table_count(), 0);
        assert_eq!(
            document.table_shape(table).unwrap_err().kind,
            ErrorKind::NotFound
        );
    }

    #[test]
    fn protected_document_rejects_mutations() {
        let mut document = MemoryDocument::from_text("locked");
        document.set_protected(true);
        let body = document.body().unwrap();
        let err = document.insert_text(body, "x", Location::End).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Permission);
    }

    #[test]
    fn locked_text_rejects_overlapping_edits() {
        let mut document = MemoryDocument::from_text("keep this part");
        document.lock_text(5, 9).unwrap();
        let hits = {
            let body = document.body().unwrap();
            document
                .search(body, "this", &SearchOptions::default())
                .unwrap()
        };
        let err = document
            .insert_text(hits[0], "that", Location::Replace)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Permission);

        let caret = document.track(Span { start: 5, end: 5 });
        document.insert_text(caret, "all of ", Location::Before).unwrap();
        assert_eq!(document.text(), "keep all of this part");

        let tail = document.track(Span { start: 17, end: 21 });
        document.insert_text(tail, "text", Location::Replace).unwrap();
        assert_eq!(document.text(), "keep all of this text");
        assert_eq!(document.lock_text(3, 99).unwrap_err().kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn paragraph_style_overrides_direct_font_size() {
        let mut document = MemoryDocument::from_text("title");
        document.add_style(StyleDef::paragraph("Big").with_font_size(24.0));
        let body = document.body().unwrap();
        document
            .set_char_property(body, &CharProperty::FontSize(12.0))
            .unwrap();
        assert_eq!(document.range_format(body).unwrap().font_size, Some(12.0));
        document.apply_named_style(body, "Big").unwrap();
        assert_eq!(document.range_format(body).unwrap().font_size, Some(24.0));
    }
}
