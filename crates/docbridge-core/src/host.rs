//! Capability boundary between the bridge and a live word-processing document.
//!
//! The bridge never holds document objects directly. A host hands out
//! [`RangeRef`] and [`TableRef`] keys for objects it keeps current while the
//! document changes underneath them, and every mutation goes through
//! [`DocumentHost`]. Mutations are only considered applied once
//! [`DocumentHost::sync`] has returned successfully.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HostResult;

/// Host-issued key for a tracked text range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RangeRef(pub u64);

/// Host-issued key for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef(pub u64);

/// Where new content lands relative to a target range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// Inside the target, before its first character.
    Start,
    /// Inside the target, after its last character.
    #[default]
    End,
    /// Outside the target, immediately before it.
    Before,
    /// Outside the target, immediately after it.
    After,
    /// In place of the target's content.
    Replace,
}

impl Location {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Before => "before",
            Self::After => "after",
            Self::Replace => "replace",
        }
    }

    /// True when content goes in front of the target.
    pub fn is_leading(self) -> bool {
        matches!(self, Self::Start | Self::Before)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags understood by the host's native search primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub match_case: bool,
    pub match_whole_word: bool,
    pub match_prefix: bool,
    pub match_suffix: bool,
    pub ignore_space: bool,
    pub ignore_punct: bool,
    /// Query is written in the host's wildcard dialect.
    pub match_wildcards: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Centered,
    Right,
    Justified,
}

impl FromStr for Alignment {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "centered" | "center" => Ok(Self::Centered),
            "right" => Ok(Self::Right),
            "justified" | "justify" => Ok(Self::Justified),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Bullet,
    Number,
    None,
}

impl FromStr for ListKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "bullet" | "bulleted" => Ok(Self::Bullet),
            "number" | "numbered" => Ok(Self::Number),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

/// Direct character formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum CharProperty {
    FontName(String),
    FontSize(f64),
    Bold(bool),
    Italic(bool),
    Underline(bool),
    StrikeThrough(bool),
    Color(String),
    HighlightColor(String),
}

impl CharProperty {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FontName(_) => "fontName",
            Self::FontSize(_) => "fontSize",
            Self::Bold(_) => "bold",
            Self::Italic(_) => "italic",
            Self::Underline(_) => "underline",
            Self::StrikeThrough(_) => "strikeThrough",
            Self::Color(_) => "color",
            Self::HighlightColor(_) => "highlightColor",
        }
    }
}

/// Direct paragraph formatting. Applied one paragraph at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum ParagraphProperty {
    Alignment(Alignment),
    LineSpacing(f64),
    SpaceBefore(f64),
    SpaceAfter(f64),
    FirstLineIndent(f64),
    LeftIndent(f64),
    List(ListKind),
}

impl ParagraphProperty {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Alignment(_) => "alignment",
            Self::LineSpacing(_) => "lineSpacing",
            Self::SpaceBefore(_) => "spaceBefore",
            Self::SpaceAfter(_) => "spaceAfter",
            Self::FirstLineIndent(_) => "firstLineIndent",
            Self::LeftIndent(_) => "leftIndent",
            Self::List(_) => "list",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleCategory {
    Paragraph,
    Character,
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleInfo {
    pub name: String,
    pub category: StyleCategory,
    pub built_in: bool,
}

/// Content of a new table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSeed {
    pub rows: usize,
    pub columns: usize,
    pub values: Vec<Vec<String>>,
    pub header_rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableShape {
    pub rows: usize,
    pub columns: usize,
}

/// Inclusive rectangle of table cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

impl CellRect {
    pub fn is_single_cell(&self) -> bool {
        self.top == self.bottom && self.left == self.right
    }
}

/// Table-level style settings; `None` leaves a setting untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TableStyling {
    #[serde(default)]
    pub style_name: Option<String>,
    #[serde(default)]
    pub header_row: Option<bool>,
    #[serde(default)]
    pub banded_rows: Option<bool>,
    #[serde(default)]
    pub banded_columns: Option<bool>,
    #[serde(default)]
    pub first_column: Option<bool>,
    #[serde(default)]
    pub last_column: Option<bool>,
    #[serde(default)]
    pub total_row: Option<bool>,
}

impl TableStyling {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// An inline picture, already encoded for the host.
#[derive(Debug, Clone, PartialEq)]
pub struct PictureSpec {
    pub base64: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub lock_aspect: bool,
    pub alt_text: Option<String>,
}

/// A live document the bridge can address and mutate.
pub trait DocumentHost: Send {
    /// Range covering the whole body.
    fn body(&mut self) -> HostResult<RangeRef>;

    /// Range covering the current selection, captured at call time.
    fn selection(&mut self) -> HostResult<RangeRef>;

    fn range_text(&self, range: RangeRef) -> HostResult<String>;

    /// Character offsets of a range, when the host can report them.
    fn range_offsets(&self, range: RangeRef) -> Option<(usize, usize)>;

    /// Stop keeping a range current. Unknown ranges are ignored.
    fn release_range(&mut self, range: RangeRef);

    /// Stop tracking a table key. The table itself stays in the document.
    fn release_table(&mut self, table: TableRef);

    /// Native search. Hits come back in document order.
    fn search(
        &mut self,
        scope: RangeRef,
        query: &str,
        options: &SearchOptions,
    ) -> HostResult<Vec<RangeRef>>;

    fn insert_text(&mut self, at: RangeRef, text: &str, location: Location) -> HostResult<RangeRef>;

    /// Insert `text` as a paragraph of its own next to the paragraphs spanned by `at`.
    fn insert_paragraph(
        &mut self,
        at: RangeRef,
        text: &str,
        location: Location,
    ) -> HostResult<RangeRef>;

    fn insert_picture(
        &mut self,
        at: RangeRef,
        picture: &PictureSpec,
        location: Location,
    ) -> HostResult<RangeRef>;

    /// One range per paragraph overlapping `range`.
    fn paragraphs(&mut self, range: RangeRef) -> HostResult<Vec<RangeRef>>;

    fn apply_named_style(&mut self, range: RangeRef, name: &str) -> HostResult<()>;

    /// Reset to the baseline paragraph style and clear direct character formatting.
    fn reset_formatting(&mut self, range: RangeRef) -> HostResult<()>;

    fn set_char_property(&mut self, range: RangeRef, property: &CharProperty) -> HostResult<()>;

    fn set_paragraph_property(
        &mut self,
        paragraph: RangeRef,
        property: &ParagraphProperty,
    ) -> HostResult<()>;

    fn styles(&self) -> HostResult<Vec<StyleInfo>>;

    fn insert_table(
        &mut self,
        at: RangeRef,
        location: Location,
        seed: &TableSeed,
    ) -> HostResult<TableRef>;

    fn table_shape(&self, table: TableRef) -> HostResult<TableShape>;

    fn insert_table_rows(&mut self, table: TableRef, at: usize, count: usize) -> HostResult<()>;

    fn insert_table_columns(&mut self, table: TableRef, at: usize, count: usize)
        -> HostResult<()>;

    fn delete_table_row(&mut self, table: TableRef, index: usize) -> HostResult<()>;

    fn delete_table_column(&mut self, table: TableRef, index: usize) -> HostResult<()>;

    fn set_cell_text(
        &mut self,
        table: TableRef,
        row: usize,
        column: usize,
        text: &str,
    ) -> HostResult<()>;

    fn merge_cells(&mut self, table: TableRef, rect: CellRect) -> HostResult<()>;

    fn style_table(&mut self, table: TableRef, styling: &TableStyling) -> HostResult<()>;

    /// Commit queued mutations and wait for the host to acknowledge them.
    fn sync(&mut self) -> HostResult<()>;
}
