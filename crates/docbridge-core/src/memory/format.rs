use crate::host::{Alignment, CharProperty, ListKind, ParagraphProperty, StyleCategory, StyleInfo};

/// Character formatting; `None` means "inherit".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharFormat {
    pub font_name: Option<String>,
    pub font_size: Option<f64>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strike_through: Option<bool>,
    pub color: Option<String>,
    pub highlight_color: Option<String>,
}

impl CharFormat {
    pub fn set(&mut self, property: &CharProperty) {
        match property {
            CharProperty::FontName(value) => self.font_name = Some(value.clone()),
            CharProperty::FontSize(value) => self.font_size = Some(*value),
            CharProperty::Bold(value) => self.bold = Some(*value),
            CharProperty::Italic(value) => self.italic = Some(*value),
            CharProperty::Underline(value) => self.underline = Some(*value),
            CharProperty::StrikeThrough(value) => self.strike_through = Some(*value),
            CharProperty::Color(value) => self.color = Some(value.clone()),
            CharProperty::HighlightColor(value) => self.highlight_color = Some(value.clone()),
        }
    }

    /// Fills unset fields from `base`.
    pub fn or(&self, base: &CharFormat) -> CharFormat {
        CharFormat {
            font_name: self.font_name.clone().or_else(|| base.font_name.clone()),
            font_size: self.font_size.or(base.font_size),
            bold: self.bold.or(base.bold),
            italic: self.italic.or(base.italic),
            underline: self.underline.or(base.underline),
            strike_through: self.strike_through.or(base.strike_through),
            color: self.color.clone().or_else(|| base.color.clone()),
            highlight_color: self
                .highlight_color
                .clone()
                .or_else(|| base.highlight_color.clone()),
        }
    }

    /// Drops every field that `style` defines, so the style value shows through.
    pub fn clear_defined_by(&mut self, style: &CharFormat) {
        if style.font_name.is_some() {
            self.font_name = None;
        }
        if style.font_size.is_some() {
            self.font_size = None;
        }
        if style.bold.is_some() {
            self.bold = None;
        }
        if style.italic.is_some() {
            self.italic = None;
        }
        if style.underline.is_some() {
            self.underline = None;
        }
        if style.strike_through.is_some() {
            self.strike_through = None;
        }
        if style.color.is_some() {
            self.color = None;
        }
        if style.highlight_color.is_some() {
            self.highlight_color = None;
        }
    }

    /// Keeps only the fields on which `self` and `other` agree.
    pub fn intersect(&self, other: &CharFormat) -> CharFormat {
        fn same<T: PartialEq + Clone>(a: &Option<T>, b: &Option<T>) -> Option<T> {
            if a == b {
                a.clone()
            } else {
                None
            }
        }
        CharFormat {
            font_name: same(&self.font_name, &other.font_name),
            font_size: same(&self.font_size, &other.font_size),
            bold: same(&self.bold, &other.bold),
            italic: same(&self.italic, &other.italic),
            underline: same(&self.underline, &other.underline),
            strike_through: same(&self.strike_through, &other.strike_through),
            color: same(&self.color, &other.color),
            highlight_color: same(&self.highlight_color, &other.highlight_color),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParagraphFormat {
    pub alignment: Option<Alignment>,
    pub line_spacing: Option<f64>,
    pub space_before: Option<f64>,
    pub space_after: Option<f64>,
    pub first_line_indent: Option<f64>,
    pub left_indent: Option<f64>,
    pub list: Option<ListKind>,
}

impl ParagraphFormat {
    pub fn set(&mut self, property: &ParagraphProperty) {
        match property {
            ParagraphProperty::Alignment(value) => self.alignment = Some(*value),
            ParagraphProperty::LineSpacing(value) => self.line_spacing = Some(*value),
            ParagraphProperty::SpaceBefore(value) => self.space_before = Some(*value),
            ParagraphProperty::SpaceAfter(value) => self.space_after = Some(*value),
            ParagraphProperty::FirstLineIndent(value) => self.first_line_indent = Some(*value),
            ParagraphProperty::LeftIndent(value) => self.left_indent = Some(*value),
            ParagraphProperty::List(ListKind::None) => self.list = None,
            ParagraphProperty::List(kind) => self.list = Some(*kind),
        }
    }

    pub fn or(&self, base: &ParagraphFormat) -> ParagraphFormat {
        ParagraphFormat {
            alignment: self.alignment.or(base.alignment),
            line_spacing: self.line_spacing.or(base.line_spacing),
            space_before: self.space_before.or(base.space_before),
            space_after: self.space_after.or(base.space_after),
            first_line_indent: self.first_line_indent.or(base.first_line_indent),
            left_indent: self.left_indent.or(base.left_indent),
            list: self.list.or(base.list),
        }
    }

    pub fn clear_defined_by(&mut self, style: &ParagraphFormat) {
        if style.alignment.is_some() {
            self.alignment = None;
        }
        if style.line_spacing.is_some() {
            self.line_spacing = None;
        }
        if style.space_before.is_some() {
            self.space_before = None;
        }
        if style.space_after.is_some() {
            self.space_after = None;
        }
        if style.first_line_indent.is_some() {
            self.first_line_indent = None;
        }
        if style.left_indent.is_some() {
            self.left_indent = None;
        }
        if style.list.is_some() {
            self.list = None;
        }
    }
}

/// A named style known to the document.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDef {
    pub name: String,
    pub category: StyleCategory,
    pub built_in: bool,
    pub font: CharFormat,
    pub paragraph: ParagraphFormat,
}

impl StyleDef {
    pub fn paragraph(name: &str) -> Self {
        Self::new(name, StyleCategory::Paragraph)
    }

    pub fn character(name: &str) -> Self {
        Self::new(name, StyleCategory::Character)
    }

    pub fn table(name: &str) -> Self {
        Self::new(name, StyleCategory::Table)
    }

    fn new(name: &str, category: StyleCategory) -> Self {
        Self {
            name: name.to_string(),
            category,
            built_in: false,
            font: CharFormat::default(),
            paragraph: ParagraphFormat::default(),
        }
    }

    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font.font_size = Some(size);
        self
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.font.bold = Some(bold);
        self
    }

    pub fn with_italic(mut self, italic: bool) -> Self {
        self.font.italic = Some(italic);
        self
    }

    pub fn with_font_name(mut self, name: &str) -> Self {
        self.font.font_name = Some(name.to_string());
        self
    }

    pub fn with_color(mut self, color: &str) -> Self {
        self.font.color = Some(color.to_string());
        self
    }

    pub fn with_left_indent(mut self, indent: f64) -> Self {
        self.paragraph.left_indent = Some(indent);
        self
    }

    pub fn with_space_before(mut self, points: f64) -> Self {
        self.paragraph.space_before = Some(points);
        self
    }

    fn built_in(mut self) -> Self {
        self.built_in = true;
        self
    }

    pub fn info(&self) -> StyleInfo {
        StyleInfo {
            name: self.name.clone(),
            category: self.category,
            built_in: self.built_in,
        }
    }
}

pub const BASELINE_STYLE: &str = "Normal";

pub fn builtin_styles() -> Vec<StyleDef> {
    vec![
        StyleDef::paragraph(BASELINE_STYLE)
            .with_font_name("Calibri")
            .with_font_size(11.0)
            .with_bold(false)
            .with_italic(false)
            .with_color("#000000")
            .built_in(),
        StyleDef::paragraph("Heading 1")
            .with_font_size(16.0)
            .with_bold(true)
            .with_color("#2F5496")
            .with_space_before(12.0)
            .built_in(),
        StyleDef::paragraph("Heading 2")
            .with_font_size(13.0)
            .with_bold(true)
            .with_color("#2F5496")
            .with_space_before(2.0)
            .built_in(),
        StyleDef::paragraph("Title").with_font_size(28.0).built_in(),
        StyleDef::paragraph("Quote").with_italic(true).built_in(),
        StyleDef::paragraph("List Paragraph")
            .with_left_indent(36.0)
            .built_in(),
        StyleDef::character("Emphasis").with_italic(true).built_in(),
        StyleDef::character("Strong").with_bold(true).built_in(),
        StyleDef::character("Subtle Emphasis")
            .with_italic(true)
            .with_color("#404040")
            .built_in(),
        StyleDef::table("Table Grid").built_in(),
        StyleDef::table("Plain Table 1").built_in(),
        StyleDef::table("Grid Table 4 - Accent 1").built_in(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clearing_exposes_style_values() {
        let style = StyleDef::paragraph("Big").with_font_size(24.0);
        let mut direct = CharFormat::default();
        direct.set(&CharProperty::FontSize(12.0));
        direct.set(&CharProperty::Bold(true));
        direct.clear_defined_by(&style.font);

        let effective = direct.or(&style.font);
        assert_eq!(effective.font_size, Some(24.0));
        assert_eq!(effective.bold, Some(true));
    }

    #[test]
    fn intersect_drops_mixed_fields() {
        let mut a = CharFormat::default();
        a.set(&CharProperty::FontSize(12.0));
        a.set(&CharProperty::Bold(true));
        let mut b = a.clone();
        b.set(&CharProperty::Bold(false));

        let merged = a.intersect(&b);
        assert_eq!(merged.font_size, Some(12.0));
        assert_eq!(merged.bold, None);
    }

    #[test]
    fn list_none_clears_membership() {
        let mut format = ParagraphFormat::default();
        format.set(&ParagraphProperty::List(ListKind::Bullet));
        assert_eq!(format.list, Some(ListKind::Bullet));
        format.set(&ParagraphProperty::List(ListKind::None));
        assert_eq!(format.list, None);
    }
}
