//! Named style plus direct formatting, applied in caller-selected order.
//!
//! A [`StyleSpec`] is turned into an ordered list of [`StyleStep`]s by
//! [`plan`]; [`apply_style`] walks that list against the host. Failures that
//! concern one property (unknown key, bad value, property the host cannot
//! set, missing style) are recorded as diagnostics and the remaining steps
//! still run. Failures that concern the document as a whole abort.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strsim::normalized_levenshtein;
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult, Diagnostic, ErrorKind, HostError};
use crate::handle::{Handle, HandleRegistry};
use crate::host::{
    Alignment, CharProperty, DocumentHost, ListKind, ParagraphProperty, RangeRef, StyleCategory,
    StyleInfo,
};
use crate::scope::{self, Scope};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Precedence {
    /// Named style first, direct overrides on top.
    #[default]
    StyleFirst,
    /// Direct overrides first, named style on top.
    OverridesFirst,
}

impl Precedence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StyleFirst => "styleFirst",
            Self::OverridesFirst => "overridesFirst",
        }
    }
}

impl fmt::Display for Precedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Precedence {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "styleFirst" => Ok(Self::StyleFirst),
            "overridesFirst" => Ok(Self::OverridesFirst),
            other => Err(format!(
                "unknown precedence '{other}' (expected 'styleFirst' or 'overridesFirst')"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSpec {
    #[serde(default)]
    pub named_style: Option<String>,
    #[serde(default)]
    pub char_overrides: Map<String, Value>,
    #[serde(default)]
    pub paragraph_overrides: Map<String, Value>,
    /// Falls back to the session default when absent.
    #[serde(default)]
    pub precedence: Option<Precedence>,
    #[serde(default)]
    pub reset_before_apply: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StyleStep {
    Reset,
    NamedStyle(String),
    ParagraphOverrides(Vec<ParagraphProperty>),
    CharOverrides(Vec<CharProperty>),
    Commit,
}

/// Builds the step list for one application. Empty override groups are
/// skipped and a commit only follows steps that mutate.
pub fn plan(
    named_style: Option<&str>,
    char_overrides: Vec<CharProperty>,
    paragraph_overrides: Vec<ParagraphProperty>,
    precedence: Precedence,
    reset_before_apply: bool,
) -> Vec<StyleStep> {
    let named = named_style.map(|name| vec![StyleStep::NamedStyle(name.to_string())]);
    let mut overrides = Vec::new();
    if !paragraph_overrides.is_empty() {
        overrides.push(StyleStep::ParagraphOverrides(paragraph_overrides));
    }
    if !char_overrides.is_empty() {
        overrides.push(StyleStep::CharOverrides(char_overrides));
    }

    let phases = match precedence {
        Precedence::StyleFirst => [named.unwrap_or_default(), overrides],
        Precedence::OverridesFirst => [overrides, named.unwrap_or_default()],
    };

    let mut steps = Vec::new();
    if reset_before_apply {
        steps.push(StyleStep::Reset);
    }
    for phase in phases {
        if phase.is_empty() {
            continue;
        }
        steps.extend(phase);
        steps.push(StyleStep::Commit);
    }
    if steps.last() == Some(&StyleStep::Reset) {
        steps.push(StyleStep::Commit);
    }
    steps
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StyleOutcome {
    pub handle: Option<Handle>,
    /// Names of the steps and properties that took effect.
    pub applied: Vec<String>,
    /// Names of the steps and properties that did not.
    pub failed: Vec<String>,
    #[serde(skip)]
    pub diagnostics: Vec<Diagnostic>,
}

impl StyleOutcome {
    fn fail(&mut self, name: &str, kind: ErrorKind, message: impl fmt::Display) {
        warn!(property = name, %kind, %message, "style step failed");
        self.failed.push(name.to_string());
        self.diagnostics
            .push(Diagnostic::error(format!("{name}: {kind}: {message}")));
    }
}

/// Applies `spec` to `scope` and returns a handle for the styled range.
pub fn apply_style(
    host: &mut dyn DocumentHost,
    registry: &mut HandleRegistry,
    scope: &Scope,
    spec: &StyleSpec,
    default_precedence: Precedence,
) -> BridgeResult<StyleOutcome> {
    let mut outcome = StyleOutcome::default();

    let mut char_overrides = Vec::new();
    for (key, value) in &spec.char_overrides {
        match parse_char_override(key, value) {
            Ok(property) => char_overrides.push(property),
            Err(err) => outcome.fail(key, err.kind(), err.message()),
        }
    }
    let mut paragraph_overrides = Vec::new();
    for (key, value) in &spec.paragraph_overrides {
        match parse_paragraph_override(key, value) {
            Ok(property) => paragraph_overrides.push(property),
            Err(err) => outcome.fail(key, err.kind(), err.message()),
        }
    }

    let precedence = spec.precedence.unwrap_or(default_precedence);
    let steps = plan(
        spec.named_style.as_deref(),
        char_overrides,
        paragraph_overrides,
        precedence,
        spec.reset_before_apply,
    );

    let resolved = scope::resolve(scope, host, registry)?;
    if let Err(err) = run_steps(host, resolved.range, &steps, &mut outcome) {
        resolved.release(host);
        return Err(err);
    }

    debug!(
        %scope,
        %precedence,
        applied = outcome.applied.len(),
        failed = outcome.failed.len(),
        "style applied"
    );
    outcome.handle = Some(match resolved.handle {
        Some(handle) => handle,
        None => registry.register_range(resolved.range),
    });
    Ok(outcome)
}

fn run_steps(
    host: &mut dyn DocumentHost,
    range: RangeRef,
    steps: &[StyleStep],
    outcome: &mut StyleOutcome,
) -> BridgeResult<()> {
    for step in steps {
        match step {
            StyleStep::Reset => match host.reset_formatting(range) {
                Ok(()) => outcome.applied.push("reset".to_string()),
                Err(err) => record(outcome, "reset", err)?,
            },
            StyleStep::NamedStyle(name) => match host.apply_named_style(range, name) {
                Ok(()) => outcome.applied.push("namedStyle".to_string()),
                Err(err) if err.kind == ErrorKind::NotFound => {
                    let mut message = format!("style '{name}' does not exist");
                    if let Some(suggestion) = closest_style(host, name) {
                        message.push_str(&format!(". Did you mean '{suggestion}'?"));
                    }
                    outcome.fail("namedStyle", ErrorKind::NotFound, message);
                }
                Err(err) => record(outcome, "namedStyle", err)?,
            },
            StyleStep::ParagraphOverrides(properties) => {
                let paragraphs = host.paragraphs(range)?;
                let result = apply_paragraph_properties(host, &paragraphs, properties, outcome);
                for paragraph in paragraphs {
                    host.release_range(paragraph);
                }
                result?;
            }
            StyleStep::CharOverrides(properties) => {
                for property in properties {
                    match host.set_char_property(range, property) {
                        Ok(()) => outcome.applied.push(property.name().to_string()),
                        Err(err) => record(outcome, property.name(), err)?,
                    }
                }
            }
            StyleStep::Commit => host.sync()?,
        }
    }
    Ok(())
}

fn apply_paragraph_properties(
    host: &mut dyn DocumentHost,
    paragraphs: &[RangeRef],
    properties: &[ParagraphProperty],
    outcome: &mut StyleOutcome,
) -> BridgeResult<()> {
    for property in properties {
        let mut failure = None;
        for &paragraph in paragraphs {
            if let Err(err) = host.set_paragraph_property(paragraph, property) {
                failure = Some(err);
                break;
            }
        }
        match failure {
            None => outcome.applied.push(property.name().to_string()),
            Some(err) => record(outcome, property.name(), err)?,
        }
    }
    Ok(())
}

/// Turns a per-property host failure into a diagnostic; failures of the
/// document as a whole are returned.
fn record(outcome: &mut StyleOutcome, name: &str, err: HostError) -> BridgeResult<()> {
    match err.kind {
        ErrorKind::InvalidArgument | ErrorKind::NotFound | ErrorKind::Unsupported => {
            outcome.fail(name, err.kind, &err.message);
            Ok(())
        }
        _ => Err(err.into()),
    }
}

fn closest_style(host: &dyn DocumentHost, name: &str) -> Option<String> {
    let styles = host.styles().ok()?;
    let wanted = name.to_lowercase();
    styles
        .iter()
        .map(|style| {
            (
                style.name.as_str(),
                normalized_levenshtein(&wanted, &style.name.to_lowercase()),
            )
        })
        .filter(|(_, score)| *score > 0.5)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(candidate, _)| candidate.to_string())
}

fn parse_char_override(key: &str, value: &Value) -> BridgeResult<CharProperty> {
    Ok(match key {
        "fontName" => CharProperty::FontName(expect_str(key, value)?),
        "fontSize" => {
            let size = expect_number(key, value)?;
            if size <= 0.0 {
                return Err(BridgeError::invalid(format!(
                    "expected a positive font size, got {size}"
                )));
            }
            CharProperty::FontSize(size)
        }
        "bold" => CharProperty::Bold(expect_bool(key, value)?),
        "italic" => CharProperty::Italic(expect_bool(key, value)?),
        "underline" => CharProperty::Underline(expect_bool(key, value)?),
        "strikeThrough" => CharProperty::StrikeThrough(expect_bool(key, value)?),
        "color" => CharProperty::Color(expect_str(key, value)?),
        "highlightColor" => CharProperty::HighlightColor(expect_str(key, value)?),
        other => {
            return Err(BridgeError::Unsupported(format!(
                "'{other}' is not a known character property"
            )))
        }
    })
}

fn parse_paragraph_override(key: &str, value: &Value) -> BridgeResult<ParagraphProperty> {
    Ok(match key {
        "alignment" => {
            let raw = expect_str(key, value)?;
            ParagraphProperty::Alignment(Alignment::from_str(&raw).map_err(|_| {
                BridgeError::invalid(format!(
                    "alignment '{raw}' is not one of left, centered, right, justified"
                ))
            })?)
        }
        "lineSpacing" => ParagraphProperty::LineSpacing(expect_number(key, value)?),
        "spaceBefore" => ParagraphProperty::SpaceBefore(expect_number(key, value)?),
        "spaceAfter" => ParagraphProperty::SpaceAfter(expect_number(key, value)?),
        "firstLineIndent" => ParagraphProperty::FirstLineIndent(expect_number(key, value)?),
        "leftIndent" => ParagraphProperty::LeftIndent(expect_number(key, value)?),
        "list" => {
            let raw = expect_str(key, value)?;
            ParagraphProperty::List(ListKind::from_str(&raw).map_err(|_| {
                BridgeError::invalid(format!("list '{raw}' is not one of bullet, number, none"))
            })?)
        }
        other => {
            return Err(BridgeError::Unsupported(format!(
                "'{other}' is not a known paragraph property"
            )))
        }
    })
}

fn expect_str(key: &str, value: &Value) -> BridgeResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BridgeError::invalid(format!("'{key}' expects a string, got {value}")))
}

fn expect_number(key: &str, value: &Value) -> BridgeResult<f64> {
    value
        .as_f64()
        .ok_or_else(|| BridgeError::invalid(format!("'{key}' expects a number, got {value}")))
}

fn expect_bool(key: &str, value: &Value) -> BridgeResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| BridgeError::invalid(format!("'{key}' expects a boolean, got {value}")))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFilter {
    #[default]
    All,
    Paragraph,
    Character,
    Table,
}

impl CategoryFilter {
    fn includes(self, category: StyleCategory) -> bool {
        match self {
            Self::All => true,
            Self::Paragraph => category == StyleCategory::Paragraph,
            Self::Character => category == StyleCategory::Character,
            Self::Table => category == StyleCategory::Table,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleCatalog {
    pub paragraph_styles: Vec<StyleInfo>,
    pub character_styles: Vec<StyleInfo>,
    pub table_styles: Vec<StyleInfo>,
}

/// Styles known to the document, grouped by category and sorted by name.
pub fn list_styles(
    host: &dyn DocumentHost,
    category: CategoryFilter,
    query: Option<&str>,
    built_in_only: bool,
) -> BridgeResult<StyleCatalog> {
    let needle = query.map(str::to_lowercase);
    let mut styles: Vec<StyleInfo> = host
        .styles()?
        .into_iter()
        .filter(|style| category.includes(style.category))
        .filter(|style| !built_in_only || style.built_in)
        .filter(|style| match &needle {
            Some(needle) => style.name.to_lowercase().contains(needle.as_str()),
            None => true,
        })
        .collect();
    styles.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    let mut catalog = StyleCatalog::default();
    for style in styles {
        match style.category {
            StyleCategory::Paragraph => catalog.paragraph_styles.push(style),
            StyleCategory::Character => catalog.character_styles.push(style),
            StyleCategory::Table => catalog.table_styles.push(style),
        }
    }
    Ok(catalog)
}
