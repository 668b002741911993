//! Opcode routing and the uniform result envelope.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

use crate::error::{BridgeError, BridgeResult, Diagnostic, ErrorKind};
use crate::handle::{Handle, HandleRegistry};
use crate::host::{DocumentHost, Location, PictureSpec, TableRef};
use crate::picture::{self, SourceKind, INLINE_WRAP};
use crate::replace::{self, ReplaceMode, ReplaceTarget};
use crate::scope::Scope;
use crate::search::{self, MatchOptions};
use crate::session::{self, Session};
use crate::style::{self, CategoryFilter, StyleSpec};
use crate::table::{self, Axis, CreateTable, StyleNameOrFlags};
use crate::text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    InsertText,
    GetSelection,
    GetText,
    Search,
    Replace,
    InsertPicture,
    TableCreate,
    TableInsertRows,
    TableInsertColumns,
    TableDeleteRows,
    TableDeleteColumns,
    TableSetCellText,
    TableMergeCells,
    TableApplyStyle,
    ApplyStyle,
    ListStyles,
    ReleaseHandle,
}

impl Opcode {
    pub const ALL: [Opcode; 17] = [
        Self::InsertText,
        Self::GetSelection,
        Self::GetText,
        Self::Search,
        Self::Replace,
        Self::InsertPicture,
        Self::TableCreate,
        Self::TableInsertRows,
        Self::TableInsertColumns,
        Self::TableDeleteRows,
        Self::TableDeleteColumns,
        Self::TableSetCellText,
        Self::TableMergeCells,
        Self::TableApplyStyle,
        Self::ApplyStyle,
        Self::ListStyles,
        Self::ReleaseHandle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsertText => "insertText",
            Self::GetSelection => "getSelection",
            Self::GetText => "getText",
            Self::Search => "search",
            Self::Replace => "replace",
            Self::InsertPicture => "insertPicture",
            Self::TableCreate => "table.create",
            Self::TableInsertRows => "table.insertRows",
            Self::TableInsertColumns => "table.insertColumns",
            Self::TableDeleteRows => "table.deleteRows",
            Self::TableDeleteColumns => "table.deleteColumns",
            Self::TableSetCellText => "table.setCellText",
            Self::TableMergeCells => "table.mergeCells",
            Self::TableApplyStyle => "table.applyStyle",
            Self::ApplyStyle => "applyStyle",
            Self::ListStyles => "listStyles",
            Self::ReleaseHandle => "releaseHandle",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Opcode {
    type Err = BridgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|opcode| opcode.as_str() == value)
            .ok_or_else(|| BridgeError::invalid(format!("unknown opcode '{value}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    pub opcode: String,
    #[serde(default)]
    pub args: Value,
}

impl OperationRequest {
    pub fn new(opcode: impl Into<String>, args: Value) -> Self {
        Self {
            opcode: opcode.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl OperationResult {
    pub fn success(data: Value, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            ok: true,
            data: Some(data),
            code: None,
            diagnostics,
        }
    }

    pub fn failure(err: &BridgeError) -> Self {
        let mut diagnostics = vec![Diagnostic::error(err.message())];
        if err.kind() == ErrorKind::Timeout {
            diagnostics.push(Diagnostic::warning(
                "the host did not acknowledge the change in time; it may still take effect",
            ));
        }
        Self {
            ok: false,
            data: None,
            code: Some(err.kind()),
            diagnostics,
        }
    }

    /// Field of the `data` object, if the operation succeeded.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(name))
    }

    /// Handle string stored under `name` in `data`.
    pub fn handle(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }
}

struct Reply {
    data: Value,
    diagnostics: Vec<Diagnostic>,
}

impl Reply {
    fn data(data: Value) -> Self {
        Self {
            data,
            diagnostics: Vec::new(),
        }
    }

    fn empty() -> Self {
        Self::data(json!({}))
    }
}

/// Executes one request. Never panics: component panics are reported as
/// `Runtime` failures.
pub fn dispatch<H: DocumentHost>(
    session: &mut Session<H>,
    request: &OperationRequest,
) -> OperationResult {
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| route(session, request)));
    let result = match outcome {
        Ok(Ok(reply)) => OperationResult::success(reply.data, reply.diagnostics),
        Ok(Err(err)) => {
            if err.kind() == ErrorKind::Timeout {
                warn!(opcode = %request.opcode, error = %err, "host timed out; change may still land");
            }
            OperationResult::failure(&err)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(opcode = %request.opcode, %message, "operation panicked");
            OperationResult::failure(&BridgeError::Runtime(format!(
                "operation '{}' panicked: {message}",
                request.opcode
            )))
        }
    };
    debug!(
        opcode = %request.opcode,
        ok = result.ok,
        elapsed_us = started.elapsed().as_micros() as u64,
        "operation dispatched"
    );
    result
}

fn route<H: DocumentHost>(
    session: &mut Session<H>,
    request: &OperationRequest,
) -> BridgeResult<Reply> {
    let opcode = Opcode::from_str(&request.opcode)?;
    let args = if request.args.is_null() {
        Value::Object(Map::new())
    } else {
        request.args.clone()
    };

    let Session {
        host,
        registry,
        settings,
        fetcher,
    } = session;
    let host: &mut dyn DocumentHost = host;

    match opcode {
        Opcode::InsertText => {
            let args: InsertTextArgs = parse_args(opcode, args)?;
            let scope = scope_or(args.scope.as_deref(), Scope::Selection)?;
            let inserted = text::insert_text(
                host,
                registry,
                &scope,
                &args.text,
                args.location,
                args.new_paragraph,
            )?;
            Ok(Reply::data(json!({
                "handle": inserted.handle,
                "length": inserted.length,
            })))
        }
        Opcode::GetSelection => {
            let snapshot = text::get_selection(host, registry)?;
            Ok(Reply::data(to_value(&snapshot)?))
        }
        Opcode::GetText => {
            let args: ScopeArgs = parse_args(opcode, args)?;
            let scope = scope_or(args.scope.as_deref(), Scope::Document)?;
            let text = text::get_text(host, registry, &scope)?;
            Ok(Reply::data(json!({ "text": text })))
        }
        Opcode::Search => {
            let args: SearchArgs = parse_args(opcode, args)?;
            let scope = scope_or(args.scope.as_deref(), Scope::Document)?;
            let limit = settings.search_limit(args.max_results)?;
            let results = search::search(host, registry, &scope, &args.query, &args.options, limit)?;
            Ok(Reply::data(json!({ "results": results })))
        }
        Opcode::Replace => {
            let args: ReplaceArgs = parse_args(opcode, args)?;
            let outcome = match ReplaceTarget::parse(&args.target)? {
                ReplaceTarget::Scope(scope) => {
                    replace::replace_at(host, registry, &scope, &args.replacement)?
                }
                ReplaceTarget::SearchQuery => {
                    let query = args.query.as_deref().ok_or_else(|| {
                        BridgeError::invalid("'query' is required when target is 'searchQuery'")
                    })?;
                    let scope = scope_or(args.scope.as_deref(), Scope::Document)?;
                    replace::replace_matches(
                        host,
                        registry,
                        &scope,
                        query,
                        &args.options,
                        &args.replacement,
                        args.mode,
                    )?
                }
            };
            let mut data = json!({ "replacedCount": outcome.replaced_count });
            if let Some(handle) = outcome.handle {
                data["handle"] = json!(handle);
            }
            Ok(Reply {
                data,
                diagnostics: outcome.diagnostics,
            })
        }
        Opcode::InsertPicture => {
            let args: InsertPictureArgs = parse_args(opcode, args)?;
            if let Some(wrap) = args.wrap.as_deref() {
                if wrap != INLINE_WRAP {
                    return Err(BridgeError::Unsupported(format!(
                        "wrap '{wrap}' is not supported; only '{INLINE_WRAP}' pictures can be inserted"
                    )));
                }
            }
            let payload = picture::load_payload(
                args.source_kind,
                &args.data,
                &settings.pictures,
                fetcher.as_deref(),
            )?;
            let scope = scope_or(args.scope.as_deref(), Scope::Selection)?;
            let spec = PictureSpec {
                base64: payload,
                width: args.width,
                height: args.height,
                lock_aspect: args.lock_aspect,
                alt_text: args.alt_text,
            };
            let handle = picture::insert(host, registry, &scope, args.location, &spec)?;
            Ok(Reply::data(json!({ "handle": handle })))
        }
        Opcode::TableCreate => {
            let args: TableCreateArgs = parse_args(opcode, args)?;
            let scope = scope_or(args.scope.as_deref(), Scope::Selection)?;
            let data = args.data.map(|rows| {
                rows.into_iter()
                    .map(|row| row.into_iter().map(cell_text).collect())
                    .collect()
            });
            let handle = table::create(
                host,
                registry,
                &scope,
                args.location,
                CreateTable {
                    rows: args.rows,
                    columns: args.cols,
                    data,
                    header: args.header,
                },
                &settings.tables,
            )?;
            Ok(Reply::data(json!({ "tableHandle": handle })))
        }
        Opcode::TableInsertRows | Opcode::TableInsertColumns => {
            let args: TableInsertArgs = parse_args(opcode, args)?;
            let table = resolve_table(registry, &args.table_handle)?;
            let axis = if opcode == Opcode::TableInsertRows {
                Axis::Row
            } else {
                Axis::Column
            };
            table::insert(host, table, axis, args.at, args.count, &settings.tables)?;
            Ok(Reply::empty())
        }
        Opcode::TableDeleteRows | Opcode::TableDeleteColumns => {
            let args: TableDeleteArgs = parse_args(opcode, args)?;
            let table = resolve_table(registry, &args.table_handle)?;
            let axis = if opcode == Opcode::TableDeleteRows {
                Axis::Row
            } else {
                Axis::Column
            };
            let deleted = table::delete(host, table, axis, &args.indexes)?;
            Ok(Reply::data(json!({ "deletedCount": deleted })))
        }
        Opcode::TableSetCellText => {
            let args: SetCellTextArgs = parse_args(opcode, args)?;
            let table = resolve_table(registry, &args.table_handle)?;
            table::set_cell_text(host, table, args.row, args.col, &args.text)?;
            Ok(Reply::empty())
        }
        Opcode::TableMergeCells => {
            let args: MergeCellsArgs = parse_args(opcode, args)?;
            let table = resolve_table(registry, &args.table_handle)?;
            table::merge_cells(
                host,
                table,
                args.start_row,
                args.start_col,
                args.row_span,
                args.col_span,
            )?;
            Ok(Reply::empty())
        }
        Opcode::TableApplyStyle => {
            let args: TableStyleArgs = parse_args(opcode, args)?;
            let table = resolve_table(registry, &args.table_handle)?;
            table::apply_style(host, table, args.style_name_or_flags)?;
            Ok(Reply::empty())
        }
        Opcode::ApplyStyle => {
            let args: ApplyStyleArgs = parse_args(opcode, args)?;
            let scope = scope_or(args.scope.as_deref(), Scope::Selection)?;
            let outcome = style::apply_style(
                host,
                registry,
                &scope,
                &args.spec,
                settings.default_precedence,
            )?;
            Ok(Reply {
                data: to_value(&outcome)?,
                diagnostics: outcome.diagnostics,
            })
        }
        Opcode::ListStyles => {
            let args: ListStylesArgs = parse_args(opcode, args)?;
            let catalog =
                style::list_styles(host, args.category, args.query.as_deref(), args.built_in_only)?;
            Ok(Reply::data(to_value(&catalog)?))
        }
        Opcode::ReleaseHandle => {
            let args: ReleaseHandleArgs = parse_args(opcode, args)?;
            let raw = args.handle.strip_prefix("handle:").unwrap_or(&args.handle);
            let handle = Handle::parse(raw)?;
            let released = session::release(host, registry, &handle);
            Ok(Reply::data(json!({ "released": released })))
        }
    }
}

fn parse_args<T: DeserializeOwned>(opcode: Opcode, args: Value) -> BridgeResult<T> {
    serde_json::from_value(args)
        .map_err(|err| BridgeError::invalid(format!("invalid arguments for '{opcode}': {err}")))
}

fn to_value<T: Serialize>(value: &T) -> BridgeResult<Value> {
    serde_json::to_value(value)
        .map_err(|err| BridgeError::Runtime(format!("failed to encode result: {err}")))
}

fn scope_or(raw: Option<&str>, default: Scope) -> BridgeResult<Scope> {
    match raw {
        Some(raw) => Scope::parse(raw),
        None => Ok(default),
    }
}

fn resolve_table(
    registry: &HandleRegistry,
    raw: &str,
) -> BridgeResult<TableRef> {
    let raw = raw.strip_prefix("handle:").unwrap_or(raw);
    registry.resolve_table(&Handle::parse(raw)?)
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn default_true() -> bool {
    true
}

fn default_count() -> usize {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScopeArgs {
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertTextArgs {
    text: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    location: Location,
    #[serde(default)]
    new_paragraph: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    query: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(flatten)]
    options: MatchOptions,
    #[serde(default)]
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplaceArgs {
    target: String,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(flatten)]
    options: MatchOptions,
    replacement: String,
    #[serde(default)]
    mode: ReplaceMode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertPictureArgs {
    source_kind: SourceKind,
    data: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    location: Location,
    #[serde(default)]
    width: Option<f64>,
    #[serde(default)]
    height: Option<f64>,
    #[serde(default = "default_true")]
    lock_aspect: bool,
    #[serde(default)]
    alt_text: Option<String>,
    #[serde(default)]
    wrap: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableCreateArgs {
    rows: usize,
    cols: usize,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    location: Location,
    #[serde(default)]
    data: Option<Vec<Vec<Value>>>,
    #[serde(default)]
    header: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableInsertArgs {
    table_handle: String,
    at: usize,
    #[serde(default = "default_count")]
    count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableDeleteArgs {
    table_handle: String,
    indexes: Vec<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetCellTextArgs {
    table_handle: String,
    row: usize,
    col: usize,
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeCellsArgs {
    table_handle: String,
    start_row: usize,
    start_col: usize,
    row_span: usize,
    col_span: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TableStyleArgs {
    table_handle: String,
    #[serde(alias = "style")]
    style_name_or_flags: StyleNameOrFlags,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplyStyleArgs {
    #[serde(default)]
    scope: Option<String>,
    #[serde(flatten)]
    spec: StyleSpec,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListStylesArgs {
    #[serde(default)]
    category: CategoryFilter,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    built_in_only: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseHandleArgs {
    handle: String,
}
