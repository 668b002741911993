use serde::Serialize;

use crate::error::{BridgeError, BridgeResult};
use crate::handle::{Handle, HandleRegistry};
use crate::host::{DocumentHost, Location};
use crate::scope::{self, Scope};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inserted {
    pub handle: Handle,
    /// Characters inserted, not bytes.
    pub length: usize,
}

pub fn insert_text(
    host: &mut dyn DocumentHost,
    registry: &mut HandleRegistry,
    scope: &Scope,
    text: &str,
    location: Location,
    new_paragraph: bool,
) -> BridgeResult<Inserted> {
    if new_paragraph && location == Location::Replace {
        return Err(BridgeError::invalid(
            "'newParagraph' cannot be combined with location 'replace'",
        ));
    }

    let resolved = scope::resolve(scope, host, registry)?;
    let inserted = if new_paragraph {
        host.insert_paragraph(resolved.range, text, location)
    } else {
        host.insert_text(resolved.range, text, location)
    };
    resolved.release(host);
    let inserted = inserted?;
    if let Err(err) = host.sync() {
        host.release_range(inserted);
        return Err(err.into());
    }

    Ok(Inserted {
        handle: registry.register_range(inserted),
        length: text.chars().count(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionSnapshot {
    pub text: String,
    pub handle: Handle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,
}

/// Reads the current selection and registers a handle for it.
pub fn get_selection(
    host: &mut dyn DocumentHost,
    registry: &mut HandleRegistry,
) -> BridgeResult<SelectionSnapshot> {
    let range = host.selection()?;
    let text = match host.range_text(range) {
        Ok(text) => text,
        Err(err) => {
            host.release_range(range);
            return Err(err.into());
        }
    };
    let offsets = host.range_offsets(range);
    Ok(SelectionSnapshot {
        text,
        handle: registry.register_range(range),
        start: offsets.map(|(start, _)| start),
        end: offsets.map(|(_, end)| end),
    })
}

pub fn get_text(
    host: &mut dyn DocumentHost,
    registry: &HandleRegistry,
    scope: &Scope,
) -> BridgeResult<String> {
    let resolved = scope::resolve(scope, host, registry)?;
    let text = host.range_text(resolved.range);
    resolved.release(host);
    Ok(text?)
}
