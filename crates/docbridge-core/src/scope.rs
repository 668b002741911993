use std::fmt;

use crate::error::{BridgeError, BridgeResult};
use crate::handle::{Handle, HandleRegistry};
use crate::host::{DocumentHost, RangeRef};

const HANDLE_PREFIX: &str = "handle:";

/// Where an operation acts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Document,
    Selection,
    Handle(Handle),
}

impl Scope {
    /// Accepts `document`, `selection`, `handle:<handle>` and, as a
    /// convenience, a bare handle string as returned in results.
    pub fn parse(raw: &str) -> BridgeResult<Self> {
        match raw {
            "document" => Ok(Self::Document),
            "selection" => Ok(Self::Selection),
            _ => {
                if let Some(rest) = raw.strip_prefix(HANDLE_PREFIX) {
                    return Handle::parse(rest).map(Self::Handle);
                }
                Handle::parse(raw)
                    .map(Self::Handle)
                    .map_err(|_| BridgeError::invalid(format!("unrecognized scope '{raw}'")))
            }
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document"),
            Self::Selection => f.write_str("selection"),
            Self::Handle(handle) => write!(f, "{HANDLE_PREFIX}{handle}"),
        }
    }
}

/// A scope turned into a live range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    pub range: RangeRef,
    /// Handle the range came from, if any.
    pub handle: Option<Handle>,
}

impl ResolvedScope {
    /// Whether the host range was created for this request only.
    pub fn is_transient(&self) -> bool {
        self.handle.is_none()
    }

    /// Stops tracking the range unless a registered handle still points at it.
    pub fn release(self, host: &mut dyn DocumentHost) {
        if self.is_transient() {
            host.release_range(self.range);
        }
    }
}

/// Resolves `scope` against the live document. The selection is read from
/// the host on every call; it changes out of band and is never cached.
pub fn resolve(
    scope: &Scope,
    host: &mut dyn DocumentHost,
    registry: &HandleRegistry,
) -> BridgeResult<ResolvedScope> {
    match scope {
        Scope::Document => Ok(ResolvedScope {
            range: host.body()?,
            handle: None,
        }),
        Scope::Selection => Ok(ResolvedScope {
            range: host.selection()?,
            handle: None,
        }),
        Scope::Handle(handle) => Ok(ResolvedScope {
            range: registry.resolve_range(handle)?,
            handle: Some(handle.clone()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::handle::HandleKind;

    #[test]
    fn parses_literal_scopes() {
        assert_eq!(Scope::parse("document").unwrap(), Scope::Document);
        assert_eq!(Scope::parse("selection").unwrap(), Scope::Selection);
    }

    #[test]
    fn parses_handle_scopes() {
        let Scope::Handle(handle) = Scope::parse("handle:range:k1-abc").unwrap() else {
            panic!("expected handle scope");
        };
        assert_eq!(handle.kind(), HandleKind::Range);
        assert_eq!(handle.as_str(), "range:k1-abc");

        assert_eq!(
            Scope::parse("range:k1-abc").unwrap(),
            Scope::parse("handle:range:k1-abc").unwrap()
        );
    }

    #[test]
    fn rejects_unknown_scope() {
        let err = Scope::parse("paragraph").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            Scope::parse("handle:nope").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn display_round_trips() {
        let scope = Scope::parse("handle:table:x-1").unwrap();
        assert_eq!(Scope::parse(&scope.to_string()).unwrap(), scope);
    }
}
