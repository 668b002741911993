//! Operation bridge between abstract editing requests and a live
//! word-processing document.

pub mod dispatch;
pub mod error;
pub mod handle;
pub mod host;
pub mod memory;
pub mod picture;
pub mod replace;
pub mod scope;
pub mod search;
pub mod session;
pub mod style;
pub mod table;
pub mod text;
pub mod translate;

pub use dispatch::{dispatch, Opcode, OperationRequest, OperationResult};
pub use error::{BridgeError, BridgeResult, Diagnostic, ErrorKind, HostError, HostResult, Level};
pub use handle::{Handle, HandleKind, HandleRegistry, LiveRef};
pub use host::{DocumentHost, Location, RangeRef, TableRef};
pub use memory::{MemoryDocument, StyleDef, SyncFault};
pub use picture::{FetchError, PictureFetcher, PictureLimits, SourceKind};
pub use scope::Scope;
pub use search::MatchOptions;
pub use session::{BridgeSettings, Session, SharedSession};
pub use style::{Precedence, StyleSpec};
pub use table::TableLimits;
