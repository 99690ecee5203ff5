//! Schema subsystem: record kinds, the per-field rule language, and the
//! registry that validates candidates against it.

mod errors;
mod registry;
mod types;

pub use errors::{FieldError, RuleKind, UnknownKind};
pub use registry::{SchemaRegistry, AGENT_STATES, EXECUTION_STATUSES};
pub use types::{FieldRule, FieldType, KindSchema, RecordKind};
