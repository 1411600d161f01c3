//! domsentry shared types
//!
//! Wire records exchanged between the in-page collector, the alert server
//! and the UI surfaces: alerts, extension inventory entries, the message
//! protocol, and the URL/origin helpers both sides rely on.

pub mod alert;
pub mod error;
pub mod extension;
pub mod limits;
pub mod message;
pub mod origin;
pub mod severity;

pub use alert::{
    ActionChange, AddedEntry, Alert, AttributeEntry, Counts, Diff, DiffOverflow, EvidenceSummary,
    FormEvidence, IframeEvidence, InputEvidence, RemovedEntry, ScriptEvidence, Security,
    SecurityOverflow, TagCount, TextEntry, UrlChange,
};
pub use error::{ErrorCode, ErrorReport};
pub use extension::{ExtensionRecord, SourceExtension};
pub use message::{Message, Response};
pub use origin::OriginKind;
pub use severity::Level;
