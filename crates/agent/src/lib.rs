//! domsentry-agent: the page side of domsentry.
//!
//! Consumes host mutation batches, accumulates bounded evidence per
//! document, classifies it, and decides when a window becomes an alert.
//!
//! ```text
//! host batches ─► MutationCollector ─► EvidenceWindow
//!                                          │ debounce
//!                                          ▼
//!                          FlushGate (classify + rules) ─► AlertSink
//! ```

pub mod classifier;
pub mod config;
pub mod dom;
pub mod flush_gate;
pub mod sensors;
pub mod session;
pub mod sink;
pub mod window;

pub use classifier::{classify, Classification};
pub use config::CollectorConfig;
pub use dom::{AncestorRef, Attribute, ElementNode, MutationBatch, MutationRecord, Node};
pub use flush_gate::{DiscardReason, FlushDecision, FlushGate, GateState, PageInfo};
pub use sensors::{BatchStats, MutationCollector};
pub use session::{run_observer, HostEvent, ObserverStats, PageObserver, Visibility};
pub use sink::{AlertSink, ChannelSink, HttpSink, MemorySink, SinkError};
pub use window::{EvidenceWindow, WindowEvidence, WindowLimits};
