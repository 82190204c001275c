//! Order-flow analysis engine.
//!
//! Wires the quote store, the stateless analytics, the background
//! processor loop and the query coordinator into one engine value that is
//! constructed at startup and threaded through; no hidden globals.

pub mod config;
pub mod processor;
pub mod query;
pub mod snapshot;
pub mod xml;

pub use config::EngineConfig;
pub use processor::{ProcessorEngine, ProcessorStatus, TickerStats};
pub use query::{AnalyzeRequest, OrderFlowEngine, QueryError};
