//! Stream Mediator Router
//!
//! The signaling core of the broker:
//! - Allocates session ids ([`IdentifierAllocator`])
//! - Tracks sessions and participant connections ([`SessionRegistry`], [`ConnectionRegistry`])
//! - Validates and routes call-setup messages between peers ([`Router`])
//! - Evicts stale entries and reports usage from regular traffic
//!   ([`MaintenanceGate`], [`Statistics`])
//!
//! # Example
//!
//! ```no_run
//! use mediator_router::{Router, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = Router::new(RouterConfig::default());
//!     router.serve_websocket("0.0.0.0:8080").await?;
//!     Ok(())
//! }
//! ```

pub mod allocator;
pub mod clock;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod handler;
pub mod maintenance;
pub mod registry;
pub mod router;
pub mod statistics;

pub use allocator::{CandidateSource, IdentifierAllocator, RandomCandidates};
pub use config::RouterConfig;
pub use dictionary::{Dictionary, DictionaryProvider, DictionaryStore};
pub use error::{Result, RouterError};
pub use handler::{ConnectionHandler, SignalingConnection};
pub use maintenance::MaintenanceGate;
pub use registry::{Connection, ConnectionRegistry, SessionRegistry};
pub use router::{CleanupReport, Router};
pub use statistics::{StatKey, Statistics};
