//! CRM Gateway - GoHighLevel adapter behind the agent's `ToolExecutor` seam
//!
//! This crate turns one tool invocation into one HTTP call against the CRM:
//! - **Routes** (`routes`) - closed table of tools served by direct REST endpoints
//! - **Gateway** (`gateway`) - REST calls, the `tools/call` RPC envelope for every
//!   other catalog tool, and failure-as-data results
//! - **Transport** (`transport`) - JSON vs event-stream decoding into one payload shape
//!
//! # Architecture
//!
//! ```text
//! AgentRuntime → RequestFilter → CrmGateway::invoke → route_for(tool)
//!                                      ↓                 ├─ REST  (Bearer + Version)
//!                               ToolInvocationResult ← decode ←─ RPC (JSON | data: lines)
//! ```
//!
//! # Key Types
//!
//! - `CrmGateway` - the `ToolExecutor` implementation
//! - `RestRoute` - one direct REST mapping
//! - `DecodeError` - body could not be normalized

pub mod gateway;
pub mod routes;
pub mod transport;

pub use gateway::{CallError, CrmGateway, GatewayError};
pub use routes::{route_for, RestRoute, Route};
pub use transport::{decode, DecodeError, WireEncoding};
