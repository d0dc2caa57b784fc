//! Agent runtime: turns a broker's free-text question into CRM tool calls and
//! a natural-language answer.
//!
//! # Flow
//!
//! 1. **Classification** - keyword label of the raw query (`brokerdesk_core::classify`)
//! 2. **Round one** (`runtime`) - system prompt + Tool Catalog + query sent to the model
//! 3. **Scoping** (`guardrails`) - every requested tool call passes the Request Filter
//! 4. **Execution** (`tools::ToolExecutor`) - the CRM gateway runs the scoped calls
//! 5. **Round two** - tool results go back to the model for the final text
//! 6. **Extraction** (`extractor`) - result block and structured-data hint for the UI
//!
//! # Key Types
//!
//! - `AgentRuntime` - the two-round orchestrator
//! - `LlmClient` - model provider seam, implemented by `AnthropicClient`
//! - `ToolExecutor` - CRM seam, implemented by the gateway crate
//! - `RequestFilter` - ownership scoping of tool invocations
//!
//! # Safety Principle
//!
//! The model never decides whose records a broker sees. Ownership scoping is
//! applied deterministically to every invocation before it reaches the CRM.

pub mod anthropic;
pub mod extractor;
pub mod guardrails;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod tools;

pub use anthropic::AnthropicClient;
pub use extractor::{extract, Extraction, StructuredData};
pub use guardrails::{scope, RequestFilter, ScopeDecision};
pub use llm::{LlmClient, ProviderError, ProviderStrategy};
pub use runtime::{AgentAnswer, AgentRuntime, ToolInvocationRecord};
pub use tools::{
    ToolCatalog, ToolDescriptor, ToolExecutor, ToolInvocationRequest, ToolInvocationResult,
};
