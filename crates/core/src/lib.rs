//! Brokerdesk core: configuration, error taxonomy, and the pure domain rules
//! (caller identity, query classification, pipeline metrics) shared by the
//! agent, the CRM gateway, and the service binaries.

pub mod config;
pub mod domain;
pub mod errors;

pub use domain::classification::{classify, QueryClassification};
pub use domain::metrics::PipelineMetrics;
pub use domain::principal::{resolve, Identity, Principal, PrincipalId, Role, UserProfile};
pub use errors::{IntegrationError, InterfaceError};
