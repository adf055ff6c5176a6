pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod store;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use config::AppConfig;
pub use domain::confirmation::{ActionId, CommittedAction, PendingConfirmation, ProposalId};
pub use domain::descriptor::{AgentCard, DomainDescriptor, DomainId};
pub use domain::exchange::{ErrorBody, TurnRequest, TurnResponse};
pub use domain::session::{Session, SessionId, Transcript, Turn, TurnRole, TurnStatus};
pub use domain::tool::{ArgValue, ParameterSchema, ToolArguments, ToolSpec};
pub use errors::{ApplicationError, InterfaceError, TurnError};
pub use store::{InMemorySessionStore, SessionLocks, SessionStore, StoreError};
