//! Master dispatcher: keeps each session pinned to one domain agent and forwards turns
//! to it over HTTP.

pub mod directory;
pub mod dispatcher;
pub mod selection;
pub mod transport;

pub use directory::DomainDirectory;
pub use dispatcher::Dispatcher;
pub use selection::{
    selector_for, ClassifierSelector, DomainSelector, FixedSelector, KeywordSelector,
};
pub use transport::{AgentTransport, HttpAgentTransport, TransportError};
