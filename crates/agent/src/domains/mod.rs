//! Demonstration domains served by the agent role: card recommendation and transaction
//! history delivery.

use concierge_core::domain::descriptor::AgentCard;

use crate::tools::ToolRegistry;

pub mod cards;
pub mod transactions;

/// Everything a domain contributes to an agent runtime.
pub struct DomainProfile {
    pub card: AgentCard,
    pub system_instruction: &'static str,
    pub registry: ToolRegistry,
}

pub fn profile(domain: &str) -> Option<DomainProfile> {
    match domain {
        cards::DOMAIN_ID => Some(cards::profile()),
        transactions::DOMAIN_ID => Some(transactions::profile()),
        _ => None,
    }
}

pub fn known_domains() -> [&'static str; 2] {
    [cards::DOMAIN_ID, transactions::DOMAIN_ID]
}
