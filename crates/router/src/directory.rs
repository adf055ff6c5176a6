use concierge_core::config::RouterConfig;
use concierge_core::domain::descriptor::{DomainDescriptor, DomainId};

use crate::transport::AgentTransport;

/// The router's view of every reachable domain, in configuration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainDirectory {
    domains: Vec<DomainDescriptor>,
    default_domain: Option<DomainId>,
}

impl DomainDirectory {
    pub fn new(domains: Vec<DomainDescriptor>, default_domain: Option<DomainId>) -> Self {
        Self { domains, default_domain }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        let domains = config
            .domains
            .iter()
            .map(|entry| {
                let mut descriptor =
                    DomainDescriptor::new(&entry.id, &entry.address, entry.intents.iter().cloned());
                if let Some(description) = &entry.description {
                    descriptor.description = description.clone();
                }
                descriptor
            })
            .collect();
        Self::new(domains, config.default_domain.as_deref().map(DomainId::from))
    }

    /// Fills descriptors from each agent's published card. Unreachable agents keep their
    /// configured metadata.
    pub async fn discover(self, transport: &dyn AgentTransport) -> Self {
        let mut domains = Vec::with_capacity(self.domains.len());
        for descriptor in self.domains {
            match transport.fetch_card(&descriptor).await {
                Ok(card) if card.domain_id == descriptor.domain_id => {
                    tracing::info!(
                        event_name = "router.agent_card_discovered",
                        domain = %descriptor.domain_id,
                        name = %card.name,
                        intents = card.supported_intents.len(),
                        "agent card discovered"
                    );
                    domains.push(descriptor.merge_card(&card));
                }
                Ok(card) => {
                    tracing::warn!(
                        event_name = "router.agent_card_mismatch",
                        domain = %descriptor.domain_id,
                        advertised = %card.domain_id,
                        "agent card advertises a different domain; keeping configuration"
                    );
                    domains.push(descriptor);
                }
                Err(error) => {
                    tracing::warn!(
                        event_name = "router.agent_card_unavailable",
                        domain = %descriptor.domain_id,
                        error = %error,
                        "agent card discovery failed; keeping configuration"
                    );
                    domains.push(descriptor);
                }
            }
        }
        Self { domains, default_domain: self.default_domain }
    }

    pub fn get(&self, domain: &DomainId) -> Option<&DomainDescriptor> {
        self.domains.iter().find(|descriptor| &descriptor.domain_id == domain)
    }

    pub fn descriptors(&self) -> &[DomainDescriptor] {
        &self.domains
    }

    /// Configured default, or the first domain when none is configured.
    pub fn default_domain(&self) -> Option<&DomainId> {
        self.default_domain
            .as_ref()
            .filter(|domain| self.get(domain).is_some())
            .or_else(|| self.domains.first().map(|descriptor| &descriptor.domain_id))
    }

    /// Domain with the most intent hits; ties go to the earlier domain. `None` on no hits.
    pub fn best_intent_match(&self, text: &str) -> Option<&DomainId> {
        let mut best: Option<(&DomainId, usize)> = None;
        for descriptor in &self.domains {
            let hits = descriptor.intent_hits(text);
            if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
                best = Some((&descriptor.domain_id, hits));
            }
        }
        best.map(|(domain, _)| domain)
    }

    /// The message says nothing the current domain handles but matches another domain.
    pub fn should_reoffer(&self, current: &DomainId, text: &str) -> bool {
        let current_hits = self.get(current).map_or(0, |descriptor| descriptor.intent_hits(text));
        current_hits == 0
            && self.domains.iter().any(|descriptor| {
                &descriptor.domain_id != current && descriptor.intent_hits(text) > 0
            })
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use concierge_core::config::AppConfig;
    use concierge_core::domain::descriptor::DomainId;

    use super::DomainDirectory;

    fn directory() -> DomainDirectory {
        DomainDirectory::from_config(&AppConfig::default().router)
    }

    #[test]
    fn keyword_match_prefers_the_domain_with_most_hits() {
        let directory = directory();
        assert_eq!(
            directory.best_intent_match("send my transaction history"),
            Some(&DomainId::from("transactions"))
        );
        assert_eq!(
            directory.best_intent_match("recommend a card for shopping"),
            Some(&DomainId::from("recommend"))
        );
        assert_eq!(directory.best_intent_match("what's the weather"), None);
    }

    #[test]
    fn reoffer_only_when_current_domain_has_no_hits_and_another_does() {
        let directory = directory();
        let recommend = DomainId::from("recommend");

        assert!(directory.should_reoffer(&recommend, "show my transaction history"));
        assert!(!directory.should_reoffer(&recommend, "thanks!"));
        assert!(!directory.should_reoffer(&recommend, "apply for the card history"));
    }

    #[test]
    fn words_containing_an_intent_do_not_trigger_a_reoffer() {
        let directory = directory();
        let transactions = DomainId::from("transactions");

        assert!(!directory.should_reoffer(&transactions, "discard that and resend it"));
        assert!(!directory.should_reoffer(&transactions, "I'm reapplying the filter"));
        assert!(directory.should_reoffer(&transactions, "which cards do you offer"));
    }

    #[test]
    fn default_domain_falls_back_to_first_entry() {
        let mut config = AppConfig::default().router;
        config.default_domain = None;
        let directory = DomainDirectory::from_config(&config);

        assert_eq!(directory.default_domain(), Some(&DomainId::from("recommend")));
        assert_eq!(directory.len(), 2);
    }
}
