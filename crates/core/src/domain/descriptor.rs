use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::text::tokenize;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainId(pub String);

impl DomainId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DomainId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Self-description an agent runtime publishes at `/.well-known/agent.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCard {
    pub domain_id: DomainId,
    pub name: String,
    pub description: String,
    pub supported_intents: Vec<String>,
}

/// Router-side metadata about one specialized agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainDescriptor {
    pub domain_id: DomainId,
    pub name: String,
    pub description: String,
    pub network_address: String,
    pub supported_intents: BTreeSet<String>,
}

impl DomainDescriptor {
    pub fn new<I, T>(domain_id: &str, network_address: &str, intents: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            domain_id: DomainId::from(domain_id),
            name: domain_id.to_string(),
            description: String::new(),
            network_address: network_address.trim_end_matches('/').to_string(),
            supported_intents: intents
                .into_iter()
                .map(|intent| intent.into().trim().to_lowercase())
                .filter(|intent| !intent.is_empty())
                .collect(),
        }
    }

    /// Fills in name, description and (when none were configured) intents from a card.
    pub fn merge_card(mut self, card: &AgentCard) -> Self {
        self.name = card.name.clone();
        self.description = card.description.clone();
        if self.supported_intents.is_empty() {
            self.supported_intents =
                card.supported_intents.iter().map(|intent| intent.trim().to_lowercase()).collect();
        }
        self
    }

    /// Number of supported intent labels that occur in the text. Each word of a label has to
    /// start a word of the text, so "card" counts in "cards" but not in "discard".
    pub fn intent_hits(&self, text: &str) -> usize {
        let tokens = tokenize(text);
        self.supported_intents.iter().filter(|intent| mentions(&tokens, intent)).count()
    }
}

fn mentions(tokens: &[String], intent: &str) -> bool {
    let words = intent.split_whitespace().collect::<Vec<_>>();
    if words.is_empty() {
        return false;
    }
    tokens.windows(words.len()).any(|window| {
        window.iter().zip(&words).all(|(token, word)| token.starts_with(word))
    })
}

#[cfg(test)]
mod tests {
    use super::{AgentCard, DomainDescriptor, DomainId};

    #[test]
    fn intent_hits_are_case_insensitive() {
        let descriptor =
            DomainDescriptor::new("recommend", "http://127.0.0.1:10000/", ["Card", "shopping"]);

        assert_eq!(descriptor.network_address, "http://127.0.0.1:10000");
        assert_eq!(descriptor.intent_hits("I want a SHOPPING card"), 2);
        assert_eq!(descriptor.intent_hits("send my statement"), 0);
    }

    #[test]
    fn intents_match_word_starts_only() {
        let descriptor = DomainDescriptor::new(
            "recommend",
            "http://a",
            ["card", "apply", "transaction history", "거래내역"],
        );

        assert_eq!(descriptor.intent_hits("please discard that"), 0);
        assert_eq!(descriptor.intent_hits("I'm reapplying next month"), 0);
        assert_eq!(descriptor.intent_hits("which cards can I apply for?"), 2);
        assert_eq!(descriptor.intent_hits("email my transaction history"), 1);
        assert_eq!(descriptor.intent_hits("history of the transaction"), 0);
        assert_eq!(descriptor.intent_hits("거래내역을 보내주세요"), 1);
    }

    #[test]
    fn configured_intents_win_over_card_intents() {
        let card = AgentCard {
            domain_id: DomainId::from("recommend"),
            name: "Card Recommendation".to_string(),
            description: "Recommends cards".to_string(),
            supported_intents: vec!["card".to_string(), "benefit".to_string()],
        };

        let configured = DomainDescriptor::new("recommend", "http://a", ["shopping"]);
        let merged = configured.merge_card(&card);
        assert_eq!(merged.name, "Card Recommendation");
        assert_eq!(merged.supported_intents.len(), 1);

        let bare = DomainDescriptor::new("recommend", "http://a", Vec::<String>::new());
        assert_eq!(bare.merge_card(&card).supported_intents.len(), 2);
    }
}
