use std::sync::Arc;

use async_trait::async_trait;
use concierge_agent::llm::{CompletionRequest, CompletionResult, CompletionService};
use concierge_core::config::SelectionPolicy;
use concierge_core::domain::descriptor::DomainId;
use concierge_core::domain::session::{Transcript, Turn};

use crate::directory::DomainDirectory;

/// Picks the domain for a message that has no usable sticky target. `None` leaves the
/// decision to the directory default.
#[async_trait]
pub trait DomainSelector: Send + Sync {
    fn policy(&self) -> SelectionPolicy;

    async fn select(&self, directory: &DomainDirectory, text: &str) -> Option<DomainId>;
}

/// Always the configured default domain.
pub struct FixedSelector;

#[async_trait]
impl DomainSelector for FixedSelector {
    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::Fixed
    }

    async fn select(&self, directory: &DomainDirectory, _text: &str) -> Option<DomainId> {
        directory.default_domain().cloned()
    }
}

pub struct KeywordSelector;

#[async_trait]
impl DomainSelector for KeywordSelector {
    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::Keyword
    }

    async fn select(&self, directory: &DomainDirectory, text: &str) -> Option<DomainId> {
        directory.best_intent_match(text).or_else(|| directory.default_domain()).cloned()
    }
}

/// Asks the completion service to name a domain, falling back to keyword matching when
/// the answer is unusable.
pub struct ClassifierSelector {
    completion: Arc<dyn CompletionService>,
}

impl ClassifierSelector {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    fn instruction(directory: &DomainDirectory) -> String {
        let mut instruction = String::from(
            "Route the user's message to exactly one of the domains below. \
             Answer with the domain id only.\n",
        );
        for descriptor in directory.descriptors() {
            let intents: Vec<&str> =
                descriptor.supported_intents.iter().map(String::as_str).collect();
            instruction.push_str(&format!(
                "- {}: {} (intents: {})\n",
                descriptor.domain_id,
                descriptor.description,
                intents.join(", ")
            ));
        }
        instruction
    }

    fn parse_answer(directory: &DomainDirectory, answer: &str) -> Option<DomainId> {
        let normalized = answer.trim().trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        if let Some(descriptor) = directory
            .descriptors()
            .iter()
            .find(|descriptor| descriptor.domain_id.as_str().to_lowercase() == normalized)
        {
            return Some(descriptor.domain_id.clone());
        }

        let lowered = answer.to_lowercase();
        let mentioned: Vec<&DomainId> = directory
            .descriptors()
            .iter()
            .map(|descriptor| &descriptor.domain_id)
            .filter(|domain| lowered.contains(&domain.as_str().to_lowercase()))
            .collect();
        match mentioned.as_slice() {
            [only] => Some((*only).clone()),
            _ => None,
        }
    }
}

#[async_trait]
impl DomainSelector for ClassifierSelector {
    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::Classifier
    }

    async fn select(&self, directory: &DomainDirectory, text: &str) -> Option<DomainId> {
        let instruction = Self::instruction(directory);
        let mut transcript = Transcript::default();
        transcript.append(Turn::user(text));

        let request = CompletionRequest {
            transcript: &transcript,
            tools: &[],
            system_instruction: &instruction,
        };
        match self.completion.complete(request).await {
            Ok(CompletionResult::Text(answer)) => {
                if let Some(domain) = Self::parse_answer(directory, &answer) {
                    return Some(domain);
                }
                tracing::warn!(
                    event_name = "router.classifier_unparsable",
                    answer = %answer,
                    "classifier answer names no known domain; using keyword match"
                );
            }
            Ok(CompletionResult::ToolCall { tool_name, .. }) => {
                tracing::warn!(
                    event_name = "router.classifier_unparsable",
                    tool_name = %tool_name,
                    "classifier requested a tool; using keyword match"
                );
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "router.classifier_failed",
                    error = %error,
                    "classifier unavailable; using keyword match"
                );
            }
        }
        KeywordSelector.select(directory, text).await
    }
}

pub fn selector_for(
    policy: SelectionPolicy,
    completion: Option<Arc<dyn CompletionService>>,
) -> Arc<dyn DomainSelector> {
    match (policy, completion) {
        (SelectionPolicy::Fixed, _) => Arc::new(FixedSelector),
        (SelectionPolicy::Classifier, Some(completion)) => {
            Arc::new(ClassifierSelector::new(completion))
        }
        (SelectionPolicy::Classifier, None) => {
            tracing::warn!(
                event_name = "router.classifier_disabled",
                "no completion service for classifier selection; using keyword match"
            );
            Arc::new(KeywordSelector)
        }
        (SelectionPolicy::Keyword, _) => Arc::new(KeywordSelector),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use concierge_agent::llm::{
        CompletionError, CompletionRequest, CompletionResult, CompletionService,
    };
    use concierge_core::config::AppConfig;
    use concierge_core::domain::descriptor::DomainId;

    use super::{ClassifierSelector, DomainSelector, FixedSelector, KeywordSelector};
    use crate::directory::DomainDirectory;

    struct Answer(Result<&'static str, ()>);

    #[async_trait]
    impl CompletionService for Answer {
        async fn complete(
            &self,
            request: CompletionRequest<'_>,
        ) -> Result<CompletionResult, CompletionError> {
            assert!(request.system_instruction.contains("transactions"));
            assert!(request.tools.is_empty());
            self.0
                .map(|text| CompletionResult::Text(text.to_string()))
                .map_err(|_| CompletionError::network("connection refused"))
        }
    }

    fn directory() -> DomainDirectory {
        DomainDirectory::from_config(&AppConfig::default().router)
    }

    #[tokio::test]
    async fn keyword_selector_uses_default_without_hits() {
        let directory = directory();
        assert_eq!(
            KeywordSelector.select(&directory, "send my statement").await,
            Some(DomainId::from("transactions"))
        );
        assert_eq!(
            KeywordSelector.select(&directory, "hello there").await,
            Some(DomainId::from("recommend"))
        );
    }

    #[tokio::test]
    async fn fixed_selector_ignores_the_message() {
        assert_eq!(
            FixedSelector.select(&directory(), "transaction history please").await,
            Some(DomainId::from("recommend"))
        );
    }

    #[tokio::test]
    async fn classifier_accepts_a_bare_domain_id() {
        let selector = ClassifierSelector::new(Arc::new(Answer(Ok(" Transactions.\n"))));
        assert_eq!(
            selector.select(&directory(), "where did my money go").await,
            Some(DomainId::from("transactions"))
        );
    }

    #[tokio::test]
    async fn classifier_falls_back_to_keywords_when_unusable() {
        let directory = directory();

        let rambling = ClassifierSelector::new(Arc::new(Answer(Ok("I am not sure"))));
        assert_eq!(
            rambling.select(&directory, "recommend a travel card").await,
            Some(DomainId::from("recommend"))
        );

        let offline = ClassifierSelector::new(Arc::new(Answer(Err(()))));
        assert_eq!(
            offline.select(&directory, "transaction history").await,
            Some(DomainId::from("transactions"))
        );
    }
}
