use async_trait::async_trait;
use concierge_core::domain::descriptor::{AgentCard, DomainId};
use concierge_core::domain::tool::{ParamType, ParameterSchema, ToolArguments, ToolSpec};
use serde::Serialize;
use uuid::Uuid;

use super::DomainProfile;
use crate::tools::{Tool, ToolError, ToolRegistry};

pub const DOMAIN_ID: &str = "recommend";

pub const SYSTEM_INSTRUCTION: &str = "\
You are a credit card recommendation assistant. Only help with finding and applying for cards; \
politely decline anything else.
Spending categories: shopping, fuel, travel, everyday, premium.
To recommend: ask for the main spending category if it is missing, call `recommend_card`, then \
explain the benefits in plain language.
To apply: call `apply_card` with the exact card name. The system asks the user to confirm before \
anything is submitted; never claim an application was filed unless the tool result says so.";

#[derive(Clone, Debug, Serialize)]
struct CardOffer {
    card_name: &'static str,
    card_type: &'static str,
    annual_fee: &'static str,
    main_benefits: &'static [&'static str],
    recommended_for: &'static str,
}

const CATALOG: &[(&str, CardOffer)] = &[
    (
        "shopping",
        CardOffer {
            card_name: "Everyday Shopper Card",
            card_type: "credit",
            annual_fee: "15,000 KRW domestic / 18,000 KRW international",
            main_benefits: &[
                "5% back on shopping",
                "extra online points",
                "double points on birthday",
            ],
            recommended_for: "frequent online and in-store shoppers",
        },
    ),
    (
        "fuel",
        CardOffer {
            card_name: "Road Saver Card",
            card_type: "credit",
            annual_fee: "15,000 KRW",
            main_benefits: &[
                "60 KRW off per litre",
                "mobile bill discount",
                "convenience store discount",
            ],
            recommended_for: "drivers who want everyday savings",
        },
    ),
    (
        "travel",
        CardOffer {
            card_name: "Voyager Travel Card",
            card_type: "credit",
            annual_fee: "30,000 KRW",
            main_benefits: &["airline miles", "airport lounge access", "duty-free discount"],
            recommended_for: "frequent international travellers",
        },
    ),
    (
        "everyday",
        CardOffer {
            card_name: "Daily Check Card",
            card_type: "debit",
            annual_fee: "free",
            main_benefits: &[
                "10% off at convenience stores",
                "public transit discount",
                "mobile bill discount",
            ],
            recommended_for: "customers with mostly day-to-day spending",
        },
    ),
    (
        "premium",
        CardOffer {
            card_name: "Platinum Reserve Card",
            card_type: "credit",
            annual_fee: "100,000 KRW",
            main_benefits: &[
                "unlimited lounge access",
                "valet parking",
                "hotel upgrades",
                "golf services",
            ],
            recommended_for: "customers who want premium services",
        },
    ),
];

fn offer_for(category: &str) -> &'static CardOffer {
    CATALOG
        .iter()
        .find(|(key, _)| *key == category)
        .or_else(|| CATALOG.iter().find(|(key, _)| *key == "everyday"))
        .map(|(_, offer)| offer)
        .unwrap_or(&CATALOG[0].1)
}

fn find_card(name: &str) -> Option<&'static CardOffer> {
    let wanted = name.trim().to_lowercase();
    CATALOG.iter().map(|(_, offer)| offer).find(|offer| offer.card_name.to_lowercase() == wanted)
}

pub struct RecommendCard {
    spec: ToolSpec,
}

impl Default for RecommendCard {
    fn default() -> Self {
        Self {
            spec: ToolSpec::new(
                "recommend_card",
                "Recommend a card for the user's main spending category.",
                ParameterSchema::new()
                    .required_one_of(
                        "spending_category",
                        "Main spending category",
                        &["shopping", "fuel", "travel", "everyday", "premium"],
                    )
                    .optional(
                        "monthly_spending",
                        ParamType::Integer,
                        "Estimated monthly spending in KRW",
                    ),
            ),
        }
    }
}

#[async_trait]
impl Tool for RecommendCard {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<String, ToolError> {
        let category = arguments
            .text("spending_category")
            .ok_or_else(|| ToolError::new("spending_category is required"))?;
        let offer = offer_for(category);

        let summary = serde_json::json!({
            "recommendation_id": Uuid::new_v4().to_string(),
            "spending_category": category,
            "monthly_spending": arguments.get("monthly_spending").map(ToString::to_string),
            "card": offer,
        });
        Ok(summary.to_string())
    }
}

pub struct ApplyCard {
    spec: ToolSpec,
}

impl Default for ApplyCard {
    fn default() -> Self {
        Self {
            spec: ToolSpec::new(
                "apply_card",
                "Submit a card application for the user. Requires the user's confirmation.",
                ParameterSchema::new().required(
                    "card_name",
                    ParamType::String,
                    "Exact name of the card to apply for",
                ),
            )
            .side_effecting(),
        }
    }
}

#[async_trait]
impl Tool for ApplyCard {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<String, ToolError> {
        let card_name =
            arguments.text("card_name").ok_or_else(|| ToolError::new("card_name is required"))?;
        let offer = find_card(card_name)
            .ok_or_else(|| ToolError::new(format!("unknown card `{card_name}`")))?;

        Ok(format!(
            "Application {} for {} was received. Review results follow within 3-5 business days.",
            Uuid::new_v4(),
            offer.card_name
        ))
    }

    fn confirmation_prompt(&self, arguments: &ToolArguments) -> String {
        let card_name = arguments.text("card_name").unwrap_or("the selected card");
        format!(
            "Shall I submit an application for '{card_name}'? Reply \"yes\" to apply or \"no\" to cancel."
        )
    }
}

pub fn registry() -> ToolRegistry {
    ToolRegistry::default().with(RecommendCard::default()).with(ApplyCard::default())
}

pub fn profile() -> DomainProfile {
    DomainProfile {
        card: AgentCard {
            domain_id: DomainId::from(DOMAIN_ID),
            name: "Card Recommendation Agent".to_string(),
            description: "Recommends cards by spending pattern and files card applications."
                .to_string(),
            supported_intents: ["recommend", "card", "shopping", "apply", "fuel", "travel"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        },
        system_instruction: SYSTEM_INSTRUCTION,
        registry: registry(),
    }
}
