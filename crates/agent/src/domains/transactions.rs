use async_trait::async_trait;
use concierge_core::domain::descriptor::{AgentCard, DomainId};
use concierge_core::domain::tool::{ParamType, ParameterSchema, ToolArguments, ToolSpec};
use uuid::Uuid;

use super::DomainProfile;
use crate::tools::{Tool, ToolError, ToolRegistry};

pub const DOMAIN_ID: &str = "transactions";

pub const SYSTEM_INSTRUCTION: &str = "\
You are a card transaction history assistant. Only help with sending transaction history; \
politely decline anything else.
Periods: 1m, 3m, 6m, 1y. Delivery methods: email (needs an email address) or sms (needs a \
phone number).
Collect the period, delivery method and contact detail, then call `send_transaction_history`. \
The system asks the user to confirm before anything is sent.";

fn period_label(period: &str) -> &'static str {
    match period {
        "1m" => "last month",
        "3m" => "last 3 months",
        "6m" => "last 6 months",
        _ => "last year",
    }
}

pub struct SendTransactionHistory {
    spec: ToolSpec,
}

impl Default for SendTransactionHistory {
    fn default() -> Self {
        Self {
            spec: ToolSpec::new(
                "send_transaction_history",
                "Send the user's card transaction history. Requires the user's confirmation.",
                ParameterSchema::new()
                    .required_one_of("period", "History window", &["1m", "3m", "6m", "1y"])
                    .required_one_of("delivery_method", "Delivery channel", &["email", "sms"])
                    .optional("email", ParamType::String, "Email address for email delivery")
                    .optional("phone", ParamType::String, "Phone number for sms delivery"),
            )
            .side_effecting(),
        }
    }
}

impl SendTransactionHistory {
    fn destination<'a>(arguments: &'a ToolArguments) -> Result<(&'a str, &'a str), ToolError> {
        let method = arguments
            .text("delivery_method")
            .ok_or_else(|| ToolError::new("delivery_method is required"))?;
        let contact = match method {
            "email" => arguments
                .text("email")
                .filter(|email| email.contains('@'))
                .ok_or_else(|| {
                    ToolError::new("a valid email address is required for email delivery")
                })?,
            _ => arguments
                .text("phone")
                .filter(|phone| !phone.trim().is_empty())
                .ok_or_else(|| ToolError::new("a phone number is required for sms delivery"))?,
        };
        Ok((method, contact))
    }
}

#[async_trait]
impl Tool for SendTransactionHistory {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: &ToolArguments) -> Result<String, ToolError> {
        let period =
            arguments.text("period").ok_or_else(|| ToolError::new("period is required"))?;
        let (method, contact) = Self::destination(arguments)?;

        Ok(format!(
            "Request {}: transaction history for the {} was sent by {} to {}.",
            Uuid::new_v4(),
            period_label(period),
            method,
            contact
        ))
    }

    fn confirmation_prompt(&self, arguments: &ToolArguments) -> String {
        let period = arguments.text("period").map(period_label).unwrap_or("requested period");
        match Self::destination(arguments) {
            Ok((method, contact)) => format!(
                "Shall I send your transaction history for the {period} by {method} to {contact}? \
                 Reply \"yes\" to send or \"no\" to cancel."
            ),
            Err(_) => format!(
                "Shall I send your transaction history for the {period}? \
                 Reply \"yes\" to send or \"no\" to cancel."
            ),
        }
    }
}

pub fn registry() -> ToolRegistry {
    ToolRegistry::default().with(SendTransactionHistory::default())
}

pub fn profile() -> DomainProfile {
    DomainProfile {
        card: AgentCard {
            domain_id: DomainId::from(DOMAIN_ID),
            name: "Transaction History Agent".to_string(),
            description: "Sends card transaction history by email or SMS.".to_string(),
            supported_intents: ["transaction", "history", "statement", "거래내역"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        },
        system_instruction: SYSTEM_INSTRUCTION,
        registry: registry(),
    }
}
