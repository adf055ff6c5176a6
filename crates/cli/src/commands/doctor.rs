use std::time::Duration;

use concierge_agent::domains;
use concierge_core::config::{AppConfig, LoadOptions, ServerRole};
use serde::Serialize;

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: impl Into<String>, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name: name.into(), status, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool, probe_domains: bool) -> CommandResult {
    let report = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => build_report(Ok(&config), probe_domains),
        Err(error) => build_report(Err(error.to_string()), probe_domains),
    };
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 3 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report(config: Result<&AppConfig, String>, probe_domains: bool) -> DoctorReport {
    let mut checks = Vec::new();

    match config {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_domain_tool_set(config));
            if probe_domains {
                checks.extend(check_domain_health(config));
            } else {
                checks.push(DoctorCheck::new(
                    "domain_health",
                    CheckStatus::Skipped,
                    "skipped by --offline",
                ));
            }
        }
        Err(error) => {
            checks.push(DoctorCheck::new("config_validation", CheckStatus::Fail, error));
            checks.push(DoctorCheck::new(
                "domain_tool_set",
                CheckStatus::Skipped,
                "skipped because configuration did not load",
            ));
            checks.push(DoctorCheck::new(
                "domain_health",
                CheckStatus::Skipped,
                "skipped because configuration did not load",
            ));
        }
    }

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_domain_tool_set(config: &AppConfig) -> DoctorCheck {
    if config.server.role == ServerRole::Router {
        return DoctorCheck::new(
            "domain_tool_set",
            CheckStatus::Skipped,
            "router role does not host a tool set",
        );
    }

    match domains::profile(&config.agent.domain) {
        Some(profile) => DoctorCheck::new(
            "domain_tool_set",
            CheckStatus::Pass,
            format!(
                "domain `{}` provides {} tool(s)",
                config.agent.domain,
                profile.registry.len()
            ),
        ),
        None => DoctorCheck::new(
            "domain_tool_set",
            CheckStatus::Fail,
            format!(
                "agent.domain `{}` has no tool set (known: {})",
                config.agent.domain,
                domains::known_domains().join(", ")
            ),
        ),
    }
}

fn check_domain_health(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck::new(
                "domain_health",
                CheckStatus::Fail,
                format!("failed to initialize async runtime: {error}"),
            )];
        }
    };

    let client = match reqwest::Client::builder().timeout(Duration::from_secs(3)).build() {
        Ok(client) => client,
        Err(error) => {
            return vec![DoctorCheck::new(
                "domain_health",
                CheckStatus::Fail,
                format!("failed to build http client: {error}"),
            )];
        }
    };

    runtime.block_on(async {
        let mut checks = Vec::with_capacity(config.router.domains.len());
        for entry in &config.router.domains {
            let name = format!("domain_health:{}", entry.id);
            let url = format!("{}/health", entry.address.trim_end_matches('/'));
            let check = match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    DoctorCheck::new(name, CheckStatus::Pass, format!("{url} is ready"))
                }
                Ok(response) => DoctorCheck::new(
                    name,
                    CheckStatus::Fail,
                    format!("{url} answered {}", response.status()),
                ),
                Err(error) => DoctorCheck::new(
                    name,
                    CheckStatus::Fail,
                    format!("{url} unreachable: {error}"),
                ),
            };
            checks.push(check);
        }
        checks
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
