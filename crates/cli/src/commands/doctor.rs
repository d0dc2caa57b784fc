use std::collections::HashSet;

use brokerdesk_agent::{ProviderStrategy, ToolCatalog};
use brokerdesk_core::config::{AppConfig, LoadOptions};
use brokerdesk_crm::routes::rest_routes;
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
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_provider_strategy(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "provider_strategy",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    checks.push(check_tool_catalog());
    checks.push(check_rest_routes());

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_provider_strategy(config: &AppConfig) -> DoctorCheck {
    let strategy = ProviderStrategy::from_config(&config.llm);
    if strategy.is_empty() {
        return DoctorCheck {
            name: "provider_strategy",
            status: CheckStatus::Fail,
            details: "no model credentials configured".to_string(),
        };
    }

    let models =
        strategy.attempts().iter().map(|attempt| attempt.model.as_str()).collect::<Vec<_>>();
    DoctorCheck {
        name: "provider_strategy",
        status: CheckStatus::Pass,
        details: format!("{} attempt(s): {}", models.len(), models.join(" -> ")),
    }
}

fn check_tool_catalog() -> DoctorCheck {
    let catalog = ToolCatalog;
    let mut seen = HashSet::new();
    let duplicates = catalog
        .list_tools()
        .iter()
        .filter(|descriptor| !seen.insert(descriptor.name))
        .map(|descriptor| descriptor.name)
        .collect::<Vec<_>>();

    if catalog.is_empty() || !duplicates.is_empty() {
        return DoctorCheck {
            name: "tool_catalog",
            status: CheckStatus::Fail,
            details: format!("catalog is empty or has duplicate names: {duplicates:?}"),
        };
    }

    let scoped = catalog.list_tools().iter().filter(|tool| tool.supports_owner_scope()).count();
    DoctorCheck {
        name: "tool_catalog",
        status: CheckStatus::Pass,
        details: format!("{} tools, {scoped} accept owner scoping", catalog.len()),
    }
}

fn check_rest_routes() -> DoctorCheck {
    let catalog = ToolCatalog;
    let orphaned = rest_routes()
        .iter()
        .filter(|route| !catalog.contains(route.tool))
        .map(|route| route.tool)
        .collect::<Vec<_>>();

    if orphaned.is_empty() {
        DoctorCheck {
            name: "crm_routes",
            status: CheckStatus::Pass,
            details: format!("{} REST routes map to catalog tools", rest_routes().len()),
        }
    } else {
        DoctorCheck {
            name: "crm_routes",
            status: CheckStatus::Fail,
            details: format!("routes without a catalog tool: {}", orphaned.join(", ")),
        }
    }
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
