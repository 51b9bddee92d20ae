use std::time::Duration;

use callbrief_core::config::{AppConfig, LoadOptions};
use callbrief_core::PromptComposer;
use serde::Serialize;

use super::CommandResult;

const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub overall_status: CheckStatus,
    pub summary: String,
    pub checks: Vec<DoctorCheck>,
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

pub fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_prompt_template(&config));
            checks.extend(check_endpoints(&config));
            checks.push(check_slack(&config));
            checks.push(check_crm(&config));
            checks.push(check_transcript_fetch(&config));
            checks.push(check_signature_verification(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["agent_endpoint", "sandbox_endpoint"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_prompt_template(config: &AppConfig) -> DoctorCheck {
    let company_name = config.agent.company_name.clone().unwrap_or_default();
    match PromptComposer::new(company_name, config.agent.system_prompt.as_deref()) {
        Ok(_) => DoctorCheck {
            name: "prompt_template",
            status: CheckStatus::Pass,
            details: if config.agent.system_prompt.is_some() {
                "custom system prompt compiled".to_string()
            } else {
                "built-in system prompt compiled".to_string()
            },
        },
        Err(error) => DoctorCheck {
            name: "prompt_template",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

/// Any HTTP answer counts as reachable; only transport failures fail the check.
fn check_endpoints(config: &AppConfig) -> Vec<DoctorCheck> {
    let targets = [
        ("agent_endpoint", config.agent.base_url.clone()),
        ("sandbox_endpoint", config.sandbox.base_url.clone()),
    ];

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return targets
                .into_iter()
                .map(|(name, _)| DoctorCheck {
                    name,
                    status: CheckStatus::Fail,
                    details: format!("failed to initialize async runtime: {error}"),
                })
                .collect();
        }
    };

    let client = match reqwest::Client::builder().timeout(REACHABILITY_TIMEOUT).build() {
        Ok(client) => client,
        Err(error) => {
            return targets
                .into_iter()
                .map(|(name, _)| DoctorCheck {
                    name,
                    status: CheckStatus::Fail,
                    details: format!("failed to build http client: {error}"),
                })
                .collect();
        }
    };

    targets
        .into_iter()
        .map(|(name, url)| {
            let Some(url) = url else {
                return DoctorCheck {
                    name,
                    status: CheckStatus::Fail,
                    details: "endpoint is not configured".to_string(),
                };
            };
            match runtime.block_on(async { client.get(&url).send().await }) {
                Ok(response) => DoctorCheck {
                    name,
                    status: CheckStatus::Pass,
                    details: format!("`{url}` answered with status {}", response.status().as_u16()),
                },
                Err(error) => DoctorCheck {
                    name,
                    status: CheckStatus::Fail,
                    details: format!("`{url}` is unreachable: {error}"),
                },
            }
        })
        .collect()
}

fn check_slack(config: &AppConfig) -> DoctorCheck {
    if !config.slack.enabled {
        return DoctorCheck {
            name: "slack_sink",
            status: CheckStatus::Skipped,
            details: "slack.enabled is false".to_string(),
        };
    }
    DoctorCheck {
        name: "slack_sink",
        status: CheckStatus::Pass,
        details: format!(
            "posting to channel `{}`",
            config.slack.channel_id.as_deref().unwrap_or_default()
        ),
    }
}

fn check_crm(config: &AppConfig) -> DoctorCheck {
    if !config.crm.enabled {
        return DoctorCheck {
            name: "crm_sink",
            status: CheckStatus::Skipped,
            details: "crm.enabled is false".to_string(),
        };
    }
    DoctorCheck {
        name: "crm_sink",
        status: CheckStatus::Pass,
        details: format!(
            "recording tasks on `{}` (api {})",
            config.crm.instance_url.as_deref().unwrap_or_default(),
            config.crm.api_version
        ),
    }
}

fn check_transcript_fetch(config: &AppConfig) -> DoctorCheck {
    match config.provider.base_url.as_deref() {
        Some(url) => DoctorCheck {
            name: "transcript_fetch",
            status: CheckStatus::Pass,
            details: format!("missing transcripts are fetched from `{url}`"),
        },
        None => DoctorCheck {
            name: "transcript_fetch",
            status: CheckStatus::Skipped,
            details: "provider.base_url is unset; only inline transcripts are used".to_string(),
        },
    }
}

fn check_signature_verification(config: &AppConfig) -> DoctorCheck {
    if config.webhook.signing_secret.is_some() {
        return DoctorCheck {
            name: "webhook_signature",
            status: CheckStatus::Pass,
            details: format!(
                "signatures verified with a {}s tolerance",
                config.webhook.tolerance_secs
            ),
        };
    }
    DoctorCheck {
        name: "webhook_signature",
        status: CheckStatus::Skipped,
        details: "webhook.signing_secret is unset; inbound webhooks are not authenticated"
            .to_string(),
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
