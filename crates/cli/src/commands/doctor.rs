use std::path::{Path, PathBuf};

use serde::Serialize;
use tally_core::config::{AppConfig, LoadOptions};
use tally_db::{connect_from_config, ping};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
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

pub struct DoctorOutput {
    pub passed: bool,
    pub rendered: String,
}

pub fn run(options: &LoadOptions, json_output: bool) -> DoctorOutput {
    let report = build_report(options);
    let passed = report.overall_status == CheckStatus::Pass;

    let rendered = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    DoctorOutput { passed, rendered }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(DoctorCheck {
                name: "ai_endpoint",
                status: CheckStatus::Pass,
                details: format!("model `{}` at {}", config.ai.model, config.ai.api_url),
            });
            checks.push(check_tool("pyxplot", config.digest.pyxplot_path.as_deref()));
            checks.push(check_tool("mogrify", config.digest.mogrify_path.as_deref()));
            checks.push(check_database_connectivity(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["ai_endpoint", "chart_tool:pyxplot", "chart_tool:mogrify", "database_connectivity"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let failed = checks
        .iter()
        .any(|check| matches!(check.status, CheckStatus::Fail | CheckStatus::Skipped));
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Missing chart tools only cost monthly and quarterly charts, so they warn.
fn check_tool(tool: &'static str, configured: Option<&Path>) -> DoctorCheck {
    let name = match tool {
        "pyxplot" => "chart_tool:pyxplot",
        _ => "chart_tool:mogrify",
    };
    let resolved: Option<PathBuf> = match configured {
        Some(path) => path.is_file().then(|| path.to_path_buf()),
        None => which::which(tool).ok(),
    };

    match resolved {
        Some(path) => DoctorCheck {
            name,
            status: CheckStatus::Pass,
            details: format!("found at {}", path.display()),
        },
        None => DoctorCheck {
            name,
            status: CheckStatus::Warn,
            details: format!("`{tool}` not found; monthly and quarterly digests will omit charts"),
        },
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        ping(&pool).await.map_err(|error| format!("database query failed: {error}"))?;
        pool.close().await;
        Ok::<(), String>(())
    });

    match result {
        Ok(()) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`", config.database.url),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
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
