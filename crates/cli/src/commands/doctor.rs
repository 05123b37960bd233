use orderbot_core::config::{AppConfig, CatalogBackend, LedgerBackend, LoadOptions};
use orderbot_db::connect_with_config;
use orderbot_server::bootstrap_with_config;
use secrecy::ExposeSecret;
use serde::Serialize;

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

pub fn run(json_output: bool) -> (bool, String) {
    let report = build_report();
    let passed = report.overall_status == CheckStatus::Pass;

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return (passed, output);
    }

    (passed, render_human(&report))
}

pub fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_owned(),
            });
            checks.push(check_appsheet_credentials(&config));
            checks.extend(run_async_checks(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["appsheet_credentials", "database_connectivity", "bootstrap"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_owned(),
                });
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if failed {
        "doctor: one or more readiness checks failed".to_owned()
    } else {
        "doctor: all readiness checks passed".to_owned()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_appsheet_credentials(config: &AppConfig) -> DoctorCheck {
    let uses_appsheet = config.catalog.backend == CatalogBackend::AppSheet
        || config.ledger.backend == LedgerBackend::AppSheet;
    if !uses_appsheet {
        return DoctorCheck {
            name: "appsheet_credentials",
            status: CheckStatus::Skipped,
            details: "no backend uses appsheet".to_owned(),
        };
    }

    let has_key = !config.appsheet.api_key.expose_secret().trim().is_empty();
    let has_app = !config.appsheet.app_id.trim().is_empty();
    if has_key && has_app {
        DoctorCheck {
            name: "appsheet_credentials",
            status: CheckStatus::Pass,
            details: format!("app `{}` at {}", config.appsheet.app_id, config.appsheet.base_url),
        }
    } else {
        DoctorCheck {
            name: "appsheet_credentials",
            status: CheckStatus::Fail,
            details: "appsheet.app_id and appsheet.api_key must both be set".to_owned(),
        }
    }
}

fn run_async_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            }];
        }
    };

    runtime.block_on(async {
        vec![check_database_connectivity(config).await, check_bootstrap(config).await]
    })
}

async fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    if config.ledger.backend != LedgerBackend::Sqlite {
        return DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Skipped,
            details: format!("ledger backend is `{}`", config.ledger.backend.as_str()),
        };
    }

    match connect_with_config(&config.database).await {
        Ok(pool) => {
            pool.close().await;
            DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            }
        }
        Err(error) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Fail,
            details: format!("failed to connect to database: {error}"),
        },
    }
}

/// Wires every backend and seeds the order id allocator, which reads the
/// ledger once.
async fn check_bootstrap(config: &AppConfig) -> DoctorCheck {
    match bootstrap_with_config(config.clone()).await {
        Ok(app) => {
            let engine = app.service.engine();
            let details = format!(
                "catalog `{}`, ledger `{}`, next order sequence {}",
                engine.catalog_backend(),
                engine.ledger_backend(),
                engine.allocator().peek_next()
            );
            if let Some(pool) = app.db_pool {
                pool.close().await;
            }
            DoctorCheck { name: "bootstrap", status: CheckStatus::Pass, details }
        }
        Err(error) => {
            DoctorCheck { name: "bootstrap", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

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
