//! Status command

use crate::cli::OutputFormat;
use crate::errors::{EXIT_SUCCESS, NOT_ATTACHED};
use crate::session::Session;
use anyhow::Result;
use owo_colors::OwoColorize;
use pro_common::{ApplicationStatus, ContractCache};
use serde::Serialize;

const SERVICE_WIDTH: usize = 17;
const ENTITLED_WIDTH: usize = 10;
const STATUS_WIDTH: usize = 10;
const NOT_ENTITLED_STATUS: &str = "—";

/// One line of status output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRow {
    pub name: String,
    pub entitled: bool,
    /// `None` when not entitled
    pub status: Option<ApplicationStatus>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusDocument<'a> {
    attached: bool,
    services: &'a [ServiceRow],
}

pub fn collect_rows(session: &Session) -> Result<Vec<ServiceRow>> {
    let env = session.engine.environment();
    let mut rows = Vec::new();
    for ent in env.registry.iter() {
        let entitled = session
            .contract
            .snapshot(ent.name)
            .map(|s| s.entitled)
            .unwrap_or(false);
        if !entitled {
            rows.push(ServiceRow {
                name: ent.name.to_string(),
                entitled,
                status: None,
                description: ent.description.to_string(),
                warning: None,
            });
            continue;
        }
        let report = session.engine.status_report(ent.name)?;
        rows.push(ServiceRow {
            name: ent.name.to_string(),
            entitled,
            status: Some(report.status),
            description: report
                .description_override
                .map(|d| d.msg)
                .unwrap_or_else(|| ent.description.to_string()),
            warning: report.warning.map(|w| w.msg),
        });
    }
    Ok(rows)
}

fn paint_status(status: Option<ApplicationStatus>, color: bool) -> String {
    let label = status.map(|s| s.as_str()).unwrap_or(NOT_ENTITLED_STATUS);
    let padded = format!("{:<width$}", label, width = STATUS_WIDTH);
    if !color {
        return padded;
    }
    match status {
        Some(ApplicationStatus::Enabled) => padded.green().to_string(),
        Some(ApplicationStatus::Pending) => padded.yellow().to_string(),
        Some(ApplicationStatus::Disabled) => padded.red().to_string(),
        None => padded.dimmed().to_string(),
    }
}

/// Table text; unentitled services only with `all`
pub fn render_table(rows: &[ServiceRow], all: bool, color: bool) -> String {
    let mut out = String::new();
    let header = format!(
        "{:<sw$}{:<ew$}{:<tw$}{}",
        "SERVICE",
        "ENTITLED",
        "STATUS",
        "DESCRIPTION",
        sw = SERVICE_WIDTH,
        ew = ENTITLED_WIDTH,
        tw = STATUS_WIDTH
    );
    if color {
        out.push_str(&header.bold().to_string());
    } else {
        out.push_str(&header);
    }
    out.push('\n');

    for row in rows.iter().filter(|r| all || r.entitled) {
        out.push_str(&format!(
            "{:<sw$}{:<ew$}{}{}\n",
            row.name,
            if row.entitled { "yes" } else { "no" },
            paint_status(row.status, color),
            row.description,
            sw = SERVICE_WIDTH,
            ew = ENTITLED_WIDTH
        ));
    }

    // Advisory warnings for active services only
    let notices: Vec<&str> = rows
        .iter()
        .filter(|r| r.status.map(|s| s.is_active()).unwrap_or(false))
        .filter_map(|r| r.warning.as_deref())
        .collect();
    if !notices.is_empty() {
        out.push_str("\nNOTICES\n");
        for notice in notices {
            out.push_str(notice);
            out.push('\n');
        }
    }
    out
}

pub fn run(session: &Session, all: bool, format: OutputFormat) -> Result<i32> {
    let attached = session.contract.is_attached();
    let rows = if attached {
        collect_rows(session)?
    } else {
        Vec::new()
    };

    match format {
        OutputFormat::Json => {
            let doc = StatusDocument {
                attached,
                services: &rows,
            };
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Tabular if !attached => println!("{}", NOT_ATTACHED),
        OutputFormat::Tabular => {
            use std::io::IsTerminal;
            let color = std::io::stdout().is_terminal();
            print!("{}", render_table(&rows, all, color));
        }
    }
    Ok(EXIT_SUCCESS)
}
