//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use console::style;
use hubcas_events::FailureContext;
use hubcas_types::{AccessCredential, ContentDescriptor};
use serde::Serialize;
use std::io;
use std::path::PathBuf;

/// Result of one command, renderable as text or JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum CommandOutput {
    Resolved {
        repo: String,
        path: String,
        revision: String,
        /// Absent when the file is not stored in CAS
        descriptor: Option<ContentDescriptor>,
    },
    Credential(CredentialSummary),
    Downloaded(Vec<DownloadRow>),
    Swept {
        dir: PathBuf,
        removed: usize,
    },
}

impl CommandOutput {
    /// Number of failed rows of a download
    pub fn failures(&self) -> usize {
        match self {
            CommandOutput::Downloaded(rows) => rows.iter().filter(|r| r.failure.is_some()).count(),
            _ => 0,
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            CommandOutput::Downloaded(rows) => rows.len(),
            _ => 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CredentialSummary {
    pub token: String,
    pub endpoint: String,
    pub repo: String,
    pub revision: String,
    pub direction: String,
    pub expiry: String,
}

impl From<AccessCredential> for CredentialSummary {
    fn from(credential: AccessCredential) -> Self {
        Self {
            token: credential.token,
            endpoint: credential.endpoint,
            repo: credential.scope.repo,
            revision: credential.scope.revision,
            direction: credential.scope.direction.to_string(),
            expiry: credential.expiry.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DownloadRow {
    pub path: String,
    pub hash: String,
    pub size: u64,
    pub local: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureContext>,
}

/// Output renderer for CLI results
#[derive(Clone, Copy)]
pub struct OutputRenderer {
    json_output: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    pub fn render(&self, output: &CommandOutput) -> io::Result<()> {
        if self.json_output {
            let json = serde_json::to_string_pretty(output).map_err(io::Error::other)?;
            println!("{json}");
            return Ok(());
        }

        match output {
            CommandOutput::Resolved {
                repo,
                path,
                revision,
                descriptor,
            } => match descriptor {
                Some(d) => println!("{repo}/{path}@{revision}: {} ({} bytes)", d.hash, d.size),
                None => println!(
                    "{repo}/{path}@{revision}: {}",
                    style("not stored in CAS").yellow()
                ),
            },
            CommandOutput::Credential(summary) => {
                println!("endpoint:  {}", summary.endpoint);
                println!(
                    "scope:     {} {}@{}",
                    summary.direction, summary.repo, summary.revision
                );
                println!("expires:   {}", summary.expiry);
                println!("token:     {}", summary.token);
            }
            CommandOutput::Downloaded(rows) => render_download_table(rows),
            CommandOutput::Swept { dir, removed } => {
                println!("removed {removed} staging file(s) from {}", dir.display());
            }
        }
        Ok(())
    }
}

fn render_download_table(rows: &[DownloadRow]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["File", "Size", "Status", "Location"]);

    for row in rows {
        let (status, location) = match (&row.local, &row.failure) {
            (Some(local), _) => (Cell::new("ok").fg(Color::Green), local.display().to_string()),
            (None, Some(failure)) => (
                Cell::new(failure.code.as_deref().unwrap_or("failed")).fg(Color::Red),
                failure.message.clone(),
            ),
            (None, None) => (Cell::new("skipped").fg(Color::Yellow), String::new()),
        };
        table.add_row(vec![
            Cell::new(&row.path),
            Cell::new(row.size),
            status,
            Cell::new(location),
        ]);
    }

    println!("{table}");
}
