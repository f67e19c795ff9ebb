use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;
use sevents_registry::Payload;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    event: &'a str,
    has_body: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a Value>,
    timestamp: String,
}

pub fn print_event(name: &str, payload: &Payload, format: OutputFormat) {
    let line = render_event(name, payload, format);
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{line}");
    let _ = out.flush();
}

fn render_event(name: &str, payload: &Payload, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                event: name,
                has_body: !payload.is_none(),
                body: payload.as_value(),
                timestamp: now_unix_seconds(),
            };
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "BODY"])
                .add_row(vec![name.to_string(), body_preview(payload)]);
            table.to_string()
        }
        OutputFormat::Pretty => format!("event={name} body={}", body_preview(payload)),
    }
}

fn body_preview(payload: &Payload) -> String {
    match payload.as_value() {
        Some(value) => value.to_string(),
        None => "<none>".to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
