//! Lint command

use anyhow::Result;
use clap::Args;
use tabled::Tabled;

use lab_lib::lint::{default_tier1, lint};

use crate::commands::ConfigArgs;
use crate::output::{color_risk, color_severity, print_info, print_success, print_table, OutputFormat};

#[derive(Args)]
pub struct LintArgs {
    #[command(flatten)]
    pub source: ConfigArgs,
}

#[derive(Tabled, serde::Serialize)]
struct FindingRow {
    #[tabled(rename = "Rule")]
    rule: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Message")]
    message: String,
}

pub fn run(args: LintArgs, format: OutputFormat) -> Result<()> {
    let (config, _mode) = args.source.resolve()?;
    let result = lint(&config, &default_tier1());

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Table => {
            if result.findings.is_empty() {
                print_success("No findings");
            } else {
                let rows: Vec<FindingRow> = result
                    .findings
                    .iter()
                    .map(|f| FindingRow {
                        rule: f.rule_id.to_string(),
                        severity: color_severity(f.severity),
                        message: match &f.context {
                            Some(context) => format!("{} ({context})", f.message),
                            None => f.message.clone(),
                        },
                    })
                    .collect();
                print_table(&rows, format);
            }
            print_info(&format!("Risk score: {}", color_risk(result.risk_score)));
            if result.blocks_rollout() {
                print_info("Score gates unforced rollouts");
            }
        }
    }

    if result.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}
