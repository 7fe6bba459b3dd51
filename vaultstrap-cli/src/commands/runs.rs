use crate::cli::GlobalFlags;
use clap::{Args, ValueEnum};
use comfy_table::{Table, presets};
use vaultstrap::RunRecord;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Only show runs for this node, oldest first
    #[arg(long)]
    pub node: Option<String>,

    /// Number of entries to show when no node is given, newest first
    #[arg(short = 'n', long, default_value_t = 20)]
    pub limit: usize,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

pub async fn execute(args: RunsArgs, global: &GlobalFlags) -> anyhow::Result<()> {
    let log = global.open_run_log()?;
    let records = match &args.node {
        Some(node) => log.runs_for(node)?,
        None => log.recent(args.limit)?,
    };

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Table => println!("{}", render_table(&records)),
    }
    Ok(())
}

fn render_table(records: &[RunRecord]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    table.set_header(vec!["RUN", "NODE", "STAGE", "OUTCOME", "RECORDED", "DETAIL"]);
    for record in records {
        table.add_row(vec![
            record.run_id.clone(),
            record.node.clone(),
            record.stage.to_string(),
            record.outcome.to_string(),
            record.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            record.detail.clone().unwrap_or_default(),
        ]);
    }
    table
}
