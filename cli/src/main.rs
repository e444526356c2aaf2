//! `cronctl` — idempotent management of named cron entries.

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::CommandFactory;
use clap::Parser;
use clap_complete::Shell;
use clap_complete::generate;
use cron_tooling::DesiredState;
use cron_tooling::ReconcileRequest;
use cron_tooling::Reconciler;

/// Ensure a named entry is present in (or absent from) a cron schedule file.
///
/// The outcome of the reconciliation is printed as JSON on stdout.
#[derive(Debug, Parser)]
#[clap(
    author,
    version,
    bin_name = "cronctl",
    subcommand_negates_reqs = true,
    override_usage = "cronctl [OPTIONS] --name <NAME>\n       cronctl <COMMAND> [ARGS]"
)]
struct Cli {
    #[clap(flatten)]
    entry: EntryArgs,

    #[clap(subcommand)]
    subcommand: Option<Subcommand>,
}

#[derive(Debug, clap::Subcommand)]
enum Subcommand {
    /// Generate shell completion scripts.
    Completion(CompletionCommand),
}

#[derive(Debug, clap::Args)]
struct CompletionCommand {
    /// Shell to generate completions for.
    #[clap(value_enum, default_value_t = Shell::Bash)]
    shell: Shell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum StateArg {
    Present,
    Absent,
}

#[derive(Debug, clap::Args)]
struct EntryArgs {
    /// Name identifying the managed entry; written into the marker comment.
    #[clap(long, required = true)]
    name: Option<String>,

    /// Whether the entry should exist after this invocation.
    #[clap(long, value_enum, default_value_t = StateArg::Present)]
    state: StateArg,

    /// Command to schedule. Required when the state is `present`.
    #[clap(long, short = 'c')]
    command: Option<String>,

    /// Principal whose schedule table is managed. Defaults to the invoking
    /// user; required when --drop-in-file is used.
    #[clap(long, short = 'u')]
    user: Option<String>,

    /// Manage a named drop-in file instead of a per-user table.
    #[clap(long)]
    drop_in_file: Option<String>,

    /// Minute field of the schedule expression.
    #[clap(long, default_value = "*")]
    minute: String,

    /// Hour field of the schedule expression.
    #[clap(long, default_value = "*")]
    hour: String,

    /// Day-of-month field of the schedule expression.
    #[clap(long, default_value = "*")]
    day: String,

    /// Month field of the schedule expression.
    #[clap(long, default_value = "*")]
    month: String,

    /// Day-of-week field of the schedule expression.
    #[clap(long, default_value = "*")]
    weekday: String,

    /// Run at boot instead of on a schedule. Mutually exclusive with the
    /// explicit time fields.
    #[clap(long)]
    reboot: bool,

    /// Retain a snapshot of the pre-modification content and report its path.
    #[clap(long)]
    backup: bool,

    /// Directory holding drop-in schedule files.
    #[clap(long, default_value = cron_tooling::DEFAULT_DROP_IN_DIR)]
    drop_in_dir: PathBuf,

    /// Binary used to read and write per-user tables.
    #[clap(long, default_value = cron_tooling::DEFAULT_CRONTAB_BIN)]
    crontab_bin: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();
    match cli.subcommand {
        Some(Subcommand::Completion(completion)) => {
            let mut command = Cli::command();
            generate(
                completion.shell,
                &mut command,
                "cronctl",
                &mut std::io::stdout(),
            );
            Ok(())
        }
        None => run_reconcile(cli.entry),
    }
}

fn run_reconcile(args: EntryArgs) -> anyhow::Result<()> {
    let name = args
        .name
        .ok_or_else(|| anyhow::anyhow!("--name is required"))?;
    let request = ReconcileRequest {
        name,
        state: match args.state {
            StateArg::Present => DesiredState::Present,
            StateArg::Absent => DesiredState::Absent,
        },
        command: args.command,
        principal: args.user,
        drop_in_file: args.drop_in_file,
        minute: args.minute,
        hour: args.hour,
        day: args.day,
        month: args.month,
        weekday: args.weekday,
        reboot: args.reboot,
        backup: args.backup,
    };

    let outcome = Reconciler::new()
        .drop_in_dir(args.drop_in_dir)
        .crontab_bin(args.crontab_bin)
        .reconcile(&request)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
