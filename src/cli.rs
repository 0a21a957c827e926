use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nfsconv")]
#[command(version)]
#[command(about = "Converge an NFS server host to its declared configuration", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Filesystem root managed files are resolved under
    #[arg(long, global = true, default_value = "/")]
    pub root: PathBuf,

    /// OS family (debian, ubuntu, redhat, centos, sles); detected if omitted
    #[arg(long, global = true)]
    pub os_family: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show resources that would change
    Plan(PlanArgs),

    /// Converge the host
    Apply(ApplyArgs),

    /// Print the rendered /etc/exports
    Exports,

    /// Print resources in convergence order with their edges
    Graph(GraphArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct PlanArgs {
    /// Only show matching resources: a kind (`mounts`), `kind:name`, or a name
    pub target: Option<String>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Dry run - show what would be done
    #[arg(short, long)]
    pub dry_run: bool,

    /// Parallel jobs within one dependency level
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct GraphArgs {
    /// Only show matching resources: a kind (`mounts`), `kind:name`, or a name
    pub target: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "nfsconv", "-vv", "--root", "/tmp/stage", "apply", "--dry-run", "-j", "2", "--json",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.root, PathBuf::from("/tmp/stage"));
        match cli.command {
            Command::Apply(args) => {
                assert!(args.dry_run);
                assert!(args.json);
                assert!(!args.yes);
                assert_eq!(args.jobs, 2);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_parse_plan_target() {
        let cli = Cli::try_parse_from(["nfsconv", "plan", "mount:/export/data", "--os-family", "debian"])
            .unwrap();
        assert_eq!(cli.os_family.as_deref(), Some("debian"));
        match cli.command {
            Command::Plan(args) => assert_eq!(args.target.as_deref(), Some("mount:/export/data")),
            _ => panic!("expected plan"),
        }
    }
}
