use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "gradebookd")]
#[command(version)]
#[command(about = "Grade book sidecar speaking JSON lines over stdin/stdout")]
pub struct Cli {
    /// Workspace directory to open at startup
    #[arg(long, env = "GRADEBOOKD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `gradebookd=trace`; RUST_LOG wins when set
    #[arg(long, env = "GRADEBOOKD_LOG")]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_optional() {
        let cli = Cli::try_parse_from(["gradebookd"]).expect("parse");
        assert!(cli.workspace.is_none());
    }

    #[test]
    fn workspace_and_log_level_parse() {
        let cli = Cli::try_parse_from([
            "gradebookd",
            "--workspace",
            "/tmp/ws",
            "--log-level",
            "debug",
        ])
        .expect("parse");
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }
}
