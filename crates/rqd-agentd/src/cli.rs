//! Command line of the `rqd` daemon.
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "rqd", version, about = "Render task execution agent")]
pub struct Cli {
    /// JSON configuration file. `RQD_*` variables override its values.
    #[arg(long, env = "RQD_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_flag_forms() {
        let cli = Cli::try_parse_from(["rqd", "--config", "/etc/rqd.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/rqd.json")));

        let cli = Cli::try_parse_from(["rqd", "--config=/tmp/r.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/r.json")));

        assert!(Cli::try_parse_from(["rqd", "--config"]).is_err());
        assert!(Cli::try_parse_from(["rqd", "--bogus"]).is_err());
    }

    #[test]
    fn config_falls_back_to_environment() {
        let cmd = Cli::command();
        let arg = cmd
            .get_arguments()
            .find(|a| a.get_id() == "config")
            .unwrap();
        assert_eq!(arg.get_env(), Some(std::ffi::OsStr::new("RQD_CONFIG")));
    }
}
