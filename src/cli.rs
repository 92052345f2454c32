use std::path::PathBuf;

use clap::Parser;

pub const DEVEL_FLAG: &str = "-devel";

/// Where the node args come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeArgsSource {
    /// The development file named in the settings.
    Devel,
    File(PathBuf),
}

#[derive(Parser, Debug)]
#[command(
    name = "cdsirius",
    color = clap::ColorChoice::Auto,
    version,
    about = "Compound Discoverer scripting node that annotates compounds with SIRIUS",
)]
pub struct Cli {
    /// Node args JSON written by Compound Discoverer, or `-devel`
    #[arg(allow_hyphen_values = true)]
    pub node_args: String,
}

impl Cli {
    pub fn source(&self) -> NodeArgsSource {
        if self.node_args == DEVEL_FLAG {
            NodeArgsSource::Devel
        } else {
            NodeArgsSource::File(PathBuf::from(&self.node_args))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_devel_flag() {
        let cli = Cli::try_parse_from(["cdsirius", "-devel"]).unwrap();
        assert_eq!(cli.source(), NodeArgsSource::Devel);
    }

    #[test]
    fn test_node_args_path() {
        let cli = Cli::try_parse_from(["cdsirius", "C:\\scratch\\node_args.json"]).unwrap();
        assert_eq!(
            cli.source(),
            NodeArgsSource::File(PathBuf::from("C:\\scratch\\node_args.json"))
        );
    }

    #[test]
    fn test_argument_required() {
        assert!(Cli::try_parse_from(["cdsirius"]).is_err());
    }
}
