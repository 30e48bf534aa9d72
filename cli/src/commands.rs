pub mod children;
pub mod dns_dump;
pub mod membership;
pub mod object;
pub mod search;
pub mod writable;

use std::path::PathBuf;

use adlens_core::rights::{ObjectType, RightFilter};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "adlens")]
#[command(about = "Read-only analysis of an Active Directory snapshot.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory snapshot to analyze (JSON export)
    #[arg(short, long, global = true, default_value = "snapshot.json")]
    pub snapshot: PathBuf,

    /// Emit one JSON object per line instead of trees
    #[arg(long, global = true)]
    pub json: bool,

    /// Show debug diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dump the DNS records readable in every partition
    #[command(alias = "dns")]
    DnsDump {
        /// Only zones whose name contains this
        #[arg(short, long)]
        zone: Option<String>,
        /// Include system records such as _ldap, _kerberos, @
        #[arg(short, long)]
        detail: bool,
    },
    /// List the groups a principal belongs to
    #[command(alias = "m")]
    Membership {
        /// DN, sAMAccountName or SID of the principal
        target: String,
        /// Only direct memberships, from memberOf
        #[arg(long)]
        no_recurse: bool,
    },
    /// List objects the snapshot's credential may write to
    #[command(alias = "w")]
    Writable {
        #[arg(short, long, default_value = "ALL", value_parser = parse_object_type)]
        otype: ObjectType,
        #[arg(short, long, default_value = "ALL", value_parser = parse_right)]
        right: RightFilter,
        /// List attributes and classes instead of a single marker
        #[arg(short, long)]
        detail: bool,
    },
    /// Read the attributes of one object
    #[command(alias = "o")]
    Object {
        /// DN, sAMAccountName or SID of the object
        target: String,
        /// Attributes to return, comma separated
        #[arg(short, long, value_delimiter = ',')]
        attr: Vec<String>,
    },
    /// List objects below a target
    #[command(alias = "c")]
    Children {
        target: String,
        /// objectClass of the objects to list
        #[arg(short = 't', long = "type", default_value = "*")]
        class: String,
    },
    /// Run a raw search
    #[command(alias = "s")]
    Search {
        base: String,
        #[arg(short, long, default_value = adlens_core::browse::ANY_OBJECT)]
        filter: String,
        /// Attributes to return, comma separated
        #[arg(short, long, value_delimiter = ',')]
        attr: Vec<String>,
    },
}

fn parse_object_type(s: &str) -> Result<ObjectType, String> {
    s.parse()
}

fn parse_right(s: &str) -> Result<RightFilter, String> {
    s.parse()
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_line_is_consistent() {
        CommandLine::command().debug_assert();
    }

    #[test]
    fn parses_writable_options() {
        let cli = CommandLine::try_parse_from([
            "adlens", "w", "--otype", "gpo", "--right", "child", "-d",
        ])
        .unwrap();
        match cli.command {
            Commands::Writable { otype, right, detail } => {
                assert_eq!(otype, ObjectType::Gpo);
                assert_eq!(right, RightFilter::Child);
                assert!(detail);
            }
            _ => panic!("expected writable"),
        }
    }

    #[test]
    fn parses_object_target_and_attributes() {
        let cli =
            CommandLine::try_parse_from(["adlens", "o", "alice", "-a", "memberOf,mail"]).unwrap();
        match cli.command {
            Commands::Object { target, attr } => {
                assert_eq!(target, "alice");
                assert_eq!(attr, vec!["memberOf", "mail"]);
            }
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn splits_search_attributes() {
        let cli = CommandLine::try_parse_from([
            "adlens", "--json", "search", "DC=corp,DC=local", "--attr", "cn,description",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Search { filter, attr, .. } => {
                assert_eq!(filter, "(objectClass=*)");
                assert_eq!(attr, vec!["cn", "description"]);
            }
            _ => panic!("expected search"),
        }
    }
}
