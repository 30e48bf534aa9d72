mod commands;
mod terminal;

use adlens_common::config::Config;
use adlens_common::directory::SnapshotDirectory;
use commands::{
    CommandLine, Commands, children, dns_dump, membership, object, search, writable,
};
use tracing::debug;

fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    terminal::logging::init_logging(commands.verbose, commands.json)?;

    let directory: SnapshotDirectory = SnapshotDirectory::from_path(&commands.snapshot)?;
    debug!(
        entries = directory.entries().len(),
        snapshot = %commands.snapshot.display(),
        "snapshot loaded"
    );
    let cfg = Config::default();
    let json: bool = commands.json;

    match commands.command {
        Commands::DnsDump { zone, detail } => {
            dns_dump::dns_dump(&directory, &cfg, zone.as_deref(), detail, json)
        }
        Commands::Membership { target, no_recurse } => {
            membership::membership(&directory, &target, no_recurse, json)
        }
        Commands::Writable {
            otype,
            right,
            detail,
        } => writable::writable(&directory, otype, right, detail, json),
        Commands::Object { target, attr } => object::object(&directory, &target, attr, json),
        Commands::Children { target, class } => {
            children::children(&directory, &target, &class, json)
        }
        Commands::Search { base, filter, attr } => {
            search::search(&directory, &base, &filter, attr, json)
        }
    }
}
