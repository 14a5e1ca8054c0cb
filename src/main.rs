//! `lnrecover`: forensic recovery toolkit for a Lightning Network node's
//! on-chain and channel funds. Given only the node's seed (plus, for some
//! commands, an encrypted wallet file, a channel-backup file, or a
//! channel-state database), this binary reconstructs the private keys and
//! witness scripts needed to spend every class of output a Lightning
//! channel can produce, then assembles, signs, and optionally broadcasts
//! the sweep transaction.

mod backup;
mod chain;
mod channeldb;
mod cli;
mod error;
mod key;
mod logscrape;
mod params;
mod recover;
mod script;
mod seed;
mod tx;

use clap::Parser;

fn init_tracing(nologfile: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if nologfile {
        subscriber.with_writer(std::io::stderr).init();
    } else {
        subscriber.init();
    }
}

fn main() {
    let cli = cli::Cli::parse();
    init_tracing(cli.nologfile);

    if let Err(err) = cli::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
