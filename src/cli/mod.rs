//! Command-line surface: one binary, ten subcommands. This module only
//! wires flags to the KS/SR/STB calls already implemented elsewhere —
//! no recovery logic lives here.

pub mod commands;
pub mod seed_args;

use std::path::PathBuf;

use bitcoin::secp256k1::PublicKey;
use bitcoin::{Amount, OutPoint};
use clap::{Parser, Subcommand};

use crate::error::{Error, Result};
use crate::params::Params;
use seed_args::SeedArgs;

#[derive(Debug, Parser)]
#[command(name = "lnrecover", version, about = "Forensic recovery toolkit for Lightning Network on-chain and channel funds")]
pub struct Cli {
    #[command(flatten)]
    pub network: NetworkArgs,

    /// Suppress the rotating log file; log to stderr only.
    #[arg(long, global = true)]
    pub nologfile: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Parser)]
pub struct NetworkArgs {
    #[arg(long, conflicts_with_all = ["regtest", "signet"])]
    pub testnet: bool,
    #[arg(long, conflicts_with_all = ["testnet", "signet"])]
    pub regtest: bool,
    #[arg(long, conflicts_with_all = ["testnet", "regtest"])]
    pub signet: bool,
}

impl NetworkArgs {
    pub fn params(&self) -> Params {
        if self.testnet {
            Params::testnet()
        } else if self.regtest {
            Params::regtest()
        } else if self.signet {
            Params::signet()
        } else {
            Params::mainnet()
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the root extended private key (xprv) for the given seed.
    ShowRootKey {
        #[command(flatten)]
        seed: SeedArgs,
    },
    /// Derive a single key at an explicit BIP32 path.
    DeriveKey {
        #[command(flatten)]
        seed: SeedArgs,
        /// BIP32 path, e.g. m/1017'/0'/1'/0/5.
        path: String,
        /// Only derive the public half; refuses if the path demands a
        /// private key (it never does — kept for parity with the xprv
        /// output line, which is omitted when this is set).
        #[arg(long)]
        neuter: bool,
    },
    /// Sweep an expired Pool account back to the wallet.
    ClosePoolAccount {
        #[command(flatten)]
        seed: SeedArgs,
        #[arg(long)]
        outpoint: String,
        #[arg(long)]
        auctioneer_pubkey: String,
        #[arg(long)]
        sweep_addr: String,
        #[arg(long)]
        fee_rate: u64,
        #[arg(long, default_value_t = 0)]
        min_expiry: u32,
        #[arg(long, default_value_t = 1 << 12)]
        max_blocks: u32,
        #[arg(long, default_value_t = 100)]
        max_accounts: u32,
        #[arg(long, default_value_t = 500)]
        max_batch_keys: u32,
        #[arg(long)]
        publish: bool,
    },
    /// Recover a Loop-in HTLC timeout output.
    RecoverLoopIn {
        #[command(flatten)]
        seed: SeedArgs,
        #[arg(long)]
        outpoint: String,
        #[arg(long)]
        server_key: String,
        #[arg(long)]
        payment_hash160: String,
        #[arg(long)]
        cltv_expiry: u32,
        #[arg(long)]
        key_family: u32,
        #[arg(long)]
        sender_key_index: Option<u32>,
        /// Swap contract version: "v2" (segwit HTLC) or "v3" (taproot HTLC).
        #[arg(long, default_value = "v2")]
        htlc_version: String,
        #[arg(long, default_value_t = 0)]
        search_start: u32,
        #[arg(long, default_value_t = 10_000)]
        num_tries: u32,
        #[arg(long)]
        sweep_addr: String,
        #[arg(long)]
        fee_rate: u64,
        #[arg(long)]
        publish: bool,
    },
    /// Recover force-closed commitment outputs from a channel address,
    /// commit point, or lnd log scrape, writing sweep WIFs to a results
    /// file.
    RescueClosed {
        #[command(flatten)]
        seed: SeedArgs,
        #[arg(long)]
        addr: String,
        #[arg(long)]
        outpoint: String,
        #[arg(long)]
        commit_point: Option<String>,
        #[arg(long)]
        logfile: Option<PathBuf>,
        #[arg(long, default_value_t = crate::recover::commit::DEFAULT_NUM_KEYS)]
        num_keys: u32,
        #[arg(long, default_value = "results")]
        out_dir: PathBuf,
    },
    /// Build a PSBT spending a channel's funding multisig output, for the
    /// counterparty to co-sign.
    RescueFunding {
        #[command(flatten)]
        seed: SeedArgs,
        #[arg(long)]
        outpoint: String,
        #[arg(long)]
        local_index: Option<u32>,
        #[arg(long)]
        remote_pubkey: String,
        #[arg(long)]
        sweep_addr: String,
        #[arg(long)]
        fee_rate: u64,
        #[arg(long)]
        value_sat: u64,
    },
    /// Co-sign a PSBT produced by `rescuefunding` and finalize it.
    SignRescueFunding {
        #[command(flatten)]
        seed: SeedArgs,
        /// Base64 PSBT, or a path to a file containing it.
        psbt: String,
        #[arg(long)]
        local_index: u32,
        #[arg(long)]
        remote_pubkey: String,
    },
    /// Classify and sweep the outputs of a channel.backup file.
    ScbForceClose {
        #[command(flatten)]
        seed: SeedArgs,
        #[arg(long)]
        backup_file: PathBuf,
        #[arg(long)]
        sweep_addr: String,
        #[arg(long)]
        fee_rate: u64,
        #[arg(long)]
        chain_api_url: Option<String>,
        #[arg(long)]
        publish: bool,
    },
    /// Brute-force and sweep remote static-remote-key / tweakless
    /// commitment outputs given a peer pubkey, no channel DB required.
    SweepRemoteClosed {
        #[command(flatten)]
        seed: SeedArgs,
        #[arg(long)]
        outpoint: String,
        #[arg(long)]
        commit_point: Option<String>,
        #[arg(long, default_value_t = crate::recover::commit::DEFAULT_NUM_KEYS)]
        num_keys: u32,
        #[arg(long)]
        sweep_addr: String,
        #[arg(long)]
        fee_rate: u64,
        #[arg(long)]
        publish: bool,
    },
    /// Build a PSBT pulling one or more anchor outputs plus a sponsor
    /// UTXO into a single CPFP transaction.
    PullAnchor {
        #[command(flatten)]
        seed: SeedArgs,
        #[arg(long)]
        sponsor_outpoint: String,
        #[arg(long)]
        sponsor_value_sat: u64,
        #[arg(long = "anchor-addr", required = true)]
        anchor_addrs: Vec<String>,
        #[arg(long)]
        taproot: bool,
        #[arg(long)]
        change_addr: String,
        #[arg(long)]
        fee_rate: u64,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    let params = cli.network.params();
    match cli.command {
        Command::ShowRootKey { seed } => commands::show_root_key::run(&params, &seed),
        Command::DeriveKey { seed, path, neuter } => {
            commands::derive_key::run(&params, &seed, &path, neuter)
        }
        Command::ClosePoolAccount {
            seed,
            outpoint,
            auctioneer_pubkey,
            sweep_addr,
            fee_rate,
            min_expiry,
            max_blocks,
            max_accounts,
            max_batch_keys,
            publish,
        } => commands::close_pool_account::run(
            &params,
            &seed,
            commands::close_pool_account::Args {
                outpoint: parse_outpoint(&outpoint)?,
                auctioneer_pubkey: parse_pubkey(&auctioneer_pubkey)?,
                sweep_addr,
                fee_rate,
                min_expiry,
                max_blocks,
                max_accounts,
                max_batch_keys,
                publish,
            },
        ),
        Command::RecoverLoopIn {
            seed,
            outpoint,
            server_key,
            payment_hash160,
            cltv_expiry,
            key_family,
            sender_key_index,
            htlc_version,
            search_start,
            num_tries,
            sweep_addr,
            fee_rate,
            publish,
        } => commands::recover_loop_in::run(
            &params,
            &seed,
            commands::recover_loop_in::Args {
                outpoint: parse_outpoint(&outpoint)?,
                server_key: parse_pubkey(&server_key)?,
                payment_hash160: parse_hash160(&payment_hash160)?,
                cltv_expiry,
                key_family,
                sender_key_index,
                htlc_version: parse_htlc_version(&htlc_version)?,
                search_start,
                num_tries,
                sweep_addr,
                fee_rate,
                publish,
            },
        ),
        Command::RescueClosed {
            seed,
            addr,
            outpoint,
            commit_point,
            logfile,
            num_keys,
            out_dir,
        } => commands::rescue_closed::run(
            &params,
            &seed,
            commands::rescue_closed::Args {
                addr,
                outpoint: parse_outpoint(&outpoint)?,
                commit_point: commit_point.as_deref().map(parse_pubkey).transpose()?,
                logfile,
                num_keys,
                out_dir,
            },
        ),
        Command::RescueFunding {
            seed,
            outpoint,
            local_index,
            remote_pubkey,
            sweep_addr,
            fee_rate,
            value_sat,
        } => commands::rescue_funding::run(
            &params,
            &seed,
            commands::rescue_funding::Args {
                outpoint: parse_outpoint(&outpoint)?,
                local_index,
                remote_pubkey: parse_pubkey(&remote_pubkey)?,
                sweep_addr,
                fee_rate,
                value_sat,
            },
        ),
        Command::SignRescueFunding {
            seed,
            psbt,
            local_index,
            remote_pubkey,
        } => commands::sign_rescue_funding::run(
            &params,
            &seed,
            &psbt,
            local_index,
            parse_pubkey(&remote_pubkey)?,
        ),
        Command::ScbForceClose {
            seed,
            backup_file,
            sweep_addr,
            fee_rate,
            chain_api_url,
            publish,
        } => commands::scb_force_close::run(
            &params,
            &seed,
            commands::scb_force_close::Args {
                backup_file,
                sweep_addr,
                fee_rate,
                chain_api_url,
                publish,
            },
        ),
        Command::SweepRemoteClosed {
            seed,
            outpoint,
            commit_point,
            num_keys,
            sweep_addr,
            fee_rate,
            publish,
        } => commands::sweep_remote_closed::run(
            &params,
            &seed,
            commands::sweep_remote_closed::Args {
                outpoint: parse_outpoint(&outpoint)?,
                commit_point: commit_point.as_deref().map(parse_pubkey).transpose()?,
                num_keys,
                sweep_addr,
                fee_rate,
                publish,
            },
        ),
        Command::PullAnchor {
            seed,
            sponsor_outpoint,
            sponsor_value_sat,
            anchor_addrs,
            taproot,
            change_addr,
            fee_rate,
        } => commands::pull_anchor::run(
            &params,
            &seed,
            commands::pull_anchor::Args {
                sponsor_outpoint: parse_outpoint(&sponsor_outpoint)?,
                sponsor_value: Amount::from_sat(sponsor_value_sat),
                anchor_addrs,
                taproot,
                change_addr,
                fee_rate,
            },
        ),
    }
}

pub(crate) fn parse_outpoint(s: &str) -> Result<OutPoint> {
    s.parse()
        .map_err(|_| Error::input(format!("malformed outpoint: {s}")))
}

pub(crate) fn parse_pubkey(s: &str) -> Result<PublicKey> {
    let bytes = hex::decode(s)?;
    PublicKey::from_slice(&bytes).map_err(|e| Error::input(format!("bad pubkey: {e}")))
}

pub(crate) fn parse_hash160(s: &str) -> Result<[u8; 20]> {
    let bytes = hex::decode(s)?;
    bytes
        .try_into()
        .map_err(|_| Error::input("payment hash must be 20 bytes".to_string()))
}

pub(crate) fn parse_htlc_version(s: &str) -> Result<crate::recover::loopin::SwapVersion> {
    match s {
        "v2" => Ok(crate::recover::loopin::SwapVersion::HtlcV2),
        "v3" => Ok(crate::recover::loopin::SwapVersion::HtlcV3),
        other => Err(Error::input(format!("unknown htlc version {other}, expected v2 or v3"))),
    }
}
