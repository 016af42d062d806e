// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use log::{debug as okay, info, warn};
use mrc_hash::{
    config::Config, file_store::FileStore, BootMode, Digest as _, IntegrityCache, SecureStore,
    Sha256Engine, StoreError, UpdateOutcome, Verdict,
};
use recovery_hash_space::POISON_DIGEST;
use std::io::Write;
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
enum ModeArg {
    Normal,
    Recovery,
}

impl From<ModeArg> for BootMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Normal => BootMode::Normal,
            ModeArg::Recovery => BootMode::Recovery,
        }
    }
}

#[derive(Debug, Parser)]
enum Command {
    /// Hash MRC data into the recovery hash space
    Update {
        /// MRC cache blob (binary)
        blob: PathBuf,
    },
    /// Check MRC data against the recovery hash space
    Verify {
        /// MRC cache blob (binary)
        blob: PathBuf,
    },
    /// Print the SHA-256 of a blob
    Digest { blob: PathBuf },
    /// Print the contents of the recovery hash space
    Show,
    /// Clear the recovery hash space, as if it had never been written
    Reset {
        /// Skip interactive confirmation
        #[clap(short, long)]
        yes: bool,
    },
}

#[derive(Debug, Parser)]
struct StoreArgs {
    /// TOML file with `mode`, `store` and `nv-index`
    #[clap(long)]
    cfg: Option<PathBuf>,

    /// File holding the recovery hash space (overrides the config file)
    #[clap(long)]
    store: Option<PathBuf>,

    /// Boot mode (overrides the config file)
    #[clap(long, value_enum)]
    mode: Option<ModeArg>,

    /// NV index of the recovery hash space (overrides the config file)
    #[clap(long, value_parser = parse_int::parse::<u32>)]
    nv_index: Option<u32>,
}

impl StoreArgs {
    fn try_into_config(self) -> Result<Config> {
        let mut cfg = match &self.cfg {
            Some(path) => Config::load(path)
                .with_context(|| format!("could not load config {}", path.display()))?,
            None => match &self.store {
                Some(store) => Config {
                    mode: BootMode::Normal,
                    store: store.clone(),
                    nv_index: recovery_hash_space::NV_INDEX,
                },
                None => bail!("must provide either --store or --cfg"),
            },
        };
        if let Some(store) = self.store {
            cfg.store = store;
        }
        if let Some(mode) = self.mode {
            cfg.mode = mode.into();
        }
        if let Some(nv_index) = self.nv_index {
            cfg.nv_index = nv_index;
        }
        Ok(cfg)
    }
}

#[derive(Debug, Parser)]
#[clap(name = "mrc_hash", max_term_width = 80)]
struct Opts {
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(flatten)]
    store: StoreArgs,

    #[clap(subcommand)]
    cmd: Command,
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    mrc_hash::logging::init_logger(opts.verbose);

    match opts.cmd {
        Command::Digest { blob } => {
            let data = std::fs::read(&blob).with_context(|| format!("could not read {blob:?}"))?;
            println!("{}", hex::encode(Sha256Engine.compute(&data)?));
        }
        Command::Update { blob } => {
            let cfg = load_config(opts.store)?;
            let data = std::fs::read(&blob).with_context(|| format!("could not read {blob:?}"))?;
            let mut cache = IntegrityCache::new(cfg.mode, Sha256Engine, cfg.file_store());
            match cache.try_update_hash(&data)? {
                UpdateOutcome::Skipped => {
                    warn!("not in recovery mode; recovery hash space left alone")
                }
                UpdateOutcome::Written(hash) => {
                    okay!("wrote {}", hex::encode(hash));
                }
                UpdateOutcome::Poisoned => {
                    println!("{}: recovery hash space poisoned", "WARNING".red());
                }
            }
        }
        Command::Verify { blob } => {
            let cfg = load_config(opts.store)?;
            let data = std::fs::read(&blob).with_context(|| format!("could not read {blob:?}"))?;
            let status = verify(&cfg, &data);
            if status != 0 {
                std::process::exit(status);
            }
        }
        Command::Show => {
            let cfg = load_config(opts.store)?;
            let mut store = cfg.file_store();
            store.init()?;
            match store.read_recovery_slot() {
                Ok(hash) if hash == POISON_DIGEST => {
                    println!("{} ({})", hex::encode(hash), "poison".red());
                }
                Ok(hash) => {
                    okay!("record at NV index {:#x} is well-formed", store.nv_index());
                    println!("{}", hex::encode(hash));
                }
                Err(StoreError::SlotUndefined) => println!("(never written)"),
                Err(e) => {
                    return Err(e).with_context(|| format!("reading {}", store.path().display()))
                }
            }
        }
        Command::Reset { yes } => {
            let cfg = load_config(opts.store)?;
            let mut store = cfg.file_store();
            reset(&mut store, yes)?;
        }
    }

    Ok(())
}

/// Checks `data` against the configured store and reports the verdict
///
/// Returns the process exit status: 0 when the data may be used, 1 otherwise.
fn verify(cfg: &Config, data: &[u8]) -> i32 {
    let mut cache = IntegrityCache::new(cfg.mode, Sha256Engine, cfg.file_store());
    let verdict = cache.try_verify_hash(data);
    match &verdict {
        Ok(Verdict::NotApplicable) => {
            println!("{} (not in recovery mode; nothing checked)", "PASS".yellow())
        }
        Ok(Verdict::Match) => println!("{}", "PASS".green()),
        Ok(Verdict::Mismatch) => println!("{}: hash mismatch", "FAIL".red()),
        Err(e) => println!("{}: {e}", "FAIL".red()),
    }
    match verdict {
        Ok(v) if v.is_usable() => 0,
        _ => 1,
    }
}

fn load_config(args: StoreArgs) -> Result<Config> {
    let cfg = args.try_into_config()?;
    info!(
        "recovery hash space {:#x} in {} ({:?} mode)",
        cfg.nv_index,
        cfg.store.display(),
        cfg.mode
    );
    Ok(cfg)
}

fn reset(store: &mut FileStore, yes: bool) -> Result<()> {
    println!(
        "{}: the next recovery boot will retrain memory",
        "WARNING".red()
    );
    if !yes {
        const EXPECTED: &str = "Reset the hash";
        println!("Please type '{EXPECTED}' to continue:");
        print!("> ");
        std::io::stdout().flush()?;
        let mut reply = String::new();
        std::io::stdin().read_line(&mut reply)?;
        let reply = reply.trim();
        if reply != EXPECTED {
            bail!("invalid reply: expected '{EXPECTED}', got '{reply}'");
        }
    }
    if store.reset()? {
        info!("removed {}", store.path().display());
    } else {
        info!("{} was already empty", store.path().display());
    }
    Ok(())
}
