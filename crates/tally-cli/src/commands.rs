use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;
use tally_miner::{
    open_setup, verify_chain, Backend, ChainBootstrap, ChainState, Miner, MinerConfig,
};
use tally_repo::{Block, ObjectStore};
use tally_sync::{init_git_origin, init_native_origin};
use tally_types::ObjectId;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = MinerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    match cli.command {
        Command::Genesis(args) => cmd_genesis(&config, args, cli.format).await,
        Command::Init => cmd_init(&config, cli.format).await,
        Command::Commit(args) => cmd_commit(&config, args, cli.format).await,
        Command::Status => cmd_status(&config, cli.format).await,
        Command::Show(args) => cmd_show(&config, args, cli.format).await,
        Command::Verify(args) => cmd_verify(&config, args, cli.format).await,
    }
}

async fn cmd_genesis(
    config: &MinerConfig,
    args: GenesisArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let path = args
        .path
        .or_else(|| (!config.origin.is_empty()).then(|| PathBuf::from(&config.origin)))
        .context("no origin path given or configured")?;
    let identity = config.identity();
    let genesis = match config.backend {
        Backend::Native => init_native_origin(&path, &identity, &config.genesis_ref).await?,
        Backend::Git => init_git_origin(&path, &identity, &config.genesis_ref).await?,
    };
    match format {
        OutputFormat::Json => print_json(&json!({
            "origin": path.display().to_string(),
            "genesis_ref": config.genesis_ref,
            "genesis": genesis,
        }))?,
        OutputFormat::Text => {
            println!(
                "{} Created {} origin in {}",
                "✓".green().bold(),
                config.backend,
                path.display().to_string().bold()
            );
            println!("  Genesis: {} ({})", genesis.to_hex().yellow(), config.genesis_ref);
            println!(
                "  Difficulty {} mines blocks starting {}",
                config.difficulty,
                genesis.hex_prefix(config.difficulty).cyan()
            );
        }
    }
    Ok(())
}

async fn cmd_init(config: &MinerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let miner = attach(config).await?;
    let state = miner.chain_state();
    miner.shutdown().await;
    match format {
        OutputFormat::Json => print_json(&state)?,
        OutputFormat::Text => {
            println!(
                "{} Mirror ready in {}",
                "✓".green().bold(),
                config.mirror_dir.display().to_string().bold()
            );
            print_state(&state);
        }
    }
    Ok(())
}

async fn cmd_commit(
    config: &MinerConfig,
    args: CommitArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let miner = attach(config).await?;
    let accepted = miner.commit(&args.message).await;
    let tip = miner.last_block();
    miner.shutdown().await;
    let accepted = accepted.context("mining block")?;

    match format {
        OutputFormat::Json => print_json(&json!({
            "accepted": accepted,
            "tip": tip,
        }))?,
        OutputFormat::Text if accepted => {
            println!("{} Block accepted", "✓".green().bold());
            println!("  {} {}", tip.hash.to_hex().yellow(), tip.summary());
            println!("  Parents: {}", short_list(&tip.parents));
        }
        OutputFormat::Text => {
            println!(
                "{} Origin moved ahead; block dropped ({} policy)",
                "✗".red().bold(),
                config.stale_action
            );
            println!("  Tip is now {}", tip.hash.to_hex().yellow());
        }
    }
    Ok(())
}

async fn cmd_status(config: &MinerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let setup = open_setup(config)?;
    let genesis = resolve(&setup.store, &setup.genesis_ref).await?;
    let tip = resolve(&setup.store, &setup.branch_ref).await?;
    let state = ChainState {
        first_block: read(&setup.store, genesis).await?,
        last_block: read(&setup.store, tip).await?,
        branch_ref: setup.branch_ref,
    };
    match format {
        OutputFormat::Json => print_json(&json!({
            "chain": state,
            "difficulty": config.difficulty,
            "prefix": genesis.hex_prefix(config.difficulty),
            "link_level": config.link_level,
        }))?,
        OutputFormat::Text => {
            print_state(&state);
            println!(
                "Difficulty {} (prefix {}), link level {}",
                config.difficulty,
                genesis.hex_prefix(config.difficulty).cyan(),
                config.link_level
            );
        }
    }
    Ok(())
}

async fn cmd_show(config: &MinerConfig, args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let setup = open_setup(config)?;
    let hash = ObjectId::from_hex(&args.hash).with_context(|| format!("bad hash {}", args.hash))?;
    let block = read(&setup.store, hash).await?;
    match format {
        OutputFormat::Json => print_json(&block)?,
        OutputFormat::Text => {
            println!("Block {}", block.hash.to_hex().yellow().bold());
            println!("  Tree:      {}", block.tree);
            println!("  Parents:   {}", short_list(&block.parents));
            println!("  Author:    {}", block.author.person);
            println!("  Committer: {}", block.committer.person);
            println!("  Date:      {}", block.date());
            println!();
            for line in block.message.lines() {
                println!("    {line}");
            }
        }
    }
    Ok(())
}

async fn cmd_verify(
    config: &MinerConfig,
    args: VerifyArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let setup = open_setup(config)?;
    let genesis = resolve(&setup.store, &setup.genesis_ref).await?;
    let tip = match args.tip {
        Some(hex) => ObjectId::from_hex(&hex).with_context(|| format!("bad hash {hex}"))?,
        None => resolve(&setup.store, &setup.branch_ref).await?,
    };
    let report = verify_chain(
        setup.store.as_ref(),
        tip,
        genesis,
        config.difficulty,
        config.link_level,
    )
    .await?;
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            println!("{} Chain verified", "✓".green().bold());
            println!("  Tip: {}", report.tip.to_hex().yellow());
            println!("  Blocks: {}", report.length.to_string().bold());
            println!(
                "  Difficulty: {} ({})",
                "valid".green(),
                genesis.hex_prefix(config.difficulty).cyan()
            );
            println!("  Link windows: {} (level {})", "valid".green(), config.link_level);
        }
    }
    Ok(())
}

async fn attach(config: &MinerConfig) -> anyhow::Result<Miner> {
    let setup = open_setup(config).context("opening mirror")?;
    let miner = ChainBootstrap::new(setup)
        .run()
        .await
        .with_context(|| format!("attaching to origin {}", config.origin))?;
    Ok(miner)
}

async fn resolve(
    store: &Arc<dyn ObjectStore>,
    name: &str,
) -> anyhow::Result<ObjectId> {
    match store.resolve_ref(name).await? {
        Some(hash) => Ok(hash),
        None => bail!("{name} is not set; run `tally init` first"),
    }
}

async fn read(
    store: &Arc<dyn ObjectStore>,
    hash: ObjectId,
) -> anyhow::Result<Block> {
    store
        .read_block(&hash)
        .await?
        .with_context(|| format!("block {hash} not found"))
}

fn print_state(state: &ChainState) {
    println!("On branch {}", state.branch_ref.yellow().bold());
    println!("  Genesis: {}", state.first_block.hash.to_hex().cyan());
    println!(
        "  Tip:     {} {}",
        state.last_block.hash.to_hex().yellow(),
        state.last_block.summary()
    );
}

fn short_list(ids: &[ObjectId]) -> String {
    ids.iter().map(ObjectId::short_hex).collect::<Vec<_>>().join(" ")
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
