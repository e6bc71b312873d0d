use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use fat_shell::{FileSystem, Shell, ShellConfig};

#[derive(Parser)]
#[command(name = "fat_shell")]
#[command(about = "Interactive shell for FAT16 disk images", long_about = None)]
struct Cli {
    /// Disk image to open
    image: PathBuf,

    /// Flush the modified image back to disk on exit
    #[arg(short, long)]
    write: bool,

    /// Partition to select at startup (0-3)
    #[arg(short, long, default_value_t = 0)]
    partition: usize,

    /// Optional shell configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)?;

    let config = match &cli.config {
        Some(path) => ShellConfig::load(path)?,
        None => ShellConfig::default(),
    };
    if !config.color {
        colored::control::set_override(false);
    }

    let mut fs = FileSystem::open(&cli.image)
        .with_context(|| format!("failed to open image {}", cli.image.display()))?;
    if let Err(err) = fs.set_active(cli.partition) {
        log::warn!("{}; staying on partition {}", err, fs.active_index());
    }

    let mut shell = Shell::new(fs, config, cli.write, cli.image);
    shell.run().context("shell session failed")?;
    Ok(())
}
