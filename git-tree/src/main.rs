//! `git-tree`: stacked-branch tracking, subtree rebase, and evolve for Git.

#![warn(clippy::all, clippy::as_conversions, clippy::clone_on_ref_ptr)]

mod commands;
mod opts;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use tree_core::core::Effects;

use crate::opts::{Command, Opts};

fn install_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> eyre::Result<()> {
    let opts = Opts::parse();
    let mut effects = Effects::new_stdout();

    match opts.command {
        Command::Init(args) => commands::init::init(&mut effects, args),
        Command::Drop => commands::drop::drop(&mut effects),
        Command::Branch(args) => commands::branch::branch(&mut effects, args),
        Command::Rebase(args) => commands::rebase::rebase(&mut effects, args),
        Command::Evolve => commands::evolve::evolve(&mut effects),
        Command::Obsolete(args) => commands::obsolete::obsolete(args),
    }
}

fn main() {
    color_eyre::install().expect("could not install panic handler");
    install_tracing();

    if let Err(err) = run() {
        eprintln!("git-tree: {err}");
        std::process::exit(1);
    }
}
