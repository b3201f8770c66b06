/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Inky CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "inky")]
#[command(version)]
#[command(about = "Inky template engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template
    Render {
        /// Template name, relative to a search path
        name: String,

        /// Template search path (repeatable, defaults to the current directory)
        #[arg(short = 'p', long = "path")]
        paths: Vec<PathBuf>,

        /// JSON file with the template variables (must hold an object)
        #[arg(short = 'd', long)]
        data: Option<PathBuf>,

        /// Variable binding (KEY=VALUE); VALUE is parsed as JSON when possible
        #[arg(short = 'V', long = "var")]
        vars: Vec<String>,

        /// Directory for the persistent artifact cache
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Fail on undefined variables
        #[arg(long)]
        strict: bool,

        /// JSON file with engine options
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write output to FILE instead of stdout
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Compile a template and print its artifact as JSON
    Compile {
        /// Template name, relative to a search path
        name: String,

        /// Template search path (repeatable, defaults to the current directory)
        #[arg(short = 'p', long = "path")]
        paths: Vec<PathBuf>,

        /// JSON file with engine options
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the token stream of a template file
    Tokens {
        /// Template file
        file: PathBuf,

        /// Open delimiter
        #[arg(long, default_value = "{{")]
        open: String,

        /// Close delimiter
        #[arg(long, default_value = "}}")]
        close: String,
    },

    /// Manage the persistent artifact cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Remove every cached artifact
    Clear {
        /// Cache directory
        #[arg(long)]
        cache_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inky=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            name,
            paths,
            data,
            vars,
            cache_dir,
            strict,
            config,
            output,
        } => commands::render::execute(commands::render::RenderArgs {
            name,
            paths,
            data,
            vars,
            cache_dir,
            strict,
            config,
            output,
        }),
        Commands::Compile {
            name,
            paths,
            config,
        } => commands::compile::execute(&name, &paths, config.as_deref()),
        Commands::Tokens { file, open, close } => commands::tokens::execute(&file, &open, &close),
        Commands::Cache { command } => match command {
            CacheCommands::Clear { cache_dir } => commands::cache::clear(&cache_dir),
        },
    }
}
