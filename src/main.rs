//! hydrate-compiler binary.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use hydrate_compiler::{
    build_project, compile_file, BuildMode, CompileContext, CompileError, CompilerConfig,
    FunctionShape,
};
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut mode = BuildMode::from_env();
    if cli.single {
        mode.shape = FunctionShape::Single;
    }
    if cli.no_layouts {
        mode.layouts = false;
    }

    let level = if mode.debug_trace { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("[{}] {}", e.code(), e);
            return ExitCode::FAILURE;
        }
    };

    let ctx = CompileContext::new(config, mode);

    match &cli.command {
        Commands::Build => {
            let report = build_project(&ctx);
            for failure in &report.failed {
                eprintln!("{} [{}] {}", failure.path.display(), failure.code, failure.message);
            }
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Commands::Compile { file } => {
            let result = compile_file(&ctx, file).and_then(|compiled| {
                ctx.writer.save_manifest()?;
                Ok(compiled)
            });
            match result {
                Ok(Some(compiled)) => {
                    println!("{}", compiled.js_path(&ctx).display());
                    ExitCode::SUCCESS
                }
                Ok(None) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("[{}] {}", e.code(), e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn load_config(cli: &Cli) -> Result<CompilerConfig, CompileError> {
    let mut config = match &cli.config {
        Some(path) => CompilerConfig::load(path)?,
        None => CompilerConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    Ok(config)
}
