//! `sitecraft` command line: compile page blueprints to HTML, preview them
//! with live reload, and export the client runtime.

mod serve;

use sitecraft_web::{Engine, PageBlueprint, compose_bootstrap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
enum CliCommand {
    Build {
        page: PathBuf,
        out: PathBuf,
        minify: bool,
    },
    Serve {
        page: PathBuf,
        port: u16,
        watch: bool,
    },
    InitRuntime {
        out: PathBuf,
    },
}

pub async fn run_from_env() -> Result<(), String> {
    run_from_args(env::args().skip(1).collect()).await
}

pub async fn run_from_args(args: Vec<String>) -> Result<(), String> {
    match parse_command(args)? {
        CliCommand::Build { page, out, minify } => run_build(&page, &out, minify),
        CliCommand::Serve { page, port, watch } => serve::run_server(page, port, watch).await,
        CliCommand::InitRuntime { out } => run_init_runtime(&out),
    }
}

fn parse_command(args: Vec<String>) -> Result<CliCommand, String> {
    if args.is_empty() {
        return Err(help_text());
    }

    let cmd = args[0].as_str();
    match cmd {
        "build" => parse_build(args),
        "serve" => parse_serve(args),
        "init-runtime" => parse_init_runtime(args),
        "help" | "--help" | "-h" => Err(help_text()),
        _ => Err(format!("unknown command: {cmd}\n\n{}", help_text())),
    }
}

fn parse_build(args: Vec<String>) -> Result<CliCommand, String> {
    let mut page: Option<PathBuf> = None;
    let mut out: Option<PathBuf> = None;
    let mut minify = false;

    let mut i = 1usize;
    while i < args.len() {
        let token = &args[i];
        match token.as_str() {
            "--out" => {
                i += 1;
                out = Some(PathBuf::from(
                    args.get(i)
                        .ok_or_else(|| "--out requires a value".to_string())?,
                ));
            }
            "--minify" => minify = true,
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}")),
            _ => {
                if page.is_some() {
                    return Err("only one PAGE positional argument is allowed".to_string());
                }
                page = Some(PathBuf::from(token));
            }
        }
        i += 1;
    }

    let page = page.ok_or_else(|| "build requires PAGE".to_string())?;
    let out = out.unwrap_or_else(|| page.with_extension("html"));
    Ok(CliCommand::Build { page, out, minify })
}

fn parse_serve(args: Vec<String>) -> Result<CliCommand, String> {
    let mut page: Option<PathBuf> = None;
    let mut port: u16 = 3000;
    let mut watch = true;

    let mut i = 1usize;
    while i < args.len() {
        let token = &args[i];
        match token.as_str() {
            "--port" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| "--port requires a value".to_string())?;
                port = value
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {value}"))?;
            }
            "--watch" => watch = true,
            "--no-watch" => watch = false,
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}")),
            _ => {
                if page.is_some() {
                    return Err("only one PAGE positional argument is allowed".to_string());
                }
                page = Some(PathBuf::from(token));
            }
        }
        i += 1;
    }

    let page = page.ok_or_else(|| "serve requires PAGE".to_string())?;
    Ok(CliCommand::Serve { page, port, watch })
}

fn parse_init_runtime(args: Vec<String>) -> Result<CliCommand, String> {
    let mut out = PathBuf::from("sitecraft-runtime.js");
    let mut i = 1usize;

    while i < args.len() {
        let token = &args[i];
        match token.as_str() {
            "--out" => {
                i += 1;
                out = PathBuf::from(
                    args.get(i)
                        .ok_or_else(|| "--out requires a value".to_string())?,
                );
            }
            x if x.starts_with("--") => return Err(format!("unknown flag: {x}")),
            _ => return Err("init-runtime does not accept positional args".to_string()),
        }
        i += 1;
    }

    Ok(CliCommand::InitRuntime { out })
}

fn help_text() -> String {
    [
        "sitecraft CLI",
        "",
        "Commands:",
        "  sitecraft build PAGE.json [--out FILE] [--minify]",
        "  sitecraft serve PAGE.json [--port 3000] [--watch|--no-watch]",
        "  sitecraft init-runtime [--out sitecraft-runtime.js]",
        "",
        "Set RUST_LOG (e.g. RUST_LOG=debug) to change log verbosity.",
    ]
    .join("\n")
}

/// Builds and renders the blueprint at `page` into a fresh engine.
fn compile_page(page: &Path, minify: bool) -> Result<Engine, String> {
    let blueprint = PageBlueprint::from_file(page).map_err(|e| e.to_string())?;
    let mut config = blueprint.config.clone();
    config.minify_script |= minify;

    let engine = Engine::with_config(config);
    let roots = blueprint
        .build(&engine)
        .map_err(|e| format!("failed to build {}: {e}", page.display()))?;
    engine
        .try_render(roots, &blueprint.head)
        .map_err(|e| format!("failed to compile {}: {e}", page.display()))?;
    Ok(engine)
}

pub(crate) fn render_page(page: &Path) -> Result<String, String> {
    compile_page(page, false)?
        .output()
        .map_err(|e| e.to_string())
}

fn run_build(page: &Path, out: &Path, minify: bool) -> Result<(), String> {
    let engine = compile_page(page, minify)?;
    engine.try_save(out).map_err(|e| e.to_string())?;
    println!("wrote {}", out.display());
    Ok(())
}

/// Writes the runtime with empty reference and state tables, for pages that
/// load it as an external script. The helpers are published on `window`.
fn run_init_runtime(out: &Path) -> Result<(), String> {
    let script = compose_bootstrap("{}", "{}", "", true).map_err(|e| e.to_string())?;
    fs::write(out, script).map_err(|e| format!("failed to write {}: {e}", out.display()))?;
    println!("wrote {}", out.display());
    Ok(())
}
