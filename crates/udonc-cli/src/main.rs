//! Command-line entry point: `udonc <input> [-o <output>] [--info <path>]
//! [--log <level>]`, grounded on `__main__.py`'s argparse surface.

mod pipeline;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use udonc_emit::ClassNameAllocator;
use udonc_model::UdonModuleInfo;

/// Decompiles Udon program bundles into pseudo-source.
#[derive(Parser, Debug)]
#[command(name = "udonc")]
#[command(about = "Reconstructs readable pseudo-source from Udon bytecode bundles")]
#[command(version)]
struct Args {
    /// Input .json program bundle, or a directory of them.
    input: PathBuf,

    /// Output file (single input) or directory (directory input).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to the extern module descriptor (UdonModuleInfo.json).
    #[arg(long, default_value = "./local/UdonModuleInfo.json")]
    info: PathBuf,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log))
        .init();

    if !args.info.exists() {
        error!(path = %args.info.display(), "module info file not found");
        return ExitCode::FAILURE;
    }

    let module_info = match pipeline::load_module_info(&args.info) {
        Ok(info) => info,
        Err(err) => {
            error!(error = %err, "failed to load module info");
            return ExitCode::FAILURE;
        }
    };

    if !args.input.exists() {
        error!(path = %args.input.display(), "input path does not exist");
        return ExitCode::FAILURE;
    }

    let ok = if args.input.is_file() {
        run_single_file(&args.input, args.output.as_deref(), &module_info)
    } else {
        run_directory(&args.input, args.output.as_deref(), &module_info)
    };

    info!("done");
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run_single_file(input: &Path, output: Option<&Path>, module_info: &UdonModuleInfo) -> bool {
    if input.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()) != Some("json".to_string()) {
        error!("input file must be a .json file");
        return false;
    }

    let (target, is_target_file) = match output {
        None => (input.parent().map(Path::to_path_buf).unwrap_or_default(), false),
        Some(out) => {
            let is_cs = out.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase())
                == Some("cs".to_string());
            (out.to_path_buf(), is_cs)
        }
    };

    let mut allocator = ClassNameAllocator::new();
    process_file(input, &target, is_target_file, module_info, &mut allocator).is_ok()
}

fn run_directory(input: &Path, output: Option<&Path>, module_info: &UdonModuleInfo) -> bool {
    let target = match output {
        Some(out) => out.to_path_buf(),
        None => {
            let dir_name = input.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            input
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
                .join(format!("{dir_name}-decompiled"))
        }
    };

    let entries = match std::fs::read_dir(input) {
        Ok(entries) => entries,
        Err(err) => {
            error!(error = %err, "failed to read input directory");
            return false;
        }
    };

    let mut json_files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("json")).unwrap_or(false))
        .filter(|p| p.file_name().and_then(|n| n.to_str()) != Some("UdonModuleInfo.json"))
        .collect();
    json_files.sort();

    if json_files.is_empty() {
        warn!("no .json files found in the directory");
        return true;
    }

    let mut allocator = ClassNameAllocator::new();
    let mut all_ok = true;
    for json_file in &json_files {
        if process_file(json_file, &target, false, module_info, &mut allocator).is_err() {
            all_ok = false;
        }
    }
    all_ok
}

fn process_file(
    json_file: &Path,
    output_target: &Path,
    is_target_file: bool,
    module_info: &UdonModuleInfo,
    allocator: &mut ClassNameAllocator,
) -> anyhow::Result<()> {
    let unit = match pipeline::decompile_file(json_file, module_info, allocator) {
        Ok(unit) => unit,
        Err(err) => {
            error!(file = %json_file.display(), error = %err, "failed to decompile");
            return Err(err);
        }
    };

    for diagnostic in unit.diagnostics.iter() {
        warn!(file = %json_file.display(), %diagnostic, "recoverable decompilation issue");
    }

    let final_path = if is_target_file {
        if let Some(parent) = output_target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        output_target.to_path_buf()
    } else {
        std::fs::create_dir_all(output_target)?;
        let stem = json_file.file_stem().and_then(|s| s.to_str()).unwrap_or("decompiled");
        output_target.join(format!("{}.cs", if unit.class_name.is_empty() { stem } else { &unit.class_name }))
    };

    std::fs::write(&final_path, &unit.source)?;
    info!(
        input = %json_file.display(),
        output = %final_path.display(),
        "decompiled"
    );
    Ok(())
}
