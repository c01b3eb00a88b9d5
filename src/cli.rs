// ============================================================================
// TextureFE CLI: headless texture editing via command-line arguments
// ============================================================================
//
// Usage examples:
//   texturefe -i skin.png --wand 120,40 --fill ff3366 -o skin_red.png
//   texturefe -i skin.png --wand 10,10 --wand 90,12 --tolerance 48 --fill 202020 -o out.png
//   texturefe -i skin.png --rect 0,0,128,64 --prompt "lace collar" --endpoint https://host/inpaint -o out.png
//   texturefe -i "textures/*.png" --rect 0,0,32,32 --fill ffffff --output-dir out/
//   texturefe -i skin.png --data-url
//
// Selections are applied in order: wand clicks first, then rectangles. The
// first one replaces the (empty) selection; every later one is additive.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use image::Rgba;

use crate::ops::ai::HttpInpaintService;
use crate::project::{Project, SelectOutcome};
use crate::settings::EditorSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// TextureFE headless texture editor.
#[derive(Parser, Debug)]
#[command(
    name = "texturefe",
    about = "TextureFE headless texture editor",
    long_about = "Select regions of a texture with the magic wand or rectangles, then\n\
                  recolor them or send them to an inpainting service.\n\n\
                  Example:\n  \
                  texturefe -i skin.png --wand 120,40 --fill ff3366 -o skin_red.png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing. Files keep their stem and get
    /// a .png extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Magic wand click at X,Y. Repeatable.
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    pub wand: Vec<(u32, u32)>,

    /// Rectangle selection from corner X0,Y0 to X1,Y1. Repeatable.
    #[arg(long, value_name = "X0,Y0,X1,Y1", value_parser = parse_rect)]
    pub rect: Vec<[i32; 4]>,

    /// Magic wand tolerance (0-128). Defaults to the settings file value.
    #[arg(short, long, value_name = "0-128")]
    pub tolerance: Option<u32>,

    /// Recolor the selection with this RGB color.
    #[arg(long, value_name = "RRGGBB", value_parser = parse_hex_color, conflicts_with = "prompt")]
    pub fill: Option<Rgba<u8>>,

    /// Inpaint the selection with this prompt.
    #[arg(long)]
    pub prompt: Option<String>,

    /// Inpaint style. Defaults to the settings file value.
    #[arg(long)]
    pub style: Option<String>,

    /// Inpaint service URL. Defaults to the settings file value.
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Print the result as a PNG data URL instead of writing a file.
    #[arg(long)]
    pub data_url: bool,

    /// Settings file to use instead of the default location.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Print per-file timing and echo all log output to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let mut settings = match &args.settings {
        Some(path) => EditorSettings::load_from(path),
        None => EditorSettings::load(),
    };
    if let Some(t) = args.tolerance {
        settings.default_tolerance = t;
    }

    let service = match &args.prompt {
        Some(_) => match build_service(&args, &settings) {
            Ok(s) => Some(s),
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if (multi || args.verbose) && !args.data_url {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        match run_one(input_path, &args, &settings, service.clone()) {
            Ok(Some(output_path)) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!("  error: {}", e);
                log::error!("{}: {}", input_path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn build_service(args: &CliArgs, settings: &EditorSettings) -> Result<Arc<HttpInpaintService>, String> {
    let endpoint = args
        .endpoint
        .clone()
        .unwrap_or_else(|| settings.inpaint_endpoint.clone());
    if endpoint.trim().is_empty() {
        return Err("--prompt needs --endpoint or inpaint_endpoint in the settings file".to_string());
    }
    HttpInpaintService::new(endpoint, settings.inpaint_timeout())
        .map(Arc::new)
        .map_err(|e| e.to_string())
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

/// Returns the written path, or `None` when the result went to stdout.
fn run_one(
    input: &Path,
    args: &CliArgs,
    settings: &EditorSettings,
    service: Option<Arc<HttpInpaintService>>,
) -> Result<Option<PathBuf>, String> {
    // -- Step 1: Load ----------------------------------------------------
    let mut project =
        Project::open(input, settings.clone()).map_err(|e| format!("load failed: {}", e))?;

    // -- Step 2: Select --------------------------------------------------
    let mut additive = false;
    for &seed in &args.wand {
        report_selection(project.select_magic_wand(seed, additive), args.verbose);
        additive = true;
    }
    for &[x0, y0, x1, y1] in &args.rect {
        report_selection(project.select_rectangle((x0, y0), (x1, y1), additive), args.verbose);
        additive = true;
    }

    // -- Step 3: Edit ----------------------------------------------------
    if let Some(color) = args.fill {
        if project.selection().is_empty() {
            return Err("nothing selected to fill".to_string());
        }
        let written = project.fill_selection(color);
        if args.verbose {
            println!("  filled {} pixels", written);
        }
    }

    if let (Some(prompt), Some(service)) = (&args.prompt, service) {
        let style = args.style.as_deref().unwrap_or(&settings.inpaint_style);
        project
            .inpaint_blocking(service, prompt, style)
            .map_err(|e| format!("inpaint failed: {}", e))?;
    }

    // -- Step 4: Output --------------------------------------------------
    if args.data_url {
        let url = project
            .export_data_url()
            .map_err(|e| format!("export failed: {}", e))?;
        println!("{}", url);
        return Ok(None);
    }

    let output_path = build_output_path(input, args.output.as_deref(), args.output_dir.as_deref())
        .ok_or_else(|| format!("cannot determine output path for '{}'", input.display()))?;
    project
        .save_png(&output_path)
        .map_err(|e| format!("save failed: {}", e))?;
    Ok(Some(output_path))
}

fn report_selection(outcome: SelectOutcome, verbose: bool) {
    match outcome {
        SelectOutcome::Applied { regions } => {
            if verbose {
                println!("  selection: {} region(s)", regions);
            }
        }
        SelectOutcome::Rejected(reason) => eprintln!("  warning: selection ignored ({})", reason),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);
        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output`
/// 2. `--output-dir` joined with the input stem
/// 3. Next to the input as `<stem>_edited.png`
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }
    let stem = input.file_stem()?.to_string_lossy().into_owned();
    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.png", stem)));
    }
    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_edited.png", stem)))
}

fn parse_numbers<T: std::str::FromStr>(s: &str, expected: usize) -> Result<Vec<T>, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != expected {
        return Err(format!("expected {} comma-separated numbers, got '{}'", expected, s));
    }
    parts
        .iter()
        .map(|p| p.parse::<T>().map_err(|_| format!("'{}' is not a valid number", p)))
        .collect()
}

fn parse_point(s: &str) -> Result<(u32, u32), String> {
    let v = parse_numbers::<u32>(s, 2)?;
    Ok((v[0], v[1]))
}

fn parse_rect(s: &str) -> Result<[i32; 4], String> {
    let v = parse_numbers::<i32>(s, 4)?;
    Ok([v[0], v[1], v[2], v[3]])
}

/// `RRGGBB`, with or without a leading `#`. Always opaque; fill keeps the
/// destination alpha anyway.
fn parse_hex_color(s: &str) -> Result<Rgba<u8>, String> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("expected RRGGBB, got '{}'", s));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| format!("invalid hex color '{}'", s))
    };
    Ok(Rgba([channel(0)?, channel(2)?, channel(4)?, 255]))
}
