// ============================================================================
// RetroPaint CLI: headless drawing via command-line arguments
// ============================================================================
//
// Usage examples:
//   retropaint --new 640x480 --script scene.rhai --output scene.png
//   retropaint -i photo.png --script doodle.rhai -o doodled.png
//   retropaint -i "shots/*.png" --script stamp.rhai --output-dir stamped/
//   retropaint --new 320x200 --title "Blank sheet" --output-dir out/
//
// Every job runs synchronously on the current thread through the same
// Project API the interactive editor uses.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::io;
use crate::ops::scripting::execute_script_sync;
use crate::ops::text::enumerate_system_fonts;
use crate::project::Project;
use crate::settings::AppSettings;

/// Largest canvas edge accepted by `--new`.
pub const MAX_CANVAS_EDGE: u32 = 16_384;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// RetroPaint headless editor.
///
/// Draw on new or existing images with Rhai edit scripts and export PNGs.
#[derive(Parser, Debug)]
#[command(
    name = "retropaint",
    about = "RetroPaint headless drawing and export",
    long_about = "Open images (PNG, JPEG, WEBP, BMP) or start a blank canvas, run Rhai\n\
                  edit scripts against them and export flattened PNGs.\n\n\
                  Example:\n  \
                  retropaint --new 640x480 --script scene.rhai --output scene.png\n  \
                  retropaint -i \"*.png\" --script stamp.rhai --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, num_args = 1.., required_unless_present_any = ["new", "list_fonts"])]
    pub input: Vec<String>,

    /// Start from a blank white canvas of this size, e.g. 800x600.
    #[arg(short, long, value_name = "WxH", value_parser = parse_size, conflicts_with = "input")]
    pub new: Option<(u32, u32)>,

    /// Rhai edit script to run on each canvas.
    #[arg(short, long, value_name = "SCRIPT.rhai")]
    pub script: Option<PathBuf>,

    /// Output PNG path. Only valid for a single job.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch jobs; files keep their input stem.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Document title, stored in the PNG and used for the default filename.
    #[arg(short, long)]
    pub title: Option<String>,

    /// List the font families the text tool can use, then exit.
    #[arg(long)]
    pub list_fonts: bool,

    /// Print script output, timings and log lines.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse `WxH` (also accepts `X` and `*`).
pub fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(|c: char| matches!(c, 'x' | 'X' | '*'))
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let w: u32 = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
    let h: u32 = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
    if w == 0 || h == 0 || w > MAX_CANVAS_EDGE || h > MAX_CANVAS_EDGE {
        return Err(format!("size must be between 1 and {} on each side", MAX_CANVAS_EDGE));
    }
    Ok((w, h))
}

/// Where a job's pixels come from.
#[derive(Clone, Debug, PartialEq)]
enum Source {
    File(PathBuf),
    Blank(u32, u32),
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all jobs and return an OS exit code.
/// `0` = every job succeeded, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    if args.list_fonts {
        for family in enumerate_system_fonts() {
            println!("{}", family);
        }
        return ExitCode::SUCCESS;
    }

    let jobs: Vec<Source> = match args.new {
        Some((w, h)) => vec![Source::Blank(w, h)],
        None => resolve_inputs(&args.input).into_iter().map(Source::File).collect(),
    };
    if jobs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if jobs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            jobs.len()
        );
        return ExitCode::FAILURE;
    }

    let script_source: Option<String> = match &args.script {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(src) => Some(src),
            Err(e) => {
                eprintln!("error: could not read script '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let settings = AppSettings::load();
    let total = jobs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, job) in jobs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, describe(job));
        }
        let start = Instant::now();

        match run_one(job, &args, &settings, script_source.as_deref()) {
            Ok(output_path) => {
                if args.verbose || multi {
                    println!(
                        "  -> {} ({:.0}ms)",
                        output_path.display(),
                        start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                crate::log_err!("cli: {}: {}", describe(job), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn describe(job: &Source) -> String {
    match job {
        Source::File(path) => path.display().to_string(),
        Source::Blank(w, h) => format!("new {}x{} canvas", w, h),
    }
}

// ============================================================================
// Per-job pipeline
// ============================================================================

fn run_one(
    job: &Source,
    args: &CliArgs,
    settings: &AppSettings,
    script: Option<&str>,
) -> Result<PathBuf, String> {
    // -- Step 1: Open ----------------------------------------------------
    let mut project = match job {
        Source::Blank(w, h) => {
            let mut sized = settings.clone();
            sized.canvas_width = *w;
            sized.canvas_height = *h;
            Project::with_settings(&sized)
        }
        Source::File(path) => {
            let bytes = std::fs::read(path).map_err(|e| format!("load failed: {}", e))?;
            let mut project = Project::with_settings(settings);
            if let Some(stem) = path.file_stem() {
                project.set_title(&stem.to_string_lossy());
            }
            project.load_image(&bytes).map_err(|e| format!("load failed: {}", e))?;
            project
        }
    };
    if let Some(title) = &args.title {
        project.set_title(title);
    }

    // -- Step 2: Script (optional) ---------------------------------------
    if let Some(src) = script {
        let output = execute_script_sync(src, &mut project)
            .map_err(|e| format!("script error:\n{}", e.friendly_message()))?;
        if args.verbose {
            for line in &output {
                println!("  [script] {}", line);
            }
        }
    }

    // -- Step 3: Export --------------------------------------------------
    let output_path = build_output_path(job, &project, args.output.as_deref(), args.output_dir.as_deref())
        .ok_or_else(|| "cannot determine output path".to_string())?;
    let bytes = project.export_png().map_err(|e| format!("save failed: {}", e))?;
    io::write_file(&output_path, &bytes).map_err(|e| format!("save failed: {}", e))?;
    Ok(output_path)
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
                    let supported = entry
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(io::is_supported_extension);
                    if !supported {
                        continue;
                    }
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no image files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Output path for one job.
///
/// Priority:
/// 1. `--output` (explicit path)
/// 2. `--output-dir` joined with the input stem, or the title-derived
///    filename for blank canvases
/// 3. Next to the input (`_out` appended when it would overwrite it), or the
///    title-derived filename in the working directory
fn build_output_path(
    job: &Source,
    project: &Project,
    output: Option<&Path>,
    output_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let file_name = match job {
        Source::File(input) => format!("{}.png", input.file_stem()?.to_string_lossy()),
        Source::Blank(..) => project.suggested_filename(),
    };

    if let Some(dir) = output_dir {
        return Some(dir.join(file_name));
    }

    match job {
        Source::File(input) => {
            let parent = input.parent().unwrap_or(Path::new("."));
            let candidate = parent.join(&file_name);
            if candidate == *input {
                let stem = input.file_stem()?.to_string_lossy().into_owned();
                Some(parent.join(format!("{}_out.png", stem)))
            } else {
                Some(candidate)
            }
        }
        Source::Blank(..) => Some(PathBuf::from(file_name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_parse() {
        assert_eq!(parse_size("800x600"), Ok((800, 600)));
        assert_eq!(parse_size("32X16"), Ok((32, 16)));
        assert!(parse_size("800").is_err());
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("axb").is_err());
        assert!(parse_size("99999x1").is_err());
    }

    #[test]
    fn args_parse() {
        let args = CliArgs::try_parse_from(["retropaint", "--new", "64x32", "-o", "out.png", "--title", "Doodle"])
            .unwrap();
        assert_eq!(args.new, Some((64, 32)));
        assert_eq!(args.title.as_deref(), Some("Doodle"));

        let args = CliArgs::try_parse_from(["retropaint", "-i", "a.png", "b.png", "--output-dir", "out"]).unwrap();
        assert_eq!(args.input, vec!["a.png".to_string(), "b.png".to_string()]);

        assert!(CliArgs::try_parse_from(["retropaint"]).is_err());
        assert!(CliArgs::try_parse_from(["retropaint", "--list-fonts"]).is_ok());
    }

    #[test]
    fn output_paths() {
        let project = Project::new(1, 1);
        let input = Source::File(PathBuf::from("shots/cat.png"));
        assert_eq!(
            build_output_path(&input, &project, None, None),
            Some(PathBuf::from("shots/cat_out.png"))
        );
        assert_eq!(
            build_output_path(&input, &project, None, Some(Path::new("out"))),
            Some(PathBuf::from("out/cat.png"))
        );
        let jpg = Source::File(PathBuf::from("shots/dog.jpg"));
        assert_eq!(build_output_path(&jpg, &project, None, None), Some(PathBuf::from("shots/dog.png")));

        let mut titled = Project::new(1, 1);
        titled.set_title("My Sheet");
        assert_eq!(
            build_output_path(&Source::Blank(1, 1), &titled, None, None),
            Some(PathBuf::from("My Sheet.png"))
        );
        assert_eq!(
            build_output_path(&Source::Blank(1, 1), &titled, Some(Path::new("x.png")), None),
            Some(PathBuf::from("x.png"))
        );
    }

    #[test]
    fn blank_job_runs_script_and_writes_png() {
        let dir = std::env::temp_dir().join(format!("retropaint-cli-{}", uuid::Uuid::new_v4()));
        let out = dir.join("scene.png");
        let args = CliArgs::try_parse_from([
            "retropaint",
            "--new",
            "16x16",
            "--title",
            "Scene",
            "-o",
            out.to_str().unwrap(),
        ])
        .unwrap();
        let job = Source::Blank(16, 16);
        let written = run_one(&job, &args, &AppSettings::default(), Some("set_color(\"#00f\"); fill(0, 0);")).unwrap();
        assert_eq!(written, out);

        let bytes = std::fs::read(&out).unwrap();
        assert_eq!(io::read_png_title(&bytes).as_deref(), Some("Scene"));
        let img = io::decode_image(&bytes).unwrap();
        assert_eq!(*img.get_pixel(8, 8), image::Rgba([0, 0, 255, 255]));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
