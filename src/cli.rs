// ============================================================================
// Memerist CLI: headless meme rendering via command-line arguments
// ============================================================================
//
// Usage examples:
//   memerist --base cat.jpg --top "i can has" --bottom "cheezburger" -o out.png
//   memerist --base bg.png --overlay sticker.png@0.8,0.2,0.5 --deep-fry -o fried.png
//   memerist --base bg.png --text "wow"@0.3,0.6 --crop 0.1,0.1,0.8,0.8 -o cropped.jpg
//   memerist --base saved.mem --cinematic -o again.png --project saved.mem
//
// No window is opened.  The document is assembled, rendered through the same
// editor pipeline the interactive front end uses, and written to disk.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use crate::canvas::BlendMode;
use crate::compositor::PostEffects;
use crate::crop::CropRect;
use crate::interaction::Editor;
use crate::io::{export_image, load_image};
use crate::layers::{Caption, Layer};
use crate::ops::text::FontSet;
use crate::project::{load_project, save_project, Document};
use crate::settings::EngineSettings;

/// Extension of project files.
pub const PROJECT_EXTENSION: &str = "mem";

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Memerist headless meme renderer.
#[derive(Parser, Debug)]
#[command(
    name = "memerist",
    about = "Stack images and captions over a picture and render the result",
    long_about = "Compose a meme without opening an editor: a base picture, overlay\n\
                  images, text layers, top/bottom captions, crop and effects.\n\n\
                  Example:\n  \
                  memerist --base cat.jpg --top \"hello\" --bottom \"world\" -o out.png"
)]
pub struct CliArgs {
    /// Base picture, or a saved project (.mem) to continue from.
    #[arg(short, long, value_name = "FILE")]
    pub base: PathBuf,

    /// Overlay image, optionally placed: PATH[@X,Y[,SCALE]] with X/Y in 0..1.
    #[arg(long, value_name = "PATH[@X,Y[,SCALE]]")]
    pub overlay: Vec<String>,

    /// Blend mode for every --overlay: normal, multiply, screen, overlay.
    #[arg(long, default_value = "normal", value_name = "MODE")]
    pub blend: String,

    /// Text layer, optionally placed: TEXT[@X,Y].
    #[arg(long, value_name = "TEXT[@X,Y]")]
    pub text: Vec<String>,

    /// Top caption.
    #[arg(long)]
    pub top: Option<String>,

    /// Bottom caption.
    #[arg(long)]
    pub bottom: Option<String>,

    /// Font size in pixels for captions and text layers.
    #[arg(long, default_value_t = Caption::DEFAULT_FONT_SIZE)]
    pub font_size: f32,

    /// Warmer, punchier colours.
    #[arg(long)]
    pub cinematic: bool,

    /// Noise, harsh contrast and blocky resampling.
    #[arg(long)]
    pub deep_fry: bool,

    /// Fixed deep-fry noise seed (default: random per run).
    #[arg(long, value_name = "N")]
    pub seed: Option<u32>,

    /// Crop the export to X,Y,W,H (normalized 0..1).
    #[arg(long, value_name = "X,Y,W,H")]
    pub crop: Option<String>,

    /// Rendered image. Format follows the extension (png, jpg, bmp).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also save the document as a project file.
    #[arg(long, value_name = "FILE.mem")]
    pub project: Option<PathBuf>,

    /// Write the effective settings (including --seed) to the settings file.
    #[arg(long)]
    pub save_settings: bool,

    /// Print what is being done and how long it took.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    if args.output.is_none() && args.project.is_none() && !args.save_settings {
        eprintln!("error: nothing to write; pass --output, --project or --save-settings.");
        return ExitCode::FAILURE;
    }

    let start = Instant::now();
    match run_inner(&args) {
        Ok(()) => {
            if args.verbose {
                println!("done in {:.0}ms", start.elapsed().as_secs_f64() * 1000.0);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_err!("CLI failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_inner(args: &CliArgs) -> Result<(), String> {
    let mut settings = EngineSettings::load();
    if let Some(seed) = args.seed {
        settings.noise_seed = seed;
    }
    if args.save_settings {
        let path = settings.save().map_err(|e| format!("settings save failed: {}", e))?;
        if args.verbose {
            println!("  → {}", path.display());
        }
    }

    let document = build_document(args)?;
    let needs_fonts = document.layers.iter().any(Layer::is_text) || document.captions.iter().any(|c| !c.is_blank());
    let fonts = if needs_fonts { FontSet::load(&settings) } else { FontSet::default() };
    if needs_fonts && fonts.body.is_none() {
        eprintln!("warning: no usable system font found; text will be missing");
    }

    let mut editor = Editor::new(settings, fonts);
    editor.open_document(document);

    if let Some(output) = &args.output {
        let image = editor.export_image().ok_or("nothing was rendered")?;
        export_image(&image, output).map_err(|e| format!("save failed: {}", e))?;
        if args.verbose {
            println!("  → {} ({}x{})", output.display(), image.width(), image.height());
        }
    }

    if let Some(path) = &args.project {
        save_project(&editor.document, path).map_err(|e| format!("project save failed: {}", e))?;
        if args.verbose {
            println!("  → {}", path.display());
        }
    }
    Ok(())
}

/// Load the base (picture or project) and apply every layer/caption flag.
fn build_document(args: &CliArgs) -> Result<Document, String> {
    if !(args.font_size.is_finite() && args.font_size >= 1.0) {
        return Err(format!("font size must be at least 1, got {}", args.font_size));
    }
    let mut doc = if is_project_path(&args.base) {
        load_project(&args.base).map_err(|e| format!("{}: {}", args.base.display(), e))?
    } else {
        let image = load_image(&args.base)?;
        Document { background: Some(Arc::new(image)), ..Document::default() }
    };
    if args.verbose
        && let Some((w, h)) = doc.background_size()
    {
        println!("base {} ({}x{})", args.base.display(), w, h);
    }

    let blend = BlendMode::from_name(&args.blend).ok_or_else(|| format!("unknown blend mode '{}'", args.blend))?;
    for arg in &args.overlay {
        let (path, x, y, scale) = parse_overlay(arg)?;
        let pixels = Arc::new(load_image(Path::new(&path))?);
        doc.layers.append(
            Layer::image(pixels)
                .with_position(x, y)
                .with_scale(scale)
                .with_blend_mode(blend),
        );
    }

    for arg in &args.text {
        let (text, x, y) = parse_text(arg)?;
        doc.layers.append(Layer::text(text, args.font_size).with_position(x, y));
    }

    if let Some(top) = &args.top {
        doc.captions.top.text = top.clone();
        doc.captions.top.font_size = args.font_size;
    }
    if let Some(bottom) = &args.bottom {
        doc.captions.bottom.text = bottom.clone();
        doc.captions.bottom.font_size = args.font_size;
    }

    if let Some(crop) = &args.crop {
        doc.crop = parse_crop(crop)?;
    }
    doc.effects = PostEffects {
        cinematic: doc.effects.cinematic || args.cinematic,
        deep_fry: doc.effects.deep_fry || args.deep_fry,
    };
    Ok(doc)
}

// ============================================================================
// Helpers
// ============================================================================

fn is_project_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(PROJECT_EXTENSION))
}

/// Comma-separated finite floats.
fn parse_numbers(s: &str) -> Result<Vec<f32>, String> {
    s.split(',')
        .map(|part| match part.trim().parse::<f32>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(format!("'{}' is not a number", part.trim())),
        })
        .collect()
}

/// Split `VALUE@NUMS` into the value and the parsed numbers.  A trailing
/// `@...` that isn't a number list is kept as part of the value.
fn split_placement(arg: &str) -> (String, Option<Vec<f32>>) {
    match arg.rsplit_once('@') {
        Some((value, nums)) if !value.is_empty() => match parse_numbers(nums) {
            Ok(nums) => (value.to_string(), Some(nums)),
            Err(_) => (arg.to_string(), None),
        },
        _ => (arg.to_string(), None),
    }
}

/// `PATH[@X,Y[,SCALE]]` → (path, x, y, scale).
fn parse_overlay(arg: &str) -> Result<(String, f32, f32, f32), String> {
    let (path, nums) = split_placement(arg);
    match nums.as_deref() {
        None => Ok((path, 0.5, 0.5, 1.0)),
        Some([x, y]) => Ok((path, *x, *y, 1.0)),
        Some([x, y, s]) if *s > 0.0 => Ok((path, *x, *y, *s)),
        Some([_, _, s]) => Err(format!("overlay scale must be positive, got {}", s)),
        Some(_) => Err(format!("bad overlay placement in '{}'; expected PATH@X,Y[,SCALE]", arg)),
    }
}

/// `TEXT[@X,Y]` → (text, x, y).
fn parse_text(arg: &str) -> Result<(String, f32, f32), String> {
    let (text, nums) = split_placement(arg);
    match nums.as_deref() {
        None => Ok((text, 0.5, 0.5)),
        Some([x, y]) => Ok((text, *x, *y)),
        Some(_) => Err(format!("bad text placement in '{}'; expected TEXT@X,Y", arg)),
    }
}

/// `X,Y,W,H` → crop rectangle clipped to the image.
fn parse_crop(arg: &str) -> Result<CropRect, String> {
    match parse_numbers(arg)?.as_slice() {
        [x, y, w, h] if *w > 0.0 && *h > 0.0 => Ok(CropRect::new(*x, *y, *w, *h)),
        [_, _, _, _] => Err("crop width and height must be positive".to_string()),
        _ => Err(format!("bad crop '{}'; expected X,Y,W,H", arg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_placement_variants() {
        assert_eq!(parse_overlay("a.png").unwrap(), ("a.png".to_string(), 0.5, 0.5, 1.0));
        assert_eq!(parse_overlay("a.png@0.2,0.8").unwrap(), ("a.png".to_string(), 0.2, 0.8, 1.0));
        assert_eq!(parse_overlay("a.png@0.2,0.8,2").unwrap(), ("a.png".to_string(), 0.2, 0.8, 2.0));
        assert!(parse_overlay("a.png@0.2").is_err());
        assert!(parse_overlay("a.png@0.2,0.8,-1").is_err());
        // An '@' that isn't a placement belongs to the path
        assert_eq!(parse_overlay("me@home.png").unwrap().0, "me@home.png");
    }

    #[test]
    fn text_and_crop_parsing() {
        assert_eq!(parse_text("such wow@0.1, 0.9").unwrap(), ("such wow".to_string(), 0.1, 0.9));
        assert_eq!(parse_text("hi").unwrap(), ("hi".to_string(), 0.5, 0.5));
        assert_eq!(parse_crop("0.1,0.2,0.5,0.5").unwrap(), CropRect::new(0.1, 0.2, 0.5, 0.5));
        assert!(parse_crop("0,0,0,1").is_err());
        assert!(parse_crop("0,0,1").is_err());
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        assert!(parse_crop("NaN,0,0.5,0.5").is_err());
        assert!(parse_crop("0,0,inf,0.5").is_err());
        // Not a placement, so the whole argument is the value
        assert_eq!(parse_text("hi@NaN,NaN").unwrap(), ("hi@NaN,NaN".to_string(), 0.5, 0.5));
        assert_eq!(parse_overlay("a.png@NaN,0.5").unwrap(), ("a.png@NaN,0.5".to_string(), 0.5, 0.5, 1.0));
    }

    #[test]
    fn bad_font_size_fails_before_loading_anything() {
        for size in ["NaN", "0", "-3"] {
            let flag = format!("--font-size={}", size);
            let args = CliArgs::try_parse_from(["memerist", "--base", "missing.png", flag.as_str(), "-o", "out.png"])
                .unwrap();
            let err = build_document(&args).unwrap_err();
            assert!(err.contains("font size"), "{}", err);
        }
    }

    #[test]
    fn project_extension_is_case_insensitive() {
        assert!(is_project_path(Path::new("x/saved.MEM")));
        assert!(!is_project_path(Path::new("x/saved.png")));
    }

    #[test]
    fn clap_accepts_repeated_layers() {
        let args = CliArgs::try_parse_from([
            "memerist", "--base", "b.png", "--overlay", "a.png", "--overlay", "c.png@0.1,0.1",
            "--text", "hey", "--deep-fry", "-o", "out.png",
        ])
        .unwrap();
        assert_eq!(args.overlay.len(), 2);
        assert_eq!(args.text, vec!["hey".to_string()]);
        assert!(args.deep_fry && !args.cinematic);
        assert_eq!(args.font_size, Caption::DEFAULT_FONT_SIZE);
    }
}
