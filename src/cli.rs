// ============================================================================
// RedactFE CLI — headless redaction via command-line arguments
// ============================================================================
//
// Usage examples:
//   redactfe --dir img --list
//   redactfe --dir img -i car.jpg --rect 120,340,200,60
//   redactfe -i plate.png --rect 10,10,64,32 --factor 20 --quality 85
//   redactfe -i plate.png --rect 10,10,64,32 --dry-run --verbose
//
// No GUI is opened in CLI mode. Everything runs synchronously on the current
// thread through the same EditSession the GUI drives.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use redactfe::geometry::Rect;
use redactfe::io::ExportFormat;
use redactfe::{AppSettings, EditSession, FsGateway, PersistenceGateway, SessionError};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// RedactFE headless redaction.
///
/// Pixelate one rectangle of an image and overwrite it as JPEG, no GUI required.
#[derive(Parser, Debug)]
#[command(
    name = "redactfe",
    about = "RedactFE headless region redaction",
    long_about = "Pixelate a rectangle of an image file and overwrite the file as JPEG,\n\
                  without opening the GUI. The file is addressed by name inside --dir.\n\n\
                  Example:\n  \
                  redactfe --dir img --list\n  \
                  redactfe --dir img -i car.jpg --rect 120,340,200,60"
)]
pub struct CliArgs {
    /// Image folder. Defaults to the folder saved in the GUI settings.
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Print the images available in the folder and exit.
    #[arg(short, long, conflicts_with_all = ["input", "rect"])]
    pub list: bool,

    /// File name of the image to redact (inside --dir).
    #[arg(short, long, value_name = "NAME", requires = "rect")]
    pub input: Option<String>,

    /// Region to pixelate in image pixels: X,Y,WIDTH,HEIGHT.
    #[arg(short, long, value_name = "X,Y,W,H", value_parser = parse_rect, requires = "input")]
    pub rect: Option<Rect>,

    /// Mosaic reduction factor (block edge in pixels).
    #[arg(short, long, value_name = "K", value_parser = clap::value_parser!(u32).range(1..=512))]
    pub factor: Option<u32>,

    /// JPEG quality (1–100).
    #[arg(short, long, value_name = "1-100", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Run the redaction but do not write the file.
    #[arg(long)]
    pub dry_run: bool,

    /// Print per-step timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i" || a == "--list" || a == "-l")
    }
}

/// Parse `X,Y,W,H` (whitespace around parts tolerated).
pub fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, w, h] = parts.as_slice() else {
        return Err(format!("expected X,Y,WIDTH,HEIGHT, got '{}'", s));
    };
    let x = x.parse::<i32>().map_err(|e| format!("X: {}", e))?;
    let y = y.parse::<i32>().map_err(|e| format!("Y: {}", e))?;
    let w = w.parse::<u32>().map_err(|e| format!("WIDTH: {}", e))?;
    let h = h.parse::<u32>().map_err(|e| format!("HEIGHT: {}", e))?;
    Ok(Rect::new(x, y, w, h))
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI request and return an OS exit code.
/// `0` = success, `1` = anything failed or nothing was redacted.
pub fn run(args: CliArgs) -> ExitCode {
    let mut settings = AppSettings::load();
    if let Some(dir) = &args.dir {
        settings.image_dir = dir.clone();
    }
    if let Some(k) = args.factor {
        settings.mosaic_factor = k;
    }
    if let Some(q) = args.quality {
        settings.jpeg_quality = q;
    }
    let gateway = FsGateway::new(settings.image_dir.clone());

    if args.list {
        return match gateway.list_assets() {
            Ok(names) => {
                for name in names {
                    println!("{}", name);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {}", SessionError::listing(e));
                ExitCode::FAILURE
            }
        };
    }

    let (Some(name), Some(rect)) = (args.input.as_deref(), args.rect) else {
        eprintln!("error: --input and --rect are both required (or use --list).");
        return ExitCode::FAILURE;
    };

    let mut session = EditSession::new(settings.to_session_config());
    match run_one(&mut session, &gateway, name, rect, args.dry_run, args.verbose) {
        Ok(written) => {
            if args.verbose || args.dry_run {
                println!(
                    "{} {} in {} ({})",
                    if args.dry_run { "would redact" } else { "redacted" },
                    written,
                    name,
                    ExportFormat::new(settings.jpeg_quality).mime()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Load → mosaic → save pipeline
// ============================================================================

fn run_one(
    session: &mut EditSession,
    gateway: &dyn PersistenceGateway,
    name: &str,
    rect: Rect,
    dry_run: bool,
    verbose: bool,
) -> Result<Rect, SessionError> {
    let start = Instant::now();

    // -- Step 1: Load ----------------------------------------------------
    session.load(gateway, name)?;
    if verbose {
        let (w, h) = session.buffer().map(|b| b.dimensions()).unwrap_or((0, 0));
        println!("  loaded {} ({}x{}, {:.0}ms)", name, w, h, ms(start));
    }

    // -- Step 2: Pixelate ------------------------------------------------
    let written = session.apply_mosaic(rect)?;
    if verbose {
        println!("  mosaic {} ({:.0}ms)", written, ms(start));
    }

    // -- Step 3: Save ----------------------------------------------------
    if !dry_run {
        session.export(gateway)?;
        if verbose {
            println!("  saved {} ({:.0}ms)", name, ms(start));
        }
    }
    Ok(written)
}

fn ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
