//! `arplace-cli` – headless AR placement shell.
//!
//! 1. Loads `~/.arplace/config.toml`, running a short first-run wizard when
//!    the file is absent.
//! 2. Starts a tracking session: a JSON recording when one is configured,
//!    otherwise the built-in demo room.
//! 3. Runs the AR session on its own worker thread and drops the user into a
//!    REPL that sends touches and commands to it.
//! 4. Intercepts **Ctrl-C** to stop the REPL cleanly.

mod config;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, warn};

use arplace_hal::{RaycastHitTester, SimTrackingSession, TrackingSession};
use arplace_runtime::{ArSession, SessionCommand, SessionHandle};
use arplace_types::PlacementMode;

fn main() {
    let _telemetry = arplace_runtime::init_tracing("arplace");

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the session …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(_)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
        }
    }
    let cfg = config::load_or_default().unwrap_or_else(|_| {
        let mut cfg = config::Config::default();
        config::apply_env_overrides(&mut cfg);
        cfg
    });

    let tracking: Box<dyn TrackingSession> = match &cfg.recording {
        Some(path) => match SimTrackingSession::from_path(path) {
            Ok(session) => {
                println!("  Replaying recording {}", path.display().to_string().bold());
                Box::new(session)
            }
            Err(e) => {
                println!("{}: {}", "Recording error".red(), e);
                println!("  Falling back to the demo room.");
                Box::new(SimTrackingSession::demo())
            }
        },
        None => {
            println!("  Using the built-in demo room.");
            Box::new(SimTrackingSession::demo())
        }
    };

    let session = match ArSession::new(
        cfg.session_settings(),
        tracking,
        Box::new(RaycastHitTester::new(cfg.viewport)),
    ) {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "Failed to start AR session");
            println!("{}: {}", "Session error".red(), e);
            return;
        }
    };
    let handle = match SessionHandle::spawn(session) {
        Ok(handle) => handle,
        Err(e) => {
            println!("{}: {}", "Session error".red(), e);
            return;
        }
    };

    // First tracking update so the scene is not empty at the prompt.
    if let Err(e) = handle.send(SessionCommand::Tick) {
        warn!(error = %e, "Initial tracking update failed");
    }

    println!(
        "  Screen {}×{} px, mode {}.",
        cfg.viewport.width,
        cfg.viewport.height,
        cfg.default_mode.to_string().yellow()
    );
    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(handle.client(), shutdown);
    handle.shutdown();
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       ARPlace First-Run Wizard       ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up ARPlace.\n");

    let mut cfg = config::Config::default();

    println!("  How should a tap place objects?");
    println!("    1) In front of the camera  (default)");
    println!("    2) On detected horizontal planes");
    println!("    3) On recognised reference images");
    cfg.default_mode = match prompt_line("  Enter choice [1]: ", "1").trim() {
        "2" => PlacementMode::Plane,
        "3" => PlacementMode::Image,
        _ => PlacementMode::Freeform,
    };

    let distance = prompt_line(
        &format!("  Minimum spacing between objects in metres [{}]: ", cfg.minimum_distance_m),
        &cfg.minimum_distance_m.to_string(),
    );
    match distance.trim().parse::<f32>() {
        Ok(d) if d >= 0.0 => cfg.minimum_distance_m = d,
        _ => println!("  {} keeping {} m", "Invalid distance –".yellow(), cfg.minimum_distance_m),
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ___    ____  ____  __                "#.bold().cyan());
    println!("{}", r#"   /   |  / __ \/ __ \/ /___ _________  "#.bold().cyan());
    println!("{}", r#"  / /| | / /_/ / /_/ / / __ `/ ___/ _ \ "#.bold().cyan());
    println!("{}", r#" / ___ |/ _, _/ ____/ / /_/ / /__/  __/ "#.bold().cyan());
    println!("{}", r#"/_/  |_/_/ |_/_/   /_/\__,_/\___/\___/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "ARPlace".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Augmented-reality object placement");
    println!();
}

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
