//! REPL – interactive shell driving an AR session.
//!
//! Supported slash-commands:
//!   /help                      – show this list
//!   /mode <freeform|plane|image>
//!   /select <object>           – choose the prototype to place
//!   /tap <x> <y>               – touch the screen once
//!   /drag <x1> <y1> <x2> <y2> [steps] – touch and drag in a straight line
//!   /planes [on|off]           – show/hide plane visuals (toggle without argument)
//!   /camera <x> <y> <z> [yaw] [pitch] – move the simulated camera (degrees)
//!   /tick [n]                  – advance tracking by n updates
//!   /undo                      – remove the last placed object
//!   /reset                     – clear placements and restart tracking
//!   /status | /objects | /anchors
//!   /quit | /exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arplace_perception::{Quaternion, Transform3D, Vec3};
use arplace_runtime::{
    CommandOutcome, PlacementOutcome, SessionClient, SessionCommand, SessionSnapshot,
};
use arplace_types::{PlacementMode, ScreenPoint, TouchPhase};

const DEFAULT_DRAG_STEPS: usize = 10;

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Help,
    Mode(PlacementMode),
    Select(String),
    Tap(ScreenPoint),
    Drag {
        from: ScreenPoint,
        to: ScreenPoint,
        steps: usize,
    },
    /// `None` toggles.
    Planes(Option<bool>),
    /// `(yaw, pitch)` in degrees; `None` keeps the current orientation.
    Camera {
        position: Vec3,
        angles: Option<(f32, f32)>,
    },
    Tick(usize),
    Undo,
    Reset,
    Status,
    Objects,
    Anchors,
    Quit,
}

fn parse_f32(arg: Option<&str>, what: &str) -> Result<f32, String> {
    let raw = arg.ok_or_else(|| format!("missing {what}"))?;
    raw.parse::<f32>().map_err(|_| format!("'{raw}' is not a valid {what}"))
}

fn parse_point<'a>(args: &mut impl Iterator<Item = &'a str>) -> Result<ScreenPoint, String> {
    let x = parse_f32(args.next(), "x coordinate")?;
    let y = parse_f32(args.next(), "y coordinate")?;
    Ok(ScreenPoint::new(x, y))
}

/// Parse one input line.
pub fn parse(line: &str) -> Result<ReplCommand, String> {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else {
        return Err("empty command".to_string());
    };
    let command = match cmd {
        "/help" => ReplCommand::Help,
        "/mode" => {
            let raw = parts.next().ok_or("usage: /mode <freeform|plane|image>")?;
            ReplCommand::Mode(raw.parse().map_err(|e: arplace_types::ArError| e.to_string())?)
        }
        "/select" => ReplCommand::Select(parts.next().ok_or("usage: /select <object>")?.to_string()),
        "/tap" => ReplCommand::Tap(parse_point(&mut parts)?),
        "/drag" => {
            let from = parse_point(&mut parts)?;
            let to = parse_point(&mut parts)?;
            let steps = match parts.next() {
                Some(raw) => raw
                    .parse::<usize>()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| format!("'{raw}' is not a valid step count"))?,
                None => DEFAULT_DRAG_STEPS,
            };
            ReplCommand::Drag { from, to, steps }
        }
        "/planes" => match parts.next() {
            None => ReplCommand::Planes(None),
            Some("on" | "show") => ReplCommand::Planes(Some(false)),
            Some("off" | "hide") => ReplCommand::Planes(Some(true)),
            Some(other) => return Err(format!("'{other}': expected on or off")),
        },
        "/camera" => {
            let position = Vec3::new(
                parse_f32(parts.next(), "x position")?,
                parse_f32(parts.next(), "y position")?,
                parse_f32(parts.next(), "z position")?,
            );
            let angles = match parts.next() {
                None => None,
                Some(yaw) => {
                    let yaw = parse_f32(Some(yaw), "yaw")?;
                    let pitch = match parts.next() {
                        Some(raw) => parse_f32(Some(raw), "pitch")?,
                        None => 0.0,
                    };
                    Some((yaw, pitch))
                }
            };
            ReplCommand::Camera { position, angles }
        }
        "/tick" => match parts.next() {
            None => ReplCommand::Tick(1),
            Some(raw) => ReplCommand::Tick(
                raw.parse::<usize>()
                    .map_err(|_| format!("'{raw}' is not a valid tick count"))?,
            ),
        },
        "/undo" => ReplCommand::Undo,
        "/reset" => ReplCommand::Reset,
        "/status" => ReplCommand::Status,
        "/objects" => ReplCommand::Objects,
        "/anchors" => ReplCommand::Anchors,
        "/quit" | "/exit" => ReplCommand::Quit,
        other => return Err(format!("Unknown command '{other}'")),
    };
    Ok(command)
}

/// Touch events for a straight drag: one `Began` at `from`, then `steps`
/// evenly spaced `Moved` events ending at `to`.
pub fn drag_events(from: ScreenPoint, to: ScreenPoint, steps: usize) -> Vec<SessionCommand> {
    let mut events = vec![SessionCommand::Touch {
        phase: TouchPhase::Began,
        point: from,
    }];
    for i in 1..=steps {
        let t = i as f32 / steps as f32;
        events.push(SessionCommand::Touch {
            phase: TouchPhase::Moved,
            point: ScreenPoint::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t),
        });
    }
    events
}

/// Camera orientation for `yaw` (about +Y) then `pitch` (about +X), degrees.
pub fn camera_rotation(yaw_deg: f32, pitch_deg: f32) -> Quaternion {
    Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), yaw_deg.to_radians())
        .mul(Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), pitch_deg.to_radians()))
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(client: SessionClient, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "arplace>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse(line) {
            Ok(ReplCommand::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Ok(command) => execute(&client, command),
            Err(e) => println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                e,
                "/help".bold()
            ),
        }
    }
}

fn execute(client: &SessionClient, command: ReplCommand) {
    match command {
        ReplCommand::Help => cmd_help(),
        ReplCommand::Mode(mode) => send(client, SessionCommand::SetMode(mode)),
        ReplCommand::Select(name) => send(client, SessionCommand::SelectObject(name)),
        ReplCommand::Tap(point) => send(
            client,
            SessionCommand::Touch {
                phase: TouchPhase::Began,
                point,
            },
        ),
        ReplCommand::Drag { from, to, steps } => cmd_drag(client, from, to, steps),
        ReplCommand::Planes(hidden) => cmd_planes(client, hidden),
        ReplCommand::Camera { position, angles } => cmd_camera(client, position, angles),
        ReplCommand::Tick(n) => {
            for _ in 0..n {
                send(client, SessionCommand::Tick);
            }
        }
        ReplCommand::Undo => send(client, SessionCommand::Undo),
        ReplCommand::Reset => send(client, SessionCommand::Reset),
        ReplCommand::Status => with_snapshot(client, print_status),
        ReplCommand::Objects => with_snapshot(client, print_objects),
        ReplCommand::Anchors => with_snapshot(client, print_anchors),
        ReplCommand::Quit => {}
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "ARPlace Commands".bold().underline());
    println!("  {}  – freeform | plane | image", "/mode <m>".bold().cyan());
    println!("  {}  – choose the object to place", "/select <obj>".bold().cyan());
    println!("  {}  – touch the screen", "/tap x y".bold().cyan());
    println!("  {}  – drag, placing along the way", "/drag x1 y1 x2 y2 [steps]".bold().cyan());
    println!("  {}  – show, hide or toggle plane visuals", "/planes [on|off]".bold().cyan());
    println!("  {}  – move the simulated camera", "/camera x y z [yaw] [pitch]".bold().cyan());
    println!("  {}  – advance tracking", "/tick [n]".bold().cyan());
    println!("  {}  – remove the last object", "/undo".bold().cyan());
    println!("  {}  – clear everything and restart tracking", "/reset".bold().cyan());
    println!("  {}  – session overview", "/status".bold().cyan());
    println!("  {}  – placed objects and available prototypes", "/objects".bold().cyan());
    println!("  {}  – tracked anchors", "/anchors".bold().cyan());
    println!("  {}  – exit", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_drag(client: &SessionClient, from: ScreenPoint, to: ScreenPoint, steps: usize) {
    let mut placed = 0;
    let mut rejected = 0;
    for event in drag_events(from, to, steps) {
        match client.send(event) {
            Ok(CommandOutcome::Placement(PlacementOutcome::Placed(_))) => placed += 1,
            Ok(_) => rejected += 1,
            Err(e) => {
                println!("{}: {}", "Error".red(), e);
                return;
            }
        }
    }
    println!(
        "  {} placed, {} skipped over {} touch events",
        placed.to_string().green().bold(),
        rejected.to_string().yellow(),
        steps + 1
    );
}

fn cmd_planes(client: &SessionClient, hidden: Option<bool>) {
    let hidden = match hidden {
        Some(h) => h,
        None => match client.snapshot() {
            Ok(snap) => !snap.planes_hidden,
            Err(e) => {
                println!("{}: {}", "Error".red(), e);
                return;
            }
        },
    };
    send(client, SessionCommand::SetPlanesHidden(hidden));
}

fn cmd_camera(client: &SessionClient, position: Vec3, angles: Option<(f32, f32)>) {
    let rotation = match angles {
        Some((yaw, pitch)) => camera_rotation(yaw, pitch),
        None => match client.snapshot() {
            Ok(snap) => snap.camera.rotation,
            Err(e) => {
                println!("{}: {}", "Error".red(), e);
                return;
            }
        },
    };
    send(client, SessionCommand::MoveCamera(Transform3D::new(position, rotation)));
}

fn send(client: &SessionClient, command: SessionCommand) {
    match client.send(command) {
        Ok(outcome) => print_outcome(&outcome),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn with_snapshot(client: &SessionClient, print: fn(&SessionSnapshot)) {
    match client.snapshot() {
        Ok(snap) => print(&snap),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Output
// ─────────────────────────────────────────────────────────────────────────────

fn print_outcome(outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::Placement(PlacementOutcome::Placed(node)) => {
            println!("  {} placed as node {}", "✓".green().bold(), node.to_string().bold());
        }
        CommandOutcome::Placement(PlacementOutcome::Rejected(reason)) => {
            println!("  {} {}", "·".dimmed(), reason.to_string().dimmed());
        }
        CommandOutcome::ModeChanged(mode) => {
            println!("  Mode: {}", mode.to_string().yellow());
        }
        CommandOutcome::Selected(name) => {
            println!("  Selected: {}", name.yellow());
        }
        CommandOutcome::PlanesHidden { hidden, visuals } => {
            let state = if *hidden { "hidden" } else { "visible" };
            println!("  Planes {} ({} visual(s))", state.yellow(), visuals);
        }
        CommandOutcome::CameraMoved(pose) => {
            let t = pose.translation;
            println!("  Camera at ({:.2}, {:.2}, {:.2})", t.x, t.y, t.z);
        }
        CommandOutcome::Undone { prototype } => {
            println!("  {} removed last {}", "✓".green().bold(), prototype.bold());
        }
        CommandOutcome::Reset => {
            println!("  {} session reset", "✓".green().bold());
        }
        CommandOutcome::Ticked(report) => {
            let line = format!(
                "  tick: +{} ~{} -{}",
                report.added, report.updated, report.removed
            );
            if report.warnings > 0 {
                println!("{} {}", line, format!("({} warning(s))", report.warnings).yellow());
            } else {
                println!("{}", line.dimmed());
            }
        }
    }
}

fn print_status(snap: &SessionSnapshot) {
    println!("{}", "Session".bold().underline());
    println!("  Mode           : {}", snap.mode.to_string().yellow());
    println!(
        "  Selected       : {}",
        snap.selected.as_deref().unwrap_or("<none>").yellow()
    );
    println!(
        "  Tracking       : {}",
        if snap.tracking_running { "running".green() } else { "stopped".red() }
    );
    let c = snap.camera.translation;
    println!("  Camera         : ({:.2}, {:.2}, {:.2})", c.x, c.y, c.z);
    println!("  Min distance   : {:.3} m", snap.minimum_distance_m);
    println!(
        "  Planes         : {}",
        if snap.planes_hidden { "hidden" } else { "visible" }
    );
    println!(
        "  Anchors        : {} ({} plane visual(s), {} image cover(s))",
        snap.anchors.len(),
        snap.plane_visuals,
        snap.image_visuals
    );
    println!("  Placed objects : {}", snap.placed.len());
    println!("  Scene nodes    : {}", snap.scene_nodes);
}

fn print_objects(snap: &SessionSnapshot) {
    println!("{}", "Prototypes".bold().underline());
    for name in &snap.prototypes {
        let marker = if snap.selected.as_deref() == Some(name) { "▶" } else { " " };
        println!("    {} {}", marker.green(), name.bold());
    }
    println!("{}", "Placed".bold().underline());
    if snap.placed.is_empty() {
        println!("    {}", "nothing placed yet".dimmed());
    }
    for (i, p) in snap.placed.iter().enumerate() {
        println!(
            "    {:>2}. {:<7} #{:<4} ({:.2}, {:.2}, {:.2})  {}  {}",
            i + 1,
            p.prototype,
            p.node,
            p.position.x,
            p.position.y,
            p.position.z,
            p.mode.to_string().dimmed(),
            p.placed_at.format("%H:%M:%S").to_string().dimmed()
        );
    }
}

fn print_anchors(snap: &SessionSnapshot) {
    println!("{}", "Anchors".bold().underline());
    if snap.anchors.is_empty() {
        println!("    {}", "no anchors yet – try /tick".dimmed());
    }
    for a in &snap.anchors {
        let detail = match (&a.alignment, &a.image) {
            (Some(alignment), _) => format!("{alignment:?}").to_lowercase(),
            (None, Some(image)) => format!("image '{image}'"),
            (None, None) => String::new(),
        };
        let size = a
            .visual_size
            .map(|s| format!(" {:.2}×{:.2} m", s.width, s.depth))
            .unwrap_or_default();
        let screen = a
            .screen
            .map(|p| format!("screen ({:.0}, {:.0})", p.x, p.y))
            .unwrap_or_else(|| "off screen".to_string());
        println!(
            "    {} {:<6} {}{}  {}",
            a.id.to_string().bold(),
            a.kind,
            detail,
            size,
            screen.dimmed()
        );
    }
}
