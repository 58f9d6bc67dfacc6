use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use finsim_core::{vec3, RigId, TargetId};
use finsim_locomotion::SwimParams;
use finsim_rig::FishRig;
use finsim_world::{
    simulate_run, FrameSpan, KinematicTailTip, RunConfig, RunUnit, TargetPoint,
    TrajectoryRecorder,
};

/// Run one swim scenario and print the per-frame trajectory plus its digest.
#[derive(Parser, Debug)]
#[command(name = "finsim-trace")]
struct Cli {
    /// JSON file with parameter overrides (missing fields take defaults).
    #[arg(long)]
    params: Option<PathBuf>,

    /// First simulated frame.
    #[arg(long, default_value_t = 1)]
    start: i32,

    /// One past the last simulated frame.
    #[arg(long, default_value_t = 250)]
    end: i32,

    /// Seed for the per-run parameter jitter.
    #[arg(long, default_value_t = 0x5EED_F15F)]
    seed: u64,

    /// Target point as "x,y,z"; omit to swim straight ahead.
    #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
    target: Option<[f32; 3]>,

    /// Initial yaw offset in degrees.
    #[arg(long, default_value_t = 0.0)]
    start_angle: f32,

    /// Tail length for the kinematic tail-tip stand-in.
    #[arg(long, default_value_t = 1.0)]
    tail_length: f32,

    /// Print only every Nth frame.
    #[arg(long, default_value_t = 1)]
    every: u32,

    /// Dump the full trajectory as JSON instead of the table.
    #[arg(long)]
    json: bool,
}

fn parse_point(s: &str) -> Result<[f32; 3], String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected x,y,z, got '{s}'"));
    }
    let mut p = [0.0f32; 3];
    for (slot, part) in p.iter_mut().zip(&parts) {
        *slot = part.trim().parse::<f32>().map_err(|e| format!("'{part}': {e}"))?;
    }
    Ok(p)
}

fn load_params(path: Option<&PathBuf>) -> Result<SwimParams> {
    let Some(path) = path else { return Ok(SwimParams::default()) };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let params: SwimParams = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(params)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let params = load_params(cli.params.as_ref())?;
    let cfg = RunConfig {
        span: FrameSpan::new(cli.start, cli.end),
        seed: cli.seed,
        start_yaw_deg: cli.start_angle,
    };

    let mut unit = RunUnit {
        rig: FishRig::with_default_bones(RigId(0), "trace"),
        target: cli.target.map(|p| TargetPoint {
            id: TargetId(0),
            position: vec3(p[0], p[1], p[2]),
        }),
    };

    let mut recorder = TrajectoryRecorder::new();
    let mut tail = KinematicTailTip { tail_length: cli.tail_length };
    simulate_run(&params, &cfg, &mut unit, &mut tail, &mut recorder)
        .context("simulation failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&recorder.samples)?);
    } else {
        println!("{:>6}  {:>9} {:>9} {:>9}  {:>8} {:>8}  {:>7}",
            "frame", "x", "y", "z", "yaw", "pitch", "fin");
        let every = cli.every.max(1) as usize;
        for s in recorder.samples.iter().step_by(every) {
            println!(
                "{:>6}  {:>9.4} {:>9.4} {:>9.4}  {:>8.3} {:>8.3}  {:>7.4}",
                s.frame,
                s.position[0], s.position[1], s.position[2],
                s.yaw_rad.to_degrees(), s.pitch_rad.to_degrees(),
                s.tail_fin_scale,
            );
        }
    }
    println!("digest: {}", recorder.digest_hex());
    Ok(())
}
