//! N-1 contingency simulator entry point: CLI wiring and scheduler construction.

use std::io;
use std::path::Path;
use std::process;

use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

use n1_sim::config::ScenarioConfig;
use n1_sim::error::PowerFlowError;
use n1_sim::io::export::export_history_csv;
use n1_sim::network::{NetworkDirectory, SharedNetwork};
use n1_sim::scenario::n1_sweep;
use n1_sim::sim::{
    FanOut, JsonLinesSink, NotificationLog, Notifier, PowerFlowTrigger, RunReport, Scheduler,
};

/// Default spacing between contingencies in a generated sweep (seconds).
const DEFAULT_SWEEP_SPACING_S: f64 = 2.0;

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    fast: bool,
    sweep_seed: Option<u64>,
    sweep_spacing_s: f64,
    history_out: Option<String>,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
}

fn print_help() {
    eprintln!("n1-sim: N-1 contingency event simulator");
    eprintln!();
    eprintln!("Usage: n1-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!("  --preset <name>          Use a built-in preset (demo, radial_feeder)");
    eprintln!("  --fast                   Replay events back-to-back instead of in real time");
    eprintln!("  --sweep <seed>           Replace scenario events with a seeded N-1 sweep");
    eprintln!("  --spacing <seconds>      Spacing between sweep events (default: 2.0)");
    eprintln!("  --history-out <path>     Export notification history to CSV");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Serve the REST API while the scenario runs");
        eprintln!("  --port <u16>             API server port (default: 3000)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the demo preset is used.");
    eprintln!("Log verbosity follows RUST_LOG (default: info).");
}

fn next_value<'a>(args: &'a [String], i: usize, flag: &str, what: &str) -> &'a str {
    match args.get(i) {
        Some(v) => v,
        None => {
            eprintln!("error: {flag} requires {what}");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        fast: false,
        sweep_seed: None,
        sweep_spacing_s: DEFAULT_SWEEP_SPACING_S,
        history_out: None,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                i += 1;
                cli.scenario_path =
                    Some(next_value(&args, i, "--scenario", "a path argument").to_string());
            }
            "--preset" => {
                i += 1;
                cli.preset = Some(next_value(&args, i, "--preset", "a name argument").to_string());
            }
            "--fast" => {
                cli.fast = true;
            }
            "--sweep" => {
                i += 1;
                let v = next_value(&args, i, "--sweep", "a u64 seed");
                if let Ok(s) = v.parse::<u64>() {
                    cli.sweep_seed = Some(s);
                } else {
                    eprintln!("error: --sweep value \"{v}\" is not a valid u64");
                    process::exit(1);
                }
            }
            "--spacing" => {
                i += 1;
                let v = next_value(&args, i, "--spacing", "a number of seconds");
                match v.parse::<f64>() {
                    Ok(s) if s.is_finite() && s >= 0.0 => cli.sweep_spacing_s = s,
                    _ => {
                        eprintln!("error: --spacing value \"{v}\" is not a non-negative number");
                        process::exit(1);
                    }
                }
            }
            "--history-out" => {
                i += 1;
                cli.history_out =
                    Some(next_value(&args, i, "--history-out", "a path argument").to_string());
            }
            #[cfg(feature = "api")]
            "--serve" => {
                cli.serve = true;
            }
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                let v = next_value(&args, i, "--port", "a u16 argument");
                if let Ok(p) = v.parse::<u16>() {
                    cli.port = p;
                } else {
                    eprintln!("error: --port value \"{v}\" is not a valid u16");
                    process::exit(1);
                }
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    if cli.scenario_path.is_some() && cli.preset.is_some() {
        eprintln!("error: --scenario and --preset are mutually exclusive");
        process::exit(1);
    }

    cli
}

/// Stand-in collaborator for the power-flow hook: summarises topology and
/// equipment states without any electrical computation.
fn topology_summary(network: &NetworkDirectory) -> Result<Value, PowerFlowError> {
    let equipment: Vec<Value> = network
        .equipment
        .iter()
        .map(|e| json!({ "id": e.id, "kind": e.kind, "state": e.state }))
        .collect();
    Ok(json!({
        "lines_total": network.lines.len(),
        "lines_out_of_service": network.lines_out_of_service(),
        "load_kw": network.loads.iter().map(|l| l.p_kw).sum::<f64>(),
        "equipment": equipment,
    }))
}

fn build_scheduler(cfg: &ScenarioConfig, log: &NotificationLog) -> Scheduler {
    let network = SharedNetwork::new(cfg.network.clone());
    let sink = FanOut::new()
        .with(JsonLinesSink::new(io::stdout()))
        .with(log.clone());
    let notifier = Notifier::new(sink);

    if cfg.simulation.powerflow {
        let trigger = PowerFlowTrigger::new(topology_summary, &cfg.simulation.output_dir);
        info!(
            output_dir = %trigger.output_dir().display(),
            "power-flow hook attached"
        );
        Scheduler::with_powerflow(network, notifier, trigger)
    } else {
        Scheduler::new(network, notifier)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let cli = parse_args();

    // Load config: --scenario takes priority, then --preset, then demo default
    let mut scenario = if let Some(ref path) = cli.scenario_path {
        match ScenarioConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match ScenarioConfig::from_preset(name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ScenarioConfig::demo()
    };

    if cli.fast {
        scenario.simulation.realtime = false;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let events = match cli.sweep_seed {
        Some(seed) => n1_sweep(&scenario.network, cli.sweep_spacing_s, seed),
        None => scenario.to_events(),
    };
    let realtime = scenario.simulation.realtime;

    let log = NotificationLog::new();
    #[cfg_attr(not(feature = "api"), expect(unused_mut))]
    let mut scheduler = build_scheduler(&scenario, &log);

    #[cfg(feature = "api")]
    {
        if cli.serve {
            run_with_api(&mut scheduler, events, realtime, &cli, &log);
            return;
        }
    }

    let report = match scheduler.run_scenario(events, realtime) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };
    finish_run(&report, &cli, &log);
}

/// Prints the run summary and writes the CSV history if requested.
fn finish_run(report: &RunReport, cli: &CliArgs, log: &NotificationLog) {
    eprintln!("{report}");

    if let Some(ref path) = cli.history_out {
        if let Err(e) = export_history_csv(&log.entries(), Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Notification history written to {path}");
    }
}

/// Runs the scenario on a background thread while the API serves; keeps
/// serving after the run ends until the process is terminated.
#[cfg(feature = "api")]
fn run_with_api(
    scheduler: &mut Scheduler,
    events: Vec<n1_sim::sim::Event>,
    realtime: bool,
    cli: &CliArgs,
    log: &NotificationLog,
) {
    use std::net::SocketAddr;
    use std::sync::Arc;

    let state = Arc::new(n1_sim::api::AppState {
        network: scheduler.network().clone(),
        log: log.clone(),
        commands: scheduler.commands(),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        }
    };
    let server = rt.spawn(n1_sim::api::serve(state, addr));

    if let Err(e) = scheduler.start_in_background(events, realtime) {
        eprintln!("error: {e}");
        process::exit(1);
    }
    let Some(report) = scheduler.join() else {
        eprintln!("error: scenario thread ended without a report");
        process::exit(1);
    };
    finish_run(&report, cli, log);
    eprintln!("scenario finished; API still serving on http://{addr} (Ctrl-C to exit)");

    match rt.block_on(server) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("error: API server failed: {e}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("error: API server task failed: {e}");
            process::exit(1);
        }
    }
}
