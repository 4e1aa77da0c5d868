use std::env;
use std::process;
use std::time::Duration;

use atc_contracts::{Scenario, SimulationConfig, SimulationSnapshot, WeatherKind};
use atc_sync::{ClientConfig, SimulationSession, SyncError};

fn print_usage() {
    println!("atc-cli <command>");
    println!("commands:");
    println!("  state");
    println!("  reset [scenario] [weather]");
    println!("    scenario: Equilibrio|Normal|Sobrecarga|Libre (default Equilibrio)");
    println!("    weather: ninguno|normal|lluvia|tormenta|viento_fuerte|niebla|microburst");
    println!("  step [n]");
    println!("  run <steps> [interval_ms]");
    println!("    steps one at a time, printing each snapshot as it lands");
    println!("environment:");
    println!("  ATC_ENGINE_URL        default http://127.0.0.1:8000");
    println!("  ATC_ENGINE_TIMEOUT_MS default 10000");
    println!("  ATC_ENGINE_ROUTES     default|legacy");
}

fn parse_i64(value: Option<&String>, label: &str) -> Result<i64, String> {
    let raw = value.ok_or_else(|| format!("missing {label}"))?;
    raw.parse::<i64>()
        .map_err(|_| format!("invalid {label}: {raw}"))
}

fn parse_reset_config(args: &[String]) -> Result<SimulationConfig, String> {
    let mut config = SimulationConfig::default();

    if let Some(raw) = args.get(2) {
        let scenario = raw.parse::<Scenario>().map_err(|err| err.to_string())?;
        config = config.with_scenario(scenario);
    }

    if let Some(raw) = args.get(3) {
        let weather = raw.parse::<WeatherKind>().map_err(|err| err.to_string())?;
        config = config.with_forced_weather(weather);
    }

    Ok(config)
}

fn print_snapshot(snapshot: &SimulationSnapshot) {
    println!("{snapshot}");
    if let Some(time) = &snapshot.metrics.time {
        println!("  time={time}");
    }
    for plane in &snapshot.planes {
        let go_around = if plane.is_going_around() { " go-around" } else { "" };
        println!(
            "  {:>8} {:<20} airline={} fuel={:.1} priority={}{}",
            plane.flight_code,
            plane.state.as_str(),
            plane.airline.code,
            plane.fuel,
            plane.priority,
            go_around
        );
    }
    let orphans = snapshot.orphaned_aircraft().count();
    if orphans > 0 {
        println!("  warning: {orphans} aircraft reference unknown airlines");
    }
}

async fn run_loop(session: SimulationSession, args: &[String]) -> Result<(), CliError> {
    let steps = parse_i64(args.get(2), "steps").map_err(CliError::Usage)?;
    let interval_ms = args
        .get(3)
        .map(|value| {
            value
                .parse::<u64>()
                .map_err(|_| CliError::Usage(format!("invalid interval_ms: {value}")))
        })
        .transpose()?
        .unwrap_or(0);

    if steps < 1 {
        return Err(CliError::Usage(format!("steps must be at least 1, got {steps}")));
    }

    let mut subscription = session.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(view) = subscription.recv().await {
            if let Some(snapshot) = view.snapshot.as_deref() {
                print!("[rev {}] ", view.revision);
                print_snapshot(snapshot);
            }
        }
    });

    let mut outcome = Ok(());
    for _ in 0..steps {
        if let Err(err) = session.step(1).await {
            outcome = Err(CliError::Sync(err));
            break;
        }
        if interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
    }

    // The subscription closes once the last cache handle is gone.
    drop(session);
    if let Err(err) = printer.await {
        log::warn!("snapshot printer stopped early: {err}");
    }
    outcome
}

enum CliError {
    Usage(String),
    Sync(SyncError),
}

impl From<SyncError> for CliError {
    fn from(value: SyncError) -> Self {
        Self::Sync(value)
    }
}

async fn dispatch(session: SimulationSession, args: &[String]) -> Result<(), CliError> {
    match args.get(1).map(String::as_str) {
        Some("state") => {
            let snapshot = session.get_state().await?;
            print_snapshot(&snapshot);
        }
        Some("reset") => {
            let config = parse_reset_config(args).map_err(CliError::Usage)?;
            let snapshot = session.reset(&config).await?;
            print_snapshot(&snapshot);
        }
        Some("step") => {
            let count = match args.get(2) {
                Some(raw) => raw
                    .parse::<i64>()
                    .map_err(|_| CliError::Usage(format!("invalid n: {raw}")))?,
                None => 1,
            };
            let snapshot = session.step(count).await?;
            print_snapshot(&snapshot);
        }
        Some("run") => run_loop(session, args).await?,
        Some(other) => return Err(CliError::Usage(format!("unknown command: {other}"))),
        None => return Err(CliError::Usage("missing command".to_string())),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if matches!(args.get(1).map(String::as_str), Some("help" | "-h" | "--help")) {
        print_usage();
        return;
    }

    let session =
        match ClientConfig::from_env().and_then(|config| SimulationSession::connect(&config)) {
            Ok(session) => session,
            Err(err) => {
                eprintln!("error: {err}");
                process::exit(2);
            }
        };
    log::debug!("engine at {}", session.client().transport().base_url());

    match dispatch(session, &args).await {
        Ok(()) => {}
        Err(CliError::Usage(err)) => {
            eprintln!("error: {err}");
            print_usage();
            process::exit(2);
        }
        Err(CliError::Sync(err)) => {
            eprintln!("error: {err}");
            process::exit(1);
        }
    }
}
