pub mod models {
    pub mod tado;
}

pub mod auth;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod periodic;
pub mod poller;
pub mod renewer;
pub mod session;
pub mod transport;

use crate::config::Config;
use crate::models::tado::HomeId;
use crate::poller::PollSnapshot;
use crate::session::Session;
use crate::transport::UreqTransport;
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

pub fn run() -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (user={}, http_timeout={:?}, token_refresh={:?}, refetch={:?}, home={})",
        cfg.credentials.username,
        cfg.http_timeout,
        cfg.token_refresh_interval,
        cfg.refetch_interval,
        cfg.home_id.map(|h| h.to_string()).unwrap_or_else(|| "first".to_string()),
    );

    // 2) Authenticate and pick the home
    let transport = Arc::new(UreqTransport::new(cfg.http_timeout));
    let session = Session::establish(transport, &cfg.endpoints, &cfg.credentials, cfg.home_id)
        .map_err(|e| format!("session setup failed: {}", e))?;

    // 3) One-off per-zone baseline, also used to label the bulk snapshots
    let zone_names = log_zone_baseline(&session);

    // 4) Background renewal and polling, each on its own cadence
    let renewer = session
        .renewer()
        .spawn(cfg.token_refresh_interval)
        .map_err(|e| format!("failed to start token renewer: {}", e))?;
    let poller = session
        .poller()
        .spawn(cfg.refetch_interval, move |snapshot| log_snapshot(&zone_names, &snapshot))
        .map_err(|e| format!("failed to start zone poller: {}", e))?;
    info!(
        "Polling home {} every {:?}, renewing tokens every {:?}",
        session.home.id, cfg.refetch_interval, cfg.token_refresh_interval
    );

    // 5) The renewer only returns once the session is unusable
    let outcome = renewer.wait();
    let ticks = poller.stop();
    info!("Zone poller handled {} tick(s)", ticks);
    match outcome {
        Ok(renewals) => {
            info!("Token renewer stopped after {} renewal(s)", renewals);
            Ok(())
        }
        Err(e) => Err(format!("session lost, token renewal failed: {}", e)),
    }
}

fn log_zone_baseline(session: &Session) -> BTreeMap<String, String> {
    let client = session.client();
    let home_id: HomeId = session.home.id;
    let zones = match client.get_zones(home_id) {
        Ok(z) => z,
        Err(e) => {
            warn!("get_zones({}) failed, snapshots will not carry zone names: {}", home_id, e);
            return BTreeMap::new();
        }
    };
    info!("Home {} has {} zone(s)", home_id, zones.len());

    for zone in &zones {
        let zone_type: String = zone.r#type.clone().into();
        match client.get_zone_state(home_id, zone.id) {
            Ok(state) => info!(
                "Zone {} ({}, {}, {} device(s)): {}",
                zone.id,
                zone.name,
                zone_type,
                zone.devices.len(),
                describe_readings(state.inside_temperature_c(), state.humidity_pct())
            ),
            Err(e) => warn!("get_zone_state({}, {}) failed: {}", home_id, zone.id, e),
        }
    }

    zones
        .into_iter()
        .map(|z| (z.id.0.to_string(), z.name))
        .collect()
}

fn log_snapshot(zone_names: &BTreeMap<String, String>, snapshot: &PollSnapshot) {
    let states = match &snapshot.result {
        Ok(states) => states,
        Err(e) => {
            error!("Tick {}: error getting zone states: {}", snapshot.tick, e);
            return;
        }
    };
    info!(
        "Tick {}: {} zone state(s) for home {} at {}",
        snapshot.tick,
        states.len(),
        snapshot.home_id,
        snapshot.fetched_at.to_rfc3339()
    );
    for (zone_id, state) in &states.zone_states {
        let name = zone_names.get(zone_id).map(String::as_str).unwrap_or("?");
        let measured = state
            .measured_at()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        info!(
            "Zone {} ({}): {} (measured {})",
            zone_id,
            name,
            describe_readings(state.inside_temperature_c(), state.humidity_pct()),
            measured
        );
    }
    if let Some(id) = zone_names.keys().find(|id| !states.zone_states.contains_key(*id)) {
        warn!("Zone {} missing from tick {}", id, snapshot.tick);
    }
}

fn describe_readings(temp_c: Option<f64>, humidity_pct: Option<f64>) -> String {
    let temp = temp_c.map(|t| format!("{:.1}°C", t)).unwrap_or_else(|| "-".to_string());
    let humidity = humidity_pct.map(|h| format!("{:.1}%", h)).unwrap_or_else(|| "-".to_string());
    format!("inside {}, humidity {}", temp, humidity)
}

/// Pull the optional `--env-file <path>` / `--env-file=<path>` out of the argument list.
fn env_file_arg<I>(args: I) -> Result<Option<PathBuf>, String>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter();
    let mut found: Option<PathBuf> = None;
    while let Some(arg) = args.next() {
        let value = match arg.to_str() {
            Some("--") => break,
            Some("--env-file") => args.next().map(PathBuf::from),
            Some(s) => match s.strip_prefix("--env-file=") {
                Some(rest) => Some(PathBuf::from(rest)).filter(|p| !p.as_os_str().is_empty()),
                None => return Err(format!("unrecognised argument: {}", s)),
            },
            None => return Err("argument contains invalid UTF-8".to_string()),
        };
        let path = value.ok_or_else(|| "`--env-file` requires a path argument".to_string())?;
        if found.replace(path).is_some() {
            return Err("`--env-file` provided more than once".to_string());
        }
    }
    Ok(found)
}

/// Load the CLI-named env file, or `./.env` when none was named and it exists.
/// Variables already set in the process environment win.
fn load_env_file() -> Result<Option<LoadedEnvFile>, String> {
    let explicit = env_file_arg(std::env::args_os().skip(1))?;
    let loaded = match explicit {
        Some(path) if !path.is_file() => return Err(format!("env file not found: {}", path.display())),
        Some(path) => LoadedEnvFile { path, explicit: true },
        None => {
            let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
            let path = cwd.join(".env");
            if !path.is_file() {
                return Ok(None);
            }
            LoadedEnvFile { path, explicit: false }
        }
    };
    dotenvy::from_path(&loaded.path).map_err(|e| format!("failed to load {}: {}", loaded.path.display(), e))?;
    Ok(Some(loaded))
}

fn main() {
    // before the logger, so RUST_LOG may come from the env file
    let loaded_env = load_env_file();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    match loaded_env {
        Ok(Some(LoadedEnvFile { path, explicit })) => info!(
            "Environment loaded from {} {}",
            if explicit { "--env-file" } else { "default .env" },
            path.display()
        ),
        Ok(None) => {}
        Err(e) => {
            error!("fatal: {}", e);
            std::process::exit(1);
        }
    }

    info!(
        "tado-sensors {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run() {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}
