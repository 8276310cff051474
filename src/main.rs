use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;

use toolsim::config::Cli;
use toolsim::persistence;
use toolsim::revision::RevisionRegistry;
use toolsim::session::SessionController;
use toolsim::state::ControllerState;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let profile = persistence::load_profile(&cli.profile)
        .with_context(|| format!("loading profile {:?}", cli.profile))?;
    let psets = persistence::load_psets(&cli.name);

    let mut revisions = RevisionRegistry::new();
    revisions.apply_profile(&profile);

    let mut state = ControllerState::new();
    state.identification.name = cli.name.clone();
    state.nok_probability = cli.nok_probability;
    state.auto_loop_interval_secs = cli.auto_loop_interval;
    state.psets = psets;
    state.io.ensure_mapped_functions(profile.relay_mappings.values().copied());

    let state = Arc::new(Mutex::new(state));
    let revisions = Arc::new(Mutex::new(revisions));

    let listener = TcpListener::bind(("0.0.0.0", cli.port))
        .await
        .with_context(|| format!("binding to port {}", cli.port))?;
    log::info!("listening on port {} as {:?} ({})", cli.port, cli.name, profile.name);

    let controller = SessionController::new(listener, state.clone(), revisions);

    tokio::select! {
        _ = controller.run() => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutting down");
        }
    }

    save_psets_on_exit(&cli.name, &state);
    Ok(())
}

fn save_psets_on_exit(controller_name: &str, state: &Arc<Mutex<ControllerState>>) {
    let psets: HashMap<String, toolsim::pset::Pset> =
        state.lock().expect("state mutex poisoned").psets.clone();
    if let Err(e) = persistence::save_psets(controller_name, &psets) {
        log::warn!("failed to persist pset table on shutdown: {e:#}");
    }
}
