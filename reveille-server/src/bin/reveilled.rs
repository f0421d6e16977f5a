//! The alarm clock daemon.
//!
//! Wires the preference store, scheduler, alarm state machine, and
//! command server together and runs until interrupted.

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use reveille_server::alarm::{AlarmState, AlarmStateMachine, LogBuzzer};
use reveille_server::clock::SystemClock;
use reveille_server::config::Config;
use reveille_server::protocol::CommandServer;
use reveille_server::scheduler::Scheduler;
use reveille_server::store::PreferenceStore;

#[tokio::main]
async fn main() -> Result<()> {
    reveille_server::tracing::init();

    let config = Config::from_env()?;
    let store = PreferenceStore::open(&config.store_path)
        .with_context(|| format!("opening preference store {}", config.store_path.display()))?;
    let alarm = AlarmState::new();

    let server = CommandServer::bind(
        (config.bind_address.as_str(), config.bind_port),
        store.clone(),
        alarm.clone(),
    )
    .await
    .with_context(|| format!("binding {}:{}", config.bind_address, config.bind_port))?;
    info!(addr = %server.local_addr()?, "listening for commands");

    let machine = AlarmStateMachine::new(
        alarm.clone(),
        Box::new(LogBuzzer),
        store.clone(),
        config.ring_cycle,
    );
    let scheduler = Scheduler::new(store, Box::new(SystemClock), machine, config.poll_interval);

    let running = CancellationToken::new();
    let scheduler_task = tokio::spawn(scheduler.run(running.clone()));
    let server_task = tokio::spawn(server.run(running.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;
    info!("shutdown requested");
    running.cancel();
    let _ = tokio::join!(scheduler_task, server_task);

    Ok(())
}
