//! Simulated clients for running the host without a network layer.

use crate::config::SimulationSettings;
use horizon_host::{ClientKey, ConnectionHub, Scheduler, TickScheduler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

/// Ticks between consecutive bot connects at startup.
const CONNECT_STAGGER_TICKS: u64 = 10;

/// Connects bot clients on a staggered schedule and, if configured,
/// replaces each bot with a fresh one after its lifetime.
pub struct BotSimulation {
    hub: Arc<ConnectionHub>,
    scheduler: Arc<TickScheduler>,
    lifetime_ticks: u64,
    spawned: AtomicUsize,
}

impl BotSimulation {
    pub fn start(
        settings: &SimulationSettings,
        hub: Arc<ConnectionHub>,
        scheduler: Arc<TickScheduler>,
    ) -> Arc<Self> {
        let simulation = Arc::new(Self {
            hub,
            scheduler,
            lifetime_ticks: settings.bot_lifetime_ticks,
            spawned: AtomicUsize::new(0),
        });

        for slot in 0..settings.bot_clients as u64 {
            let bots = simulation.clone();
            simulation.scheduler.schedule_once(
                slot * CONNECT_STAGGER_TICKS,
                Box::new(move || bots.spawn()),
            );
        }

        info!(
            "🤖 Scheduled {} simulated client(s) (lifetime: {})",
            settings.bot_clients,
            match settings.bot_lifetime_ticks {
                0 => "until shutdown".to_string(),
                ticks => format!("{} ticks", ticks),
            }
        );
        simulation
    }

    /// Total bots connected so far.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    fn spawn(self: &Arc<Self>) {
        let number = self.spawned.fetch_add(1, Ordering::Relaxed) + 1;
        let client = ClientKey::new();
        self.hub.connect(client, format!("Bot-{}", number));

        if self.lifetime_ticks > 0 {
            let bots = self.clone();
            self.scheduler.schedule_once(
                self.lifetime_ticks,
                Box::new(move || {
                    bots.hub.disconnect(&client);
                    bots.spawn();
                }),
            );
        }
    }
}
