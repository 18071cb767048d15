use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use clap::Parser;
use colav_core::arpa::ArpaConfig;
use colav_core::cbf::CbfConfig;
use colav_core::records::World;
use tokio::sync::mpsc;
use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

use colav_server::{
    Cli, ColavCoordinator, Controls, CoordinatorConfig, DomainStore, RecordRouter, Relay,
    RelayConfig, ReplaySource, RouterConfig, VERSION,
};

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = Cli::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    log::info!("colav-server {}", VERSION);

    Toplevel::new(move |s| async move {
        let world = Arc::new(Mutex::new(World::default()));
        let controls = Arc::new(RwLock::new(Controls::default()));

        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(64);
        let (domain_tx, domain_rx) = mpsc::channel(4);
        let (record_tx, record_rx) = mpsc::channel(256);

        let relay = Relay::new(
            RelayConfig {
                address: args.relay.clone(),
                enabled: !args.no_relay,
            },
            controls.clone(),
            domain_tx,
        );
        s.start(SubsystemBuilder::new("Relay", move |h| {
            relay.run(h, outbound_rx)
        }));

        let router = RecordRouter::new(
            world.clone(),
            outbound_tx.clone(),
            RouterConfig {
                distance_filter_deg: args.distance_filter,
                predicted_interval_s: args.predicted_interval,
            },
        );
        s.start(SubsystemBuilder::new("Router", move |h| {
            router.run(h, record_rx)
        }));

        let store = DomainStore::new(
            args.domains
                .clone()
                .unwrap_or_else(DomainStore::default_path),
        );
        let coordinator = ColavCoordinator::new(
            CoordinatorConfig {
                update_interval_s: args.update_interval,
                arpa: ArpaConfig {
                    safety_radius: args.safety_radius,
                    own_mmsi: args.own_mmsi.clone(),
                    ..ArpaConfig::default()
                },
                cbf: CbfConfig {
                    t_tot: args.prediction_t,
                    ..CbfConfig::default()
                },
                ..CoordinatorConfig::default()
            },
            world,
            outbound_tx,
            store,
        );
        s.start(SubsystemBuilder::new("Coordinator", move |h| {
            coordinator.run(h, domain_rx)
        }));

        if let Some(path) = args.replay.clone() {
            let replay = ReplaySource::new(path, record_tx);
            s.start(SubsystemBuilder::new("Replay", move |h| replay.run(h)));
        }
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_secs(5))
    .await
    .map_err(|e| miette::miette!("{}", e))
}
