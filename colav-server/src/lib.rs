//! # COLAV Server
//!
//! Tokio runtime around [`colav_core`]: ingests typed sensor records,
//! maintains the world model, runs the COLAV pipeline on a fixed interval
//! and streams `arpa`/`encounters`/`cbf` JSON payloads to a visualization
//! client over a WebSocket relay.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       colav-server                           │
//! │                                                              │
//! │  replay/transport ──mpsc──▶ RecordRouter ──┐                 │
//! │                               │            │ decorated JSON  │
//! │                     World (Arc<Mutex>)     │                 │
//! │                               │            ▼                 │
//! │                      ColavCoordinator ──mpsc──▶ Relay ──ws──▶│
//! │                        │        ▲                 │          │
//! │                  spawn_blocking │ oneshot   inbound control  │
//! │                     CBF worker ─┘           (cbf_domains)    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Subsystem lifecycle is managed with `tokio-graceful-shutdown`: shutting
//! down cancels the coordinator interval, the in-flight CBF worker and the
//! relay socket.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use clap::Parser;
use colav_core::records::World;

pub mod coordinator;
pub mod relay;
pub mod replay;
pub mod router;
pub mod storage;

pub use coordinator::{ColavCoordinator, CoordinatorConfig};
pub use relay::{Relay, RelayConfig};
pub use replay::ReplaySource;
pub use router::{RecordRouter, RouterConfig};
pub use storage::DomainStore;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error type shared by all subsystems.
pub type SubsystemError = Box<dyn std::error::Error + Send + Sync>;
pub type SubsystemResult = Result<(), SubsystemError>;

/// The shared world model: serialized writes from the router, snapshot
/// reads from the coordinator.
pub type SharedWorld = Arc<Mutex<World>>;

/// Latest inbound control values from the visualization client. The
/// simulation-source orchestrator consumes these; the COLAV pipeline only
/// uses `cbf_domains`, which travels on its own channel.
#[derive(Debug, Clone, Default)]
pub struct Controls {
    pub azimuth: Option<f64>,
    pub thrust: Option<f64>,
    pub data_mode: Option<String>,
}

pub type SharedControls = Arc<RwLock<Controls>>;

#[derive(Parser, Clone, Debug)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// WebSocket address of the visualization relay
    #[arg(short, long, default_value = "ws://127.0.0.1:8000")]
    pub relay: String,

    /// Run without a relay connection (payloads are dropped)
    #[arg(long, default_value_t = false)]
    pub no_relay: bool,

    /// COLAV update interval in seconds
    #[arg(short, long, default_value_t = 1.0)]
    pub update_interval: f64,

    /// CBF prediction horizon in seconds
    #[arg(long, default_value_t = 600.0)]
    pub prediction_t: f64,

    /// Safety radius in meters
    #[arg(long, default_value_t = 200.0)]
    pub safety_radius: f64,

    /// Own-ship MMSI; its AIS echo is skipped by the pipeline
    #[arg(long, default_value = "")]
    pub own_mmsi: String,

    /// AIS distance gate in geodetic degrees
    #[arg(long, default_value_t = 1.0)]
    pub distance_filter: f64,

    /// Dead-reckoning horizon for AIS predicted positions, seconds
    #[arg(long, default_value_t = 30.0)]
    pub predicted_interval: f64,

    /// Replay a JSON-lines record log as the ingress source
    #[arg(long)]
    pub replay: Option<PathBuf>,

    /// Path of the persisted ship-domain table
    /// (default: platform data dir / cbf_domains.json)
    #[arg(long)]
    pub domains: Option<PathBuf>,
}
