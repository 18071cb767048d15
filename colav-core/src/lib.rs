//! # COLAV Core
//!
//! Platform-independent collision-avoidance numerics for a research vessel.
//!
//! This crate contains the geometric and state-logical subsystems of the
//! COLAV pipeline with **zero I/O dependencies**: everything here is pure
//! computation over typed inputs, making it usable from the tokio server,
//! batch analysis tools or tests alike.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  colav-core (platform-independent, no tokio/async deps)      │
//! │  ├── geo/        (geodetic<->ENU, DDM, unit conversions)     │
//! │  ├── records/    (typed sensor records, world model)         │
//! │  ├── smoother/   (per-MMSI history + Butterworth low-pass)   │
//! │  ├── arpa/       (CPA + safety-radius geometry)              │
//! │  ├── encounter/  (sector classifier + hysteresis FSM)        │
//! │  ├── domain/     (polygonal ship domains)                    │
//! │  └── cbf/        (4-DOF rollout with CBF safety filter)      │
//! └──────────────────────────────────────────────────────────────┘
//!                              ▲
//!                 ┌────────────┴────────────┐
//!                 │  colav-server           │
//!                 │  (tokio, WebSocket)     │
//!                 └─────────────────────────┘
//! ```
//!
//! ## Data flow
//!
//! Parsed records land in the [`records::World`] model. Each coordinator
//! tick snapshots the world, runs [`arpa::ArpaEngine`] over every AIS
//! contact, feeds the qualifying tracks through per-target
//! [`encounter::EncounterClassifier`] machines, and hands the decorated
//! tracks to [`cbf::CbfPredictor`] for the forward rollout.
//!
//! Conventions: 2-D vectors are (east, north) meters in the ENU frame
//! centered on own ship; courses are degrees on the wire and radians
//! inside the classifier and predictor.

pub mod arpa;
pub mod cbf;
pub mod domain;
pub mod encounter;
pub mod error;
pub mod geo;
pub mod records;
pub mod smoother;

// Re-export commonly used types
pub use arpa::{ArpaConfig, ArpaEngine, ArpaReport, OwnShipKinematics, TargetTrack};
pub use cbf::{CbfConfig, CbfOwnShip, CbfPredictor, CbfSolution, CbfTarget, ReferenceModel};
pub use domain::{Domain, DomainTable};
pub use encounter::{EncounterClass, EncounterClassifier, HysteresisConfig};
pub use error::{DomainError, GeoError, RecordError};
pub use records::{AisContact, AisRecord, InputRecord, OwnShipState, World};
pub use smoother::{SmootherConfig, TrackSmoother};
