//! COLAV coordinator
//!
//! The periodic update loop. Every tick: snapshot the world under the
//! mutex, run the ARPA engine, advance the per-target encounter machines,
//! emit the `arpa` and `encounters` payloads, then dispatch the CBF rollout
//! to a blocking worker. At most one worker is in flight; a tick that
//! arrives first cancels the stale rollout through its flag. The `cbf`
//! payload is emitted when the worker's oneshot resolves.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use colav_core::arpa::{ArpaConfig, ArpaEngine, TargetTrack};
use colav_core::cbf::{CbfConfig, CbfOwnShip, CbfPredictor, CbfSolution, CbfTarget, ReferenceModel};
use colav_core::domain::DomainTable;
use colav_core::encounter::{EncounterClassifier, HysteresisConfig};
use colav_core::geo;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_graceful_shutdown::SubsystemHandle;

use crate::storage::DomainStore;
use crate::{SharedWorld, SubsystemResult};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Update loop period, seconds
    pub update_interval_s: f64,
    /// ARPA gates
    pub arpa: ArpaConfig,
    /// CBF rollout parameters
    pub cbf: CbfConfig,
    /// Encounter FSM bands
    pub hysteresis: HysteresisConfig,
    /// Contacts silent this long are evicted at snapshot time, milliseconds
    pub target_timeout_ms: u64,
    /// Stub vessel length absent AIS type-5 static data, meters
    pub vessel_length_m: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            update_interval_s: 1.0,
            arpa: ArpaConfig::default(),
            cbf: CbfConfig::default(),
            hysteresis: HysteresisConfig::default(),
            target_timeout_ms: 120_000,
            vessel_length_m: 50.0,
        }
    }
}

/// An in-flight CBF worker: its result channel, its cancellation flag and
/// the ENU origin its output is expressed against.
struct PendingCbf {
    rx: oneshot::Receiver<Option<CbfSolution>>,
    cancel: Arc<AtomicBool>,
    origin: (f64, f64),
}

pub struct ColavCoordinator {
    config: CoordinatorConfig,
    world: SharedWorld,
    outbound: mpsc::Sender<String>,
    store: DomainStore,
    domains: DomainTable,
    arpa: ArpaEngine,
    predictor: Arc<CbfPredictor<ReferenceModel>>,
    classifiers: BTreeMap<String, EncounterClassifier>,
}

impl ColavCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        world: SharedWorld,
        outbound: mpsc::Sender<String>,
        store: DomainStore,
    ) -> Self {
        let domains = store.load();
        let arpa = ArpaEngine::new(config.arpa.clone());
        let predictor = Arc::new(CbfPredictor::new(config.cbf.clone(), ReferenceModel::default()));
        Self {
            config,
            world,
            outbound,
            store,
            domains,
            arpa,
            predictor,
            classifiers: BTreeMap::new(),
        }
    }

    pub async fn run(
        mut self,
        subsys: SubsystemHandle,
        mut domain_rx: mpsc::Receiver<DomainTable>,
    ) -> SubsystemResult {
        let mut ticker =
            tokio::time::interval(Duration::from_secs_f64(self.config.update_interval_s));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut pending: Option<PendingCbf> = None;

        log::info!(
            "Coordinator running, interval {:.1} s, horizon {:.0} s",
            self.config.update_interval_s,
            self.config.cbf.t_tot
        );

        loop {
            if let Some(mut job) = pending.take() {
                tokio::select! {
                    _ = subsys.on_shutdown_requested() => {
                        job.cancel.store(true, Ordering::Relaxed);
                        return Ok(());
                    }
                    result = &mut job.rx => match result {
                        Ok(Some(solution)) => self.emit_cbf(&solution, job.origin),
                        Ok(None) => log::debug!("Coordinator: CBF rollout cancelled"),
                        Err(_) => log::warn!("Coordinator: CBF worker died without a result"),
                    },
                    Some(table) = domain_rx.recv() => {
                        self.apply_domain_update(table);
                        pending = Some(job);
                    }
                    _ = ticker.tick() => {
                        // Stale worker: cancel and start a fresh cycle
                        job.cancel.store(true, Ordering::Relaxed);
                        pending = self.tick();
                    }
                }
            } else {
                tokio::select! {
                    _ = subsys.on_shutdown_requested() => return Ok(()),
                    Some(table) = domain_rx.recv() => self.apply_domain_update(table),
                    _ = ticker.tick() => pending = self.tick(),
                }
            }
        }
    }

    /// One update cycle: snapshot, ARPA, classifier update, emissions, CBF
    /// dispatch. Returns the in-flight worker if one was started.
    fn tick(&mut self) -> Option<PendingCbf> {
        let now_ms = Utc::now().timestamp_millis() as u64;
        let (own, targets) = {
            let mut world = self.world.lock().ok()?;
            world.evict_stale_targets(now_ms, self.config.target_timeout_ms);
            (world.own_ship.clone(), world.targets.clone())
        };
        let own = own?;

        let (own_kin, mut tracks) = self.arpa.evaluate(&own, &targets);

        // Encounter machines follow the AIS map: evict entries whose MMSI
        // vanished from the current update
        self.classifiers
            .retain(|mmsi, _| targets.contains_key(mmsi));

        if tracks.is_empty() {
            log::debug!("Coordinator: no qualifying targets this tick");
            return None;
        }

        let own_course = own_kin.course_deg.to_radians();
        for track in &mut tracks {
            track.length = self.config.vessel_length_m;
            let fsm = self
                .classifiers
                .entry(track.mmsi.clone())
                .or_insert_with(|| EncounterClassifier::new(self.config.hysteresis));

            let (d_at_cpa, t_cpa) = classifier_inputs(track, self.config.arpa.safety_radius);
            track.encounter = fsm.update(
                own_course,
                track.course_deg.to_radians(),
                track.po,
                own_kin.u,
                track.uo,
                d_at_cpa,
                t_cpa,
            );
        }

        // arpa, then encounters, then the CBF dispatch; the cbf payload for
        // this cycle arrives whenever the worker finishes
        let reports = self.arpa.convert_arpa_params(&own_kin, &tracks);
        match serde_json::to_value(&reports) {
            Ok(data) => self.send_payload("arpa", data),
            Err(e) => log::warn!("Coordinator: arpa serialization failed: {}", e),
        }

        let encounters: BTreeMap<&str, &str> = self
            .classifiers
            .iter()
            .map(|(mmsi, classifier)| (mmsi.as_str(), classifier.state().as_str()))
            .collect();
        self.send_payload("encounters", serde_json::json!(encounters));

        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let (tx, rx) = oneshot::channel();
        let predictor = self.predictor.clone();
        let domains = self.domains.clone();
        let own_cbf = CbfOwnShip::from(&own_kin);
        let cbf_targets: Vec<CbfTarget> = tracks.iter().map(CbfTarget::from).collect();
        let start_unix = now_ms as f64 / 1000.0;

        tokio::task::spawn_blocking(move || {
            let solution = predictor.rollout(&own_cbf, &cbf_targets, &domains, start_unix, &flag);
            let _ = tx.send(solution);
        });

        Some(PendingCbf {
            rx,
            cancel,
            origin: (own_kin.lat, own_kin.lon),
        })
    }

    /// Convert a finished rollout to geodetic coordinates and emit `cbf`.
    fn emit_cbf(&self, solution: &CbfSolution, origin: (f64, f64)) {
        let (lat_o, lon_o) = origin;
        let path: Vec<[f64; 2]> = solution
            .trajectory
            .iter()
            .map(|p| {
                let (lat, lon) = geo::xyz_to_coords(p[0], p[1], lat_o, lon_o);
                [lon, lat]
            })
            .collect();

        let domains: Vec<Vec<[[f64; 2]; 2]>> = solution
            .domain_lines
            .iter()
            .map(|group| {
                group
                    .iter()
                    .map(|seg| {
                        let (lat1, lon1) = geo::xyz_to_coords(seg.x1, seg.y1, lat_o, lon_o);
                        let (lat2, lon2) = geo::xyz_to_coords(seg.x2, seg.y2, lat_o, lon_o);
                        [[lon1, lat1], [lon2, lat2]]
                    })
                    .collect()
            })
            .collect();

        let data = serde_json::json!({
            "p": path,
            "maneuver_start": solution.maneuver_start.unwrap_or(-1.0),
            "domains": domains,
        });
        self.send_payload("cbf", data);
    }

    /// Swap in a validated domain table and persist it; reject the update
    /// whole on validation failure.
    fn apply_domain_update(&mut self, table: DomainTable) {
        match table.validate() {
            Ok(()) => {
                self.domains = table;
                log::info!("Coordinator: domain table updated");
                if let Err(e) = self.store.save(&self.domains) {
                    log::error!("Coordinator: domain table persist failed: {}", e);
                }
            }
            Err(e) => log::warn!("Coordinator: rejecting domain update: {}", e),
        }
    }

    fn send_payload(&self, message_id: &str, data: serde_json::Value) {
        let payload = compose_payload(message_id, data);
        if self.outbound.try_send(payload).is_err() {
            log::warn!("Coordinator: relay backlog, dropped {}", message_id);
        }
    }
}

/// The entry/exit predicate inputs for the encounter machine. A target
/// breaching the safety radius is classified on the intersection geometry
/// with d_at_cpa pinned to the radius.
fn classifier_inputs(track: &TargetTrack, safety_radius: f64) -> (f64, f64) {
    match (&track.safety, &track.cpa) {
        (Some(sp), _) => (safety_radius, sp.t_2_r),
        (None, Some(cpa)) => (cpa.d_at_cpa, cpa.t_2_cpa),
        (None, None) => (f64::INFINITY, f64::NEG_INFINITY),
    }
}

/// The relay envelope shared by every pipeline payload.
fn compose_payload(message_id: &str, data: serde_json::Value) -> String {
    serde_json::json!({
        "type": "datain",
        "content": {
            "message_id": message_id,
            "data": data,
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use colav_core::arpa::{CpaSolution, SafetyIntersection};
    use colav_core::encounter::EncounterClass;

    fn track() -> TargetTrack {
        TargetTrack {
            mmsi: "257000001".into(),
            course_deg: 180.0,
            length: 50.0,
            po: [0.0, 1000.0],
            uo: 5.0,
            zo: [0.0, -1.0],
            uo_x: 0.0,
            uo_y: -5.0,
            cpa: Some(CpaSolution {
                d_at_cpa: 120.0,
                d_2_cpa: 500.0,
                t_2_cpa: 100.0,
                x_at_cpa: 0.0,
                y_at_cpa: 500.0,
                o_x_at_cpa: 0.0,
                o_y_at_cpa: 500.0,
            }),
            safety: None,
            encounter: EncounterClass::Safe,
        }
    }

    #[test]
    fn test_classifier_inputs_prefer_safety_intersection() {
        let mut t = track();
        assert_eq!(classifier_inputs(&t, 200.0), (120.0, 100.0));

        t.safety = Some(SafetyIntersection {
            t_2_r: 80.0,
            t_x_at_r: 0.0,
            t_y_at_r: 600.0,
            x_at_r: 0.0,
            y_at_r: 400.0,
            d_2_r: 400.0,
        });
        // Radius breach substitutes d_at_cpa := safety_radius, t := t_2_r
        assert_eq!(classifier_inputs(&t, 200.0), (200.0, 80.0));
    }

    #[test]
    fn test_payload_envelope_shape() {
        let payload = compose_payload("encounters", serde_json::json!({"1": "SAFE"}));
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["type"], "datain");
        assert_eq!(value["content"]["message_id"], "encounters");
        assert_eq!(value["content"]["data"]["1"], "SAFE");
    }

    #[tokio::test]
    async fn test_tick_emits_arpa_and_encounters() {
        use colav_core::records::{AisContact, OwnShipState, World};
        use std::sync::Mutex;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let mut world = World::default();
        world.own_ship = Some(OwnShipState {
            lat: 63.4389,
            lon: 10.3995,
            speed_kn: geo::mps_to_kn(5.0),
            course_deg: 0.0,
            heading_deg: None,
        });
        // Reciprocal-course target 1 km dead ahead
        let (lat, lon) = geo::xyz_to_coords(0.0, 1000.0, 63.4389, 10.3995);
        world.targets.insert(
            "257000001".into(),
            AisContact {
                mmsi: "257000001".into(),
                lat,
                lon,
                course_deg: Some(180.0),
                speed_kn: Some(geo::mps_to_kn(5.0)),
                received_ms: Utc::now().timestamp_millis() as u64,
            },
        );

        let (tx, mut rx) = mpsc::channel(16);
        let mut coordinator = ColavCoordinator::new(
            CoordinatorConfig {
                cbf: CbfConfig {
                    t_tot: 10.0,
                    ..CbfConfig::default()
                },
                ..CoordinatorConfig::default()
            },
            Arc::new(Mutex::new(world)),
            tx,
            DomainStore::new(dir.path().join("cbf_domains.json")),
        );

        let pending = coordinator.tick().expect("CBF should be dispatched");

        let arpa: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(arpa["content"]["message_id"], "arpa");
        let report = &arpa["content"]["data"]["257000001"];
        assert!(report["safety_params"].as_bool().unwrap());
        assert!((report["t_2_cpa"].as_f64().unwrap() - 100.0).abs() < 1.0);

        let encounters: serde_json::Value =
            serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(encounters["content"]["message_id"], "encounters");
        assert!(encounters["content"]["data"]["257000001"].is_string());

        // The dispatched rollout completes and yields a full trajectory
        let solution = pending.rx.await.unwrap().unwrap();
        assert_eq!(solution.trajectory.len(), 50);
    }

    #[tokio::test]
    async fn test_classifier_gc_follows_ais_map() {
        use colav_core::records::{OwnShipState, World};
        use std::sync::Mutex;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let mut world = World::default();
        world.own_ship = Some(OwnShipState {
            lat: 63.4389,
            lon: 10.3995,
            speed_kn: 10.0,
            course_deg: 0.0,
            heading_deg: None,
        });

        let (tx, _rx) = mpsc::channel(16);
        let mut coordinator = ColavCoordinator::new(
            CoordinatorConfig::default(),
            Arc::new(Mutex::new(world)),
            tx,
            DomainStore::new(dir.path().join("cbf_domains.json")),
        );
        coordinator.classifiers.insert(
            "999".into(),
            EncounterClassifier::new(HysteresisConfig::default()),
        );

        // MMSI 999 is gone from the AIS map, so its machine is evicted even
        // though the tick finds no qualifying targets
        assert!(coordinator.tick().is_none());
        assert!(!coordinator.classifiers.contains_key("999"));
    }
}
