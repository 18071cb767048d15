//! Hysteresis state machine for encounter commitment
//!
//! Raw sector classification flaps when a target sits near a boundary. The
//! machine commits to a non-safe state only once the CPA geometry crosses the
//! (tighter) entry band, and releases it only once it crosses the (looser)
//! exit band or the classification itself returns to safe. Transitions always
//! pass through SAFE; there is no direct hop between two non-safe states.

use super::EncounterClass;

/// Entry/exit bands for the hysteresis machine. The entry band must lie
/// strictly inside the exit band or the machine degenerates to flapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisConfig {
    /// Enter when d_at_cpa is below this, meters
    pub d_enter_up_cpa: f64,
    /// Enter only when t_2_cpa is above this, seconds
    pub t_enter_low_cpa: f64,
    /// Enter only when t_2_cpa is below this, seconds
    pub t_enter_up_cpa: f64,
    /// Exit when d_at_cpa reaches this, meters
    pub d_exit_low_cpa: f64,
    /// Exit when t_2_cpa drops below this, seconds
    pub t_exit_low_cpa: f64,
    /// Exit when t_2_cpa exceeds this, seconds
    pub t_exit_up_cpa: f64,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            d_enter_up_cpa: 200.0,
            t_enter_low_cpa: 5.0,
            t_enter_up_cpa: 60.0,
            d_exit_low_cpa: 300.0,
            t_exit_low_cpa: 0.0,
            t_exit_up_cpa: 90.0,
        }
    }
}

/// Per-target encounter state machine. Initial state is SAFE.
#[derive(Debug, Clone)]
pub struct EncounterFsm {
    state: EncounterClass,
    config: HysteresisConfig,
    last_entry: bool,
    last_exit: bool,
    last_classified: EncounterClass,
}

impl EncounterFsm {
    pub fn new(config: HysteresisConfig) -> Self {
        Self {
            state: EncounterClass::Safe,
            config,
            last_entry: false,
            last_exit: false,
            last_classified: EncounterClass::Safe,
        }
    }

    pub fn state(&self) -> EncounterClass {
        self.state
    }

    /// Most recent raw classification fed into the machine.
    pub fn last_classified(&self) -> EncounterClass {
        self.last_classified
    }

    /// Guard flags from the most recent update.
    pub fn last_guards(&self) -> (bool, bool) {
        (self.last_entry, self.last_exit)
    }

    /// Advance the machine with a fresh classification and the CPA geometry
    /// backing it. When the caller classifies from safety-radius intersection
    /// parameters it substitutes d_at_cpa := safety_radius.
    pub fn update(
        &mut self,
        classified: EncounterClass,
        d_at_cpa: f64,
        t_2_cpa: f64,
    ) -> EncounterClass {
        let entry = d_at_cpa < self.config.d_enter_up_cpa
            && t_2_cpa > self.config.t_enter_low_cpa
            && t_2_cpa < self.config.t_enter_up_cpa;
        let exit = d_at_cpa >= self.config.d_exit_low_cpa
            || t_2_cpa < self.config.t_exit_low_cpa
            || t_2_cpa > self.config.t_exit_up_cpa;

        self.last_entry = entry;
        self.last_exit = exit;
        self.last_classified = classified;

        if self.state == EncounterClass::Safe {
            if entry && classified != EncounterClass::Safe {
                self.state = classified;
            }
        } else if classified == EncounterClass::Safe || exit {
            self.state = EncounterClass::Safe;
        }
        self.state
    }
}
