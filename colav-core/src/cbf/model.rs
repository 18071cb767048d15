//! 4-DOF maneuvering model contract
//!
//! The hydrodynamic integrator is an external library; the predictor depends
//! only on this trait. State layout follows the integrator's convention:
//! [N, E, yaw, roll, surge, sway, roll_rate, yaw_rate, azimuth, revs].
//!
//! [`ReferenceModel`] is a first-order stand-in with the same contract:
//! yaw rate follows the azimuth command with a time constant, surge is held,
//! positions integrate kinematically. It keeps the predictor testable
//! without the vessel's hydrodynamic coefficient set; the real integrator
//! drops in behind the same trait.

/// Maneuvering state, mirroring the external integrator's state vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VesselState {
    /// Position north, meters
    pub north: f64,
    /// Position east, meters
    pub east: f64,
    /// Yaw, radians (0 = north, positive clockwise)
    pub yaw: f64,
    /// Roll, radians
    pub roll: f64,
    /// Surge velocity, m/s
    pub surge: f64,
    /// Sway velocity, m/s
    pub sway: f64,
    /// Roll rate, rad/s
    pub roll_rate: f64,
    /// Yaw rate, rad/s
    pub yaw_rate: f64,
    /// Azimuth thruster angle, radians
    pub azimuth: f64,
    /// Propeller revolutions
    pub revs: f64,
}

impl VesselState {
    /// Initial state from speed and heading, thrusters per the command.
    pub fn from_kinematics(u: f64, yaw: f64, azimuth: f64, revs: f64) -> Self {
        Self {
            north: 0.0,
            east: 0.0,
            yaw,
            roll: 0.0,
            surge: u,
            sway: 0.0,
            roll_rate: 0.0,
            yaw_rate: 0.0,
            azimuth,
            revs,
        }
    }
}

/// Integration parameters: step plus ambient current.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimParams {
    pub dt: f64,
    /// Current speed, m/s
    pub current_speed: f64,
    /// Current direction, radians
    pub current_dir: f64,
}

/// One integration step of a 4-DOF maneuvering model.
/// `thrust` is [azimuth, revs]; `wind` is the 4-DOF generalized wind force.
pub trait ManeuveringModel: Send + Sync {
    fn step(&self, x: &VesselState, thrust: [f64; 2], wind: [f64; 4], sim: &SimParams)
        -> VesselState;
}

/// First-order reference dynamics implementing the model contract.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceModel {
    /// Commanded yaw rate per radian of azimuth deflection, 1/s
    pub yaw_rate_gain: f64,
    /// Yaw response time constant, seconds
    pub yaw_time_constant: f64,
    /// Roll rate decay time constant, seconds
    pub roll_time_constant: f64,
}

impl Default for ReferenceModel {
    fn default() -> Self {
        Self {
            yaw_rate_gain: 1.0,
            yaw_time_constant: 1.5,
            roll_time_constant: 5.0,
        }
    }
}

impl ManeuveringModel for ReferenceModel {
    fn step(
        &self,
        x: &VesselState,
        thrust: [f64; 2],
        _wind: [f64; 4],
        sim: &SimParams,
    ) -> VesselState {
        let dt = sim.dt;
        let [azimuth, revs] = thrust;

        let r_cmd = self.yaw_rate_gain * azimuth;
        let yaw_rate = x.yaw_rate + (r_cmd - x.yaw_rate) * dt / self.yaw_time_constant;
        let yaw = x.yaw + yaw_rate * dt;

        let (sin_yaw, cos_yaw) = yaw.sin_cos();
        let current_n = sim.current_speed * sim.current_dir.cos();
        let current_e = sim.current_speed * sim.current_dir.sin();
        let north = x.north + (x.surge * cos_yaw - x.sway * sin_yaw + current_n) * dt;
        let east = x.east + (x.surge * sin_yaw + x.sway * cos_yaw + current_e) * dt;

        let roll_rate = x.roll_rate * (1.0 - dt / self.roll_time_constant);
        let roll = x.roll + roll_rate * dt;

        VesselState {
            north,
            east,
            yaw,
            roll,
            surge: x.surge,
            sway: x.sway,
            roll_rate,
            yaw_rate,
            azimuth,
            revs,
        }
    }
}
