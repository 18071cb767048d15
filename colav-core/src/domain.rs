//! Ship domains
//!
//! A ship domain is a polygonal safety envelope around a target vessel,
//! oriented to the target's course. For each encounter class the table holds
//! three equal-length arrays: `d[k]` is a distance multiplier (scaled by the
//! target's length at evaluation time) and `(z1[k], z2[k])` the matching
//! direction unit vector in the target's body frame. The serde shape matches
//! the persisted `cbf_domains.json`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::encounter::EncounterClass;
use crate::error::DomainError;

/// One polygonal domain: distance multipliers plus body-frame directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub d: Vec<f64>,
    pub z1: Vec<f64>,
    pub z2: Vec<f64>,
}

impl Domain {
    /// Number of half-plane constraints in the polygon.
    pub fn len(&self) -> usize {
        self.d.len()
    }

    pub fn is_empty(&self) -> bool {
        self.d.is_empty()
    }

    fn validate(&self, class: EncounterClass) -> Result<(), DomainError> {
        if self.d.len() != self.z1.len() || self.d.len() != self.z2.len() {
            return Err(DomainError::LengthMismatch {
                class,
                d: self.d.len(),
                z1: self.z1.len(),
                z2: self.z2.len(),
            });
        }
        if self.d.is_empty() {
            return Err(DomainError::Empty(class));
        }
        if let Some((index, &value)) = self.d.iter().enumerate().find(|(_, &v)| v <= 0.0) {
            return Err(DomainError::NonPositiveDistance {
                class,
                index,
                value,
            });
        }
        Ok(())
    }
}

/// The full table, keyed by encounter class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainTable {
    classes: BTreeMap<EncounterClass, Domain>,
}

impl DomainTable {
    /// Build a table from per-class domains, rejecting incomplete or
    /// malformed input as a whole.
    pub fn new(classes: BTreeMap<EncounterClass, Domain>) -> Result<Self, DomainError> {
        let table = Self { classes };
        table.validate()?;
        Ok(table)
    }

    /// Check completeness and per-class consistency.
    pub fn validate(&self) -> Result<(), DomainError> {
        for class in EncounterClass::ALL {
            let domain = self
                .classes
                .get(&class)
                .ok_or(DomainError::MissingClass(class))?;
            domain.validate(class)?;
        }
        Ok(())
    }

    /// Domain for an encounter class. Valid tables cover every class.
    pub fn get(&self, class: EncounterClass) -> &Domain {
        self.classes
            .get(&class)
            .unwrap_or_else(|| &self.classes[&EncounterClass::Safe])
    }
}

/// Eight body-frame directions: bow, bow quarters, beams, stern quarters,
/// stern. Shared by all default domains; only the distances differ.
const DIRECTIONS: [(f64, f64); 8] = [
    (0.0, 1.0),                                    // bow
    (std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2), // starboard bow
    (1.0, 0.0),                                    // starboard beam
    (std::f64::consts::FRAC_1_SQRT_2, -std::f64::consts::FRAC_1_SQRT_2), // starboard quarter
    (0.0, -1.0),                                   // stern
    (-std::f64::consts::FRAC_1_SQRT_2, -std::f64::consts::FRAC_1_SQRT_2), // port quarter
    (-1.0, 0.0),                                   // port beam
    (-std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2), // port bow
];

fn domain_with_distances(d: [f64; 8]) -> Domain {
    Domain {
        d: d.to_vec(),
        z1: DIRECTIONS.iter().map(|(z1, _)| *z1).collect(),
        z2: DIRECTIONS.iter().map(|(_, z2)| *z2).collect(),
    }
}

impl Default for DomainTable {
    /// Built-in table used until a `cbf_domains` update arrives. Distances
    /// are multiples of the target's length; the asymmetries follow the
    /// rules of the road (keep clear ahead and to the side being passed).
    fn default() -> Self {
        let mut classes = BTreeMap::new();
        classes.insert(
            EncounterClass::Safe,
            domain_with_distances([1.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]),
        );
        classes.insert(
            EncounterClass::Headon,
            domain_with_distances([3.0, 2.0, 1.5, 1.0, 1.0, 1.0, 2.0, 2.5]),
        );
        classes.insert(
            EncounterClass::Giveway,
            domain_with_distances([2.5, 3.0, 2.5, 1.5, 1.0, 1.0, 1.0, 1.5]),
        );
        classes.insert(
            EncounterClass::Standon,
            domain_with_distances([2.0, 1.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.5]),
        );
        classes.insert(
            EncounterClass::OvertakingStar,
            domain_with_distances([2.0, 1.5, 1.0, 1.0, 1.5, 2.0, 2.5, 2.5]),
        );
        classes.insert(
            EncounterClass::OvertakingPort,
            domain_with_distances([2.0, 2.5, 2.5, 2.0, 1.5, 1.0, 1.0, 1.5]),
        );
        Self { classes }
    }
}
