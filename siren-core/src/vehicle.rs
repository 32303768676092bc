//! Vehicle categories and the per-zone inventory they are counted in.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Emergency vehicle categories served by the engine.
///
/// The set is closed: any other name is rejected when parsing.
///
/// # Examples
///
/// ```
/// use siren_core::VehicleType;
///
/// let vehicle: VehicleType = "fire_truck".parse().expect("known vehicle type");
/// assert_eq!(vehicle, VehicleType::FireTruck);
/// assert_eq!(vehicle.to_string(), "fire_truck");
/// assert!("tow_truck".parse::<VehicleType>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum VehicleType {
    /// Ambulance-class units.
    Ambulance,
    /// Fire-class units.
    FireTruck,
    /// Police-class units.
    Police,
}

impl VehicleType {
    /// Every vehicle type, in canonical order.
    pub const ALL: [Self; 3] = [Self::Ambulance, Self::FireTruck, Self::Police];

    /// Wire name of the vehicle type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ambulance => "ambulance",
            Self::FireTruck => "fire_truck",
            Self::Police => "police",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a vehicle type name is outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown vehicle type {value:?} (expected ambulance, fire_truck or police)")]
pub struct VehicleTypeError {
    /// The rejected input.
    pub value: String,
}

impl FromStr for VehicleType {
    type Err = VehicleTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|vehicle| vehicle.as_str() == s)
            .ok_or_else(|| VehicleTypeError {
                value: s.to_owned(),
            })
    }
}

/// Available unit counts for each vehicle type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VehicleCounts {
    /// Available ambulances.
    pub ambulance: u32,
    /// Available fire trucks.
    pub fire_truck: u32,
    /// Available police units.
    pub police: u32,
}

impl VehicleCounts {
    /// Number of units available for `vehicle`.
    #[must_use]
    pub const fn get(&self, vehicle: VehicleType) -> u32 {
        match vehicle {
            VehicleType::Ambulance => self.ambulance,
            VehicleType::FireTruck => self.fire_truck,
            VehicleType::Police => self.police,
        }
    }

    /// Overwrite the count for `vehicle`.
    pub const fn set(&mut self, vehicle: VehicleType, count: u32) {
        match vehicle {
            VehicleType::Ambulance => self.ambulance = count,
            VehicleType::FireTruck => self.fire_truck = count,
            VehicleType::Police => self.police = count,
        }
    }

    /// Remove one unit of `vehicle` if any is left.
    ///
    /// Returns `false` and leaves the count untouched when it is already
    /// zero, so the counter can never go negative.
    pub fn take_one(&mut self, vehicle: VehicleType) -> bool {
        match self.get(vehicle).checked_sub(1) {
            Some(remaining) => {
                self.set(vehicle, remaining);
                true
            }
            None => false,
        }
    }
}

/// Per-type flags marking a zone as the canonical depot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DepotFlags {
    /// Zone is the ambulance depot.
    pub ambulance: bool,
    /// Zone is the fire truck depot.
    pub fire_truck: bool,
    /// Zone is the police depot.
    pub police: bool,
}

impl DepotFlags {
    /// Whether the zone is a depot for `vehicle`.
    #[must_use]
    pub const fn is_depot(&self, vehicle: VehicleType) -> bool {
        match vehicle {
            VehicleType::Ambulance => self.ambulance,
            VehicleType::FireTruck => self.fire_truck,
            VehicleType::Police => self.police,
        }
    }

    /// Set or clear the depot flag for `vehicle`.
    pub const fn set(&mut self, vehicle: VehicleType, depot: bool) {
        match vehicle {
            VehicleType::Ambulance => self.ambulance = depot,
            VehicleType::FireTruck => self.fire_truck = depot,
            VehicleType::Police => self.police = depot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ambulance", VehicleType::Ambulance)]
    #[case("fire_truck", VehicleType::FireTruck)]
    #[case("police", VehicleType::Police)]
    fn parses_wire_names(#[case] input: &str, #[case] expected: VehicleType) {
        assert_eq!(input.parse::<VehicleType>(), Ok(expected));
        assert_eq!(expected.as_str(), input);
    }

    #[rstest]
    #[case("")]
    #[case("Ambulance")]
    #[case("fire-truck")]
    #[case("helicopter")]
    fn rejects_names_outside_the_closed_set(#[case] input: &str) {
        let err = input.parse::<VehicleType>().expect_err("unknown type");
        assert_eq!(err.value, input);
    }

    #[rstest]
    fn take_one_stops_at_zero() {
        let mut counts = VehicleCounts {
            police: 1,
            ..VehicleCounts::default()
        };
        assert!(counts.take_one(VehicleType::Police));
        assert!(!counts.take_one(VehicleType::Police));
        assert_eq!(counts.get(VehicleType::Police), 0);
        assert!(!counts.take_one(VehicleType::Ambulance));
    }

    #[rstest]
    fn depot_flags_are_tracked_per_type() {
        let mut flags = DepotFlags::default();
        flags.set(VehicleType::FireTruck, true);
        assert!(flags.is_depot(VehicleType::FireTruck));
        assert!(!flags.is_depot(VehicleType::Ambulance));
        assert!(!flags.is_depot(VehicleType::Police));
    }
}
