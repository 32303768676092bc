//! The append-only dispatch log entry.

use chrono::{DateTime, Utc};

use crate::VehicleType;

/// One committed dispatch.
///
/// Records are produced exactly once per successful allocation and are
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DispatchRecord {
    /// Vehicle type that was dispatched.
    pub vehicle_type: VehicleType,
    /// Code of the zone the unit left from.
    pub source_code: String,
    /// Code of the zone the unit was sent to.
    pub dest_code: String,
    /// Zone codes from source to destination inclusive.
    pub path: Vec<String>,
    /// Sum of traversed edge weights; zero for a local dispatch.
    pub distance: f64,
    /// Commit time.
    pub created_at: DateTime<Utc>,
}

impl DispatchRecord {
    /// Whether the unit stayed in its own zone.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.source_code == self.dest_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("A", "C", false)]
    #[case("A", "A", true)]
    fn local_dispatch_keeps_source_and_destination_equal(
        #[case] source: &str,
        #[case] dest: &str,
        #[case] expected: bool,
    ) {
        let record = DispatchRecord {
            vehicle_type: VehicleType::FireTruck,
            source_code: source.to_owned(),
            dest_code: dest.to_owned(),
            path: vec![source.to_owned()],
            distance: 0.0,
            created_at: Utc::now(),
        };
        assert_eq!(record.is_local(), expected);
    }
}
