use std::fmt::{Debug, Display, Formatter};

use crate::quantity::{Quantity, cost::Cost};

/// Euro per kilowatt-hour.
pub type KilowattHourRate = Quantity<f64, -1, -1, 1>;

impl KilowattHourRate {
    /// Euro-per-megawatt-hour, the unit OMIE publishes in.
    pub fn from_megawatt_hour_rate(rate: f64) -> Self {
        Self(rate / 1000.0)
    }
}

impl Display for KilowattHourRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4} €/kWh", self.0)
    }
}

impl Debug for KilowattHourRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}€/kWh", self.0)
    }
}

/// Euro per day of contracted power.
pub type DayRate = Quantity<f64, 0, -1, 1>;

impl DayRate {
    pub fn over_days(self, days: u32) -> Cost {
        Cost::from(self.0 * f64::from(days))
    }
}

impl Display for DayRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4} €/day", self.0)
    }
}

impl Debug for DayRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}€/day", self.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_from_megawatt_hour_rate() {
        assert_abs_diff_eq!(KilowattHourRate::from_megawatt_hour_rate(60.0).0, 0.060);
    }

    #[test]
    fn test_over_days() {
        assert_abs_diff_eq!(DayRate::from(0.10).over_days(30).0, 3.0);
    }
}
