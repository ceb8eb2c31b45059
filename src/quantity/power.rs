use std::fmt::{Debug, Display, Formatter};

use crate::quantity::Quantity;

/// Contracted power tier in kilovolt-amperes (1.15 through 20.7 kVA for BTN
/// supply points).
pub type Kilovoltamperes = Quantity<f64, 1, 0, 0>;

impl Display for Kilovoltamperes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} kVA", self.0)
    }
}

impl Debug for Kilovoltamperes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}kVA", self.0)
    }
}
