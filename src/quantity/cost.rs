use std::fmt::{Debug, Display, Formatter};

use crate::quantity::Quantity;

pub type Cost = Quantity<f64, 0, 0, 1>;

impl Cost {
    /// Round to whole euro cents, the resolution of an invoice line.
    pub fn round_cents(self) -> Self {
        Self((self.0 * 100.0).round() / 100.0)
    }
}

impl Display for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} €", self.0)
    }
}

impl Debug for Cost {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}€", self.0)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_round_cents() {
        assert_abs_diff_eq!(Cost::from(1.006).round_cents().0, 1.01);
        assert_abs_diff_eq!(Cost::from(1.004).round_cents().0, 1.0);
        assert_abs_diff_eq!(Cost::from(-0.004).round_cents().0, 0.0);
    }
}
