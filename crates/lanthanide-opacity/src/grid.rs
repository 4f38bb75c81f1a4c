//! The parameter grid: nuclear charges × density exponents × temperatures.

use std::ops::RangeInclusive;

use crate::literal::NumericLiteral;
use crate::types::{CompositeKey, OpacityError, OpacityResult};

/// Lanthanides, La through Yb.
pub const LANTHANIDE_CHARGES: RangeInclusive<u32> = 57..=70;

/// Actinides, Ac through No.
pub const ACTINIDE_CHARGES: RangeInclusive<u32> = 89..=102;

/// Mass density exponents: rho = 10^-n g/cm³.
pub const DENSITY_EXPONENTS: RangeInclusive<i32> = 4..=20;

/// Electron temperatures in eV, spelled as they go on the wire.
///
/// The first entry is deliberately `.01` rather than `0.01`.
pub const TEMPERATURES_EV: [&str; 27] = [
    ".01", "0.07", "0.1", "0.14", "0.17", "0.2", "0.22", "0.24", "0.27", "0.3", "0.34", "0.4",
    "0.5", "0.6", "0.7", "0.8", "0.9", "1", "1.2", "1.5", "2", "2.5", "3", "3.5", "4", "4.5", "5",
];

/// Mass density in g/cm³ for a density exponent.
pub fn mass_density(exponent: i32) -> f64 {
    // Powers of ten are exact up to 1e22, so the division rounds once.
    if exponent >= 0 {
        1.0 / 10f64.powi(exponent)
    } else {
        10f64.powi(-exponent)
    }
}

/// One fetch unit.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    pub nuclear_charge: u32,
    pub density_exponent: i32,
    pub temperature: NumericLiteral,
}

impl GridPoint {
    pub fn new(nuclear_charge: u32, density_exponent: i32, temperature: NumericLiteral) -> Self {
        Self {
            nuclear_charge,
            density_exponent,
            temperature,
        }
    }

    pub fn mass_density(&self) -> f64 {
        mass_density(self.density_exponent)
    }

    /// Index key this point's rows are stored under.
    pub fn key(&self) -> CompositeKey {
        CompositeKey::new(
            self.nuclear_charge,
            self.mass_density(),
            self.temperature.value(),
        )
    }
}

/// Ordered Cartesian product of grid axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    nuclear_charges: Vec<u32>,
    density_exponents: Vec<i32>,
    temperatures: Vec<NumericLiteral>,
}

impl Grid {
    /// Build a grid from explicit axes. Axes keep the given order.
    pub fn new(
        nuclear_charges: Vec<u32>,
        density_exponents: Vec<i32>,
        temperatures: Vec<NumericLiteral>,
    ) -> OpacityResult<Self> {
        if let Some(&z) = nuclear_charges.iter().find(|&&z| z == 0) {
            return Err(OpacityError::InvalidInput(format!(
                "nuclear charge must be positive, got {z}"
            )));
        }
        if let Some(t) = temperatures.iter().find(|t| t.value() <= 0.0) {
            return Err(OpacityError::InvalidInput(format!(
                "temperature must be positive, got {t}"
            )));
        }
        Ok(Self {
            nuclear_charges,
            density_exponents,
            temperatures,
        })
    }

    /// The lanthanide/actinide harvest grid.
    pub fn lanthanides_and_actinides() -> Self {
        Self {
            nuclear_charges: LANTHANIDE_CHARGES.chain(ACTINIDE_CHARGES).collect(),
            density_exponents: DENSITY_EXPONENTS.collect(),
            temperatures: TEMPERATURES_EV
                .iter()
                .filter_map(|t| NumericLiteral::new(t).ok())
                .collect(),
        }
    }

    pub fn nuclear_charges(&self) -> &[u32] {
        &self.nuclear_charges
    }

    pub fn density_exponents(&self) -> &[i32] {
        &self.density_exponents
    }

    pub fn temperatures(&self) -> &[NumericLiteral] {
        &self.temperatures
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.nuclear_charges.len() * self.density_exponents.len() * self.temperatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Points in charge → density → temperature order, temperature fastest.
    pub fn points(&self) -> impl Iterator<Item = GridPoint> + '_ {
        self.nuclear_charges.iter().flat_map(move |&z| {
            self.density_exponents.iter().flat_map(move |&rho| {
                self.temperatures
                    .iter()
                    .map(move |t| GridPoint::new(z, rho, t.clone()))
            })
        })
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::lanthanides_and_actinides()
    }
}
