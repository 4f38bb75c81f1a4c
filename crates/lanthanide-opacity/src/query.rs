//! Query URL construction for the NIST opacity search endpoint.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::grid::GridPoint;
use crate::literal::NumericLiteral;
use crate::types::{OpacityError, OpacityResult};

/// NIST NLTE opacity search endpoint.
pub const DEFAULT_BASE_URL: &str = "https://nlte.nist.gov/cgi-bin/OPAC/osearch.py";

/// Lower photon energy bound, as sent.
pub const DEFAULT_ENERGY_LOWER: &str = "1.25e-05";

/// Upper photon energy bound, as sent.
pub const DEFAULT_ENERGY_UPPER: &str = "150000.0";

/// Heaviest element the endpoint could plausibly tabulate.
const MAX_NUCLEAR_CHARGE: u32 = 118;

/// Opacity quantities the endpoint can tabulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpacityKind {
    /// Total opacity.
    Total,
    /// Absorption opacity.
    Absorption,
    /// Bound-bound opacity.
    BoundBound,
    /// Bound-free opacity.
    BoundFree,
    /// Free-free opacity.
    FreeFree,
}

impl OpacityKind {
    /// All kinds, in request order.
    pub const ALL: [OpacityKind; 5] = [
        OpacityKind::Total,
        OpacityKind::Absorption,
        OpacityKind::BoundBound,
        OpacityKind::BoundFree,
        OpacityKind::FreeFree,
    ];

    /// Wire tag for the `opacity` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Total => "total_opac",
            Self::Absorption => "absorpt_opac",
            Self::BoundBound => "bb_opac",
            Self::BoundFree => "bf_opac",
            Self::FreeFree => "ff_opac",
        }
    }
}

impl fmt::Display for OpacityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpacityKind {
    type Err = OpacityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| OpacityError::InvalidInput(format!("unknown opacity kind: '{s}'")))
    }
}

/// Everything in a query except the grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    base_url: Url,
    energy_lower: NumericLiteral,
    energy_upper: NumericLiteral,
    opacities: Vec<OpacityKind>,
}

impl QueryTemplate {
    pub fn new(
        base_url: &str,
        energy_lower: NumericLiteral,
        energy_upper: NumericLiteral,
        opacities: Vec<OpacityKind>,
    ) -> OpacityResult<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            energy_lower,
            energy_upper,
            opacities,
        })
    }

    /// Template for the NIST endpoint with the standard energy window and
    /// all five opacity kinds.
    pub fn nist() -> OpacityResult<Self> {
        Self::new(
            DEFAULT_BASE_URL,
            NumericLiteral::new(DEFAULT_ENERGY_LOWER)?,
            NumericLiteral::new(DEFAULT_ENERGY_UPPER)?,
            OpacityKind::ALL.to_vec(),
        )
    }

    /// Same template against another endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> OpacityResult<Self> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn opacities(&self) -> &[OpacityKind] {
        &self.opacities
    }

    /// Build the request URL for one grid point.
    ///
    /// Parameters are appended in a fixed order; `rho` carries the density
    /// exponent, not the density, and `opacity` repeats once per kind.
    pub fn build_url(&self, point: &GridPoint) -> OpacityResult<Url> {
        if point.nuclear_charge == 0 || point.nuclear_charge > MAX_NUCLEAR_CHARGE {
            return Err(OpacityError::InvalidInput(format!(
                "nuclear charge out of range: {}",
                point.nuclear_charge
            )));
        }
        if point.temperature.value() <= 0.0 {
            return Err(OpacityError::InvalidInput(format!(
                "temperature must be positive: {}",
                point.temperature
            )));
        }

        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("nuc_charge", &point.nuclear_charge.to_string())
                .append_pair("rho", &point.density_exponent.to_string())
                .append_pair("temperature", point.temperature.text())
                .append_pair("energy_no_1", self.energy_lower.text())
                .append_pair("energy_no_2", self.energy_upper.text());
            for kind in &self.opacities {
                query.append_pair("opacity", kind.as_str());
            }
        }
        Ok(url)
    }
}

fn parse_base_url(base_url: &str) -> OpacityResult<Url> {
    let url = Url::parse(base_url)?;
    if url.cannot_be_a_base() {
        return Err(OpacityError::InvalidInput(format!(
            "not a usable base URL: {url}"
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(z: u32, rho: i32, t: &str) -> GridPoint {
        GridPoint::new(z, rho, NumericLiteral::new(t).unwrap())
    }

    #[test]
    fn test_build_url_exact() {
        let template = QueryTemplate::nist().unwrap();
        let url = template.build_url(&point(57, 4, ".01")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://nlte.nist.gov/cgi-bin/OPAC/osearch.py?nuc_charge=57&rho=4&temperature=.01\
             &energy_no_1=1.25e-05&energy_no_2=150000.0\
             &opacity=total_opac&opacity=absorpt_opac&opacity=bb_opac&opacity=bf_opac&opacity=ff_opac"
        );
    }

    #[test]
    fn test_build_url_is_deterministic() {
        let template = QueryTemplate::nist().unwrap();
        let p = point(92, 12, "2.5");
        let a = template.build_url(&p).unwrap();
        let b = template.build_url(&p).unwrap();
        assert_eq!(a.as_str(), b.as_str());
        assert!(a.as_str().contains("rho=12&temperature=2.5&"));
    }

    #[test]
    fn test_opacity_order_follows_template() {
        let template = QueryTemplate::new(
            DEFAULT_BASE_URL,
            NumericLiteral::new("1").unwrap(),
            NumericLiteral::new("2").unwrap(),
            vec![OpacityKind::FreeFree, OpacityKind::Total],
        )
        .unwrap();
        let url = template.build_url(&point(60, 5, "1")).unwrap();
        let kinds: Vec<String> = url
            .query_pairs()
            .filter(|(k, _)| k == "opacity")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(kinds, vec!["ff_opac", "total_opac"]);
    }

    #[test]
    fn test_with_base_url_keeps_parameters() {
        let template = QueryTemplate::nist()
            .unwrap()
            .with_base_url("http://127.0.0.1:9000/osearch.py")
            .unwrap();
        let url = template.build_url(&point(57, 4, "1")).unwrap();
        assert!(url.as_str().starts_with("http://127.0.0.1:9000/osearch.py?nuc_charge=57"));
        assert_eq!(template.opacities().len(), 5);
    }

    #[test]
    fn test_invalid_grid_point_rejected() {
        let template = QueryTemplate::nist().unwrap();
        assert!(template.build_url(&point(0, 4, "1")).is_err());
        assert!(template.build_url(&point(200, 4, "1")).is_err());
    }

    #[test]
    fn test_bad_base_url() {
        assert!(QueryTemplate::nist().unwrap().with_base_url("not a url").is_err());
        assert!(QueryTemplate::nist().unwrap().with_base_url("mailto:x@y.z").is_err());
    }

    #[test]
    fn test_opacity_kind_round_trip_tags() {
        for kind in OpacityKind::ALL {
            assert_eq!(kind.as_str().parse::<OpacityKind>().unwrap(), kind);
        }
        assert!("opac".parse::<OpacityKind>().is_err());
    }
}
