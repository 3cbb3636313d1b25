use crate::types::{Covariate, EquationVersion};

/// Recommended range for one continuous covariate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub const UNBOUNDED: Bounds = Bounds {
        lower: f64::NEG_INFINITY,
        upper: f64::INFINITY,
    };

    const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

/// The recommended ranges of every continuous covariate for one equation version.
/// With `override_errors` set, every range is widened to (-inf, +inf).
#[derive(Debug, Clone, Copy)]
pub struct BoundarySpec {
    version: EquationVersion,
    override_errors: bool,
}

impl BoundarySpec {
    pub fn new(version: EquationVersion, override_errors: bool) -> Self {
        Self {
            version,
            override_errors,
        }
    }

    /// `None` for covariates that have no range under this version (categoricals, or
    /// PREVENT-only covariates under the Pooled Cohort equations).
    pub fn bounds(&self, covariate: Covariate) -> Option<Bounds> {
        let recommended = recommended_bounds(self.version, covariate)?;
        if self.override_errors {
            Some(Bounds::UNBOUNDED)
        } else {
            Some(recommended)
        }
    }
}

fn recommended_bounds(version: EquationVersion, covariate: Covariate) -> Option<Bounds> {
    match version {
        EquationVersion::Goff2013 | EquationVersion::Yadlowsky2018 => match covariate {
            Covariate::AgeYears => Some(Bounds::new(40.0, 79.0)),
            Covariate::CholTotal => Some(Bounds::new(130.0, 320.0)),
            Covariate::CholHdl => Some(Bounds::new(20.0, 100.0)),
            Covariate::BpSys => Some(Bounds::new(90.0, 200.0)),
            _ => None,
        },
        EquationVersion::Khan2023 => match covariate {
            Covariate::AgeYears => Some(Bounds::new(30.0, 79.0)),
            Covariate::CholTotal => Some(Bounds::new(130.0, 320.0)),
            Covariate::CholHdl => Some(Bounds::new(20.0, 100.0)),
            Covariate::BpSys => Some(Bounds::new(90.0, 180.0)),
            Covariate::Bmi => Some(Bounds::new(18.5, 39.9)),
            Covariate::Egfr => Some(Bounds::new(15.0, 140.0)),
            Covariate::Acr => Some(Bounds::new(0.1, 25000.0)),
            Covariate::Hba1c => Some(Bounds::new(4.5, 15.0)),
            Covariate::Sdi => Some(Bounds::new(1.0, 10.0)),
            _ => None,
        },
    }
}
