//! Name-addressable topographic quantities and band stacks

use crate::core::topography::Topography;
use crate::types::{Grid, GridStack, TopoError, TopoResult};
use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Every per-pixel quantity a [`Topography`] can produce.
///
/// Irradiation proxies are evaluated at zero declination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    SlopeX,
    SlopeY,
    Slope,
    CurvatureX,
    CurvatureY,
    Curvature,
    PlanCurvature,
    TangCurvature,
    ProfCurvature,
    GradDir,
    Aspect,
    Northness,
    Eastness,
    SlopeAngle,
    SlopeAngleX,
    SlopeAngleY,
    Verticality,
    VerticalityX,
    VerticalityY,
    Latitude,
    SunExposure,
    RadAngle,
}

impl Quantity {
    pub const ALL: [Quantity; 22] = [
        Quantity::SlopeX,
        Quantity::SlopeY,
        Quantity::Slope,
        Quantity::CurvatureX,
        Quantity::CurvatureY,
        Quantity::Curvature,
        Quantity::PlanCurvature,
        Quantity::TangCurvature,
        Quantity::ProfCurvature,
        Quantity::GradDir,
        Quantity::Aspect,
        Quantity::Northness,
        Quantity::Eastness,
        Quantity::SlopeAngle,
        Quantity::SlopeAngleX,
        Quantity::SlopeAngleY,
        Quantity::Verticality,
        Quantity::VerticalityX,
        Quantity::VerticalityY,
        Quantity::Latitude,
        Quantity::SunExposure,
        Quantity::RadAngle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Quantity::SlopeX => "slope_x",
            Quantity::SlopeY => "slope_y",
            Quantity::Slope => "slope",
            Quantity::CurvatureX => "curvature_x",
            Quantity::CurvatureY => "curvature_y",
            Quantity::Curvature => "curvature",
            Quantity::PlanCurvature => "plan_curvature",
            Quantity::TangCurvature => "tang_curvature",
            Quantity::ProfCurvature => "prof_curvature",
            Quantity::GradDir => "grad_dir",
            Quantity::Aspect => "aspect",
            Quantity::Northness => "northness",
            Quantity::Eastness => "eastness",
            Quantity::SlopeAngle => "slope_angle",
            Quantity::SlopeAngleX => "slope_angle_x",
            Quantity::SlopeAngleY => "slope_angle_y",
            Quantity::Verticality => "verticality",
            Quantity::VerticalityX => "verticality_x",
            Quantity::VerticalityY => "verticality_y",
            Quantity::Latitude => "latitude",
            Quantity::SunExposure => "sun_exposure",
            Quantity::RadAngle => "rad_angle",
        }
    }

    /// Whether computing this quantity needs a transform and CRS
    pub fn needs_georeference(&self) -> bool {
        matches!(
            self,
            Quantity::Latitude | Quantity::SunExposure | Quantity::RadAngle
        )
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Quantity {
    type Err = TopoError;

    fn from_str(s: &str) -> TopoResult<Self> {
        Quantity::ALL
            .iter()
            .copied()
            .find(|q| q.name() == s)
            .ok_or_else(|| TopoError::UnknownQuantity(s.to_string()))
    }
}

impl Topography {
    /// Evaluate a quantity by its enum tag
    pub fn compute(&self, quantity: Quantity) -> TopoResult<Arc<Grid>> {
        match quantity {
            Quantity::SlopeX => self.slope_x(),
            Quantity::SlopeY => self.slope_y(),
            Quantity::Slope => self.slope(),
            Quantity::CurvatureX => self.curvature_x(),
            Quantity::CurvatureY => self.curvature_y(),
            Quantity::Curvature => self.curvature(),
            Quantity::PlanCurvature => self.plan_curvature(),
            Quantity::TangCurvature => self.tang_curvature(),
            Quantity::ProfCurvature => self.prof_curvature(),
            Quantity::GradDir => self.grad_dir(),
            Quantity::Aspect => self.aspect(),
            Quantity::Northness => self.northness(),
            Quantity::Eastness => self.eastness(),
            Quantity::SlopeAngle => self.slope_angle(),
            Quantity::SlopeAngleX => self.slope_angle_x(),
            Quantity::SlopeAngleY => self.slope_angle_y(),
            Quantity::Verticality => self.verticality(),
            Quantity::VerticalityX => self.verticality_x(),
            Quantity::VerticalityY => self.verticality_y(),
            Quantity::Latitude => self.latitude(),
            Quantity::SunExposure => self.sun_exposure(0.0),
            Quantity::RadAngle => self.rad_angle(0.0),
        }
    }

    /// Evaluate several quantities into one `(band, rows, cols)` stack, in
    /// the order given.
    pub fn feature_stack(&self, quantities: &[Quantity]) -> TopoResult<GridStack> {
        let (rows, cols) = self.dim();
        let mut stack = Array3::<f64>::zeros((quantities.len(), rows, cols));
        for (band, &quantity) in quantities.iter().enumerate() {
            log::debug!("Stacking band {}: {}", band, quantity);
            let grid = self.compute(quantity)?;
            stack.index_axis_mut(Axis(0), band).assign(&*grid);
        }
        Ok(stack)
    }

    /// [`Topography::feature_stack`] for quantity names such as `"slope"`.
    pub fn feature_stack_named(&self, names: &[&str]) -> TopoResult<GridStack> {
        let quantities = names
            .iter()
            .map(|name| name.parse())
            .collect::<TopoResult<Vec<Quantity>>>()?;
        self.feature_stack(&quantities)
    }
}
