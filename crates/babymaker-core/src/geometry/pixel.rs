use std::{f64::consts::PI, fs::File, io::BufReader, path::Path};

use nalgebra::{Matrix3, Vector3};
use serde::Deserialize;
use serde_pickle::DeOptions;

use crate::{utils::vectors::Vec3, BabyError, BabyResult};

/// Half-thickness of the slab around a module plane in which a point counts as on the module.
pub const DEFAULT_SEARCH_HALF_THICKNESS: f64 = 0.5;

/// Radial gaps with no pixel material, in cm: inside the beam pipe and between layers 1 and 2.
const EMPTY_RADII: [(f64, f64); 2] = [(0.0, 2.4), (3.7, 5.7)];

/// Layer number of a module from the position of its centre: 1-4 for the barrel, 5-7 for the
/// forward disks.
pub fn layer_from_position(rho: f64, z: f64) -> i32 {
    let z = z.abs();
    if z > 45.0 {
        7
    } else if z > 35.0 {
        6
    } else if z > 25.0 {
        5
    } else if rho < 4.5 {
        1
    } else if rho < 9.0 {
        2
    } else if rho < 14.0 {
        3
    } else {
        4
    }
}

/// A flat rectangular sensor.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelModule {
    /// Centre of the module in global coordinates.
    pub translation: Vector3<f64>,
    /// Columns are the local axes in global coordinates; the third is the plane normal.
    pub rotation: Matrix3<f64>,
    /// Half-length, half-width and half-thickness in the local frame.
    pub half_extents: Vector3<f64>,
    pub layer: i32,
}

impl PixelModule {
    pub fn new(
        translation: Vector3<f64>,
        rotation: Matrix3<f64>,
        half_extents: Vector3<f64>,
    ) -> Self {
        let layer = layer_from_position(translation.x.hypot(translation.y), translation.z);
        Self {
            translation,
            rotation,
            half_extents,
            layer,
        }
    }

    pub fn to_local(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.transpose() * (point - self.translation)
    }

    /// Distance from `point` to the plane of the module.
    pub fn plane_distance(&self, point: &Vector3<f64>) -> f64 {
        self.to_local(point).z.abs()
    }

    /// Whether `point` lies over the module surface and within `half_thickness` of its plane.
    pub fn contains(&self, point: &Vector3<f64>, half_thickness: f64) -> bool {
        let local = self.to_local(point);
        local.x.abs() <= self.half_extents.x
            && local.y.abs() <= self.half_extents.y
            && local.z.abs() <= self.half_extents.z + half_thickness
    }
}

#[derive(Deserialize)]
struct ModuleRow {
    translation: [f64; 3],
    matrix: [f64; 9],
    shape: [f64; 3],
}

/// The module a point was located in.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PixelHit {
    pub module: usize,
    pub plane_distance: f64,
    pub layer: i32,
}

/// A collection of pixel modules.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelGeometry {
    modules: Vec<PixelModule>,
    half_thickness: f64,
}

impl PixelGeometry {
    pub fn new(modules: Vec<PixelModule>) -> Self {
        Self {
            modules,
            half_thickness: DEFAULT_SEARCH_HALF_THICKNESS,
        }
    }

    /// Override the search half-thickness around module planes.
    pub fn half_thickness(mut self, half_thickness: f64) -> Self {
        self.half_thickness = half_thickness;
        self
    }

    pub fn modules(&self) -> &[PixelModule] {
        &self.modules
    }

    /// The four Phase-1 barrel layers with ideal, untilted ladders.
    pub fn nominal_barrel() -> Self {
        const LAYERS: [(f64, usize); 4] = [(2.9, 12), (6.8, 28), (10.9, 44), (16.0, 64)];
        const Z_CENTRES: [f64; 4] = [3.35, 10.05, 16.75, 23.45];
        let half_extents = Vector3::new(0.81, 3.24, 0.0145);
        let mut modules = Vec::new();
        for (radius, n_ladders) in LAYERS {
            for ladder in 0..n_ladders {
                let phi = 2.0 * PI * ladder as f64 / n_ladders as f64;
                let (sin, cos) = phi.sin_cos();
                let rotation = Matrix3::from_columns(&[
                    Vector3::new(-sin, cos, 0.0),
                    Vector3::z(),
                    Vector3::new(cos, sin, 0.0),
                ]);
                for z in Z_CENTRES.iter().flat_map(|z| [-z, *z]) {
                    modules.push(PixelModule::new(
                        Vector3::new(radius * cos, radius * sin, z),
                        rotation,
                        half_extents,
                    ));
                }
            }
        }
        Self::new(modules)
    }

    /// Load modules from a pickled list of dictionaries with `translation` (3 values), `matrix`
    /// (9 values, row-major) and `shape` (3 half-extents) keys.
    pub fn from_pickle<P: AsRef<Path>>(path: P) -> BabyResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let rows: Vec<ModuleRow> = serde_pickle::from_reader(reader, DeOptions::new())?;
        if rows.is_empty() {
            return Err(BabyError::Custom(
                "Pixel geometry table contains no modules".to_string(),
            ));
        }
        Ok(Self::new(
            rows.into_iter()
                .map(|row| {
                    PixelModule::new(
                        Vector3::from(row.translation),
                        Matrix3::from_row_slice(&row.matrix),
                        Vector3::from(row.shape),
                    )
                })
                .collect(),
        ))
    }

    /// Find the module whose plane is closest to `point` among those containing it.
    ///
    /// Points in the radial gaps without material are never located.
    pub fn locate(&self, point: &Vec3) -> Option<PixelHit> {
        let rho = point.rho();
        if EMPTY_RADII
            .iter()
            .any(|&(low, high)| rho > low && rho < high)
        {
            return None;
        }
        let point = Vector3::new(point.x, point.y, point.z);
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, module)| module.contains(&point, self.half_thickness))
            .map(|(imodule, module)| PixelHit {
                module: imodule,
                plane_distance: module.plane_distance(&point),
                layer: module.layer,
            })
            .min_by(|a, b| a.plane_distance.total_cmp(&b.plane_distance))
    }
}

impl Default for PixelGeometry {
    fn default() -> Self {
        Self::nominal_barrel()
    }
}
