/// Per-(run, lumi) beamspot tables and their process-wide cache.
pub mod beamspot;
/// Pixel module geometry used for the material veto.
pub mod pixel;
/// Helix propagation of muon tracks to the displaced vertex.
pub mod propagation;

pub use beamspot::{BeamspotCache, BeamspotTable};
pub use pixel::{PixelGeometry, PixelHit, PixelModule};
pub use propagation::{phi_at_vertex, track_reference_point};
