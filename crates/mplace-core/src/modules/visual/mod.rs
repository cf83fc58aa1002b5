mod alpha;
mod session;

pub use alpha::{AlphaMapper, AlphaOrdering, AlphaRange, AlphaTable};
pub use session::{MarkerShape, VisualizationSession, WellMarker};
