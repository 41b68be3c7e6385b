//! Image orientation: integer transforms and direction-code resolution.

pub mod resolve;
pub mod transform;

pub use resolve::{DirectionCode, DirectionResolver};
pub use transform::OrientationTransform;
