//! Coordinate transformation pipeline.
//!
//! Rendering and snapping move coordinates through two stages, always in the
//! same order: an optional CRS reprojection first, then the affine map-units
//! to device-pixels transform. [`CoordinateTransformer`] composes the two.

use nalgebra::Matrix3;
use thiserror::Error;

/// A coordinate could not be reprojected.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("coordinate ({x}, {y}) is outside the valid domain of the transform")]
pub struct TransformError {
    /// X ordinate of the failing coordinate.
    pub x: f64,
    /// Y ordinate of the failing coordinate.
    pub y: f64,
}

/// Reprojection between coordinate reference systems.
///
/// Implementations transform in place and fail for coordinates outside the
/// valid domain of the projection.
pub trait CrsTransform {
    /// Transforms a single coordinate in place. The Z ordinate is carried
    /// through for 3d-aware projections and ignored by 2d ones.
    fn transform_in_place(&self, x: &mut f64, y: &mut f64, z: &mut f64)
        -> Result<(), TransformError>;

    /// Transforms parallel coordinate arrays in place.
    ///
    /// Fails on the first coordinate outside the transform domain; values
    /// before the failing index are left transformed.
    fn transform_arrays(
        &self,
        xs: &mut [f64],
        ys: &mut [f64],
        zs: &mut [f64],
    ) -> Result<(), TransformError> {
        for i in 0..xs.len() {
            self.transform_in_place(&mut xs[i], &mut ys[i], &mut zs[i])?;
        }
        Ok(())
    }
}

/// The identity reprojection. Used when the layer CRS matches the map CRS.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTransform;

impl CrsTransform for IdentityTransform {
    fn transform_in_place(
        &self,
        _x: &mut f64,
        _y: &mut f64,
        _z: &mut f64,
    ) -> Result<(), TransformError> {
        Ok(())
    }
}

/// Affine transform from map units to device pixels.
///
/// Device Y grows downwards, so the map's top edge lands on pixel row zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapToPixel {
    matrix: Matrix3<f64>,
}

impl MapToPixel {
    /// Creates the transform from the map scale and the visible extent
    /// corner. `map_units_per_pixel` must be positive.
    pub fn new(map_units_per_pixel: f64, x_min: f64, y_max: f64) -> Self {
        let scale = 1.0 / map_units_per_pixel;
        #[rustfmt::skip]
        let matrix = Matrix3::new(
            scale, 0.0, -x_min * scale,
            0.0, -scale, y_max * scale,
            0.0, 0.0, 1.0,
        );
        Self { matrix }
    }

    /// Transforms a map coordinate to device pixels in place.
    pub fn apply(&self, x: &mut f64, y: &mut f64) {
        let device = self.matrix * nalgebra::Vector3::new(*x, *y, 1.0);
        *x = device.x;
        *y = device.y;
    }
}

/// The full per-layer transform: CRS reprojection (if any) followed by the
/// map-to-pixel affine transform.
pub struct CoordinateTransformer {
    crs: Option<Box<dyn CrsTransform>>,
    map_to_pixel: MapToPixel,
}

impl CoordinateTransformer {
    /// Creates a transformer without a CRS stage.
    pub fn new(map_to_pixel: MapToPixel) -> Self {
        Self {
            crs: None,
            map_to_pixel,
        }
    }

    /// Creates a transformer that reprojects before rasterizing.
    pub fn with_crs(map_to_pixel: MapToPixel, crs: Box<dyn CrsTransform>) -> Self {
        Self {
            crs: Some(crs),
            map_to_pixel,
        }
    }

    /// Whether a CRS stage is configured.
    pub fn has_crs(&self) -> bool {
        self.crs.is_some()
    }

    /// Transforms a single coordinate to device pixels.
    pub fn transform(&self, x: &mut f64, y: &mut f64) -> Result<(), TransformError> {
        let mut z = 0.0;
        if let Some(crs) = &self.crs {
            crs.transform_in_place(x, y, &mut z)?;
        }
        self.map_to_pixel.apply(x, y);
        Ok(())
    }

    /// Transforms parallel coordinate arrays to device pixels.
    ///
    /// The CRS stage runs over the whole batch before the affine stage, so a
    /// reprojection failure leaves no coordinate rasterized.
    pub fn transform_arrays(
        &self,
        xs: &mut [f64],
        ys: &mut [f64],
        zs: &mut [f64],
    ) -> Result<(), TransformError> {
        if let Some(crs) = &self.crs {
            crs.transform_arrays(xs, ys, zs)?;
        }
        for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
            self.map_to_pixel.apply(x, y);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    struct ShiftTransform {
        dx: f64,
        valid_x: std::ops::Range<f64>,
    }

    impl CrsTransform for ShiftTransform {
        fn transform_in_place(
            &self,
            x: &mut f64,
            y: &mut f64,
            _z: &mut f64,
        ) -> Result<(), TransformError> {
            if !self.valid_x.contains(x) {
                return Err(TransformError { x: *x, y: *y });
            }
            *x += self.dx;
            Ok(())
        }
    }

    #[test]
    fn map_to_pixel_flips_y() {
        let transform = MapToPixel::new(2.0, 100.0, 200.0);
        let (mut x, mut y) = (110.0, 180.0);
        transform.apply(&mut x, &mut y);
        assert_abs_diff_eq!(x, 5.0);
        assert_abs_diff_eq!(y, 10.0);
    }

    #[test]
    fn crs_runs_before_map_to_pixel() {
        let transformer = CoordinateTransformer::with_crs(
            MapToPixel::new(1.0, 0.0, 10.0),
            Box::new(ShiftTransform {
                dx: 5.0,
                valid_x: -1000.0..1000.0,
            }),
        );
        let (mut x, mut y) = (1.0, 10.0);
        transformer.transform(&mut x, &mut y).expect("in domain");
        assert_abs_diff_eq!(x, 6.0);
        assert_abs_diff_eq!(y, 0.0);
    }

    #[test]
    fn out_of_domain_coordinate_fails() {
        let transformer = CoordinateTransformer::with_crs(
            MapToPixel::new(1.0, 0.0, 10.0),
            Box::new(ShiftTransform {
                dx: 5.0,
                valid_x: 0.0..10.0,
            }),
        );
        let mut xs = [1.0, 50.0];
        let mut ys = [1.0, 1.0];
        let mut zs = [0.0, 0.0];
        let err = transformer
            .transform_arrays(&mut xs, &mut ys, &mut zs)
            .expect_err("second point out of domain");
        assert_abs_diff_eq!(err.x, 50.0);
    }
}
