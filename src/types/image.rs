//! Depth frames and camera intrinsics
//!
//! Frames arrive as row-major depth buffers in meters with a capture
//! timestamp. Sensors are commonly run downsampled; the intrinsics and
//! the frame must be scaled by the same integer factor or every
//! projection in the likelihood model is silently wrong, so both types
//! carry a `downsample` operation and the filter checks their dimensions
//! against each other on every frame.

use nalgebra::{Matrix3, RealField};
use num_traits::Float;

use crate::{Error, Result};

// ============================================================================
// Camera Intrinsics
// ============================================================================

/// Pinhole camera intrinsics together with the sensor resolution they
/// correspond to.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraIntrinsics<T: RealField> {
    /// Focal length, x (pixels)
    pub fx: T,
    /// Focal length, y (pixels)
    pub fy: T,
    /// Principal point, x (pixels)
    pub cx: T,
    /// Principal point, y (pixels)
    pub cy: T,
    /// Image width (pixels)
    pub width: usize,
    /// Image height (pixels)
    pub height: usize,
}

impl<T: RealField + Float + Copy> CameraIntrinsics<T> {
    pub fn new(fx: T, fy: T, cx: T, cy: T, width: usize, height: usize) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    /// The 3x3 camera matrix.
    pub fn matrix(&self) -> Matrix3<T> {
        let zero = T::zero();
        let one = T::one();
        nalgebra::matrix![
            self.fx, zero, self.cx;
            zero, self.fy, self.cy;
            zero, zero, one
        ]
    }

    /// Scales the intrinsics for an image downsampled by an integer factor.
    ///
    /// Focal lengths, principal point, and resolution all divide by the
    /// factor, keeping projections consistent with
    /// [`DepthImage::downsample`].
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if `factor` is zero.
    pub fn downsample(&self, factor: usize) -> Result<Self> {
        if factor == 0 {
            return Err(Error::InvalidConfig {
                parameter: "downsampling_factor",
                reason: "must be at least 1".into(),
            });
        }
        let f = T::from_f64(factor as f64).unwrap();
        Ok(Self {
            fx: self.fx / f,
            fy: self.fy / f,
            cx: self.cx / f,
            cy: self.cy / f,
            width: self.width / factor,
            height: self.height / factor,
        })
    }
}

// ============================================================================
// Depth Image
// ============================================================================

/// A row-major depth frame in meters with a capture timestamp in seconds.
///
/// Pixels without a valid depth reading are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage<T: RealField> {
    width: usize,
    height: usize,
    timestamp: T,
    depths: Vec<T>,
}

impl<T: RealField + Float + Copy> DepthImage<T> {
    /// Creates a depth frame from a row-major buffer.
    ///
    /// # Panics
    /// Panics if `depths.len() != width * height`.
    pub fn new(width: usize, height: usize, timestamp: T, depths: Vec<T>) -> Self {
        assert_eq!(
            depths.len(),
            width * height,
            "depth buffer length must equal width * height"
        );
        Self {
            width,
            height,
            timestamp,
            depths,
        }
    }

    /// A frame with every pixel invalid (NaN), mostly useful in tests.
    pub fn empty(width: usize, height: usize, timestamp: T) -> Self {
        Self::new(width, height, timestamp, vec![T::nan(); width * height])
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Capture timestamp in seconds.
    #[inline]
    pub fn timestamp(&self) -> T {
        self.timestamp
    }

    /// Depth at pixel (x, y).
    ///
    /// # Panics
    /// Panics if the pixel is out of bounds.
    #[inline]
    pub fn depth(&self, x: usize, y: usize) -> T {
        assert!(x < self.width && y < self.height, "pixel out of bounds");
        self.depths[y * self.width + x]
    }

    /// The raw row-major depth buffer.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.depths
    }

    /// Whether the frame matches a sensor geometry.
    #[inline]
    pub fn dimensions_match(&self, intrinsics: &CameraIntrinsics<T>) -> bool {
        self.width == intrinsics.width && self.height == intrinsics.height
    }

    /// Keeps every `factor`-th pixel in both directions, preserving the
    /// timestamp. Pair with [`CameraIntrinsics::downsample`].
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] if `factor` is zero.
    pub fn downsample(&self, factor: usize) -> Result<Self> {
        if factor == 0 {
            return Err(Error::InvalidConfig {
                parameter: "downsampling_factor",
                reason: "must be at least 1".into(),
            });
        }
        let width = self.width / factor;
        let height = self.height / factor;
        let mut depths = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                depths.push(self.depths[y * factor * self.width + x * factor]);
            }
        }
        Ok(Self {
            width,
            height,
            timestamp: self.timestamp,
            depths,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intrinsics() -> CameraIntrinsics<f64> {
        CameraIntrinsics::new(500.0, 500.0, 320.0, 240.0, 640, 480)
    }

    #[test]
    fn test_intrinsics_downsample_scales_consistently() {
        let half = intrinsics().downsample(2).unwrap();
        assert!((half.fx - 250.0).abs() < 1e-12);
        assert!((half.cx - 160.0).abs() < 1e-12);
        assert_eq!(half.width, 320);
        assert_eq!(half.height, 240);
    }

    #[test]
    fn test_downsample_factor_zero_rejected() {
        assert!(intrinsics().downsample(0).is_err());
        let image = DepthImage::empty(4, 4, 0.0);
        assert!(image.downsample(0).is_err());
    }

    #[test]
    fn test_image_downsample_picks_stride_pixels() {
        let depths: Vec<f64> = (0..16).map(|i| i as f64).collect();
        let image = DepthImage::new(4, 4, 1.5, depths);
        let small = image.downsample(2).unwrap();

        assert_eq!(small.width(), 2);
        assert_eq!(small.height(), 2);
        assert!((small.timestamp() - 1.5).abs() < 1e-12);
        assert!((small.depth(0, 0) - 0.0).abs() < 1e-12);
        assert!((small.depth(1, 0) - 2.0).abs() < 1e-12);
        assert!((small.depth(0, 1) - 8.0).abs() < 1e-12);
        assert!((small.depth(1, 1) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_dimensions_match() {
        let image = DepthImage::<f64>::empty(640, 480, 0.0);
        assert!(image.dimensions_match(&intrinsics()));
        assert!(!image.downsample(2).unwrap().dimensions_match(&intrinsics()));
    }
}
