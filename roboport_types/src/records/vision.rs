use crate::time::Time;
use serde::{Deserialize, Serialize};

/// Raw or compressed camera frame.
///
/// `format` names the pixel layout ("rgb8", "mono8", "jpeg", ...). For raw
/// formats `pixels.len() == width * height * bpp / 8`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraImage {
    pub tm: Time,
    pub width: u16,
    pub height: u16,
    /// Bits per pixel
    pub bpp: u16,
    pub format: String,
    /// Scale from pixel value to physical unit (depth cameras)
    pub f_div: f64,
    pub pixels: Vec<u8>,
}

impl CameraImage {
    pub fn new(width: u16, height: u16, bpp: u16, format: &str, pixels: Vec<u8>) -> Self {
        Self {
            tm: Time::now(),
            width,
            height,
            bpp,
            format: format.to_string(),
            f_div: 1.0,
            pixels,
        }
    }

    /// Expected byte count of a raw frame of this geometry
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.bpp as usize / 8
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.format.as_str(), "jpeg" | "png")
    }
}
