//! Video frames

use std::sync::Arc;

/// One RGB24 video frame.
///
/// Pixels sit behind an `Arc` so that worker submission and clip buffering
/// share a single allocation; cloning a frame is cheap.
#[derive(Debug, Clone)]
pub struct Frame {
    seq: u64,
    width: u32,
    height: u32,
    /// Row-major RGB24, always `width * height * 3` bytes
    pixels: Arc<Vec<u8>>,
}

impl Frame {
    /// Wrap a pixel buffer, checking its length against the dimensions
    pub fn new(seq: u64, width: u32, height: u32, pixels: Vec<u8>) -> crate::Result<Self> {
        let expected = Self::byte_len(width, height);
        if pixels.len() != expected {
            return Err(crate::Error::InvalidInput(format!(
                "frame {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            seq,
            width,
            height,
            pixels: Arc::new(pixels),
        })
    }

    /// Black frame of the given size
    pub fn blank(seq: u64, width: u32, height: u32) -> Self {
        Self {
            seq,
            width,
            height,
            pixels: Arc::new(vec![0; Self::byte_len(width, height)]),
        }
    }

    /// Solid-colour frame, handy for synthetic sources
    pub fn filled(seq: u64, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(Self::byte_len(width, height))
            .collect();
        Self {
            seq,
            width,
            height,
            pixels: Arc::new(pixels),
        }
    }

    /// Frame with a pixel buffer that does not match its dimensions
    #[cfg(test)]
    pub(crate) fn malformed(seq: u64, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            seq,
            width,
            height,
            pixels: Arc::new(pixels),
        }
    }

    /// Monotonic capture sequence number
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// True when the buffer length matches the dimensions
    pub fn is_well_formed(&self) -> bool {
        self.pixels.len() == Self::byte_len(self.width, self.height)
    }

    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        assert!(Frame::new(0, 2, 2, vec![0; 12]).is_ok());
        assert!(Frame::new(0, 2, 2, vec![0; 11]).is_err());
    }

    #[test]
    fn test_blank() {
        let f = Frame::blank(7, 4, 3);
        assert_eq!(f.seq(), 7);
        assert!(f.is_well_formed());
        assert_eq!(f.pixels().len(), 36);
        assert!(f.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_filled() {
        let f = Frame::filled(0, 2, 1, [1, 2, 3]);
        assert_eq!(f.pixels(), &[1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_malformed_detected() {
        assert!(!Frame::malformed(0, 2, 2, vec![0; 15]).is_well_formed());
    }

    #[test]
    fn test_clone_shares_pixels() {
        let f = Frame::blank(0, 8, 8);
        let g = f.clone();
        assert!(Arc::ptr_eq(&f.pixels, &g.pixels));
    }
}
