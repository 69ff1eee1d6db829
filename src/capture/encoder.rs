//! Clip Encoding
//!
//! Encoders turn a buffered frame list into a video file. The chain tries
//! each encoder in order and stops at the first success:
//! - [`FfmpegEncoder`]: VP8/WebM through an `ffmpeg` subprocess
//! - [`Y4mEncoder`]: uncompressed YUV4MPEG2, written in-process
//!
//! Thumbnails are binary PPM so no image codec is needed.

use super::frame::Frame;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Writes a frame sequence to a video file
pub trait ClipEncoder: Send + Sync {
    /// Short codec name recorded in the clip record
    fn name(&self) -> &str;

    /// File extension without the dot
    fn extension(&self) -> &str;

    /// Encode `frames` at `fps` into `path`
    fn encode(&self, frames: &[Frame], fps: f64, path: &Path) -> crate::Result<()>;
}

/// Check that all frames are well formed and share the first frame's dimensions
pub(crate) fn uniform_dimensions(frames: &[Frame]) -> crate::Result<(u32, u32)> {
    let first = frames
        .first()
        .ok_or_else(|| crate::Error::Encode("no frames to encode".to_string()))?;
    if let Some(bad) = frames.iter().find(|f| !f.is_well_formed()) {
        return Err(crate::Error::Encode(format!(
            "frame {} has {} bytes for {}x{}",
            bad.seq(),
            bad.pixels().len(),
            bad.width(),
            bad.height()
        )));
    }
    if let Some(odd) = frames
        .iter()
        .find(|f| f.width() != first.width() || f.height() != first.height())
    {
        return Err(crate::Error::Encode(format!(
            "frame {} is {}x{}, expected {}x{}",
            odd.seq(),
            odd.width(),
            odd.height(),
            first.width(),
            first.height()
        )));
    }
    Ok((first.width(), first.height()))
}

/// VP8/WebM via an external `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: PathBuf,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }
}

impl FfmpegEncoder {
    /// Use a specific ffmpeg binary
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl ClipEncoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "vp8"
    }

    fn extension(&self) -> &str {
        "webm"
    }

    fn encode(&self, frames: &[Frame], fps: f64, path: &Path) -> crate::Result<()> {
        let (width, height) = uniform_dimensions(frames)?;

        let mut child = Command::new(&self.binary)
            .args(["-y", "-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .args(["-s", &format!("{}x{}", width, height)])
            .args(["-r", &format!("{:.3}", fps)])
            .args(["-i", "-", "-an", "-c:v", "libvpx", "-b:v", "1M"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| crate::Error::Encode(format!("failed to spawn {}: {}", self.binary.display(), e)))?;

        {
            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| crate::Error::Encode("ffmpeg stdin unavailable".to_string()))?;
            let mut stdin = BufWriter::new(stdin);
            for frame in frames {
                if let Err(e) = stdin.write_all(frame.pixels()) {
                    // ffmpeg exited early; its status below carries the reason
                    debug!(error = %e, "ffmpeg closed its input");
                    break;
                }
            }
            let _ = stdin.flush();
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(crate::Error::Encode(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Uncompressed YUV4MPEG2 (4:4:4) writer
#[derive(Debug, Clone, Copy, Default)]
pub struct Y4mEncoder;

impl ClipEncoder for Y4mEncoder {
    fn name(&self) -> &str {
        "y4m"
    }

    fn extension(&self) -> &str {
        "y4m"
    }

    fn encode(&self, frames: &[Frame], fps: f64, path: &Path) -> crate::Result<()> {
        let (width, height) = uniform_dimensions(frames)?;
        let (num, den) = fps_ratio(fps);

        let mut out = BufWriter::new(std::fs::File::create(path)?);
        writeln!(out, "YUV4MPEG2 W{} H{} F{}:{} Ip A1:1 C444", width, height, num, den)?;

        let plane = width as usize * height as usize;
        let mut y = vec![0u8; plane];
        let mut u = vec![0u8; plane];
        let mut v = vec![0u8; plane];

        for frame in frames {
            for (i, px) in frame.pixels().chunks_exact(3).enumerate() {
                let (yy, uu, vv) = rgb_to_yuv(px[0], px[1], px[2]);
                y[i] = yy;
                u[i] = uu;
                v[i] = vv;
            }
            out.write_all(b"FRAME\n")?;
            out.write_all(&y)?;
            out.write_all(&u)?;
            out.write_all(&v)?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Frame rate as a rational with millisecond precision
fn fps_ratio(fps: f64) -> (u64, u64) {
    let num = (fps.max(0.001) * 1000.0).round() as u64;
    let den = 1000;
    let g = gcd(num, den);
    (num / g, den / g)
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

/// Full-range BT.601 conversion
#[inline]
fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let u = -0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0;
    let v = 0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0;
    (
        y.round().clamp(0.0, 255.0) as u8,
        u.round().clamp(0.0, 255.0) as u8,
        v.round().clamp(0.0, 255.0) as u8,
    )
}

/// Outcome of a successful chain run
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedVideo {
    pub file_name: String,
    pub codec: String,
}

/// Ordered list of encoders; first success wins
pub struct EncoderChain {
    encoders: Vec<Box<dyn ClipEncoder>>,
}

impl Default for EncoderChain {
    /// ffmpeg first, Y4M as the fallback
    fn default() -> Self {
        Self::new(vec![Box::new(FfmpegEncoder::default()), Box::new(Y4mEncoder)])
    }
}

impl EncoderChain {
    pub fn new(encoders: Vec<Box<dyn ClipEncoder>>) -> Self {
        Self { encoders }
    }

    /// Try each encoder, writing `<dir>/<stem>.<ext>`. Partial files from
    /// failed attempts are removed.
    pub fn encode(&self, frames: &[Frame], fps: f64, dir: &Path, stem: &str) -> crate::Result<EncodedVideo> {
        for encoder in &self.encoders {
            let file_name = format!("{}.{}", stem, encoder.extension());
            let path = dir.join(&file_name);

            match encoder.encode(frames, fps, &path) {
                Ok(()) => {
                    return Ok(EncodedVideo {
                        file_name,
                        codec: encoder.name().to_string(),
                    })
                }
                Err(e) => {
                    warn!(encoder = encoder.name(), error = %e, "Encoder failed, trying next");
                    if path.exists() {
                        let _ = std::fs::remove_file(&path);
                    }
                }
            }
        }
        Err(crate::Error::Encode("all encoders failed".to_string()))
    }

    pub fn len(&self) -> usize {
        self.encoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoders.is_empty()
    }
}

/// Write a binary PPM (P6) image of `frame`
pub fn write_ppm(frame: &Frame, path: &Path) -> crate::Result<()> {
    if !frame.is_well_formed() {
        return Err(crate::Error::Encode(format!("frame {} is malformed", frame.seq())));
    }
    let mut out = BufWriter::new(std::fs::File::create(path)?);
    write!(out, "P6\n{} {}\n255\n", frame.width(), frame.height())?;
    out.write_all(frame.pixels())?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct AlwaysFails;

    impl ClipEncoder for AlwaysFails {
        fn name(&self) -> &str {
            "broken"
        }

        fn extension(&self) -> &str {
            "bin"
        }

        fn encode(&self, _frames: &[Frame], _fps: f64, path: &Path) -> crate::Result<()> {
            std::fs::write(path, b"partial")?;
            Err(crate::Error::Encode("nope".to_string()))
        }
    }

    fn frames(n: u64) -> Vec<Frame> {
        (0..n).map(|i| Frame::filled(i, 4, 2, [255, 0, 0])).collect()
    }

    #[test]
    fn test_y4m_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.y4m");
        Y4mEncoder.encode(&frames(3), 30.0, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let header = b"YUV4MPEG2 W4 H2 F30:1 Ip A1:1 C444\n";
        assert!(bytes.starts_with(header));
        // header + 3 * ("FRAME\n" + 3 planes of 8 bytes)
        assert_eq!(bytes.len(), header.len() + 3 * (6 + 24));
    }

    #[test]
    fn test_y4m_rejects_mixed_sizes() {
        let dir = TempDir::new().unwrap();
        let mut fs = frames(2);
        fs.push(Frame::blank(9, 8, 8));
        assert!(Y4mEncoder.encode(&fs, 30.0, &dir.path().join("x.y4m")).is_err());
    }

    #[test]
    fn test_y4m_rejects_short_buffer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.y4m");
        let fs = vec![Frame::malformed(0, 2, 2, vec![0; 15])];
        assert!(Y4mEncoder.encode(&fs, 30.0, &path).is_err());
        assert!(!path.exists());
        assert!(write_ppm(&fs[0], &dir.path().join("t.ppm")).is_err());
    }

    #[test]
    fn test_encode_empty_fails() {
        let dir = TempDir::new().unwrap();
        assert!(Y4mEncoder.encode(&[], 30.0, &dir.path().join("x.y4m")).is_err());
    }

    #[test]
    fn test_chain_falls_back_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let chain = EncoderChain::new(vec![Box::new(AlwaysFails), Box::new(Y4mEncoder)]);
        let video = chain.encode(&frames(2), 2.0, dir.path(), "event").unwrap();

        assert_eq!(video.file_name, "event.y4m");
        assert_eq!(video.codec, "y4m");
        assert!(!dir.path().join("event.bin").exists());
        assert!(dir.path().join("event.y4m").exists());
    }

    #[test]
    fn test_chain_all_fail() {
        let dir = TempDir::new().unwrap();
        let chain = EncoderChain::new(vec![Box::new(AlwaysFails)]);
        assert!(chain.encode(&frames(1), 1.0, dir.path(), "event").is_err());
    }

    #[test]
    fn test_missing_ffmpeg_binary_errors() {
        let dir = TempDir::new().unwrap();
        let enc = FfmpegEncoder::with_binary("/nonexistent/ffmpeg-binary");
        assert!(enc.encode(&frames(1), 1.0, &dir.path().join("x.webm")).is_err());
    }

    #[test]
    fn test_ppm_thumbnail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("thumb.ppm");
        write_ppm(&Frame::filled(0, 2, 2, [1, 2, 3]), &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"P6\n2 2\n255\n"));
        assert_eq!(bytes.len(), b"P6\n2 2\n255\n".len() + 12);
    }

    #[test]
    fn test_fps_ratio() {
        assert_eq!(fps_ratio(30.0), (30, 1));
        assert_eq!(fps_ratio(29.97), (2997, 100));
        assert_eq!(fps_ratio(1.5), (3, 2));
    }

    #[test]
    fn test_rgb_to_yuv_extremes() {
        assert_eq!(rgb_to_yuv(0, 0, 0), (0, 128, 128));
        assert_eq!(rgb_to_yuv(255, 255, 255), (255, 128, 128));
    }
}
