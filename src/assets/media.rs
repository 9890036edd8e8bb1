use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use crate::{
    assets::PreparedImage,
    error::{BoothError, BoothResult},
};

#[cfg(feature = "media-ffmpeg")]
use std::path::Path;

#[derive(Clone, Debug)]
pub struct VideoSourceInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub duration_sec: f64,
}

impl VideoSourceInfo {
    pub fn source_fps(&self) -> f64 {
        if self.fps_den == 0 {
            0.0
        } else {
            f64::from(self.fps_num) / f64::from(self.fps_den)
        }
    }
}

/// Map elapsed wall time onto looping source time, so short grain clips
/// and simulated camera files repeat seamlessly.
pub fn loop_source_time_sec(info: &VideoSourceInfo, elapsed_sec: f64) -> f64 {
    if info.duration_sec <= 0.0 {
        return 0.0;
    }
    let t = elapsed_sec.max(0.0) % info.duration_sec;
    t.max(0.0)
}

#[cfg(feature = "media-ffmpeg")]
pub fn probe_video(source_path: &Path) -> BoothResult<VideoSourceInfo> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeFormat {
        duration: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        streams: Vec<ProbeStream>,
        format: Option<ProbeFormat>,
    }

    let out = std::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(source_path)
        .output()
        .map_err(|e| BoothError::asset(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(BoothError::asset(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| BoothError::asset(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| BoothError::asset("no video stream found"))?;
    let width = video_stream
        .width
        .ok_or_else(|| BoothError::asset("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| BoothError::asset("missing video height from ffprobe"))?;

    let (fps_num, fps_den) = parse_ff_ratio(video_stream.r_frame_rate.as_deref().unwrap_or("0/1"))
        .ok_or_else(|| BoothError::asset("invalid video r_frame_rate"))?;
    let duration_sec = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_ref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
        duration_sec,
    })
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn probe_video(_source_path: &std::path::Path) -> BoothResult<VideoSourceInfo> {
    Err(BoothError::asset(
        "video assets require the 'media-ffmpeg' feature",
    ))
}

#[cfg(feature = "media-ffmpeg")]
pub fn decode_video_frame_rgba8(
    source: &VideoSourceInfo,
    source_time_sec: f64,
) -> BoothResult<Vec<u8>> {
    let out = std::process::Command::new("ffmpeg")
        .args(["-v", "error", "-ss", &format!("{source_time_sec:.9}")])
        .arg("-i")
        .arg(&source.source_path)
        .args([
            "-frames:v",
            "1",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "pipe:1",
        ])
        .output()
        .map_err(|e| BoothError::asset(format!("failed to run ffmpeg for video decode: {e}")))?;

    if !out.status.success() {
        return Err(BoothError::asset(format!(
            "ffmpeg video decode failed for '{}': {}",
            source.source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    let expected_len = source.width as usize * source.height as usize * 4;
    if expected_len == 0 {
        return Err(BoothError::asset(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }
    if out.stdout.len() < expected_len {
        return Err(BoothError::asset(format!(
            "decoded video frame has invalid size: got {} bytes, expected {expected_len}",
            out.stdout.len()
        )));
    }

    Ok(out.stdout[..expected_len].to_vec())
}

#[cfg(not(feature = "media-ffmpeg"))]
pub fn decode_video_frame_rgba8(
    _source: &VideoSourceInfo,
    _source_time_sec: f64,
) -> BoothResult<Vec<u8>> {
    Err(BoothError::asset(
        "video assets require the 'media-ffmpeg' feature",
    ))
}

/// Frame-on-demand video source with a small keyed LRU cache. Used for
/// both grain loops and the simulated camera feed.
pub struct VideoFeed {
    pub info: Arc<VideoSourceInfo>,
    frame_cache: HashMap<u64, PreparedImage>,
    lru: VecDeque<u64>,
    capacity: usize,
}

impl VideoFeed {
    pub fn open(path: impl Into<PathBuf>) -> BoothResult<Self> {
        let info = probe_video(&path.into())?;
        Ok(Self::from_info(Arc::new(info)))
    }

    pub fn from_info(info: Arc<VideoSourceInfo>) -> Self {
        let capacity = std::env::var("PHOTOBOOTH_VIDEO_CACHE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(64);
        Self {
            info,
            frame_cache: HashMap::new(),
            lru: VecDeque::new(),
            capacity,
        }
    }

    /// Decode the frame for `elapsed_sec` of wall time, looping over the
    /// source duration.
    pub fn frame_at(&mut self, elapsed_sec: f64) -> BoothResult<PreparedImage> {
        let src_t = loop_source_time_sec(&self.info, elapsed_sec);
        let key = self.key_for_time(src_t);
        if let Some(img) = self.frame_cache.get(&key).cloned() {
            self.touch(key);
            return Ok(img);
        }

        let mut rgba = decode_video_frame_rgba8(&self.info, src_t)?;
        crate::assets::decode::premultiply_rgba8_in_place(&mut rgba);
        let img = PreparedImage {
            width: self.info.width,
            height: self.info.height,
            rgba8_premul: Arc::new(rgba),
        };
        self.insert_frame(key, img.clone());
        Ok(img)
    }

    fn key_for_time(&self, source_time_s: f64) -> u64 {
        ((source_time_s.max(0.0)) * 1000.0).round() as u64
    }

    fn insert_frame(&mut self, key: u64, image: PreparedImage) {
        self.frame_cache.insert(key, image);
        self.touch(key);
        while self.lru.len() > self.capacity {
            if let Some(old) = self.lru.pop_front() {
                self.frame_cache.remove(&old);
            }
        }
    }

    fn touch(&mut self, key: u64) {
        if let Some(pos) = self.lru.iter().position(|x| *x == key) {
            self.lru.remove(pos);
        }
        self.lru.push_back(key);
    }
}

#[cfg(feature = "media-ffmpeg")]
fn parse_ff_ratio(s: &str) -> Option<(u32, u32)> {
    let mut parts = s.split('/');
    let a = parts.next()?.parse::<u32>().ok()?;
    let b = parts.next()?.parse::<u32>().ok()?;
    if b == 0 {
        return None;
    }
    Some((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(duration_sec: f64) -> VideoSourceInfo {
        VideoSourceInfo {
            source_path: PathBuf::from("grain.mp4"),
            width: 320,
            height: 240,
            fps_num: 30,
            fps_den: 1,
            duration_sec,
        }
    }

    #[test]
    fn loop_time_wraps_over_duration() {
        let i = info(2.5);
        assert!((loop_source_time_sec(&i, 0.0) - 0.0).abs() < 1e-9);
        assert!((loop_source_time_sec(&i, 1.0) - 1.0).abs() < 1e-9);
        assert!((loop_source_time_sec(&i, 2.5) - 0.0).abs() < 1e-9);
        assert!((loop_source_time_sec(&i, 6.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn loop_time_handles_unknown_duration() {
        let i = info(0.0);
        assert_eq!(loop_source_time_sec(&i, 42.0), 0.0);
    }

    #[test]
    fn source_fps_guards_zero_den() {
        let mut i = info(1.0);
        i.fps_den = 0;
        assert_eq!(i.source_fps(), 0.0);
    }
}
