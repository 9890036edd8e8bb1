use std::path::PathBuf;

use crate::{
    assets::PreparedImage,
    core::Point,
    error::{BoothError, BoothResult},
};

/// Fixed user-visible status when no model source can be loaded.
pub const MODEL_UNAVAILABLE_MSG: &str =
    "face detection model unavailable; filters and dialogue are disabled";

/// One detected face: ordered landmark point groups as reported by the
/// external detector. Ephemeral; consumed for placement, then dropped.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectedFace {
    pub left_eye: Vec<Point>,
    pub right_eye: Vec<Point>,
    pub nose: Vec<Point>,
}

impl DetectedFace {
    /// Landmark contract: at least 4 points per eye and 1 nose point.
    pub fn has_required_landmarks(&self) -> bool {
        self.left_eye.len() >= 4 && self.right_eye.len() >= 4 && !self.nose.is_empty()
    }

    /// `|right_eye[3].x - left_eye[0].x|`, the face-width proxy every
    /// placement formula starts from.
    pub fn eye_span(&self) -> Option<f64> {
        let l = self.left_eye.first()?;
        let r = self.right_eye.get(3)?;
        Some((r.x - l.x).abs())
    }

    /// X midpoint between the inner eye corners (`left_eye[3]`,
    /// `right_eye[0]`).
    pub fn inner_eye_mid_x(&self) -> Option<f64> {
        let l = self.left_eye.get(3)?;
        let r = self.right_eye.first()?;
        Some((l.x + r.x) / 2.0)
    }

    pub fn nose_tip(&self) -> Option<Point> {
        self.nose.first().copied()
    }
}

/// Result of polling an in-flight detection.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectPoll {
    /// The detection call has not resolved yet; this cycle is skipped
    /// and rescheduled.
    Pending,
    Complete(Vec<DetectedFace>),
}

/// Pluggable face detection backend. Given the current video frame,
/// reports zero or more faces with landmark groups.
pub trait FaceDetector {
    fn poll_detect(&mut self, frame: &PreparedImage) -> BoothResult<DetectPoll>;
}

/// Detector that always completes with no faces. Used when no model
/// could be loaded so the rest of the pipeline keeps working.
pub struct NullDetector;

impl FaceDetector for NullDetector {
    fn poll_detect(&mut self, _frame: &PreparedImage) -> BoothResult<DetectPoll> {
        Ok(DetectPoll::Complete(Vec::new()))
    }
}

/// Where detector model weights may come from, in fallback order.
#[derive(Clone, Debug)]
pub struct ModelSources {
    pub primary: PathBuf,
    pub fallback_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModelLocation {
    LocalPath(PathBuf),
    RemoteUrl(String),
}

/// Try the primary model source, then the remote fallback. Both failing
/// yields the fixed [`MODEL_UNAVAILABLE_MSG`] detection error; callers
/// leave filters/dialogue inactive and keep the rest of the pipeline
/// alive.
pub fn resolve_model<T>(
    sources: &ModelSources,
    mut try_load: impl FnMut(&ModelLocation) -> BoothResult<T>,
) -> BoothResult<T> {
    let primary = ModelLocation::LocalPath(sources.primary.clone());
    match try_load(&primary) {
        Ok(model) => return Ok(model),
        Err(e) => {
            tracing::warn!(error = %e, path = %sources.primary.display(), "primary model source failed");
        }
    }

    if let Some(url) = &sources.fallback_url {
        let fallback = ModelLocation::RemoteUrl(url.clone());
        match try_load(&fallback) {
            Ok(model) => return Ok(model),
            Err(e) => {
                tracing::warn!(error = %e, url = %url, "fallback model source failed");
            }
        }
    }

    Err(BoothError::detection(MODEL_UNAVAILABLE_MSG))
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn synthetic_face() -> DetectedFace {
        DetectedFace {
            left_eye: vec![
                Point::new(100.0, 120.0),
                Point::new(108.0, 118.0),
                Point::new(116.0, 118.0),
                Point::new(124.0, 120.0),
            ],
            right_eye: vec![
                Point::new(156.0, 120.0),
                Point::new(164.0, 118.0),
                Point::new(172.0, 118.0),
                Point::new(180.0, 120.0),
            ],
            nose: vec![Point::new(140.0, 150.0)],
        }
    }

    #[test]
    fn landmark_accessors_follow_the_formula_points() {
        let face = synthetic_face();
        assert!(face.has_required_landmarks());
        assert_eq!(face.eye_span(), Some(80.0));
        assert_eq!(face.inner_eye_mid_x(), Some((124.0 + 156.0) / 2.0));
        assert_eq!(face.nose_tip(), Some(Point::new(140.0, 150.0)));
    }

    #[test]
    fn short_landmark_groups_yield_none() {
        let face = DetectedFace {
            left_eye: vec![Point::new(0.0, 0.0)],
            right_eye: vec![],
            nose: vec![],
        };
        assert!(!face.has_required_landmarks());
        assert_eq!(face.eye_span(), None);
        assert_eq!(face.nose_tip(), None);
    }

    #[test]
    fn resolve_model_uses_fallback_after_primary_failure() {
        let sources = ModelSources {
            primary: PathBuf::from("models/landmarks.bin"),
            fallback_url: Some("https://cdn.example/landmarks.bin".to_string()),
        };

        let mut tried = Vec::new();
        let loaded = resolve_model(&sources, |loc| {
            tried.push(loc.clone());
            match loc {
                ModelLocation::LocalPath(_) => Err(BoothError::detection("no local file")),
                ModelLocation::RemoteUrl(_) => Ok("weights"),
            }
        })
        .unwrap();

        assert_eq!(loaded, "weights");
        assert_eq!(tried.len(), 2);
    }

    #[test]
    fn resolve_model_reports_fixed_message_when_all_fail() {
        let sources = ModelSources {
            primary: PathBuf::from("models/landmarks.bin"),
            fallback_url: Some("https://cdn.example/landmarks.bin".to_string()),
        };

        let err = resolve_model::<()>(&sources, |_| Err(BoothError::detection("nope")))
            .unwrap_err();
        assert!(err.to_string().contains(MODEL_UNAVAILABLE_MSG));
    }
}
