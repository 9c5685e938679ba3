use crate::engine::error::EngineError;

/// Descriptor length produced by the capture pipeline at registration.
pub const DESCRIPTOR_LEN: usize = 128;

/// Default acceptance threshold for the Euclidean distance between the live
/// capture and the stored reference.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Hard admission gate for clock-in. Accepts only when the live descriptor
/// lands within `threshold` of the reference; there is no fallback path and
/// the check writes nothing, so a mismatch cannot corrupt attendance state.
pub fn verify(reference: &[f32], live: &[f32], threshold: f32) -> Result<f32, EngineError> {
    if reference.len() != live.len() || reference.is_empty() {
        return Err(EngineError::FaceMismatch {
            distance: f32::INFINITY,
        });
    }

    let distance = euclidean_distance(reference, live);
    if distance <= threshold {
        Ok(distance)
    } else {
        Err(EngineError::FaceMismatch { distance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(fill: f32) -> Vec<f32> {
        vec![fill; DESCRIPTOR_LEN]
    }

    #[test]
    fn identical_descriptors_match() {
        let reference = descriptor(0.25);
        let distance = verify(&reference, &reference, DEFAULT_MATCH_THRESHOLD).unwrap();
        assert_eq!(distance, 0.0);
    }

    #[test]
    fn distance_above_threshold_is_rejected() {
        // 128 * (0.65 / sqrt(128))^2 sums to 0.65^2, i.e. distance 0.65
        let reference = descriptor(0.0);
        let offset = 0.65 / (DESCRIPTOR_LEN as f32).sqrt();
        let live = descriptor(offset);

        match verify(&reference, &live, DEFAULT_MATCH_THRESHOLD) {
            Err(EngineError::FaceMismatch { distance }) => {
                assert!((distance - 0.65).abs() < 1e-3, "got {distance}");
            }
            other => panic!("expected FaceMismatch, got {other:?}"),
        }
    }

    #[test]
    fn distance_just_below_threshold_is_accepted() {
        let reference = descriptor(0.0);
        let offset = 0.59 / (DESCRIPTOR_LEN as f32).sqrt();
        let live = descriptor(offset);
        assert!(verify(&reference, &live, DEFAULT_MATCH_THRESHOLD).is_ok());
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let reference = descriptor(0.1);
        let live = vec![0.1; 64];
        assert!(matches!(
            verify(&reference, &live, DEFAULT_MATCH_THRESHOLD),
            Err(EngineError::FaceMismatch { .. })
        ));
    }
}
