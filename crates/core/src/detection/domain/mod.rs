pub mod anchor_detector;
pub mod candidate_detector;
pub mod eye_detector;
