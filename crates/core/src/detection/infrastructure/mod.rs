mod blobs;
pub mod contrast_eye_detector;
pub mod onnx_anchor_detector;
pub mod skin_tone_candidate_detector;
