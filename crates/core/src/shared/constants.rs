pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Frame rate assumed for image sequences when none is given.
pub const DEFAULT_SEQUENCE_FPS: f64 = 30.0;

/// Padding around the tracked face before eye detection runs on it.
pub const EYE_REGION_PADDING: i32 = 20;
