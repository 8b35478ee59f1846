//! Anchor detector backed by a YOLO face model in ONNX Runtime via `ort`.
//!
//! Letterboxes the frame, runs inference once, then looks for faces at
//! progressively lower confidence thresholds and reports the largest face
//! found at the first threshold that yields any.
use std::path::Path;

use crate::detection::domain::anchor_detector::AnchorDetector;
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Multipliers applied to the configured confidence, tried in order.
const ESCALATION: [f64; 3] = [1.0, 0.7, 0.5];

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

pub struct OnnxAnchorDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxAnchorDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?.commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl AnchorDetector for OnnxAnchorDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Option<Rect>, Box<dyn std::error::Error>> {
        let (input_tensor, letterbox) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let floor = self.confidence * ESCALATION[ESCALATION.len() - 1];
        let raw = parse_detections(data, &shape, &letterbox, floor)?;
        let face = escalate(&raw, self.confidence, frame.width(), frame.height());
        if let Some(r) = face {
            log::debug!("Anchor face at {r:?}");
        }
        Ok(face)
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Mapping from letterboxed model coordinates back to the frame.
#[derive(Clone, Copy, Debug)]
struct Letterbox {
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

/// Letterbox-resize a frame to `target_size` × `target_size` as an NCHW
/// float32 tensor.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding is 114/255 gray, YOLO convention
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x,
            pad_y,
        },
    )
}

// ---------------------------------------------------------------------------
// Post-processing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    confidence: f64,
}

impl RawDetection {
    fn bbox(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    fn area(&self) -> f64 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }
}

/// Decodes YOLO rows `[cx, cy, w, h, conf, ...]` at or above `min_conf`.
///
/// Accepts both `[1, features, detections]` and `[1, detections, features]`.
fn parse_detections(
    data: &[f32],
    shape: &[usize],
    letterbox: &Letterbox,
    min_conf: f64,
) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Err(format!("YOLO output too small for shape {shape:?}").into());
    }

    let value = |det: usize, feat: usize| -> f64 {
        if transposed {
            data[feat * num_dets + det] as f64
        } else {
            data[det * num_feats + feat] as f64
        }
    };

    let Letterbox {
        scale,
        pad_x,
        pad_y,
    } = *letterbox;
    let mut dets = Vec::new();
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < min_conf {
            continue;
        }
        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        dets.push(RawDetection {
            x1: ((cx - w / 2.0) - pad_x as f64) / scale,
            y1: ((cy - h / 2.0) - pad_y as f64) / scale,
            x2: ((cx + w / 2.0) - pad_x as f64) / scale,
            y2: ((cy + h / 2.0) - pad_y as f64) / scale,
            confidence: conf,
        });
    }
    Ok(dets)
}

/// Largest face after NMS at the first threshold in the escalation that
/// yields one, clipped to the frame.
fn escalate(raw: &[RawDetection], confidence: f64, frame_w: u32, frame_h: u32) -> Option<Rect> {
    for factor in ESCALATION {
        let threshold = confidence * factor;
        let mut passing: Vec<RawDetection> = raw
            .iter()
            .filter(|d| d.confidence >= threshold)
            .cloned()
            .collect();
        let kept = nms(&mut passing, NMS_IOU_THRESH);
        let largest = kept
            .iter()
            .max_by(|a, b| a.area().total_cmp(&b.area()))
            .and_then(|d| to_rect(d).clip_to(frame_w, frame_h));
        if largest.is_some() {
            if factor < 1.0 {
                log::debug!("Anchor found at lowered confidence {threshold:.2}");
            }
            return largest;
        }
    }
    None
}

fn to_rect(d: &RawDetection) -> Rect {
    let x = d.x1.round() as i32;
    let y = d.y1.round() as i32;
    Rect::new(x, y, d.x2.round() as i32 - x, d.y2.round() as i32 - y)
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<RawDetection> = Vec::new();
    for d in dets.iter() {
        if keep
            .iter()
            .all(|k| bbox_iou(&k.bbox(), &d.bbox()) <= iou_thresh)
        {
            keep.push(d.clone());
        }
    }
    keep
}

fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
