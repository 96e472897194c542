/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Rotates the frame upright, letterboxes it to the model input, runs
/// inference and NMS, and reports boxes normalized to the upright frame.
/// Tracking is left to the domain `FaceTracker`.
use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_observation::FaceObservation;
use crate::shared::error::DetectionError;
use crate::shared::frame::Frame;
use crate::shared::geometry::NormalizedRect;
use crate::shared::orientation::Orientation;

use super::execution_provider::preferred_execution_providers;

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for raw model output.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.45;

/// YOLO face detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

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

        log::info!(
            "Loaded YOLO model {} (input {input_size}px)",
            model_path.display()
        );

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<RawDetection>, Box<dyn std::error::Error>> {
        let (input_tensor, scale, pad_x, pad_y) = letterbox(frame, self.input_size)?;

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();

        // [1, features, detections] or [1, detections, features].
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if num_feats < 5 {
            return Ok(Vec::new());
        }

        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let feature = |det: usize, f: usize| -> f64 {
            if transposed {
                data[f * num_dets + det] as f64
            } else {
                data[det * num_feats + f] as f64
            }
        };

        let mut raw_dets = Vec::new();
        for i in 0..num_dets {
            let conf = feature(i, 4);
            if conf < self.confidence {
                continue;
            }
            let (cx, cy, w, h) = (feature(i, 0), feature(i, 1), feature(i, 2), feature(i, 3));
            raw_dets.push(RawDetection {
                x1: ((cx - w / 2.0) - pad_x as f64) / scale,
                y1: ((cy - h / 2.0) - pad_y as f64) / scale,
                x2: ((cx + w / 2.0) - pad_x as f64) / scale,
                y2: ((cy + h / 2.0) - pad_y as f64) / scale,
                confidence: conf,
            });
        }

        Ok(nms(&mut raw_dets, NMS_IOU_THRESH))
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        orientation: Orientation,
    ) -> Result<Vec<FaceObservation>, DetectionError> {
        let upright = orientation.upright_frame(frame);
        let detections = self
            .infer(&upright)
            .map_err(|e| DetectionError(e.to_string()))?;
        Ok(detections
            .iter()
            .filter_map(|d| d.to_observation(upright.width(), upright.height()))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resize a frame to `target_size` × `target_size`.
///
/// Returns `(NCHW float32 tensor, scale, pad_x, pad_y)`.
fn letterbox(
    frame: &Frame,
    target_size: u32,
) -> Result<(ndarray::Array4<f32>, f64, u32, u32), ndarray::ShapeError> {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding is 114/255 gray, the YOLO convention.
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray()?;
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

    Ok((tensor, scale, pad_x, pad_y))
}

// ---------------------------------------------------------------------------
// NMS
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
    /// Pixel box → normalized rect clipped to the frame. `None` if nothing
    /// of the box lies inside.
    fn to_observation(&self, width: u32, height: u32) -> Option<FaceObservation> {
        let w = width as f64;
        let h = height as f64;
        let x1 = (self.x1 / w).clamp(0.0, 1.0);
        let y1 = (self.y1 / h).clamp(0.0, 1.0);
        let x2 = (self.x2 / w).clamp(0.0, 1.0);
        let y2 = (self.y2 / h).clamp(0.0, 1.0);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(FaceObservation::new(
            NormalizedRect::new(x1, y1, x2 - x1, y2 - y1),
            self.confidence.clamp(0.0, 1.0),
        ))
    }
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if suppressed[j] {
                continue;
            }
            let iou = bbox_iou(
                &[dets[i].x1, dets[i].y1, dets[i].x2, dets[i].y2],
                &[dets[j].x1, dets[j].y1, dets[j].x2, dets[j].y2],
            );
            if iou > iou_thresh {
                suppressed[j] = true;
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn det(x1: f64, y1: f64, x2: f64, y2: f64, confidence: f64) -> RawDetection {
        RawDetection {
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → 640: scale 3.2, content 640x320, pad_y 160.
        let frame = Frame::new(vec![128u8; 200 * 100 * 3], 200, 100, 3, 0);
        let (tensor, scale, pad_x, pad_y) = letterbox(&frame, 640).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(scale, 3.2, epsilon = 0.01);
        assert_eq!(pad_x, 0);
        assert_eq!(pad_y, 160);
    }

    #[test]
    fn test_letterbox_portrait_pads_horizontally() {
        let frame = Frame::new(vec![128u8; 100 * 200 * 3], 100, 200, 3, 0);
        let (_, _, pad_x, pad_y) = letterbox(&frame, 640).unwrap();
        assert_eq!(pad_x, 160);
        assert_eq!(pad_y, 0);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let (tensor, _, pad_x, pad_y) = letterbox(&frame, 640).unwrap();

        let y = pad_y as usize + 1;
        let x = pad_x as usize + 1;
        assert_relative_eq!(tensor[[0, 0, y, x]], 1.0, epsilon = 0.01);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 114.0 / 255.0, epsilon = 0.01);
    }

    #[test]
    fn test_nms_suppresses_overlapping() {
        let mut dets = vec![
            det(0.0, 0.0, 100.0, 100.0, 0.9),
            det(5.0, 5.0, 105.0, 105.0, 0.8),
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_keeps_non_overlapping() {
        let mut dets = vec![
            det(0.0, 0.0, 50.0, 50.0, 0.9),
            det(200.0, 200.0, 250.0, 250.0, 0.8),
        ];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }

    #[test]
    fn test_nms_confidence_ordering() {
        let mut dets = vec![
            det(0.0, 0.0, 100.0, 100.0, 0.5),
            det(2.0, 2.0, 102.0, 102.0, 0.9),
        ];
        let kept = nms(&mut dets, 0.3);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn test_nms_empty_input() {
        assert!(nms(&mut [], 0.3).is_empty());
    }

    #[test]
    fn test_bbox_iou_partial_overlap() {
        let a = [0.0, 0.0, 10.0, 10.0];
        let b = [5.0, 5.0, 15.0, 15.0];
        assert_relative_eq!(bbox_iou(&a, &b), 25.0 / 175.0, epsilon = 1e-9);
        assert_eq!(bbox_iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
    }

    #[test]
    fn test_to_observation_normalizes_and_clips() {
        let obs = det(-20.0, 50.0, 80.0, 150.0, 0.7)
            .to_observation(200, 100)
            .unwrap();
        assert_relative_eq!(obs.bbox.x, 0.0);
        assert_relative_eq!(obs.bbox.y, 0.5);
        assert_relative_eq!(obs.bbox.width, 0.4);
        assert_relative_eq!(obs.bbox.height, 0.5);
        assert!(obs.is_well_formed());
    }

    #[test]
    fn test_to_observation_outside_frame_is_dropped() {
        assert!(det(300.0, 10.0, 400.0, 20.0, 0.9)
            .to_observation(200, 100)
            .is_none());
    }
}
