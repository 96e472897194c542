pub mod cadenced_detector;
pub mod execution_provider;
pub mod model_resolver;
pub mod onnx_yolo_detector;
pub mod scripted_face_detector;
