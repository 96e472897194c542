use ort::execution_providers::ExecutionProviderDispatch;

/// Hardware-accelerated providers to try for detector sessions, best first.
///
/// An empty list leaves ONNX Runtime on its CPU provider; providers that
/// fail to register are skipped by `ort` at session build time.
pub fn preferred_execution_providers() -> Vec<ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    let providers = vec![ort::execution_providers::CoreMLExecutionProvider::default().build()];
    #[cfg(target_os = "windows")]
    let providers = vec![ort::execution_providers::DirectMLExecutionProvider::default().build()];
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let providers = Vec::new();

    log::debug!("Requesting {} accelerated execution provider(s)", providers.len());
    providers
}
