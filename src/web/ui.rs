/// `GET /`
pub async fn index_handler() -> &'static str {
    "MNIST ONNX API is running. POST /predict-file, /predict-base64 or /api/mnist/predict"
}
