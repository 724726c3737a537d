use serde::{ Serialize, Deserialize };

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdviceRequest {
    pub spending_data: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdviceResponse {
    pub advice: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub query: String,
    /// Opaque to this service, usually serialized JSON.
    pub data_context: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub response: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
}
