use crate::admission_request::AdmissionRequest;
use crate::admission_response::AdmissionResponse;
use crate::errors::MutateError;

/// The envelope exchanged with the Kubernetes API server.
///
/// The same type is used both for the incoming review, where `request` is
/// set, and for the outgoing one, where `response` is filled by the mutator.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

impl AdmissionReview {
    pub fn from_slice(body: &[u8]) -> Result<Self, MutateError> {
        serde_json::from_slice(body).map_err(MutateError::DecodeEnvelope)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, MutateError> {
        serde_json::to_vec(self).map_err(MutateError::Encode)
    }
}
