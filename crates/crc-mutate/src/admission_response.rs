use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// This models the admission/v1/AdmissionResponse object of Kubernetes
/// See https://pkg.go.dev/k8s.io/kubernetes/pkg/apis/admission#AdmissionResponse
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    /// UID is an identifier for the individual request/response.
    /// This must be copied over from the corresponding AdmissionRequest.
    pub uid: String,

    /// Allowed indicates whether or not the admission request was permitted.
    pub allowed: bool,

    /// The type of Patch. Currently we only allow "JSONPatch".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,

    /// The patch body, base64 encoded. Currently we only support "JSONPatch"
    /// which implements RFC 6902.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,

    /// AuditAnnotations is an unstructured key value map set by remote admission controller.
    /// They are added to the audit log entry of the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_annotations: Option<HashMap<String, String>>,

    /// Result of the admission, the `result` field of the Kubernetes type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionResponseStatus>,
}

/// PatchType is the type of patch being used to represent the mutated object
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub enum PatchType {
    #[serde(rename = "JSONPatch")]
    #[default]
    JSONPatch,
}

/// Value of Status.Status of an AdmissionResponse. Requests are never
/// denied, hence the only value ever produced is `Success`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum AdmissionResponseStatusValue {
    Success,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct AdmissionResponseStatus {
    /// Status of the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AdmissionResponseStatusValue>,
}

impl AdmissionResponseStatus {
    pub fn success() -> Self {
        AdmissionResponseStatus {
            status: Some(AdmissionResponseStatusValue::Success),
        }
    }
}

impl AdmissionResponse {
    /// Accept the request identified by `uid` without changing it.
    pub fn allow(uid: String) -> AdmissionResponse {
        AdmissionResponse {
            uid,
            allowed: true,
            ..Default::default()
        }
    }

    /// Attach a JSON Patch to the response.
    pub fn with_patch(mut self, patch: &json_patch::Patch) -> Result<Self, serde_json::Error> {
        let raw = serde_json::to_vec(patch)?;
        self.patch = Some(general_purpose::STANDARD.encode(raw));
        self.patch_type = Some(PatchType::JSONPatch);
        Ok(self)
    }

    pub fn with_audit_annotation(mut self, key: &str, value: &str) -> Self {
        self.audit_annotations
            .get_or_insert_with(HashMap::new)
            .insert(key.to_owned(), value.to_owned());
        self
    }

    /// Decode the `patch` field back into a JSON Patch, `None` when the
    /// response doesn't carry one.
    pub fn decoded_patch(&self) -> Option<Result<json_patch::Patch, PatchDecodeError>> {
        self.patch
            .as_ref()
            .map(|patch| -> Result<json_patch::Patch, PatchDecodeError> {
                let raw = general_purpose::STANDARD.decode(patch)?;
                Ok(serde_json::from_slice(&raw)?)
            })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PatchDecodeError {
    #[error("patch is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("patch is not a valid JSON Patch: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use json_patch::{Patch, PatchOperation, RemoveOperation};
    use jsonptr::PointerBuf;
    use serde_json::json;

    #[test]
    fn create_allow_response() {
        let response = AdmissionResponse::allow(String::from("UID"));

        assert_eq!(response.uid, "UID");
        assert!(response.allowed);
        assert_eq!(response.patch, None);
        assert_eq!(response.patch_type, None);
        assert_eq!(response.audit_annotations, None);
        assert_eq!(response.decoded_patch().map(|p| p.is_ok()), None);
    }

    #[test]
    fn serialize_response_without_patch_omits_patch_fields() {
        let mut response = AdmissionResponse::allow(String::from("UID"));
        response.status = Some(AdmissionResponseStatus::success());

        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(
            value,
            json!({
                "uid": "UID",
                "allowed": true,
                "status": {"status": "Success"}
            })
        );
    }

    #[test]
    fn attach_patch_to_response() {
        let patch = Patch(vec![PatchOperation::Remove(RemoveOperation {
            path: PointerBuf::from_tokens(["spec", "containers", "0", "resources", "limits", "cpu"]),
        })]);

        let response = AdmissionResponse::allow(String::from("UID"))
            .with_patch(&patch)
            .unwrap()
            .with_audit_annotation("key", "value");

        assert_eq!(response.patch_type, Some(PatchType::JSONPatch));
        assert_eq!(
            response.audit_annotations,
            Some(HashMap::from([("key".to_owned(), "value".to_owned())]))
        );

        let raw = general_purpose::STANDARD
            .decode(response.patch.as_ref().unwrap())
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(
            value,
            json!([{"op": "remove", "path": "/spec/containers/0/resources/limits/cpu"}])
        );

        assert_eq!(response.decoded_patch().unwrap().unwrap(), patch);

        let serialized = serde_json::to_value(&response).unwrap();
        assert_eq!(serialized["patchType"], "JSONPatch");
        assert_eq!(serialized["auditAnnotations"]["key"], "value");
    }

    #[test]
    fn decode_invalid_patch() {
        let response = AdmissionResponse {
            patch: Some(String::from("not base64!")),
            ..Default::default()
        };

        assert!(matches!(
            response.decoded_patch(),
            Some(Err(PatchDecodeError::Base64(_)))
        ));
    }
}
