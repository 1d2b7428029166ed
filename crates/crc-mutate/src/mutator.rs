use tracing::{debug, info};

use crate::admission_response::{AdmissionResponse, AdmissionResponseStatus};
use crate::admission_review::AdmissionReview;
use crate::errors::{MutateError, Result};
use crate::patch::build_patch;
use crate::pod::Pod;
use crate::policy;

/// Key of the audit annotation added to every patched request.
pub const AUDIT_ANNOTATION_KEY: &str = "crc-mutate-webhook";
pub const AUDIT_ANNOTATION_VALUE: &str =
    "initial resource requests been adjusted by crc-mutate-webhook";

/// Take the body of an HTTP request holding an `AdmissionReview` and return
/// the JSON encoded review that has to be sent back to the API server.
pub fn mutate(body: &[u8]) -> Result<Vec<u8>> {
    let review = AdmissionReview::from_slice(body)?;
    mutate_review(review)?.to_vec()
}

/// Fill the `response` of `review`.
///
/// A review without a request is returned as it is. The request is always
/// allowed, a JSON Patch is attached only when the Pod lives inside of a gated
/// namespace and at least one of its containers has resources to adjust.
pub fn mutate_review(review: AdmissionReview) -> Result<AdmissionReview> {
    review_mutation(review).map(|mutation| mutation.review)
}

/// Outcome of [`review_mutation`].
#[derive(Debug)]
pub struct Mutation {
    /// The review with its `response` filled.
    pub review: AdmissionReview,
    /// Number of operations of the attached patch, 0 when there's no patch.
    pub patch_operations: usize,
}

/// Same as [`mutate_review`], also reporting the size of the patch.
pub fn review_mutation(mut review: AdmissionReview) -> Result<Mutation> {
    let Some(request) = review.request.as_ref() else {
        debug!("admission review without request, nothing to do");
        return Ok(Mutation {
            review,
            patch_operations: 0,
        });
    };

    let pod = Pod::from_raw(request.object.as_ref())?;
    let namespace = request.namespace();
    let mut response = AdmissionResponse::allow(request.uid.clone());
    let mut patch_operations = 0;

    if policy::is_gated(namespace) {
        info!(namespace, uid = request.uid.as_str(), "trying to patch");

        let patch = build_patch(&pod, namespace);
        patch_operations = patch.0.len();
        if patch_operations > 0 {
            response = response
                .with_patch(&patch)
                .map_err(MutateError::Encode)?
                .with_audit_annotation(AUDIT_ANNOTATION_KEY, AUDIT_ANNOTATION_VALUE);
        }

        info!(
            namespace,
            uid = request.uid.as_str(),
            patch_operations,
            "patched"
        );
    } else {
        info!(namespace, uid = request.uid.as_str(), "not patching");
    }

    response.status = Some(AdmissionResponseStatus::success());
    review.response = Some(response);

    Ok(Mutation {
        review,
        patch_operations,
    })
}
