use axum::{
    body::Bytes,
    http::{StatusCode, header},
    response::IntoResponse,
};
use crc_mutate::{AdmissionReview, Mutation, admission_request::AdmissionRequest, review_mutation};
use tracing::{Span, debug};

use crate::api::api_error::ApiError;

#[tracing::instrument(
    name = "mutate",
    fields(
        request_uid=tracing::field::Empty,
        host=crate::config::HOSTNAME.as_str(),
        name=tracing::field::Empty,
        namespace=tracing::field::Empty,
        operation=tracing::field::Empty,
        kind=tracing::field::Empty,
        allowed=tracing::field::Empty,
        mutated=tracing::field::Empty,
        patch_operations=tracing::field::Empty,
    ),
    skip_all)]
/// Run the mutation against the `AdmissionReview` held by the request body.
///
/// The body is taken as raw bytes, a payload that is not an `AdmissionReview`
/// is reported with a `400`.
pub(crate) async fn mutate_handler(body: Bytes) -> Result<impl IntoResponse, ApiError> {
    let admission_review = AdmissionReview::from_slice(&body)?;
    if let Some(request) = &admission_review.request {
        populate_span_with_admission_request_data(request);
    }

    let mutation = review_mutation(admission_review)?;
    populate_span_with_mutation_results(&mutation);

    let admission_review = mutation.review;
    debug!(response =? &admission_review.response, "admission review processed");

    let body = admission_review.to_vec()?;
    Ok((
        [(header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
        body,
    ))
}

pub(crate) async fn readiness_handler() -> StatusCode {
    StatusCode::OK
}

fn populate_span_with_admission_request_data(adm_req: &AdmissionRequest) {
    Span::current().record("request_uid", adm_req.uid.as_str());
    Span::current().record("name", adm_req.name.as_deref().unwrap_or_default());
    Span::current().record("namespace", adm_req.namespace());
    Span::current().record("operation", adm_req.operation.as_str());
    Span::current().record("kind", adm_req.kind.kind.as_str());
}

fn populate_span_with_mutation_results(mutation: &Mutation) {
    if let Some(response) = &mutation.review.response {
        Span::current().record("allowed", response.allowed);
        Span::current().record("mutated", response.patch.is_some());
    }
    Span::current().record("patch_operations", mutation.patch_operations as u64);
}
