//! Mutation engine of the CRC admission webhook.
//!
//! Given an `AdmissionReview` carrying a Pod, the engine decides whether the
//! Pod lives inside of a platform namespace (`openshift-*`) and, when it does,
//! lowers the resource requests of its containers and drops their limits by
//! returning a JSON Patch inside of the `AdmissionResponse`.
//!
//! The engine never rejects a request and keeps no state between calls.

pub mod admission_request;
pub mod admission_response;
pub mod admission_review;
pub mod errors;
pub mod mutator;
pub mod patch;
pub mod pod;
pub mod policy;
pub mod quantity;

pub use admission_review::AdmissionReview;
pub use errors::{MutateError, PodError};
pub use mutator::{Mutation, mutate, mutate_review, review_mutation};
