use thiserror::Error;

use crate::quantity::QuantityError;

pub type Result<T> = std::result::Result<T, MutateError>;

#[derive(Error, Debug)]
pub enum MutateError {
    #[error("unmarshaling request failed with {0}")]
    DecodeEnvelope(#[source] serde_json::Error),

    #[error("unable to unmarshal pod json object: {0}")]
    DecodePod(#[from] PodError),

    #[error("cannot marshal admission review: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum PodError {
    #[error("admission request does not carry an object")]
    MissingObject,

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("container {container}: {field}: {source}")]
    InvalidQuantity {
        container: usize,
        field: String,
        #[source]
        source: QuantityError,
    },
}
