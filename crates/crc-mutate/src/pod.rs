//! Projection of a Pod limited to what the webhook reads: the resource
//! requirements of its containers, in order.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::runtime::RawExtension;
use serde::Deserialize;

use crate::errors::PodError;
use crate::quantity;

pub const CPU: &str = "cpu";
pub const MEMORY: &str = "memory";

/// Quantities listed by resource name. A `null` quantity is accepted and
/// stands for an unset one, as the API server does.
pub type ResourceList = BTreeMap<String, Option<Quantity>>;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Pod {
    #[serde(default)]
    pub spec: Option<PodSpec>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Option<Vec<Container>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Container {
    #[serde(default)]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default)]
    pub requests: Option<ResourceList>,
    #[serde(default)]
    pub limits: Option<ResourceList>,
}

impl Pod {
    /// Decode the object carried by an admission request.
    ///
    /// Every quantity found among the requests and limits of the containers
    /// must be well formed, otherwise the whole Pod is rejected, the same way
    /// the API server would refuse to decode it.
    pub fn from_raw(object: Option<&RawExtension>) -> Result<Self, PodError> {
        let object = match object {
            Some(RawExtension(value)) if !value.is_null() => value,
            _ => return Err(PodError::MissingObject),
        };
        let pod = Pod::deserialize(object)?;
        pod.validate_quantities()?;
        Ok(pod)
    }

    pub fn containers(&self) -> &[Container] {
        self.spec
            .as_ref()
            .and_then(|spec| spec.containers.as_deref())
            .unwrap_or_default()
    }

    fn validate_quantities(&self) -> Result<(), PodError> {
        for (index, container) in self.containers().iter().enumerate() {
            let Some(resources) = &container.resources else {
                continue;
            };
            let sections = [("requests", &resources.requests), ("limits", &resources.limits)];
            for (section, list) in sections {
                for (name, value) in list.iter().flatten() {
                    let Some(value) = value else {
                        continue;
                    };
                    quantity::is_zero(value).map_err(|source| PodError::InvalidQuantity {
                        container: index,
                        field: format!("resources.{section}.{name}"),
                        source,
                    })?;
                }
            }
        }
        Ok(())
    }
}

impl Container {
    pub fn requests(&self) -> Option<&ResourceList> {
        self.resources.as_ref().and_then(|r| r.requests.as_ref())
    }

    pub fn limits(&self) -> Option<&ResourceList> {
        self.resources.as_ref().and_then(|r| r.limits.as_ref())
    }
}

/// Returns true when `resource` is listed and its quantity is not zero.
///
/// This mirrors the `quantity.String() != "0"` check done by Kubernetes
/// tooling: an absent entry, a `null` one and an explicit zero are all
/// considered unset.
pub fn is_set(list: Option<&ResourceList>, resource: &str) -> bool {
    list.and_then(|list| list.get(resource))
        .and_then(Option::as_ref)
        .is_some_and(|value| matches!(quantity::is_zero(value), Ok(false)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawExtension {
        RawExtension(value)
    }

    #[test]
    fn decode_pod_with_resources() {
        let object = raw(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "etcd", "namespace": "openshift-etcd"},
            "spec": {
                "containers": [
                    {"name": "etcd", "resources": {"requests": {"cpu": "1", "memory": "0"}}},
                    {"name": "metrics"}
                ]
            }
        }));

        let pod = Pod::from_raw(Some(&object)).unwrap();
        let containers = pod.containers();

        assert_eq!(containers.len(), 2);
        assert!(is_set(containers[0].requests(), CPU));
        assert!(!is_set(containers[0].requests(), MEMORY));
        assert!(!is_set(containers[0].limits(), CPU));
        assert!(!is_set(containers[1].requests(), CPU));
    }

    #[test]
    fn null_quantities_are_unset() {
        let object = raw(json!({
            "spec": {
                "containers": [
                    {"resources": {"requests": {"cpu": null, "memory": "1Gi"}, "limits": {"memory": null}}}
                ]
            }
        }));

        let pod = Pod::from_raw(Some(&object)).unwrap();
        let container = &pod.containers()[0];

        assert!(!is_set(container.requests(), CPU));
        assert!(is_set(container.requests(), MEMORY));
        assert!(!is_set(container.limits(), MEMORY));
    }

    #[test]
    fn decode_pod_without_spec() {
        let object = raw(json!({"metadata": {"name": "no-spec"}}));

        let pod = Pod::from_raw(Some(&object)).unwrap();

        assert!(pod.containers().is_empty());
    }

    #[test]
    fn decode_pod_with_null_containers() {
        let object = raw(json!({"spec": {"containers": null}}));

        let pod = Pod::from_raw(Some(&object)).unwrap();

        assert!(pod.containers().is_empty());
    }

    #[test]
    fn missing_object_is_an_error() {
        assert!(matches!(Pod::from_raw(None), Err(PodError::MissingObject)));
        assert!(matches!(
            Pod::from_raw(Some(&raw(serde_json::Value::Null))),
            Err(PodError::MissingObject)
        ));
    }

    #[test]
    fn object_of_the_wrong_shape_is_an_error() {
        let object = raw(json!({"spec": {"containers": "not-a-list"}}));

        assert!(matches!(
            Pod::from_raw(Some(&object)),
            Err(PodError::Json(_))
        ));
    }

    #[test]
    fn malformed_quantity_is_an_error() {
        let object = raw(json!({
            "spec": {
                "containers": [
                    {"name": "ok"},
                    {"name": "broken", "resources": {"limits": {"ephemeral-storage": "lots"}}}
                ]
            }
        }));

        let err = Pod::from_raw(Some(&object)).unwrap_err();

        match err {
            PodError::InvalidQuantity {
                container, field, ..
            } => {
                assert_eq!(container, 1);
                assert_eq!(field, "resources.limits.ephemeral-storage");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
