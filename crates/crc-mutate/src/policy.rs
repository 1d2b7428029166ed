//! Compiled-in policy: which namespaces are patched and the resource
//! requests their containers are lowered to.

/// Only namespaces starting with this prefix are patched.
pub const GATED_NAMESPACE_PREFIX: &str = "openshift-";

pub const DEFAULT_MINIMAL_CPU: &str = "10m";
pub const DEFAULT_MINIMAL_MEMORY: &str = "10Mi";

/// Returns true when Pods admitted inside of `namespace` have to be patched.
pub fn is_gated(namespace: &str) -> bool {
    !namespace.is_empty() && namespace.starts_with(GATED_NAMESPACE_PREFIX)
}

/// CPU request granted to the containers of `namespace`.
///
/// Namespaces are matched exactly, there's no prefix matching.
pub fn minimal_cpu(namespace: &str) -> &'static str {
    match namespace {
        "openshift-console" => "100m",
        "openshift-kube-controller-manager" => "300m",
        "openshift-kube-apiserver" => "800m",
        "openshift-etcd" => "600m",
        _ => DEFAULT_MINIMAL_CPU,
    }
}

/// Memory request granted to the containers of `namespace`.
pub fn minimal_memory(namespace: &str) -> &'static str {
    match namespace {
        "openshift-console" => "50Mi",
        _ => DEFAULT_MINIMAL_MEMORY,
    }
}
