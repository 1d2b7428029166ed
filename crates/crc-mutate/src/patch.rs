//! Build the JSON Patch lowering the resource footprint of a Pod.

use json_patch::{Patch, PatchOperation, RemoveOperation, ReplaceOperation};
use jsonptr::PointerBuf;
use serde_json::Value;

use crate::pod::{CPU, MEMORY, Pod, is_set};
use crate::policy;

const REQUESTS: &str = "requests";
const LIMITS: &str = "limits";

/// Compute the patch operations for `pod`, admitted inside of `namespace`.
///
/// Containers are walked in order. For each of them, and in this order:
///   * the memory request is replaced with the namespace minimum
///   * the CPU request is replaced with the namespace minimum
///   * the memory limit is removed
///   * the CPU limit is removed
///
/// An operation is emitted only when the targeted field is set to a non-zero
/// quantity, `replace` and `remove` both fail on a missing path.
pub fn build_patch(pod: &Pod, namespace: &str) -> Patch {
    let minimal_cpu = policy::minimal_cpu(namespace);
    let minimal_memory = policy::minimal_memory(namespace);

    let mut operations = Vec::new();
    for (index, container) in pod.containers().iter().enumerate() {
        let requests = container.requests();
        let limits = container.limits();

        if is_set(requests, MEMORY) {
            operations.push(replace(index, REQUESTS, MEMORY, minimal_memory));
        }
        if is_set(requests, CPU) {
            operations.push(replace(index, REQUESTS, CPU, minimal_cpu));
        }
        if is_set(limits, MEMORY) {
            operations.push(remove(index, LIMITS, MEMORY));
        }
        if is_set(limits, CPU) {
            operations.push(remove(index, LIMITS, CPU));
        }
    }

    Patch(operations)
}

fn resource_pointer(index: usize, section: &str, resource: &str) -> PointerBuf {
    let index = index.to_string();
    PointerBuf::from_tokens([
        "spec",
        "containers",
        index.as_str(),
        "resources",
        section,
        resource,
    ])
}

fn replace(index: usize, section: &str, resource: &str, value: &str) -> PatchOperation {
    PatchOperation::Replace(ReplaceOperation {
        path: resource_pointer(index, section, resource),
        value: Value::String(value.to_owned()),
    })
}

fn remove(index: usize, section: &str, resource: &str) -> PatchOperation {
    PatchOperation::Remove(RemoveOperation {
        path: resource_pointer(index, section, resource),
    })
}
