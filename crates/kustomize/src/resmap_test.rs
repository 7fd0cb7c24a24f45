// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use serde_json::json;

use super::*;

fn resource(api_version: &str, kind: &str, name: &str) -> Resource {
    Resource::from_value(json!({
        "apiVersion": api_version,
        "kind": kind,
        "metadata": {"name": name},
    }))
    .expect("Should build resource")
}

fn config_map(name: &str, data: serde_json::Value, behavior: Behavior) -> Resource {
    Resource::from_value(json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": name},
        "data": data,
    }))
    .unwrap()
    .with_behavior(behavior)
}

#[rstest]
fn test_add_rejects_duplicate() {
    let mut map = ResourceMap::new();
    map.add(resource("v1", "Service", "svc")).unwrap();

    let result = map.add(resource("v1", "Service", "svc"));
    assert!(matches!(result, Err(Error::DuplicateResource(_))));
    assert_eq!(map.len(), 1);
}

#[rstest]
fn test_add_allows_same_name_different_kind() {
    let mut map = ResourceMap::new();
    map.add(resource("v1", "Service", "web")).unwrap();
    map.add(resource("apps/v1", "Deployment", "web")).unwrap();
    assert_eq!(map.len(), 2);
}

#[rstest]
fn test_merge_from_behaviors() {
    let mut accum = ResourceMap::new();
    accum
        .add(config_map("cm", json!({"a": "1"}), Behavior::Create))
        .unwrap();
    let id = accum.ids().next().unwrap().clone();

    let mut incoming = ResourceMap::new();
    incoming
        .add(config_map("cm", json!({"b": "2"}), Behavior::Merge))
        .unwrap();
    accum.merge_from(incoming).unwrap();
    assert_eq!(
        accum.get(&id).unwrap().field(&["data"]),
        Some(&json!({"a": "1", "b": "2"}))
    );

    let mut incoming = ResourceMap::new();
    incoming
        .add(config_map("cm", json!({"c": "3"}), Behavior::Replace))
        .unwrap();
    accum.merge_from(incoming).unwrap();
    assert_eq!(accum.len(), 1);
    assert_eq!(accum.get(&id).unwrap().field(&["data"]), Some(&json!({"c": "3"})));
    assert_eq!(accum.get(&id).unwrap().behavior(), Behavior::Create);
}

#[rstest]
fn test_merge_matches_original_name_after_prefix() {
    let mut accum = ResourceMap::new();
    let mut base = config_map("cm", json!({"a": "1"}), Behavior::Create);
    base.set_name("base-cm");
    let id = ResId::new(Gvk::new("", "v1", "ConfigMap"), "cm").add_prefix_suffix("base-", "");
    accum.add_with_id(id.clone(), base).unwrap();

    let mut incoming = ResourceMap::new();
    incoming
        .add(config_map("cm", json!({"b": "2"}), Behavior::Merge))
        .unwrap();
    accum.merge_from(incoming).unwrap();

    let merged = accum.get(&id).unwrap();
    assert_eq!(merged.name(), "base-cm");
    assert_eq!(merged.field(&["data"]), Some(&json!({"a": "1", "b": "2"})));
}

#[rstest]
#[case(Behavior::Merge)]
#[case(Behavior::Replace)]
fn test_merge_without_target_fails(#[case] behavior: Behavior) {
    let mut accum = ResourceMap::new();
    let mut incoming = ResourceMap::new();
    incoming
        .add(config_map("cm", json!({}), behavior))
        .unwrap();
    let result = accum.merge_from(incoming);
    assert!(matches!(result, Err(Error::MergeTargetMissing(_))));
}

#[rstest]
fn test_merge_create_collision_fails() {
    let mut accum = ResourceMap::new();
    accum
        .add(config_map("cm", json!({}), Behavior::Create))
        .unwrap();
    let mut incoming = ResourceMap::new();
    incoming
        .add(config_map("cm", json!({}), Behavior::Create))
        .unwrap();
    let result = accum.merge_from(incoming);
    assert!(matches!(result, Err(Error::DuplicateResource(_))));
}

#[rstest]
fn test_find_by_names() {
    let mut map = ResourceMap::new();
    let mut cm = config_map("cm", json!({}), Behavior::Create);
    cm.set_name("foo-cm");
    let id = ResId::new(Gvk::new("", "v1", "ConfigMap"), "cm").add_prefix_suffix("foo-", "");
    map.add_with_id(id.clone(), cm).unwrap();

    let selector = Gvk::new("", "", "ConfigMap");
    assert_eq!(map.find_by_original_name(&selector, "cm", None), vec![&id]);
    assert!(map.find_by_original_name(&selector, "foo-cm", None).is_empty());
    assert_eq!(map.find_by_current_name(&selector, "foo-cm", None), vec![&id]);
    assert!(map.find_by_current_name(&selector, "foo-cm", Some("other")).is_empty());
    assert_eq!(map.find_target(&selector, "foo-cm", None), vec![id]);
}

#[rstest]
fn test_ordered_slice_uses_kind_precedence() {
    let mut map = ResourceMap::new();
    map.add(resource("admissionregistration.k8s.io/v1", "ValidatingWebhookConfiguration", "hook"))
        .unwrap();
    map.add(resource("apps/v1", "Deployment", "b-app")).unwrap();
    map.add(resource("apps/v1", "Deployment", "a-app")).unwrap();
    map.add(resource("example.com/v1", "Widget", "w")).unwrap();
    map.add(resource("v1", "ConfigMap", "cm")).unwrap();
    map.add(resource("v1", "Namespace", "ns")).unwrap();

    let names: Vec<_> = map.as_ordered_slice().iter().map(|r| r.name().to_string()).collect();
    assert_eq!(names, vec!["ns", "cm", "a-app", "b-app", "w", "hook"]);
}

#[rstest]
fn test_ordered_slice_is_stable() {
    let build = || {
        let mut map = ResourceMap::new();
        for name in ["c", "a", "b"] {
            map.add(resource("v1", "Service", name)).unwrap();
        }
        map
    };
    let first: Vec<_> = build().as_ordered_slice().into_iter().cloned().collect();
    let second: Vec<_> = build().as_ordered_slice().into_iter().cloned().collect();
    assert_eq!(first, second);
}
