// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use serde_json::json;

use super::*;
use crate::transform::PrefixSuffixTransformer;
use crate::{Resource, TransformerConfig};

fn map_of(values: Vec<Value>) -> ResourceMap {
    let mut map = ResourceMap::new();
    for value in values {
        map.add(Resource::from_value(value).unwrap()).unwrap();
    }
    map
}

fn transformer() -> NameReferenceTransformer {
    NameReferenceTransformer::new(TransformerConfig::default().name_reference)
}

fn find<'a>(map: &'a ResourceMap, kind: &str) -> &'a Resource {
    map.iter()
        .find(|(id, _)| id.gvk().kind == kind)
        .map(|(_, res)| res)
        .expect("Should find resource")
}

#[rstest]
fn test_follows_renamed_config_map_and_secret() {
    let map = map_of(vec![
        json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "settings"}}),
        json!({"apiVersion": "v1", "kind": "Secret", "metadata": {"name": "creds"}}),
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web"},
            "spec": {"template": {"spec": {
                "imagePullSecrets": [{"name": "creds"}],
                "containers": [{
                    "name": "web",
                    "envFrom": [{"configMapRef": {"name": "settings"}}],
                    "env": [{"name": "PW", "valueFrom": {"secretKeyRef": {"name": "creds", "key": "pw"}}}],
                }],
                "volumes": [
                    {"name": "cfg", "configMap": {"name": "settings"}},
                    {"name": "other", "configMap": {"name": "unrelated"}},
                ],
            }}},
        }),
    ]);
    let map = PrefixSuffixTransformer::new("foo-", "").transform(map).unwrap();
    let out = transformer().transform(map).expect("Should update references");

    let spec = find(&out, "Deployment").field(&["spec", "template", "spec"]).unwrap();
    assert_eq!(spec["imagePullSecrets"], json!([{"name": "foo-creds"}]));
    assert_eq!(
        spec["containers"][0]["envFrom"][0]["configMapRef"]["name"],
        json!("foo-settings")
    );
    assert_eq!(
        spec["containers"][0]["env"][0]["valueFrom"]["secretKeyRef"]["name"],
        json!("foo-creds")
    );
    assert_eq!(spec["volumes"][0]["configMap"]["name"], json!("foo-settings"));
    assert_eq!(spec["volumes"][1]["configMap"]["name"], json!("unrelated"));
}

#[rstest]
fn test_binding_respects_sibling_kind() {
    let map = map_of(vec![
        json!({"apiVersion": "v1", "kind": "ServiceAccount", "metadata": {"name": "robot"}}),
        json!({"apiVersion": "rbac.authorization.k8s.io/v1", "kind": "Role", "metadata": {"name": "robot"}}),
        json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "RoleBinding",
            "metadata": {"name": "bind"},
            "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": "Role", "name": "robot"},
            "subjects": [
                {"kind": "ServiceAccount", "name": "robot"},
                {"kind": "User", "name": "robot"},
            ],
        }),
    ]);
    let map = PrefixSuffixTransformer::new("", "-v1").transform(map).unwrap();
    let out = transformer().transform(map).unwrap();
    let binding = find(&out, "RoleBinding");
    assert_eq!(binding.field(&["roleRef", "name"]), Some(&json!("robot-v1")));
    assert_eq!(
        binding.field(&["subjects"]),
        Some(&json!([
            {"kind": "ServiceAccount", "name": "robot-v1"},
            {"kind": "User", "name": "robot"},
        ]))
    );
}

#[rstest]
fn test_follows_chained_renames() {
    let map = map_of(vec![
        json!({"apiVersion": "v1", "kind": "Service", "metadata": {"name": "db"}}),
        json!({
            "apiVersion": "apps/v1",
            "kind": "StatefulSet",
            "metadata": {"name": "db"},
            "spec": {"serviceName": "db"},
        }),
    ]);
    let map = PrefixSuffixTransformer::new("base-", "").transform(map).unwrap();
    let map = transformer().transform(map).unwrap();
    let map = PrefixSuffixTransformer::new("prod-", "").transform(map).unwrap();
    let out = transformer().transform(map).unwrap();
    assert_eq!(
        find(&out, "StatefulSet").field(&["spec", "serviceName"]),
        Some(&json!("prod-base-db"))
    );
}

#[rstest]
fn test_no_references_is_identity() {
    let map = map_of(vec![
        json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}}),
        json!({"apiVersion": "v1", "kind": "Service", "metadata": {"name": "b"}, "spec": {"selector": {"app": "a"}}}),
    ]);
    let renamed = PrefixSuffixTransformer::new("x-", "").transform(map.clone()).unwrap();
    assert_eq!(transformer().transform(renamed.clone()).unwrap(), renamed);
    assert_eq!(transformer().transform(map.clone()).unwrap(), map);
}

#[rstest]
fn test_prefers_referee_in_same_namespace() {
    let map = map_of(vec![
        json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cfg", "namespace": "a"}}),
        json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "cfg", "namespace": "b"}}),
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "p", "namespace": "b"},
            "spec": {"volumes": [{"name": "v", "configMap": {"name": "cfg"}}]},
        }),
    ]);
    let mut out = PrefixSuffixTransformer::new("p-", "").transform(map).unwrap();
    for (id, res) in out.iter_mut() {
        if id.gvk().kind == "ConfigMap" && id.namespace() == Some("b") {
            res.set_name("p-cfg-b");
        }
    }
    let out = transformer().transform(out).unwrap();
    assert_eq!(
        find(&out, "Pod").field(&["spec", "volumes"]),
        Some(&json!([{"name": "v", "configMap": {"name": "p-cfg-b"}}]))
    );
}
