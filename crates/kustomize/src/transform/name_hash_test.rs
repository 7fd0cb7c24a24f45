// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::rstest;
use serde_json::json;

use super::*;
use crate::Resource;

#[rstest]
fn test_only_flagged_resources_are_hashed() {
    let mut cm = Resource::from_value(json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {"name": "cm"},
        "data": {"a": "1"},
    }))
    .unwrap();
    cm.set_needs_hash(true);
    let svc = Resource::from_value(json!({"apiVersion": "v1", "kind": "Service", "metadata": {"name": "svc"}})).unwrap();

    let mut map = ResourceMap::new();
    map.add(cm).unwrap();
    map.add(svc).unwrap();
    let out = NameHashTransformer.transform(map).expect("Should hash names");

    let names: Vec<(String, String)> = out
        .iter()
        .map(|(id, res)| (id.current_name(), res.name().to_string()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("cm-9hfg4tdfc6".to_string(), "cm-9hfg4tdfc6".to_string()),
            ("svc".to_string(), "svc".to_string()),
        ]
    );

    let again = NameHashTransformer.transform(out.clone()).unwrap();
    assert_eq!(again, out);
    let (_, hashed) = out.iter().next().unwrap();
    assert!(hashed.answers_to("cm"));
    assert!(!hashed.needs_hash());
}
