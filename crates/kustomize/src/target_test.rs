// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use rstest::{fixture, rstest};
use serde_json::{Value, json};

use super::*;
use crate::{FieldRef, MemoryLoader, ObjRef, Resource, ShellCommandRunner, Var, YamlCodec};

const KUSTOMIZATION: &str = r#"
apiVersion: v1beta1
kind: Kustomization
namePrefix: foo-
nameSuffix: -bar
namespace: ns1
commonLabels:
  app: nginx
commonAnnotations:
  note: This is a test annotation
resources:
  - deployment.yaml
  - namespace.yaml
configMapGenerator:
- name: literalConfigMap
  literals:
  - DB_USERNAME=admin
  - DB_PASSWORD=somepw
secretGenerator:
- name: secret
  commands:
    DB_USERNAME: "printf admin"
    DB_PASSWORD: "printf somepw"
  type: Opaque
patchesJson6902:
- target:
    group: apps
    version: v1
    kind: Deployment
    name: dply1
  path: jsonpatch.json
"#;

const SLOW_SECRET: &str = r#"
apiVersion: v1beta1
kind: Kustomization
secretGenerator:
- name: secret
  timeoutSeconds: 1
  commands:
    USER: "sleep 2"
  type: Opaque
"#;

const BASE_VARS: &str = r#"
vars:
  - name: AWARD
    objref:
      kind: Service
      name: nobelPrize
      apiVersion: v7
    fieldref:
      fieldpath: some.arbitrary.path
  - name: BIRD
    objref:
      kind: Service
      name: heron
      apiVersion: v300
"#;

#[fixture]
fn runner() -> ShellCommandRunner {
    ShellCommandRunner::new()
}

fn loader_at(root: &str, files: &[(&str, &str)]) -> Box<dyn Loader> {
    let mut loader = MemoryLoader::new(root);
    for (path, content) in files {
        loader.write_file(path, *content);
    }
    Box::new(loader)
}

fn testpath_loader() -> Box<dyn Loader> {
    loader_at(
        "/testpath",
        &[
            ("/testpath/kustomization.yaml", KUSTOMIZATION),
            (
                "/testpath/deployment.yaml",
                "apiVersion: apps/v1\nmetadata:\n  name: dply1\nkind: Deployment\n",
            ),
            (
                "/testpath/namespace.yaml",
                "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: ns1\n",
            ),
            (
                "/testpath/jsonpatch.json",
                r#"[
    {"op": "add", "path": "/spec/replica", "value": "3"}
]"#,
            ),
        ],
    )
}

fn find<'m>(map: &'m ResourceMap, kind: &str) -> (&'m crate::ResId, &'m Resource) {
    map.iter()
        .find(|(id, _)| id.gvk().kind == kind)
        .unwrap_or_else(|| panic!("Should contain a {kind}"))
}

fn var(name: &str, api_version: &str, kind: &str, target: &str, field_path: &str) -> Var {
    Var {
        name: name.to_string(),
        obj_ref: ObjRef {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: target.to_string(),
            namespace: None,
        },
        field_ref: FieldRef {
            field_path: field_path.to_string(),
        },
    }
}

#[rstest]
fn test_customized_resources(runner: ShellCommandRunner) {
    let codec = YamlCodec;
    let kt = KustTarget::new(testpath_loader(), &runner, &codec).expect("Should load directive");
    let map = kt.make_customized_res_map().expect("Should build resources");
    assert_eq!(map.len(), 4);

    let metadata = |name: &str, namespaced: bool| {
        let mut meta = json!({
            "name": name,
            "labels": {"app": "nginx"},
            "annotations": {"note": "This is a test annotation"},
        });
        if namespaced {
            meta["namespace"] = json!("ns1");
        }
        meta
    };

    let (id, deploy) = find(&map, "Deployment");
    assert_eq!(id.name(), "dply1");
    assert_eq!((id.prefix(), id.suffix()), ("foo-", "-bar"));
    assert_eq!(id.namespace(), Some("ns1"));
    assert_eq!(
        deploy.to_value(),
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": metadata("foo-dply1-bar", true),
            "spec": {
                "replica": "3",
                "selector": {"matchLabels": {"app": "nginx"}},
                "template": {
                    "metadata": {
                        "annotations": {"note": "This is a test annotation"},
                        "labels": {"app": "nginx"},
                    },
                },
            },
        })
    );

    let (id, cm) = find(&map, "ConfigMap");
    assert_eq!(id.name(), "literalConfigMap");
    assert_eq!(cm.behavior(), Behavior::Create);
    assert_eq!(
        cm.to_value(),
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": metadata("foo-literalConfigMap-bar-8d2dkb8k24", true),
            "data": {"DB_USERNAME": "admin", "DB_PASSWORD": "somepw"},
        })
    );

    let (_, secret) = find(&map, "Secret");
    assert_eq!(
        secret.to_value(),
        json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": metadata("foo-secret-bar-9btc7bt4kb", true),
            "type": "Opaque",
            "data": {"DB_USERNAME": "YWRtaW4=", "DB_PASSWORD": "c29tZXB3"},
        })
    );

    let (id, ns) = find(&map, "Namespace");
    assert_eq!(id.namespace(), None);
    assert_eq!(
        ns.to_value(),
        json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": metadata("foo-ns1-bar", false),
        })
    );
}

#[rstest]
fn test_resource_not_found(runner: ShellCommandRunner) {
    let loader = loader_at("/testpath", &[("kustomization.yaml", KUSTOMIZATION)]);
    let kt = KustTarget::new(loader, &runner, &YamlCodec).unwrap();
    let err = kt.make_customized_res_map().unwrap_err();
    assert!(err.to_string().contains("cannot read file"), "{err}");
}

#[rstest]
fn test_secret_timeout(runner: ShellCommandRunner) {
    let loader = loader_at("/testpath", &[("kustomization.yaml", SLOW_SECRET)]);
    let kt = KustTarget::new(loader, &runner, &YamlCodec).unwrap();
    let err = kt.make_customized_res_map().unwrap_err();
    assert!(err.to_string().contains("killed"), "{err}");
}

#[rstest]
fn test_disable_name_suffix_hash(runner: ShellCommandRunner) {
    let mut kt = KustTarget::new(testpath_loader(), &runner, &YamlCodec).unwrap();
    let map = kt.make_customized_res_map().unwrap();
    assert_eq!(find(&map, "Secret").1.name(), "foo-secret-bar-9btc7bt4kb");

    kt.kustomization.generator_options = Some(crate::GeneratorOptions {
        disable_name_suffix_hash: true,
        ..Default::default()
    });
    let map = kt.make_customized_res_map().unwrap();
    assert_eq!(find(&map, "Secret").1.name(), "foo-secret-bar");
}

#[rstest]
fn test_directories_that_share_a_prefix(runner: ShellCommandRunner) {
    let loader = loader_at(
        "/app/overlays/aws-sandbox2.us-east-1",
        &[
            ("/app/base/kustomization.yaml", ""),
            ("/app/overlays/aws/kustomization.yaml", "bases:\n- ../../base\n"),
            ("/app/overlays/aws-nonprod/kustomization.yaml", "bases:\n- ../aws\n"),
            (
                "/app/overlays/aws-sandbox2.us-east-1/kustomization.yaml",
                "bases:\n- ../aws-nonprod\n",
            ),
        ],
    );
    let kt = KustTarget::new(loader, &runner, &YamlCodec).unwrap();
    let map = kt.make_customized_res_map().expect("Should build nested bases");
    assert!(map.is_empty());
}

#[rstest]
fn test_get_all_vars_simple(runner: ShellCommandRunner) {
    let loader = loader_at("/app", &[("kustomization.yaml", BASE_VARS)]);
    let vars = KustTarget::new(loader, &runner, &YamlCodec)
        .unwrap()
        .get_all_vars()
        .expect("Should collect vars");
    let collected: Vec<_> = vars.into_iter().collect();
    assert_eq!(
        collected,
        vec![
            var("AWARD", "v7", "Service", "nobelPrize", "some.arbitrary.path"),
            var("BIRD", "v300", "Service", "heron", "metadata.name"),
        ]
    );
}

#[rstest]
fn test_get_all_vars_nested(runner: ShellCommandRunner) {
    let loader = loader_at(
        "/app/overlays/o2",
        &[
            ("/app/base/kustomization.yaml", BASE_VARS),
            (
                "/app/overlays/o1/kustomization.yaml",
                "vars:\n  - name: FRUIT\n    objref:\n      kind: Service\n      name: apple\nbases:\n- ../../base\n",
            ),
            (
                "/app/overlays/o2/kustomization.yaml",
                "vars:\n  - name: VEGETABLE\n    objref:\n      kind: Leafy\n      name: kale\nbases:\n- ../o1\n",
            ),
        ],
    );
    let vars = KustTarget::new(loader, &runner, &YamlCodec)
        .unwrap()
        .get_all_vars()
        .expect("Should collect nested vars");
    let collected: Vec<_> = vars.into_iter().collect();
    assert_eq!(
        collected,
        vec![
            var("AWARD", "v7", "Service", "nobelPrize", "some.arbitrary.path"),
            var("BIRD", "v300", "Service", "heron", "metadata.name"),
            var("FRUIT", "", "Service", "apple", "metadata.name"),
            var("VEGETABLE", "", "Leafy", "kale", "metadata.name"),
        ]
    );
}

#[rstest]
fn test_var_collisions_forbidden(runner: ShellCommandRunner) {
    let loader = loader_at(
        "/app/overlays/o2",
        &[
            ("/app/base/kustomization.yaml", BASE_VARS),
            (
                "/app/overlays/o1/kustomization.yaml",
                "vars:\n  - name: AWARD\n    objref:\n      kind: Service\n      name: academy\nbases:\n- ../../base\n",
            ),
            (
                "/app/overlays/o2/kustomization.yaml",
                "vars:\n  - name: VEGETABLE\n    objref:\n      kind: Leafy\n      name: kale\nbases:\n- ../o1\n",
            ),
        ],
    );
    let err = KustTarget::new(loader, &runner, &YamlCodec)
        .unwrap()
        .get_all_vars()
        .unwrap_err();
    assert!(matches!(err, Error::VarCollision { name } if name == "AWARD"));
}

#[rstest]
fn test_cyclic_bases(runner: ShellCommandRunner) {
    let loader = loader_at(
        "/app/a",
        &[
            ("/app/a/kustomization.yaml", "bases:\n- ../b\n"),
            ("/app/b/kustomization.yaml", "bases:\n- ../a\n"),
        ],
    );
    let kt = KustTarget::new(loader, &runner, &YamlCodec).unwrap();
    let err = kt.make_customized_res_map().unwrap_err();
    assert!(matches!(err, Error::CyclicBase(path) if path == std::path::Path::new("/app/a")));
}

#[rstest]
fn test_base_outside_sandbox(runner: ShellCommandRunner) {
    let mut loader = MemoryLoader::new("/app/overlay").with_sandbox("/app/overlay");
    loader.write_file("/app/overlay/kustomization.yaml", "bases:\n- ../base\n");
    loader.write_file("/app/base/kustomization.yaml", "");
    let kt = KustTarget::new(Box::new(loader), &runner, &YamlCodec).unwrap();
    assert!(matches!(
        kt.make_customized_res_map(),
        Err(Error::LoaderEscape { .. })
    ));
}

/// A base with a generated config map, a deployment that mounts it and a
/// service exposed through a var, plus an overlay that extends all three.
fn overlay_loader() -> Box<dyn Loader> {
    loader_at(
        "/app/overlay",
        &[
            (
                "/app/base/kustomization.yaml",
                r#"
namePrefix: base-
resources:
- deployment.yaml
- service.yaml
configMapGenerator:
- name: settings
  literals:
  - MODE=fast
vars:
- name: DB_SERVICE
  objref:
    kind: Service
    name: db
"#,
            ),
            (
                "/app/base/deployment.yaml",
                r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  template:
    spec:
      containers:
      - name: web
        image: nginx:1.19
        command: ["serve", "--db=$(DB_SERVICE)"]
        envFrom:
        - configMapRef:
            name: settings
"#,
            ),
            (
                "/app/base/service.yaml",
                "apiVersion: v1\nkind: Service\nmetadata:\n  name: db\n",
            ),
            (
                "/app/overlay/kustomization.yaml",
                r#"
namePrefix: prod-
namespace: prod
resources:
- ../base
configMapGenerator:
- name: settings
  behavior: merge
  literals:
  - REGION=eu
patchesStrategicMerge:
- replicas.yaml
images:
- name: nginx
  newTag: "1.25"
"#,
            ),
            (
                "/app/overlay/replicas.yaml",
                "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\nspec:\n  replicas: 3\n",
            ),
        ],
    )
}

#[rstest]
fn test_overlay_of_directory_resource(runner: ShellCommandRunner) {
    let kt = KustTarget::new(overlay_loader(), &runner, &YamlCodec).unwrap();
    let map = kt.make_customized_res_map().expect("Should build overlay");
    assert_eq!(map.len(), 3);

    let (_, cm) = find(&map, "ConfigMap");
    assert!(cm.name().starts_with("prod-base-settings-"), "{}", cm.name());
    assert_eq!(cm.name().len(), "prod-base-settings-".len() + 10);
    assert_eq!(cm.namespace(), Some("prod"));
    assert_eq!(cm.field(&["data"]), Some(&json!({"MODE": "fast", "REGION": "eu"})));

    let (_, svc) = find(&map, "Service");
    assert_eq!(svc.name(), "prod-base-db");

    let (_, deploy) = find(&map, "Deployment");
    assert_eq!(deploy.name(), "prod-base-web");
    assert_eq!(deploy.field(&["spec", "replicas"]), Some(&json!(3)));
    let container = &deploy.field(&["spec", "template", "spec", "containers"]).unwrap()[0];
    assert_eq!(container["image"], json!("nginx:1.25"));
    assert_eq!(container["command"], json!(["serve", "--db=prod-base-db"]));
    assert_eq!(
        container["envFrom"][0]["configMapRef"]["name"],
        Value::String(cm.name().to_string())
    );
}

#[rstest]
fn test_merge_without_base_resource(runner: ShellCommandRunner) {
    let loader = loader_at(
        "/app",
        &[(
            "kustomization.yaml",
            "configMapGenerator:\n- name: settings\n  behavior: merge\n  literals:\n  - A=1\n",
        )],
    );
    let kt = KustTarget::new(loader, &runner, &YamlCodec).unwrap();
    assert!(matches!(
        kt.make_customized_res_map(),
        Err(Error::MergeTargetMissing(_))
    ));
}

#[rstest]
fn test_ordered_output(runner: ShellCommandRunner) {
    let kt = KustTarget::new(testpath_loader(), &runner, &YamlCodec).unwrap();
    let map = kt.make_customized_res_map().unwrap();
    let kinds: Vec<_> = map
        .as_ordered_slice()
        .into_iter()
        .map(|res| res.gvk().kind)
        .collect();
    assert_eq!(kinds, vec!["Namespace", "ConfigMap", "Secret", "Deployment"]);
}

#[rstest]
fn test_bases_with_same_name_in_different_namespaces(runner: ShellCommandRunner) {
    let cm = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cfg\n";
    let loader = loader_at(
        "/app/overlay",
        &[
            ("/app/overlay/kustomization.yaml", "resources:\n- ../a\n- ../b\n"),
            ("/app/a/kustomization.yaml", "namespace: team-a\nresources:\n- cm.yaml\n"),
            ("/app/a/cm.yaml", cm),
            ("/app/b/kustomization.yaml", "resources:\n- cm.yaml\n"),
            ("/app/b/cm.yaml", cm),
        ],
    );
    let kt = KustTarget::new(loader, &runner, &YamlCodec).unwrap();
    let map = kt
        .make_customized_res_map()
        .expect("Should keep both config maps");
    assert_eq!(map.len(), 2);
    let mut namespaces: Vec<_> = map.iter().map(|(_, res)| res.namespace()).collect();
    namespaces.sort();
    assert_eq!(namespaces, vec![None, Some("team-a")]);
}

#[rstest]
fn test_base_configurations_reach_hashed_names(runner: ShellCommandRunner) {
    let loader = loader_at(
        "/app/overlay",
        &[
            ("/app/overlay/kustomization.yaml", "resources:\n- ../base\n"),
            (
                "/app/base/kustomization.yaml",
                r#"
configurations:
- refs.yaml
resources:
- app.yaml
configMapGenerator:
- name: settings
  literals:
  - MODE=fast
"#,
            ),
            (
                "/app/base/refs.yaml",
                r#"
nameReference:
- kind: ConfigMap
  version: v1
  fieldSpecs:
  - kind: MyApp
    path: spec/configName
"#,
            ),
            (
                "/app/base/app.yaml",
                r#"
apiVersion: example.com/v1
kind: MyApp
metadata:
  name: app
spec:
  configName: settings
"#,
            ),
        ],
    );
    let kt = KustTarget::new(loader, &runner, &YamlCodec).unwrap();
    let map = kt.make_customized_res_map().expect("Should build overlay");

    let (_, cm) = find(&map, "ConfigMap");
    assert!(cm.name().starts_with("settings-"), "{}", cm.name());
    let (_, app) = find(&map, "MyApp");
    assert_eq!(
        app.field(&["spec", "configName"]),
        Some(&Value::String(cm.name().to_string()))
    );
}
