use super::*;
use crate::reference::ReferenceState;
use crate::scope::SourceFile;
use camino::Utf8Path;
use serde_json::{Value, json};

fn tree(files: &[(&str, Value)]) -> ScopeTree {
    let mut tree = ScopeTree::new("/repo").expect("tree");
    for (path, body) in files {
        let path = Utf8Path::new(path);
        let dir = path.parent().expect("parent");
        let id = tree.ensure_dir(dir).expect("dir");
        tree.add_file(
            id,
            SourceFile {
                path: path.to_path_buf(),
                body: ConfigValue::from_json(body.clone()),
            },
        );
    }
    tree
}

fn resource_attr(resolution: &Resolution, module: &str, address: &str, attr: &str) -> ConfigValue {
    let record = resolution.registry.get(module).expect("module");
    record.resources[address]
        .config_map()
        .expect("config")[attr]
        .clone()
}

#[test]
fn whole_value_reference_keeps_type() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({
            "variable": {"count": {"default": 3}},
            "locals": {"n": "${var.count}"},
            "resource": {"aws_instance": {"web": {"count": "${local.n}"}}}
        }),
    )]);
    let r = resolve(&t, VariableOverrides::new());
    assert!(r.errors.is_empty(), "{:?}", r.errors);
    assert_eq!(resource_attr(&r, "app", "aws_instance.web", "count"), ConfigValue::from(3));
}

#[test]
fn partial_template_splices_text() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({
            "variable": {"env": {"default": "prod"}},
            "resource": {"aws_s3_bucket": {"logs": {"bucket": "sf-${var.env}-logs"}}}
        }),
    )]);
    let r = resolve(&t, VariableOverrides::new());
    assert_eq!(
        resource_attr(&r, "app", "aws_s3_bucket.logs", "bucket"),
        ConfigValue::from("sf-prod-logs")
    );
}

#[test]
fn nested_index_reference_resolves_inner_first() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({
            "locals": {
                "env": "prod",
                "vpc_ids": {"test": "vpc-1", "prod": "vpc-2"}
            },
            "resource": {"aws_instance": {"web": {"vpc_id": "${local.vpc_ids[local.env]}"}}}
        }),
    )]);
    let r = resolve(&t, VariableOverrides::new());
    assert_eq!(
        resource_attr(&r, "app", "aws_instance.web", "vpc_id"),
        ConfigValue::from("vpc-2")
    );
}

#[test]
fn module_outputs_resolve_across_modules() {
    let t = tree(&[
        (
            "/repo/app/main.tf",
            json!({
                "module": {"common": {"source": "../common"}},
                "resource": {"aws_s3_bucket": {"b": {"bucket": "sf-${module.common.account_name}"}}}
            }),
        ),
        (
            "/repo/common/outputs.tf",
            json!({"output": {"account_name": {"value": "acme"}}}),
        ),
    ]);
    let r = resolve(&t, VariableOverrides::new());
    assert!(r.errors.is_empty(), "{:?}", r.errors);
    assert_eq!(
        resource_attr(&r, "app", "aws_s3_bucket.b", "bucket"),
        ConfigValue::from("sf-acme")
    );
}

#[test]
fn invocation_parameters_override_callee_defaults() {
    let t = tree(&[
        (
            "/repo/app/main.tf",
            json!({
                "variable": {"base_cidr": {"default": "10.0.0.0/16"}},
                "module": {"net": {"source": "./net", "cidr": "${var.base_cidr}"}}
            }),
        ),
        (
            "/repo/app/net/main.tf",
            json!({
                "variable": {"cidr": {"default": "192.168.0.0/24"}},
                "resource": {"aws_vpc": {"main": {"cidr_block": "${var.cidr}"}}}
            }),
        ),
    ]);
    let r = resolve(&t, VariableOverrides::new());
    assert!(r.errors.is_empty(), "{:?}", r.errors);
    assert_eq!(
        resource_attr(&r, "net", "aws_vpc.main", "cidr_block"),
        ConfigValue::from("10.0.0.0/16")
    );
}

#[test]
fn self_reference_reports_exactly_one_error() {
    let t = tree(&[(
        "/repo/app/variables.tf",
        json!({"variable": {"a": {"default": "${var.a}"}}}),
    )]);
    let r = resolve(&t, VariableOverrides::new());
    assert_eq!(r.errors.len(), 1, "{:?}", r.errors);
    let error = &r.errors[0];
    assert!(error.message.contains("var.a"), "{}", error.message);
    assert_eq!(error.module_name, "app");
    assert_eq!(error.file_name, "/repo/app/variables.tf");
}

#[test]
fn missing_variable_is_reported_once_and_left_failed() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({"resource": {"aws_instance": {"web": {"ami": "${var.ami}"}}}}),
    )]);
    let r = resolve(&t, VariableOverrides::new());
    assert_eq!(r.errors.len(), 1);
    assert_eq!(
        r.errors[0].message,
        "Couldn't find a replacement for: var.ami in app"
    );
    let ConfigValue::Reference(template) = resource_attr(&r, "app", "aws_instance.web", "ami")
    else {
        panic!("expected unresolved reference");
    };
    assert!(
        template
            .interpolations()
            .all(|i| i.state == ReferenceState::Failed)
    );
}

#[test]
fn mutual_cycle_reports_a_single_error() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({"locals": {"a": "${local.b}", "b": "${local.a}"}}),
    )]);
    let r = resolve(&t, VariableOverrides::new());
    assert_eq!(r.errors.len(), 1, "{:?}", r.errors);
}

#[test]
fn data_references_need_overrides_and_stay_silent() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({"resource": {"aws_instance": {
            "web": {"ami": "${data.aws_ami.ubuntu.id}"},
            "db": {"ami": "${data.aws_ami.centos.id}"}
        }}}),
    )]);
    let overrides: VariableOverrides =
        [("data.aws_ami.ubuntu.id", ConfigValue::from("ami-123"))].into_iter().collect();
    let r = resolve(&t, overrides);
    assert!(r.errors.is_empty(), "{:?}", r.errors);
    assert_eq!(
        resource_attr(&r, "app", "aws_instance.web", "ami"),
        ConfigValue::from("ami-123")
    );
    assert!(!resource_attr(&r, "app", "aws_instance.db", "ami").is_resolved());
}

#[test]
fn workspace_comes_from_overrides() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({"resource": {"aws_s3_bucket": {"b": {"bucket": "logs-${terraform.workspace}"}}}}),
    )]);
    let overrides: VariableOverrides =
        [("terraform.workspace", ConfigValue::from("staging"))].into_iter().collect();
    let r = resolve(&t, overrides);
    assert_eq!(
        resource_attr(&r, "app", "aws_s3_bucket.b", "bucket"),
        ConfigValue::from("logs-staging")
    );

    let r = resolve(&t, VariableOverrides::new());
    assert_eq!(r.errors.len(), 1);
}

#[test]
fn variable_overrides_fill_undeclared_variables() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({
            "variable": {"env": {"default": "test"}},
            "resource": {"aws_instance": {"web": {"env": "${var.env}", "region": "${var.region}"}}}
        }),
    )]);
    let overrides: VariableOverrides = [
        ("env", ConfigValue::from("prod")),
        ("region", ConfigValue::from("us-east-1")),
    ]
    .into_iter()
    .collect();
    let r = resolve(&t, overrides);
    // Declared defaults win over overrides; overrides fill the gaps.
    assert_eq!(resource_attr(&r, "app", "aws_instance.web", "env"), ConfigValue::from("test"));
    assert_eq!(
        resource_attr(&r, "app", "aws_instance.web", "region"),
        ConfigValue::from("us-east-1")
    );
}

#[test]
fn functions_evaluate_after_arguments_resolve() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({
            "variable": {
                "names": {"default": ["a", "b"]},
                "extra": {"default": ["c"]},
                "empty": {"default": ""}
            },
            "resource": {"aws_instance": {"web": {
                "joined": "${join(\",\", var.names)}",
                "all": "${concat(var.names, var.extra)}",
                "second": "${element(var.names, 3)}",
                "first": "${coalesce(var.empty, \"fallback\")}",
                "tags": "${merge(map_a, var.extra)}"
            }}}
        }),
    )]);
    let r = resolve(&t, VariableOverrides::new());
    let attr = |name| resource_attr(&r, "app", "aws_instance.web", name);
    assert_eq!(attr("joined"), ConfigValue::from("a,b"));
    assert_eq!(attr("all"), ConfigValue::from(vec!["a", "b", "c"]));
    assert_eq!(attr("second"), ConfigValue::from("b"));
    assert_eq!(attr("first"), ConfigValue::from("fallback"));
    // Unknown identifiers make the whole expression unsupported.
    assert!(!attr("tags").is_resolved());
}

#[test]
fn arithmetic_evaluates_over_resolved_operands() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({
            "variable": {"n": {"default": 4}},
            "resource": {"aws_instance": {"web": {
                "double": "${var.n * 2}",
                "triple": ["${var.n}", "/", 8]
            }}}
        }),
    )]);
    let r = resolve(&t, VariableOverrides::new());
    assert_eq!(resource_attr(&r, "app", "aws_instance.web", "double"), ConfigValue::from(8));
    assert_eq!(
        resource_attr(&r, "app", "aws_instance.web", "triple"),
        ConfigValue::number_f64(0.5).expect("number")
    );
}

#[test]
fn unterminated_interpolation_is_reported() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({"resource": {"aws_instance": {"web": {"ami": "${var.ami"}}}}),
    )]);
    let r = resolve(&t, VariableOverrides::new());
    assert_eq!(r.errors.len(), 1);
    assert_eq!(r.errors[0].message, "Matching close brace not found: ${var.ami");
}

#[test]
fn unsupported_expressions_are_left_without_errors() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({"resource": {"aws_instance": {"web": {"ami": "${var.a == \"x\" ? 1 : 2}"}}}}),
    )]);
    let r = resolve(&t, VariableOverrides::new());
    assert!(r.errors.is_empty());
    assert_eq!(
        resource_attr(&r, "app", "aws_instance.web", "ami").to_text(),
        "${var.a == \"x\" ? 1 : 2}"
    );
}

#[test]
fn missing_module_output_names_the_module() {
    let t = tree(&[
        (
            "/repo/app/main.tf",
            json!({"resource": {"aws_instance": {"web": {"ami": "${module.common.nope}"}}}}),
        ),
        ("/repo/common/outputs.tf", json!({"output": {"id": {"value": "x"}}})),
    ]);
    let r = resolve(&t, VariableOverrides::new());
    assert_eq!(r.errors.len(), 1);
    assert_eq!(
        r.errors[0].message,
        "Error resolving variable: module.common.nope variable not found in module common"
    );
}

#[test]
fn resolution_is_idempotent() {
    let t = tree(&[
        (
            "/repo/app/main.tf",
            json!({
                "locals": {"env": "prod"},
                "module": {"net": {"source": "./net", "env": "${local.env}"}},
                "resource": {"aws_instance": {"web": {"ami": "${var.missing}"}}}
            }),
        ),
        (
            "/repo/app/net/main.tf",
            json!({"resource": {"aws_vpc": {"main": {"tags": {"env": "${var.env}"}}}}}),
        ),
    ]);
    let first = resolve(&t, VariableOverrides::new());
    let second = resolve(&t, VariableOverrides::new());
    let records = |r: &Resolution| r.registry.iter().cloned().collect::<Vec<_>>();
    assert_eq!(records(&first), records(&second));
    assert_eq!(first.errors, second.errors);
}

#[test]
fn registry_follows_discovery_order() {
    let t = tree(&[
        ("/repo/b/main.tf", json!({"locals": {"x": 1}})),
        ("/repo/a/main.tf", json!({"locals": {"y": 2}})),
    ]);
    let r = resolve(&t, VariableOverrides::new());
    let names: Vec<&str> = r.registry.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["b", "a"]);
}

#[test]
fn resolve_named_works_on_a_single_module() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({"variable": {"env": {"default": "prod"}}, "locals": {"e": "${var.env}"}}),
    )]);
    let mut ctx = ResolutionContext::new(&t, VariableOverrides::new());
    let record = ctx.resolve_named("app").expect("app");
    assert_eq!(record.locals["e"].value, ConfigValue::from("prod"));
    assert_eq!(ctx.pass(), Pass::First);
    assert!(ctx.errors().is_empty());
}

#[test]
fn coalescelist_splat_picks_first_non_empty_list() {
    let t = tree(&[(
        "/repo/app/main.tf",
        json!({
            "variable": {"lists": {"default": [[], ["x"]]}},
            "locals": {"picked": "${coalescelist(var.lists...)}"}
        }),
    )]);
    let r = resolve(&t, VariableOverrides::new());
    assert!(r.errors.is_empty(), "{:?}", r.errors);
    let record = r.registry.get("app").expect("module");
    assert_eq!(record.locals["picked"].value, ConfigValue::from(vec!["x"]));
}
