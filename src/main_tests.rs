//! Unit tests for the `vpcform` CLI binary implementation.

use super::*;
use rstest::rstest;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vpcform::test_support::config_for_endpoint;

async fn mock_client() -> (MockServer, VpcClient) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/identity/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "cli-token",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;
    let client = VpcClient::new(&config_for_endpoint(&server.uri()))
        .unwrap_or_else(|err| panic!("client should build: {err}"));
    (server, client)
}

fn list_command(kind: ListKind, group: Option<&str>, name: Option<&str>) -> ListCommand {
    ListCommand {
        kind,
        name: name.map(str::to_owned),
        tag: None,
        group: group.map(str::to_owned),
    }
}

#[rstest]
#[case::address("10.0.0.5", json!({ "address": "10.0.0.5" }))]
#[case::cidr("10.0.0.0/24", json!({ "cidr_block": "10.0.0.0/24" }))]
#[case::group("r006-sg", json!({ "id": "r006-sg" }))]
fn classify_renders_one_field(#[case] value: &str, #[case] expected: Value) {
    let rendered = classify(value).unwrap_or_else(|err| panic!("classify failed: {err}"));

    assert_eq!(rendered, expected);
}

#[rstest]
#[case::rules_need_group(ListKind::SecurityGroupRule, None, None)]
#[case::rules_have_no_names(ListKind::SecurityGroupRule, Some("sg-1"), Some("web"))]
#[case::group_only_for_rules(ListKind::FloatingIp, Some("sg-1"), None)]
fn list_arguments_are_checked(
    #[case] kind: ListKind,
    #[case] group: Option<&str>,
    #[case] name: Option<&str>,
) {
    let err = check_list_args(&list_command(kind, group, name)).expect_err("usage error");

    assert!(matches!(err, CliError::Usage(_)), "unexpected error: {err}");
}

#[rstest]
#[case::rules(ListKind::SecurityGroupRule, Some("sg-1"), None)]
#[case::named(ListKind::BackupPolicy, None, Some("nightly"))]
fn valid_list_arguments_pass(
    #[case] kind: ListKind,
    #[case] group: Option<&str>,
    #[case] name: Option<&str>,
) {
    assert!(check_list_args(&list_command(kind, group, name)).is_ok());
}

#[test]
fn cli_parses_apply_with_id() {
    let cli = Cli::try_parse_from([
        "vpcform",
        "apply",
        "floating-ip",
        "--file",
        "fip.json",
        "--id",
        "fip-1",
    ])
    .unwrap_or_else(|err| panic!("parse failed: {err}"));

    let Cli::Apply(command) = cli else {
        panic!("expected the apply subcommand");
    };
    assert_eq!(command.kind, ResourceKind::FloatingIp);
    assert_eq!(command.file, "fip.json");
    assert_eq!(command.id.as_deref(), Some("fip-1"));
}

#[test]
fn cli_rejects_unknown_kind() {
    assert!(Cli::try_parse_from(["vpcform", "read", "instance", "i-1"]).is_err());
}

#[tokio::test]
async fn read_of_missing_resource_is_null() {
    let (server, client) = mock_client().await;
    Mock::given(method("GET"))
        .and(path("/floating_ips/fip-9"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let output = run(&FloatingIps::new(client), Op::Read(String::from("fip-9")))
        .await
        .unwrap_or_else(|err| panic!("read failed: {err}"));

    assert_eq!(output, Value::Null);
}

#[tokio::test]
async fn exists_reports_presence() {
    let (server, client) = mock_client().await;
    Mock::given(method("GET"))
        .and(path("/public_gateways/pgw-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pgw-1",
            "name": "edge",
            "status": "available"
        })))
        .mount(&server)
        .await;

    let output = run(&PublicGateways::new(client), Op::Exists(String::from("pgw-1")))
        .await
        .unwrap_or_else(|err| panic!("exists failed: {err}"));

    assert_eq!(output, json!({ "id": "pgw-1", "exists": true }));
}

#[tokio::test]
async fn apply_reports_missing_manifest() {
    let (_server, client) = mock_client().await;
    let op = Op::Apply {
        file: Utf8PathBuf::from("does-not-exist/backup.json"),
        id: None,
    };

    let err = run(&BackupPolicies::new(client), op)
        .await
        .expect_err("manifest is missing");

    assert!(
        matches!(err, CliError::Manifest(ManifestError::Read { .. })),
        "unexpected error: {err}"
    );
}

#[test]
fn write_output_pretty_prints() {
    let mut buf = Vec::new();
    write_output(&mut buf, &json!({ "id": "fip-1" }))
        .unwrap_or_else(|err| panic!("write failed: {err}"));

    let rendered = String::from_utf8(buf).expect("utf8");
    assert_eq!(rendered, "{\n  \"id\": \"fip-1\"\n}\n");
}

#[test]
fn write_error_writes_cli_error() {
    let mut buf = Vec::new();
    let err = CliError::Usage(String::from("--group is required"));
    write_error(&mut buf, &err);
    let rendered = String::from_utf8(buf).expect("utf8");
    assert!(
        rendered.contains("invalid usage: --group is required"),
        "rendered: {rendered}"
    );
}
