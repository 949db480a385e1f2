use std::fs;
use std::path::Path;

use fabric_deploy_core::config::{BindingConfig, Credentials, EndpointsConfig, SourceConfig};
use fabric_deploy_core::{
    BindingOutcome, ClientSecretCredential, DeployConfig, DeployError, Orchestrator,
    PrincipalKind, Role, WorkspaceResolution,
};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/tenant-1/oauth2/v2.0/token";

fn source_tree(items: &[(&str, Option<&str>)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let dev = dir.path().join("Development");
    fs::create_dir(&dev).unwrap();
    for (name, file) in items {
        let item_dir = dev.join(name);
        fs::create_dir(&item_dir).unwrap();
        if let Some(file) = file {
            fs::write(item_dir.join(file), b"{}").unwrap();
        }
    }
    dir
}

fn config(server: &MockServer, source: &Path) -> DeployConfig {
    let base = server.uri();
    let mut cfg = DeployConfig {
        credentials: Credentials {
            tenant_id: "tenant-1".into(),
            client_id: "client-1".into(),
            client_secret: "secret".into(),
        },
        endpoints: EndpointsConfig {
            authority: base.clone(),
            fabric_api: format!("{base}/v1"),
            powerbi_api: format!("{base}/pbi"),
            graph_api: format!("{base}/graph"),
            ..EndpointsConfig::default()
        },
        source: SourceConfig {
            path: Some(source.to_path_buf()),
            ..SourceConfig::default()
        },
        ..DeployConfig::default()
    };
    cfg.workspace.name = "Prod".into();
    cfg.workspace.capacity_id = Some("cap-1".into());
    cfg.deploy.item_delay_ms = 0;
    cfg
}

async fn mount_tokens(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("graph.microsoft.com"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access_token": "graph-token" })),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("api.fabric.microsoft.com"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access_token": "fabric-token" })),
        )
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_workspace_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/workspaces"))
        .and(header("Authorization", "Bearer fabric-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": "ws-1", "displayName": "prod" }]
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/workspaces"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_run_survives_partial_failures() {
    let server = MockServer::start().await;
    mount_tokens(&server).await;
    mount_workspace_listing(&server).await;

    Mock::given(method("GET"))
        .and(path("/v1/workspaces/ws-1/roleAssignments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "principal": { "id": "P1", "type": "User" }, "role": "Admin" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/graph/users/ada@example.com"))
        .and(header("Authorization", "Bearer graph-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "obj-ada" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws-1/roleAssignments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws-1/items"))
        .and(header("Authorization", "Bearer fabric-token"))
        .respond_with(ResponseTemplate::new(201))
        .expect(4)
        .mount(&server)
        .await;

    let tree = source_tree(&[
        ("A.Report", Some("definition.pbir")),
        ("B.SemanticModel", Some("definition.pbism")),
        ("C.Report", None),
        ("D.Lakehouse", Some("lakehouse.metadata.json")),
        ("E.Notebook", Some("E.ipynb")),
        ("notes", None),
    ]);
    let mut cfg = config(&server, tree.path());
    cfg.bindings = vec![
        BindingConfig {
            principal: "P1".into(),
            principal_type: PrincipalKind::User,
            role: Role::Admin,
        },
        BindingConfig {
            principal: "ada@example.com".into(),
            principal_type: PrincipalKind::User,
            role: Role::Contributor,
        },
    ];

    let tokens = ClientSecretCredential::new(&cfg.endpoints.authority, cfg.credentials.clone());
    let summary = Orchestrator::new(&cfg, &tokens)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert!(matches!(summary.workspace, WorkspaceResolution::Found(ref ws) if ws.id == "ws-1"));
    assert_eq!(summary.bindings.results[0].outcome, BindingOutcome::AlreadyPresent);
    assert_eq!(summary.bindings.results[1].outcome, BindingOutcome::Created);
    assert_eq!(summary.bindings.before.len(), 1);
    assert_eq!(summary.succeeded(), 4);
    assert_eq!(summary.total(), 5);
    assert!(!summary.is_complete());
}

#[tokio::test]
async fn empty_catalogue_aborts_but_keeps_binding_report() {
    let server = MockServer::start().await;
    mount_tokens(&server).await;
    mount_workspace_listing(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/workspaces/ws-1/roleAssignments"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws-1/roleAssignments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws-1/items"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let tree = source_tree(&[("readme", None)]);
    let mut cfg = config(&server, tree.path());
    cfg.bindings = vec![BindingConfig {
        principal: "P2".into(),
        principal_type: PrincipalKind::Group,
        role: Role::Member,
    }];
    let tokens = ClientSecretCredential::new(&cfg.endpoints.authority, cfg.credentials.clone());
    let failure = Orchestrator::new(&cfg, &tokens)
        .unwrap()
        .run()
        .await
        .unwrap_err();
    assert!(matches!(failure.error, DeployError::Source(_)));

    let report = failure.bindings.expect("binding report");
    assert!(report.listing_denied);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].outcome, BindingOutcome::Created);
}

#[tokio::test]
async fn missing_item_folder_keeps_binding_report() {
    let server = MockServer::start().await;
    mount_tokens(&server).await;
    mount_workspace_listing(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/workspaces/ws-1/roleAssignments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(&server)
        .await;

    let tree = tempfile::tempdir().unwrap();
    let cfg = config(&server, tree.path());
    let tokens = ClientSecretCredential::new(&cfg.endpoints.authority, cfg.credentials.clone());
    let failure = Orchestrator::new(&cfg, &tokens)
        .unwrap()
        .run()
        .await
        .unwrap_err();
    assert!(matches!(failure.error, DeployError::Source(_)));
    assert!(failure.bindings.is_some());
}

#[tokio::test]
async fn token_failure_aborts_before_any_api_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "unauthorized_client"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/workspaces"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tree = source_tree(&[("A.Report", Some("definition.pbir"))]);
    let cfg = config(&server, tree.path());
    let tokens = ClientSecretCredential::new(&cfg.endpoints.authority, cfg.credentials.clone());
    let err = Orchestrator::new(&cfg, &tokens)
        .unwrap()
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err.error, DeployError::Auth(_)));
    assert!(err.bindings.is_none());
}

#[tokio::test]
async fn workspace_creation_failure_is_fatal() {
    let server = MockServer::start().await;
    mount_tokens(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/workspaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/workspaces"))
        .respond_with(ResponseTemplate::new(500).set_body_string("capacity unavailable"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws-1/items"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let tree = source_tree(&[("A.Report", Some("definition.pbir"))]);
    let cfg = config(&server, tree.path());
    let tokens = ClientSecretCredential::new(&cfg.endpoints.authority, cfg.credentials.clone());
    let err = Orchestrator::new(&cfg, &tokens)
        .unwrap()
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err.error, DeployError::Resource(_)));
}

#[tokio::test]
async fn skip_flag_bypasses_role_assignment() {
    let server = MockServer::start().await;
    mount_tokens(&server).await;
    mount_workspace_listing(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/workspaces/ws-1/roleAssignments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/workspaces/ws-1/items"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let tree = source_tree(&[("A.Report", Some("definition.pbir"))]);
    let mut cfg = config(&server, tree.path());
    cfg.deploy.skip_role_assignment = true;
    cfg.bindings = vec![BindingConfig {
        principal: "P9".into(),
        principal_type: PrincipalKind::Group,
        role: Role::Viewer,
    }];

    let tokens = ClientSecretCredential::new(&cfg.endpoints.authority, cfg.credentials.clone());
    let summary = Orchestrator::new(&cfg, &tokens)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(summary.bindings.results[0].outcome, BindingOutcome::Skipped);
    assert!(summary.is_complete());
}
