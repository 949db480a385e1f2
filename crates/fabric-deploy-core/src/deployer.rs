//! Per-item upload of content definitions.
//!
//! Each item is sent as a single inline base64 definition part. Creation is
//! fire-and-forget: a 202 means provisioning was accepted and is not polled.
//! A failing item never stops the batch.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{error, info, warn};

use crate::client::{FabricClient, Listing};
use crate::error::Result;
use crate::model::{
    ContentItem, CreateItemRequest, DefinitionPart, DeploymentOutcome, ItemDefinition,
};
use crate::token::Token;

pub const MANUAL_GRANT_HINT: &str =
    "service principal needs workspace permissions (assign a role manually)";

#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Pause between consecutive create calls.
    pub delay: Duration,
    /// List the workspace first and skip items whose name and type exist.
    pub skip_existing: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            skip_existing: false,
        }
    }
}

/// Read the item's definition file and wrap it into a create request.
pub fn build_request(item: &ContentItem) -> std::io::Result<CreateItemRequest> {
    let raw = std::fs::read(&item.definition_path)?;
    Ok(CreateItemRequest {
        display_name: item.display_name.clone(),
        item_type: item.item_type,
        definition: ItemDefinition {
            parts: vec![DefinitionPart {
                path: item.logical_file.clone(),
                payload: BASE64.encode(raw),
                payload_type: item.payload_type,
            }],
        },
    })
}

/// Upload one item. Expected failures come back as an unsuccessful outcome;
/// only transport errors are returned as `Err`.
pub async fn deploy_one(
    client: &FabricClient,
    token: &Token,
    workspace_id: &str,
    item: &ContentItem,
) -> Result<DeploymentOutcome> {
    let request = match build_request(item) {
        Ok(request) => request,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(item = %item.display_name, path = %item.definition_path.display(), "definition file not found");
            return Ok(DeploymentOutcome::failure(
                item.clone(),
                None,
                format!("file not found: {}", item.definition_path.display()),
            ));
        }
        Err(e) => {
            warn!(item = %item.display_name, error = %e, "cannot read definition file");
            return Ok(DeploymentOutcome::failure(
                item.clone(),
                None,
                format!("cannot read {}: {e}", item.definition_path.display()),
            ));
        }
    };

    let resp = client.create_item(token, workspace_id, &request).await?;
    match resp.status {
        200 | 201 | 202 => {
            info!(item = %item.display_name, item_type = %item.item_type, status = resp.status, "item created");
            Ok(DeploymentOutcome::success(item.clone(), Some(resp.status)))
        }
        401 => {
            error!(item = %item.display_name, status = 401, "{MANUAL_GRANT_HINT}");
            Ok(DeploymentOutcome::failure(
                item.clone(),
                Some(401),
                format!("{MANUAL_GRANT_HINT}: {}", resp.error_message()),
            ))
        }
        status => {
            error!(item = %item.display_name, status, detail = %resp.error_message(), "item creation failed");
            Ok(DeploymentOutcome::failure(
                item.clone(),
                Some(status),
                resp.body,
            ))
        }
    }
}

/// Names of items already present in the workspace, keyed by
/// `(lowercased display name, type)`.
async fn existing_items(
    client: &FabricClient,
    token: &Token,
    workspace_id: &str,
) -> HashSet<(String, String)> {
    match client.list_items(token, workspace_id).await {
        Ok(Listing::Items(items)) => items
            .into_iter()
            .map(|i| (i.display_name.to_lowercase(), i.item_type))
            .collect(),
        Ok(Listing::Rejected(resp)) => {
            warn!(status = resp.status, "cannot list workspace items; deploying all");
            HashSet::new()
        }
        Err(e) => {
            warn!(error = %e, "cannot list workspace items; deploying all");
            HashSet::new()
        }
    }
}

/// Deploy every item in order, pausing between create calls. Always returns
/// one outcome per item.
pub async fn deploy_all(
    client: &FabricClient,
    token: &Token,
    workspace_id: &str,
    items: &[ContentItem],
    options: &DeployOptions,
) -> Vec<DeploymentOutcome> {
    let existing = if options.skip_existing {
        existing_items(client, token, workspace_id).await
    } else {
        HashSet::new()
    };

    let mut outcomes = Vec::with_capacity(items.len());
    let mut issued_call = false;
    for item in items {
        let key = (
            item.display_name.to_lowercase(),
            item.item_type.as_str().to_string(),
        );
        if existing.contains(&key) {
            info!(item = %item.display_name, item_type = %item.item_type, "item already exists; skipping");
            let mut outcome = DeploymentOutcome::success(item.clone(), None);
            outcome.error_detail = Some("already exists".to_string());
            outcomes.push(outcome);
            continue;
        }

        if issued_call && !options.delay.is_zero() {
            tokio::time::sleep(options.delay).await;
        }
        let outcome = match deploy_one(client, token, workspace_id, item).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(item = %item.display_name, error = %e, "item deployment aborted");
                DeploymentOutcome::failure(item.clone(), None, e.to_string())
            }
        };
        issued_call |= outcome.http_status.is_some();
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ContentCatalog;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;
    use std::path::Path;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token() -> Token {
        Token::new("t", crate::token::FABRIC_SCOPE)
    }

    fn write_item(root: &Path, dir: &str, file: &str, content: &[u8]) {
        let path = root.join(dir);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join(file), content).unwrap();
    }

    fn no_delay() -> DeployOptions {
        DeployOptions {
            delay: Duration::ZERO,
            skip_existing: false,
        }
    }

    #[test]
    fn request_wraps_base64_definition_part() {
        let dir = tempfile::tempdir().unwrap();
        write_item(dir.path(), "Sales.Report", "definition.pbir", b"{\"version\":\"1.0\"}");
        let item = ContentCatalog::new(dir.path()).discover().unwrap().remove(0);

        let request = build_request(&item).unwrap();
        assert_json_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "displayName": "Sales",
                "type": "Report",
                "definition": {
                    "parts": [{
                        "path": "definition.pbir",
                        "payload": "eyJ2ZXJzaW9uIjoiMS4wIn0=",
                        "payloadType": "InlineBase64"
                    }]
                }
            })
        );
    }

    #[tokio::test]
    async fn accepted_status_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/workspaces/ws-1/items"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        write_item(dir.path(), "Bronze.Lakehouse", "lakehouse.metadata.json", b"{}");
        let item = ContentCatalog::new(dir.path()).discover().unwrap().remove(0);

        let client = FabricClient::new(&server.uri(), &server.uri());
        let outcome = deploy_one(&client, &token(), "ws-1", &item).await.unwrap();
        assert!(outcome.succeeded);
        assert_eq!(outcome.http_status, Some(202));
    }

    #[tokio::test]
    async fn unauthorized_carries_manual_grant_hint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/workspaces/ws-1/items"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        write_item(dir.path(), "Sales.Report", "definition.pbir", b"{}");
        let item = ContentCatalog::new(dir.path()).discover().unwrap().remove(0);

        let client = FabricClient::new(&server.uri(), &server.uri());
        let outcome = deploy_one(&client, &token(), "ws-1", &item).await.unwrap();
        assert!(!outcome.succeeded);
        assert_eq!(outcome.http_status, Some(401));
        assert!(outcome.error_detail.unwrap().contains(MANUAL_GRANT_HINT));
    }

    #[tokio::test]
    async fn missing_definition_skips_call_and_batch_continues() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/workspaces/ws-1/items"))
            .respond_with(ResponseTemplate::new(201))
            .expect(4)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        write_item(dir.path(), "A.Report", "definition.pbir", b"{}");
        write_item(dir.path(), "B.Report", "definition.pbir", b"{}");
        std::fs::create_dir_all(dir.path().join("C.Report")).unwrap();
        write_item(dir.path(), "D.Report", "definition.pbir", b"{}");
        write_item(dir.path(), "E.Report", "definition.pbir", b"{}");
        let items = ContentCatalog::new(dir.path()).discover().unwrap();

        let client = FabricClient::new(&server.uri(), &server.uri());
        let outcomes = deploy_all(&client, &token(), "ws-1", &items, &no_delay()).await;
        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes.iter().filter(|o| o.succeeded).count(), 4);
        assert!(!outcomes[2].succeeded);
        assert!(outcomes[2].error_detail.as_deref().unwrap().starts_with("file not found"));
    }

    #[tokio::test]
    async fn unreachable_api_fails_each_item_and_batch_continues() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let dir = tempfile::tempdir().unwrap();
        write_item(dir.path(), "A.Report", "definition.pbir", b"{}");
        write_item(dir.path(), "B.Report", "definition.pbir", b"{}");
        write_item(dir.path(), "C.Report", "definition.pbir", b"{}");
        let items = ContentCatalog::new(dir.path()).discover().unwrap();

        let base = format!("http://127.0.0.1:{port}");
        let client = FabricClient::new(&base, &base);
        let outcomes = deploy_all(&client, &token(), "ws-1", &items, &no_delay()).await;

        assert_eq!(outcomes.len(), 3);
        for (outcome, name) in outcomes.iter().zip(["A", "B", "C"]) {
            assert_eq!(outcome.item.display_name, name);
            assert!(!outcome.succeeded);
            assert_eq!(outcome.http_status, None);
            assert!(outcome.error_detail.as_deref().unwrap().contains("create item"));
        }
    }

    #[tokio::test]
    async fn delay_separates_consecutive_create_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/workspaces/ws-1/items"))
            .respond_with(ResponseTemplate::new(201))
            .expect(3)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        write_item(dir.path(), "A.Report", "definition.pbir", b"{}");
        write_item(dir.path(), "B.Report", "definition.pbir", b"{}");
        write_item(dir.path(), "C.Report", "definition.pbir", b"{}");
        let items = ContentCatalog::new(dir.path()).discover().unwrap();

        let client = FabricClient::new(&server.uri(), &server.uri());
        let options = DeployOptions {
            delay: Duration::from_millis(50),
            skip_existing: false,
        };
        let started = std::time::Instant::now();
        let outcomes = deploy_all(&client, &token(), "ws-1", &items, &options).await;

        assert!(outcomes.iter().all(|o| o.succeeded));
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn existing_items_are_skipped_when_enabled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/workspaces/ws-1/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{ "id": "i-1", "displayName": "sales", "type": "Report" }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/workspaces/ws-1/items"))
            .and(body_partial_json(json!({ "displayName": "Sales", "type": "SemanticModel" })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        write_item(dir.path(), "Sales.Report", "definition.pbir", b"{}");
        write_item(dir.path(), "Sales.SemanticModel", "definition.pbism", b"{}");
        let items = ContentCatalog::new(dir.path()).discover().unwrap();

        let client = FabricClient::new(&server.uri(), &server.uri());
        let options = DeployOptions {
            skip_existing: true,
            ..no_delay()
        };
        let outcomes = deploy_all(&client, &token(), "ws-1", &items, &options).await;
        assert!(outcomes.iter().all(|o| o.succeeded));
        assert_eq!(outcomes[0].error_detail.as_deref(), Some("already exists"));
        assert_eq!(outcomes[1].http_status, Some(201));
    }
}
