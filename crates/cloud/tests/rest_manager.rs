use cloud::{CloudError, ResourceManager, RestConfig, RestResourceManager};
use landing_zone_core::resource_types::{PRIVATE_ENDPOINT, VIRTUAL_NETWORK};
use landing_zone_core::{ContainerRef, ResourceSpec};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn container() -> ContainerRef {
    ContainerRef {
        tenant_id: Uuid::nil(),
        subscription_id: Uuid::nil(),
        resource_group: "mrg".to_string(),
        region: "eastus".to_string(),
    }
}

fn manager(server: &MockServer) -> RestResourceManager {
    RestResourceManager::new(RestConfig {
        base_url: server.uri(),
        token: Some("secret".to_string()),
        ..RestConfig::default()
    })
}

fn scope() -> String {
    container().scope()
}

#[tokio::test]
async fn test_list_resources_follows_next_link() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/resources", scope())))
        .and(query_param("api-version", "2021-04-01"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": format!("{}/providers/{}/vnet-1", scope(), VIRTUAL_NETWORK),
                "name": "vnet-1",
                "type": VIRTUAL_NETWORK,
                "location": "eastus",
                "tags": { "WLZ-ID": "lz-1" }
            }],
            "nextLink": format!("{}/page-2", server.uri())
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": format!("{}/providers/Microsoft.OperationsManagement/solutions/s", scope()),
                "name": "s",
                "type": "Microsoft.OperationsManagement/solutions",
                "location": "eastus",
                "tags": null
            }]
        })))
        .mount(&server)
        .await;

    let resources = manager(&server).list_resources(&container()).await.unwrap();

    assert_eq!(resources.len(), 2);
    assert_eq!(resources[0].region, "eastus");
    assert_eq!(resources[0].tags.get("WLZ-ID").map(String::as_str), Some("lz-1"));
    assert!(resources[1].tags.is_empty());
}

#[tokio::test]
async fn test_list_private_endpoints_reads_connection_targets() {
    let server = MockServer::start().await;
    let target = format!(
        "{}/providers/Microsoft.DBforPostgreSQL/flexibleServers/pg",
        scope()
    );

    Mock::given(method("GET"))
        .and(path(format!("{}/providers/{}", scope(), PRIVATE_ENDPOINT)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": format!("{}/providers/{}/pe-1", scope(), PRIVATE_ENDPOINT),
                "name": "pe-1",
                "type": PRIVATE_ENDPOINT,
                "location": "eastus",
                "properties": {
                    "privateLinkServiceConnections": [
                        { "properties": { "privateLinkServiceId": target } }
                    ]
                }
            }]
        })))
        .mount(&server)
        .await;

    let endpoints = manager(&server)
        .list_private_endpoints(&container())
        .await
        .unwrap();

    assert_eq!(endpoints.len(), 1);
    assert!(endpoints[0].targets(&target.to_uppercase()));
}

#[tokio::test]
async fn test_create_sends_if_none_match() {
    let server = MockServer::start().await;
    let spec = ResourceSpec::new(VIRTUAL_NETWORK, "vnet-1", "eastus").with_tag("WLZ-ID", "lz-1");
    let id = spec.resource_id(&container());

    Mock::given(method("PUT"))
        .and(path(id.clone()))
        .and(header("if-none-match", "*"))
        .and(body_partial_json(json!({ "location": "eastus", "tags": { "WLZ-ID": "lz-1" } })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": id,
            "name": "vnet-1",
            "type": VIRTUAL_NETWORK,
            "location": "eastus",
            "tags": { "WLZ-ID": "lz-1" },
            "properties": { "provisioningState": "Succeeded" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = manager(&server)
        .create_resource(&container(), &spec)
        .await
        .unwrap();

    assert_eq!(created.id, id);
    assert_eq!(created.properties["provisioningState"], "Succeeded");
}

#[tokio::test]
async fn test_create_existing_resource_is_conflict() {
    let server = MockServer::start().await;
    let spec = ResourceSpec::new(VIRTUAL_NETWORK, "vnet-1", "eastus");

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({
            "error": { "code": "PreconditionFailed", "message": "exists" }
        })))
        .mount(&server)
        .await;

    let result = manager(&server).create_resource(&container(), &spec).await;

    assert!(matches!(result, Err(CloudError::Conflict(_))));
}

#[tokio::test]
async fn test_delete_errors_are_classified() {
    let server = MockServer::start().await;
    let missing = format!("{}/providers/{}/gone", scope(), VIRTUAL_NETWORK);
    let busy = format!("{}/providers/{}/busy", scope(), VIRTUAL_NETWORK);

    Mock::given(method("DELETE"))
        .and(path(missing.clone()))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "ResourceNotFound", "message": "not here" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(busy.clone()))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let manager = manager(&server);

    assert!(manager.delete_by_id(&missing).await.unwrap_err().is_not_found());
    assert!(manager.delete_by_id(&busy).await.unwrap_err().is_retryable());
}

#[tokio::test]
async fn test_network_link_delete_uses_dns_api_version() {
    let server = MockServer::start().await;
    let link = format!(
        "{}/providers/Microsoft.Network/privateDnsZones/zone/virtualNetworkLinks/link",
        scope()
    );

    Mock::given(method("DELETE"))
        .and(path(link.clone()))
        .and(query_param("api-version", "2020-06-01"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    manager(&server).delete_network_link(&link).await.unwrap();
}
