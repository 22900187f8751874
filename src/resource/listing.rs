//! Listing calls
//!
//! Maps each resource kind to the concrete REST API call that lists it
//! for one project.

use super::kind::ResourceKind;
use crate::gcp::auth::IamAuthorization;
use crate::gcp::client::GcpClient;
use anyhow::Result;
use serde_json::{json, Value};

/// Snapshots are sampled: only the most recent ones per project
pub const SNAPSHOT_SAMPLE_SIZE: u32 = 10;

/// List the raw compute records of `kind` in a project.
///
/// Instances and disks use the aggregated (all zones) endpoints; firewalls
/// and snapshots are global. Every endpoint except snapshots is followed
/// through all pages.
pub async fn list_compute(
    client: &GcpClient,
    kind: ResourceKind,
    project_id: &str,
) -> Result<Vec<Value>> {
    match kind {
        ResourceKind::Vm => {
            let url = client.compute_aggregated_url(project_id, "instances");
            list_all_pages(client, &url, true).await
        }
        ResourceKind::Disk => {
            let url = client.compute_aggregated_url(project_id, "disks");
            list_all_pages(client, &url, true).await
        }
        ResourceKind::Firewall => {
            let url = client.compute_global_url(project_id, "firewalls");
            list_all_pages(client, &url, false).await
        }
        ResourceKind::Snapshot => {
            let url = add_query_params(
                &client.compute_global_url(project_id, "snapshots"),
                &json!({
                    "maxResults": SNAPSHOT_SAMPLE_SIZE.to_string(),
                    "orderBy": "creationTimestamp desc",
                }),
            );
            let response = client.get(&url).await?;
            Ok(items(&response))
        }
        ResourceKind::IamBinding => Err(anyhow::anyhow!(
            "IAM bindings are not listed through the compute API"
        )),
    }
}

/// Fetch a project's IAM policy using the shared authorization handle
pub async fn get_iam_policy(
    client: &GcpClient,
    auth: &IamAuthorization,
    project_id: &str,
) -> Result<Value> {
    let url = client.resourcemanager_url(&format!("projects/{}:getIamPolicy", project_id));
    let response = client
        .post_with_token(&url, auth.token(), Some(&json!({})))
        .await?;
    Ok(response)
}

async fn list_all_pages(client: &GcpClient, url: &str, aggregated: bool) -> Result<Vec<Value>> {
    let mut all_items = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page_url = match &page_token {
            Some(token) => add_query_params(url, &json!({ "pageToken": token })),
            None => url.to_string(),
        };

        let mut response = client.get(&page_url).await?;
        if aggregated {
            response = flatten_aggregated_response(response);
        }
        all_items.extend(items(&response));

        page_token = response
            .get("nextPageToken")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        if page_token.is_none() {
            break;
        }
    }

    Ok(all_items)
}

fn items(response: &Value) -> Vec<Value> {
    response
        .get("items")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

fn add_query_params(url: &str, params: &Value) -> String {
    let Value::Object(map) = params else {
        return url.to_string();
    };

    let query_parts: Vec<String> = map
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_str()
                .map(|s| format!("{}={}", key, urlencoding::encode(s)))
        })
        .collect();

    if query_parts.is_empty() {
        url.to_string()
    } else if url.contains('?') {
        format!("{}&{}", url, query_parts.join("&"))
    } else {
        format!("{}?{}", url, query_parts.join("&"))
    }
}

/// Flatten an aggregated API response into a standard list response.
/// Aggregated responses have format:
/// { "items": { "zones/us-central1-a": { "instances": [...] }, ... } }
/// We flatten to: { "items": [...all instances...], "nextPageToken": ... }
fn flatten_aggregated_response(response: Value) -> Value {
    let next_token = response.get("nextPageToken").cloned();

    let Some(scopes) = response.get("items").and_then(|v| v.as_object()) else {
        return json!({ "items": [], "nextPageToken": next_token });
    };

    let mut all_items: Vec<Value> = Vec::new();

    for (_scope, scope_data) in scopes {
        if let Some(obj) = scope_data.as_object() {
            for (key, value) in obj {
                // Scopes without resources only carry a warning
                if key == "warning" {
                    continue;
                }
                if let Some(arr) = value.as_array() {
                    all_items.extend(arr.iter().cloned());
                }
            }
        }
    }

    json!({ "items": all_items, "nextPageToken": next_token })
}
