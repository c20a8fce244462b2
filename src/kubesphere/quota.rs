//! Workspace resource quota retrieval
//!
//! Each member cluster exposes the workspace quota through the host cluster's
//! `kapis` proxy. The quota object is named after its workspace.

use tracing::{debug, warn};

use crate::error::FetchError;
use crate::event::QuotaSnapshot;
use crate::http::{join_url, HttpClient, HttpRequest};
use crate::kubesphere::types::ResourceQuota;
use crate::kubesphere::Session;
use crate::normalize::{normalize, uses_fallback, FallbackUsage};

/// Path of the quota of `workspace` on `cluster`
pub fn quota_path(cluster: &str, workspace: &str) -> String {
    format!(
        "kapis/clusters/{cluster}/tenant.kubesphere.io/v1alpha2/workspaces/{workspace}/resourcequotas/{workspace}"
    )
}

/// Fetch and normalize the quota of one (workspace, cluster) pair
///
/// A non-200 answer is reported without looking at the body.
///
/// # Errors
///
/// - [`FetchError::Transport`] if the request could not be sent
/// - [`FetchError::BadStatus`] if the endpoint did not answer 200
/// - [`FetchError::MalformedResponse`] if the body is not a resource quota
pub async fn fetch_quota(
    http: &HttpClient,
    session: &Session,
    workspace: &str,
    cluster: &str,
    fallback: &FallbackUsage,
) -> Result<QuotaSnapshot, FetchError> {
    let url = join_url(session.base_url(), &quota_path(cluster, workspace));
    debug!(%workspace, %cluster, %url, "fetching resource quota");

    let request = HttpRequest::get(url.as_str())
        .header("Content-Type", "application/json")
        .header("Authorization", session.token().header_value());

    let response = http.send(request).await.map_err(|e| {
        warn!(%workspace, %cluster, error = %e, "quota request failed");
        FetchError::Transport(e)
    })?;

    if !response.is_ok() {
        warn!(%workspace, %cluster, status = response.status, "quota endpoint answered with error status");
        return Err(FetchError::BadStatus(response.status));
    }

    let quota: ResourceQuota = serde_json::from_slice(&response.body).map_err(|e| {
        warn!(%workspace, %cluster, error = %e, "quota response could not be decoded");
        FetchError::MalformedResponse(e)
    })?;

    if uses_fallback(&quota) {
        debug!(%workspace, %cluster, "usage not aggregated yet, publishing declared limits");
    }

    Ok(QuotaSnapshot::new(workspace, cluster, normalize(&quota, fallback)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http() -> HttpClient {
        HttpClient::new(Duration::from_secs(2), false).unwrap()
    }

    #[test]
    fn test_quota_path() {
        assert_eq!(
            quota_path("c1", "ws-a"),
            "kapis/clusters/c1/tenant.kubesphere.io/v1alpha2/workspaces/ws-a/resourcequotas/ws-a"
        );
    }

    #[tokio::test]
    async fn test_fetch_quota_live_total() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{}", quota_path("c1", "ws-a"))))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metadata": {"name": "ws-a"},
                "spec": {"quota": {"hard": {"limits.cpu": "8"}}},
                "status": {"total": {"hard": {"cpu": "4"}, "used": {"cpu": "1"}}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session::for_tests(&server.uri(), "tok");
        let snapshot = fetch_quota(&http(), &session, "ws-a", "c1", &FallbackUsage::default())
            .await
            .unwrap();

        assert_eq!(snapshot.workspace, "ws-a");
        assert_eq!(snapshot.cluster, "c1");
        assert_eq!(snapshot.quota.hard["cpu"], "4");
        assert_eq!(snapshot.quota.used["cpu"], "1");
        assert_eq!(snapshot.quota.used.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_quota_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metadata": {"name": "ws-a"},
                "spec": {"quota": {"hard": {"limits.cpu": "8", "limits.memory": "16Gi"}}}
            })))
            .mount(&server)
            .await;

        let session = Session::for_tests(&server.uri(), "tok");
        let snapshot = fetch_quota(&http(), &session, "ws-a", "c2", &FallbackUsage::default())
            .await
            .unwrap();

        assert_eq!(snapshot.quota.hard["limits.memory"], "16Gi");
        assert_eq!(snapshot.quota.used, FallbackUsage::default().to_map());
    }

    #[tokio::test]
    async fn test_fetch_quota_bad_status_skips_decode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not json"))
            .mount(&server)
            .await;

        let session = Session::for_tests(&server.uri(), "tok");
        let err = fetch_quota(&http(), &session, "ws-a", "c1", &FallbackUsage::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::BadStatus(404)));
    }

    #[tokio::test]
    async fn test_fetch_quota_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"spec":"oops"}"#))
            .mount(&server)
            .await;

        let session = Session::for_tests(&server.uri(), "tok");
        let err = fetch_quota(&http(), &session, "ws-a", "c1", &FallbackUsage::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_fetch_quota_transport_failure() {
        // Nothing listens on the discard port
        let session = Session::for_tests("http://127.0.0.1:9", "tok");
        let err = fetch_quota(&http(), &session, "ws-a", "c1", &FallbackUsage::default())
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
        assert_eq!(err.reason(), "transport");
    }
}
