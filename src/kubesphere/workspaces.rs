//! Workspace enumeration
//!
//! Lists every workspace template with the member clusters it is placed on.
//! The list is not paginated.

use std::collections::HashSet;

use tracing::{debug, error, info};

use crate::error::EnumError;
use crate::http::{join_url, HttpClient, HttpRequest};
use crate::kubesphere::types::WorkspaceTemplateList;
use crate::kubesphere::Session;

pub const WORKSPACE_TEMPLATES_PATH: &str = "apis/tenant.kubesphere.io/v1alpha2/workspacetemplates";

/// A workspace and the clusters it is placed on, in API order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePlacement {
    pub workspace: String,
    pub clusters: Vec<String>,
}

impl WorkspacePlacement {
    pub fn is_placed(&self) -> bool {
        !self.clusters.is_empty()
    }
}

impl From<WorkspaceTemplateList> for Vec<WorkspacePlacement> {
    fn from(list: WorkspaceTemplateList) -> Self {
        list.items
            .unwrap_or_default()
            .into_iter()
            .map(|template| {
                let mut seen = HashSet::new();
                let clusters = template
                    .placement_clusters()
                    .filter(|name| !name.is_empty())
                    .filter(|name| seen.insert(name.to_string()))
                    .map(str::to_owned)
                    .collect();
                WorkspacePlacement {
                    workspace: template.metadata.name,
                    clusters,
                }
            })
            .collect()
    }
}

/// List all workspaces and their placements
///
/// Cluster names are de-duplicated within a workspace so that a pair is
/// never processed twice in one run.
///
/// # Errors
///
/// - [`EnumError::Transport`] if the request could not be sent
/// - [`EnumError::BadStatus`] if the endpoint did not answer 200
/// - [`EnumError::MalformedResponse`] if the body is not a template list
pub async fn list_workspaces(
    http: &HttpClient,
    session: &Session,
) -> Result<Vec<WorkspacePlacement>, EnumError> {
    let url = join_url(session.base_url(), WORKSPACE_TEMPLATES_PATH);
    debug!(%url, "listing workspace templates");

    let request = HttpRequest::get(url.as_str())
        .header("Content-Type", "application/json")
        .header("Authorization", session.token().header_value());

    let response = http.send(request).await.map_err(|e| {
        error!(%url, error = %e, "workspace listing request failed");
        EnumError::Transport(e)
    })?;

    if !response.is_ok() {
        error!(%url, status = response.status, "workspace listing answered with error status");
        return Err(EnumError::BadStatus(response.status));
    }

    let list: WorkspaceTemplateList = serde_json::from_slice(&response.body).map_err(|e| {
        error!(%url, error = %e, "workspace listing could not be decoded");
        EnumError::MalformedResponse(e)
    })?;

    let placements: Vec<WorkspacePlacement> = list.into();
    info!(
        workspaces = placements.len(),
        placed = placements.iter().filter(|p| p.is_placed()).count(),
        "enumerated workspaces"
    );
    Ok(placements)
}
