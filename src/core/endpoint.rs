use crate::utils::error::{NetilionError, Result};
use std::fmt;

/// Path templates of the Netilion technical API, relative to `api_url`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Units,
    Unit,
    Assets,
    Asset,
    AssetValues,
    AssetValuesByKey,
    AssetSystems,
    AssetHealthConditions,
    HealthCondition,
    AssetDocuments,
    AssetSpecifications,
    ClientApplications,
    ClientApplication,
    ClientApplicationCurrent,
    Webhooks,
    Webhook,
    Permissions,
    Nodes,
    NodeSpecifications,
    NodeAssets,
    Documents,
    Attachments,
    Attachment,
    AttachmentDownload,
}

impl Endpoint {
    pub fn template(&self) -> &'static str {
        match self {
            Endpoint::Units => "/units",
            Endpoint::Unit => "/units/{unit_id}",
            Endpoint::Assets => "/assets",
            Endpoint::Asset => "/assets/{asset_id}",
            Endpoint::AssetValues => "/assets/{asset_id}/values",
            Endpoint::AssetValuesByKey => "/assets/{asset_id}/values/{key}",
            Endpoint::AssetSystems => "/assets/{asset_id}/systems",
            Endpoint::AssetHealthConditions => "/assets/{asset_id}/health_conditions",
            Endpoint::HealthCondition => "/health_conditions/{health_condition_id}",
            Endpoint::AssetDocuments => "/assets/{asset_id}/documents",
            Endpoint::AssetSpecifications => "/assets/{asset_id}/specifications",
            Endpoint::ClientApplications => "/client_applications",
            Endpoint::ClientApplication => "/client_applications/{application_id}",
            Endpoint::ClientApplicationCurrent => "/client_applications/current",
            Endpoint::Webhooks => "/client_applications/{application_id}/webhooks",
            Endpoint::Webhook => "/client_applications/{application_id}/webhooks/{webhook_id}",
            Endpoint::Permissions => "/permissions",
            Endpoint::Nodes => "/nodes",
            Endpoint::NodeSpecifications => "/nodes/{node_id}/specifications",
            Endpoint::NodeAssets => "/nodes/{node_id}/assets",
            Endpoint::Documents => "/documents",
            Endpoint::Attachments => "/attachments",
            Endpoint::Attachment => "/attachments/{attachment_id}",
            Endpoint::AttachmentDownload => "/attachments/{attachment_id}/download",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template())
    }
}

/// Joins `api_url` with the endpoint template and fills in `{name}` placeholders.
pub fn construct_url(
    api_url: &str,
    endpoint: Endpoint,
    params: &[(&str, String)],
) -> Result<String> {
    let mut path = endpoint.template().to_string();
    for (name, value) in params {
        path = path.replace(&format!("{{{}}}", name), value);
    }

    if path.contains('{') && path.contains('}') {
        tracing::error!("📡 Unresolved parameters in endpoint: {}", path);
        let message = format!("unresolved parameters in endpoint {}", path);
        return Err(NetilionError::malformed_request(message));
    }

    let api_url = api_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Ok(format!("{}/{}", api_url, path))
}
