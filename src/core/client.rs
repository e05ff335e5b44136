use crate::config::ConfigurationParameters;
use crate::core::auth::{fetch_token, AccessToken};
use crate::core::endpoint::{construct_url, Endpoint};
use crate::domain::model::{
    Asset, AssetHealthCondition, AssetSystem, AssetValue, AssetValues, AssetValuesByKey,
    Attachment, ClientApplication, Document, DocumentClassification, DocumentStatus, Node,
    NodeSpecification, Pagination, Specification, Unit, WebHook,
};
use crate::domain::ports::ApiObject;
use crate::utils::error::{describe_response, NetilionError, Result};
use crate::utils::logger::TIMING_TARGET;
use crate::utils::validation::is_below;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::convert::identity;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const HISTORY_PAGE_SIZE: u32 = 1000;
const HISTORY_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Client for the Netilion technical API, acting as one technical user.
pub struct NetilionClient {
    config: ConfigurationParameters,
    http: reqwest::Client,
    token: Mutex<Option<AccessToken>>,
    my_application: Mutex<Option<ClientApplication>>,
}

async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| {
        tracing::warn!("HTTP {} response is not JSON: {}", status.as_u16(), e);
        let message = format!("HTTP {}: invalid JSON body: {}", status.as_u16(), e);
        NetilionError::malformed_response(message)
    })
}

async fn describe_failure(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    describe_response(status, &body)
}

fn id_param(name: &'static str, id: u64) -> (&'static str, String) {
    (name, id.to_string())
}

impl NetilionClient {
    pub fn new(config: ConfigurationParameters) -> Result<Self> {
        let application = config
            .client_application_name
            .as_deref()
            .unwrap_or("unnamed application");
        tracing::debug!(
            "Starting Netilion client (-> {}): {}, {}",
            config.endpoint,
            application,
            config.client_id
        );
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;
        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
            my_application: Mutex::new(None),
        })
    }

    pub fn configuration(&self) -> &ConfigurationParameters {
        &self.config
    }

    pub fn construct_url(&self, endpoint: Endpoint, params: &[(&str, String)]) -> Result<String> {
        construct_url(&self.config.api_url, endpoint, params)
    }

    /// Returns a bearer token, fetching a new one when there is none or the
    /// current one has expired.
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        let now = Utc::now().timestamp();
        match guard.as_ref() {
            Some(token) if !token.is_expired_at(now) => {
                tracing::debug!(
                    "Access token still valid for {} seconds",
                    token.expires_at() - now
                );
                return Ok(token.access_token.clone());
            }
            Some(token) => {
                tracing::info!(
                    "Refreshing token (expired {} seconds ago)",
                    now - token.expires_at()
                );
            }
            None => {}
        }

        let token = fetch_token(&self.http, &self.config).await?;
        let access_token = token.access_token.clone();
        *guard = Some(token);
        Ok(access_token)
    }

    /// Sends an authorized request to a URL below the configured endpoint.
    pub async fn request<F>(&self, method: Method, url: &str, customize: F) -> Result<Response>
    where
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        if !is_below(&self.config.endpoint, url) {
            tracing::error!("❌ Refusing request to non-Netilion URL {}", url);
            return Err(NetilionError::ForeignUrl {
                url: url.to_string(),
            });
        }

        let token = self.access_token().await?;
        let request = self
            .http
            .request(method.clone(), url)
            .header("Api-Key", &self.config.client_id)
            .bearer_auth(token);

        let started = Instant::now();
        let response = customize(request).send().await?;
        tracing::debug!(
            target: TIMING_TARGET,
            "{} to {} took {:.2} seconds",
            method,
            url,
            started.elapsed().as_secs_f64()
        );
        Ok(response)
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request(Method::GET, url, identity).await
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self
            .request(Method::GET, url, |request| request.query(query))
            .await?;
        read_json(response).await
    }

    /// Collects a list across all pages by following `pagination.next`.
    /// Stops at the first link to a page that was already read.
    async fn get_all<T: ApiObject>(
        &self,
        url: &str,
        query: &[(&str, String)],
        under_key: &str,
    ) -> Result<Vec<T>> {
        let mut body = self.get_json(url, query).await?;
        let mut visited = HashSet::from([url.to_string()]);
        let mut items = Vec::new();
        loop {
            let next = body
                .pointer("/pagination/next")
                .and_then(Value::as_str)
                .map(str::to_string);
            items.extend(T::parse_multiple_from_api(body, under_key)?);

            let next = match next {
                Some(next) if !next.is_empty() => next,
                _ => return Ok(items),
            };
            if !visited.insert(next.clone()) {
                tracing::warn!("Pagination links back to {}, stopping", next);
                return Ok(items);
            }
            tracing::debug!("📡 Following pagination to {}", next);
            body = self.get_json(&next, &[]).await?;
        }
    }

    async fn get_one<T: ApiObject>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let body = self.get_json(url, query).await?;
        T::parse_from_api(body).map_err(|err| {
            tracing::error!("{}", err);
            err
        })
    }

    async fn find_single<T: ApiObject>(
        &self,
        url: &str,
        query: &[(&str, String)],
        under_key: &str,
        what: &str,
    ) -> Result<Option<T>> {
        let mut found = self.get_all::<T>(url, query, under_key).await?;
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            count => {
                let err = NetilionError::invalid_state(format!(
                    "Received {} {} for {:?}",
                    count, under_key, what
                ));
                tracing::error!("{}", err);
                Err(err)
            }
        }
    }

    /// Sends `body` and turns any status of 300 or above into a
    /// `MalformedRequest` carrying the API's errors.
    async fn submit(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Response> {
        let response = self
            .request(method, url, |request| match body {
                Some(body) => request.json(body),
                None => request,
            })
            .await?;
        if response.status().as_u16() >= 300 {
            let message = describe_failure(response).await;
            tracing::error!("❌ Request to {} rejected: {}", url, message);
            return Err(NetilionError::malformed_request(message));
        }
        Ok(response)
    }

    // ----- client applications -----

    pub async fn get_applications(&self) -> Result<Vec<ClientApplication>> {
        let url = self.construct_url(Endpoint::ClientApplications, &[])?;
        self.get_all(&url, &[], "client_applications").await
    }

    pub async fn get_application(&self, application_id: u64) -> Result<ClientApplication> {
        let url = self.construct_url(
            Endpoint::ClientApplication,
            &[id_param("application_id", application_id)],
        )?;
        self.get_one(&url, &[]).await
    }

    /// The client application this client acts as. Taken from the
    /// configuration when it names one, asked from the API otherwise.
    pub async fn get_my_application(&self) -> Result<ClientApplication> {
        let mut cached = self.my_application.lock().await;
        if let Some(app) = cached.as_ref() {
            return Ok(app.clone());
        }
        if let (Some(id), Some(name)) = (
            self.config.client_application_id,
            self.config.client_application_name.as_ref(),
        ) {
            return Ok(ClientApplication::new(name.clone(), id));
        }

        let url = self.construct_url(Endpoint::ClientApplicationCurrent, &[])?;
        let app: ClientApplication = self.get_one(&url, &[]).await?;
        tracing::info!("Determined this application to be {}", app);
        *cached = Some(app.clone());
        Ok(app)
    }

    async fn my_application_param(&self) -> Result<(&'static str, String)> {
        let app = self.get_my_application().await?;
        Ok(id_param("application_id", app.id))
    }

    // ----- webhooks -----

    pub async fn get_webhooks(&self) -> Result<Vec<WebHook>> {
        let app = self.my_application_param().await?;
        let url = self.construct_url(Endpoint::Webhooks, &[app])?;
        self.get_all(&url, &[], "webhooks").await
    }

    pub async fn get_webhook(&self, webhook_id: u64) -> Result<WebHook> {
        let app = self.my_application_param().await?;
        let hook = id_param("webhook_id", webhook_id);
        let url = self.construct_url(Endpoint::Webhook, &[app, hook])?;
        self.get_one(&url, &[]).await
    }

    pub async fn set_webhook(&self, webhook: &WebHook) -> Result<WebHook> {
        let app = self.my_application_param().await?;
        let url = self.construct_url(Endpoint::Webhooks, &[app])?;
        let body = webhook.to_api_json();
        let response = self.submit(Method::POST, &url, Some(&body)).await?;
        WebHook::parse_from_api(read_json(response).await?)
    }

    pub async fn delete_webhook(&self, webhook: &WebHook) -> Result<()> {
        let webhook_id = webhook.id.ok_or_else(|| {
            NetilionError::malformed_request(format!("{} has no id to delete", webhook))
        })?;
        let app = self.my_application_param().await?;
        let hook = id_param("webhook_id", webhook_id);
        let url = self.construct_url(Endpoint::Webhook, &[app, hook])?;
        let response = self.request(Method::DELETE, &url, identity).await?;
        if response.status() != StatusCode::NO_CONTENT {
            return Err(NetilionError::malformed_response(describe_failure(response).await));
        }
        Ok(())
    }

    // ----- assets -----

    pub async fn get_assets(&self) -> Result<Vec<Asset>> {
        let url = self.construct_url(Endpoint::Assets, &[])?;
        self.get_all(&url, &[], "assets").await
    }

    pub async fn get_asset(&self, asset_id: u64) -> Result<Asset> {
        let url = self.construct_url(Endpoint::Asset, &[id_param("asset_id", asset_id)])?;
        self.get_one(&url, &[]).await
    }

    pub async fn find_asset(&self, serial_number: &str) -> Result<Option<Asset>> {
        let url = self.construct_url(Endpoint::Assets, &[])?;
        self.find_single(
            &url,
            &[("serial_number", serial_number.to_string())],
            "assets",
            serial_number,
        )
        .await
    }

    pub async fn create_asset(&self, serial_number: &str, product_id: u64) -> Result<Asset> {
        let url = self.construct_url(Endpoint::Assets, &[])?;
        let body = json!({"serial_number": serial_number, "product": {"id": product_id}});
        let response = self
            .request(Method::POST, &url, |request| request.json(&body))
            .await?;
        Asset::parse_from_api(read_json(response).await?)
    }

    pub async fn delete_asset(&self, asset_id: u64) -> Result<()> {
        let url = self.construct_url(Endpoint::Asset, &[id_param("asset_id", asset_id)])?;
        let response = self.request(Method::DELETE, &url, identity).await?;
        let status = response.status();
        if status.is_client_error() {
            return Err(NetilionError::malformed_request(describe_failure(response).await));
        }
        if status != StatusCode::NO_CONTENT {
            return Err(NetilionError::invalid_state(describe_failure(response).await));
        }
        Ok(())
    }

    // ----- asset values -----

    pub async fn get_asset_values(&self, asset_id: u64) -> Result<Vec<AssetValue>> {
        let url = self.construct_url(Endpoint::AssetValues, &[id_param("asset_id", asset_id)])?;
        self.get_all(&url, &[], "values").await
    }

    pub async fn push_asset_values(&self, asset_values: &AssetValues) -> Result<()> {
        tracing::info!("POSTing asset values: {}", asset_values);
        // the asset is part of the URL
        let payload = json!({"values": asset_values.to_api_json()["values"]});
        tracing::debug!("{}", payload);

        let url = self.construct_url(
            Endpoint::AssetValues,
            &[id_param("asset_id", asset_values.asset.id)],
        )?;
        let response = self
            .request(Method::POST, &url, |request| request.json(&payload))
            .await?;
        let status = response.status();
        if status.as_u16() >= 300 {
            tracing::error!("Received bad server response: {}", status.as_u16());
            return Err(NetilionError::malformed_response(describe_failure(response).await));
        }
        tracing::debug!("POST confirmed: {}", status.as_u16());
        Ok(())
    }

    pub async fn get_asset_values_history(
        &self,
        asset_id: u64,
        key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<(Vec<AssetValuesByKey>, Pagination)> {
        let url = self.construct_url(
            Endpoint::AssetValuesByKey,
            &[id_param("asset_id", asset_id), ("key", key.to_string())],
        )?;
        let query = [
            ("from", from.format(HISTORY_TIMESTAMP_FORMAT).to_string()),
            ("to", to.format(HISTORY_TIMESTAMP_FORMAT).to_string()),
            ("page", "1".to_string()),
            ("per_page", HISTORY_PAGE_SIZE.to_string()),
        ];
        let body = self.get_json(&url, &query).await?;
        let pagination = Pagination::parse_from_api(body.clone())?;
        let values = AssetValuesByKey::parse_multiple_from_api(body, "data")?;
        Ok((values, pagination))
    }

    /// Values of `key` up to `to`, newest first.
    pub async fn get_last_asset_values(
        &self,
        asset_id: u64,
        key: &str,
        to: DateTime<Utc>,
        from: Option<DateTime<Utc>>,
    ) -> Result<Vec<AssetValuesByKey>> {
        let url = self.construct_url(
            Endpoint::AssetValuesByKey,
            &[id_param("asset_id", asset_id), ("key", key.to_string())],
        )?;
        let mut query = vec![
            ("to", to.format(HISTORY_TIMESTAMP_FORMAT).to_string()),
            ("order_by", "-timestamp".to_string()),
        ];
        if let Some(from) = from {
            query.push(("from", from.format(HISTORY_TIMESTAMP_FORMAT).to_string()));
        }
        let body = self.get_json(&url, &query).await?;
        AssetValuesByKey::parse_multiple_from_api(body, "data")
    }

    // ----- units -----

    pub async fn find_unit(&self, code: &str) -> Result<Option<Unit>> {
        let url = self.construct_url(Endpoint::Units, &[])?;
        self.find_single(&url, &[("code", code.to_string())], "units", code)
            .await
    }

    pub async fn get_unit(&self, unit_id: u64) -> Result<Unit> {
        let url = self.construct_url(Endpoint::Unit, &[id_param("unit_id", unit_id)])?;
        self.get_one(&url, &[]).await
    }

    // ----- permissions -----

    /// Grants `user_id` read and update rights on the asset.
    pub async fn set_rw_permissions(&self, asset_id: u64, user_id: u64) -> Result<bool> {
        let url = self.construct_url(Endpoint::Permissions, &[])?;
        let body = json!({
            "permission_type": ["can_read", "can_update"],
            "assignable": {"id": user_id, "type": "User"},
            "permitable": {"id": asset_id, "type": "Asset"},
        });
        let response = self
            .request(Method::POST, &url, |request| request.json(&body))
            .await?;
        if response.status().as_u16() >= 300 {
            let message = describe_failure(response).await;
            tracing::error!(
                "Unable to set permissions for user {} on asset {}: {}",
                user_id,
                asset_id,
                message
            );
            return Ok(false);
        }
        Ok(true)
    }

    // ----- systems and health conditions -----

    pub async fn get_asset_systems(&self, asset_id: u64) -> Result<Vec<AssetSystem>> {
        let url = self.construct_url(Endpoint::AssetSystems, &[id_param("asset_id", asset_id)])?;
        let query = [("include", "specifications".to_string())];
        self.get_all(&url, &query, "systems").await
    }

    pub async fn get_asset_health_conditions(
        &self,
        asset_id: u64,
    ) -> Result<Vec<AssetHealthCondition>> {
        let url = self.construct_url(
            Endpoint::AssetHealthConditions,
            &[id_param("asset_id", asset_id)],
        )?;
        self.get_all(&url, &[], "health_conditions").await
    }

    pub async fn get_asset_health_condition(
        &self,
        health_condition_id: u64,
    ) -> Result<AssetHealthCondition> {
        let url = self.construct_url(
            Endpoint::HealthCondition,
            &[id_param("health_condition_id", health_condition_id)],
        )?;
        self.get_one(&url, &[]).await
    }

    fn health_conditions_body(ids: &[u64]) -> Value {
        let conditions: Vec<Value> = ids.iter().map(|id| json!({"id": id})).collect();
        json!({"health_conditions": conditions})
    }

    pub async fn post_asset_health_conditions(&self, asset_id: u64, ids: &[u64]) -> Result<()> {
        let url = self.construct_url(
            Endpoint::AssetHealthConditions,
            &[id_param("asset_id", asset_id)],
        )?;
        let body = Self::health_conditions_body(ids);
        self.submit(Method::POST, &url, Some(&body)).await?;
        Ok(())
    }

    pub async fn delete_asset_health_conditions(&self, asset_id: u64, ids: &[u64]) -> Result<()> {
        let url = self.construct_url(
            Endpoint::AssetHealthConditions,
            &[id_param("asset_id", asset_id)],
        )?;
        let body = Self::health_conditions_body(ids);
        self.submit(Method::DELETE, &url, Some(&body)).await?;
        Ok(())
    }

    // ----- nodes -----

    pub async fn get_nodes(&self) -> Result<Vec<Node>> {
        let url = self.construct_url(Endpoint::Nodes, &[])?;
        self.get_all(&url, &[], "nodes").await
    }

    pub async fn get_node_assets(&self, node_id: u64) -> Result<Vec<Asset>> {
        let url = self.construct_url(Endpoint::NodeAssets, &[id_param("node_id", node_id)])?;
        self.get_all(&url, &[], "assets").await
    }

    /// Nodes named `name`, hidden ones included, with their specifications.
    pub async fn get_node_specifications(&self, name: &str) -> Result<Vec<NodeSpecification>> {
        let url = self.construct_url(Endpoint::Nodes, &[])?;
        let query = [
            ("name", name.to_string()),
            ("include", "hidden,specifications".to_string()),
        ];
        self.get_all(&url, &query, "nodes").await
    }

    /// Creates a hidden node.
    pub async fn post_node(&self, name: &str) -> Result<Node> {
        let url = self.construct_url(Endpoint::Nodes, &[])?;
        let body = json!({"name": name, "hidden": "true"});
        let response = self.submit(Method::POST, &url, Some(&body)).await?;
        Node::parse_from_api(read_json(response).await?)
    }

    pub async fn patch_node_specification(
        &self,
        node_id: u64,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let url = self.construct_url(
            Endpoint::NodeSpecifications,
            &[id_param("node_id", node_id)],
        )?;
        let mut fields = serde_json::Map::new();
        fields.insert(key.to_string(), json!({"value": value.into()}));
        let body = Value::Object(fields);
        self.submit(Method::PATCH, &url, Some(&body)).await?;
        Ok(())
    }

    // ----- specifications -----

    pub async fn get_asset_specifications(&self, asset_id: u64) -> Result<Vec<Specification>> {
        let url = self.construct_url(
            Endpoint::AssetSpecifications,
            &[id_param("asset_id", asset_id)],
        )?;
        let body = self.get_json(&url, &[]).await?;
        Specification::parse_map_from_api(body)
    }

    pub async fn patch_asset_specifications(
        &self,
        asset_id: u64,
        specifications: &[Specification],
    ) -> Result<()> {
        let url = self.construct_url(
            Endpoint::AssetSpecifications,
            &[id_param("asset_id", asset_id)],
        )?;
        let body = Specification::patch_body(specifications);
        self.submit(Method::PATCH, &url, Some(&body)).await?;
        Ok(())
    }

    // ----- documents and attachments -----

    pub async fn post_document(
        &self,
        name: &str,
        classification: DocumentClassification,
        status: DocumentStatus,
    ) -> Result<Document> {
        let url = self.construct_url(Endpoint::Documents, &[])?;
        let body = json!({"name": name, "classification": classification, "status": status});
        let response = self.submit(Method::POST, &url, Some(&body)).await?;
        Document::parse_from_api(read_json(response).await?)
    }

    pub async fn get_asset_documents(&self, asset_id: u64) -> Result<Vec<Document>> {
        let url = self.construct_url(Endpoint::AssetDocuments, &[id_param("asset_id", asset_id)])?;
        let response = self
            .request(Method::GET, &url, |request| {
                request.query(&[("include", "attachments")])
            })
            .await?;
        if response.status().as_u16() >= 300 {
            return Err(NetilionError::malformed_request(describe_failure(response).await));
        }
        Document::parse_multiple_from_api(read_json(response).await?, "documents")
    }

    pub async fn post_asset_document(&self, asset_id: u64, document_id: u64) -> Result<()> {
        let url = self.construct_url(Endpoint::AssetDocuments, &[id_param("asset_id", asset_id)])?;
        let body = json!({"documents": [{"id": document_id}]});
        self.submit(Method::POST, &url, Some(&body)).await?;
        Ok(())
    }

    pub async fn download_json_attachment(&self, attachment_id: u64) -> Result<Value> {
        let url = self.construct_url(
            Endpoint::AttachmentDownload,
            &[id_param("attachment_id", attachment_id)],
        )?;
        let response = self.submit(Method::GET, &url, None).await?;
        read_json(response).await
    }

    fn json_file_part(content: &Value, file_name: &str) -> Result<Part> {
        let bytes = serde_json::to_vec(content)?;
        Ok(Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/json")?)
    }

    pub async fn upload_json_attachment(
        &self,
        content: &Value,
        file_name: &str,
        document_id: u64,
    ) -> Result<Attachment> {
        let url = self.construct_url(Endpoint::Attachments, &[])?;
        let form = Form::new()
            .part("file", Self::json_file_part(content, file_name)?)
            .text("document_id", document_id.to_string());
        let response = self
            .request(Method::POST, &url, |request| request.multipart(form))
            .await?;
        if response.status().as_u16() >= 300 {
            return Err(NetilionError::malformed_request(describe_failure(response).await));
        }
        Attachment::parse_from_api(read_json(response).await?)
    }

    pub async fn patch_json_attachment(
        &self,
        content: &Value,
        attachment_id: u64,
        file_name: &str,
    ) -> Result<()> {
        let url = self.construct_url(
            Endpoint::Attachment,
            &[id_param("attachment_id", attachment_id)],
        )?;
        let form = Form::new().part("file", Self::json_file_part(content, file_name)?);
        let response = self
            .request(Method::PATCH, &url, |request| request.multipart(form))
            .await?;
        if response.status().as_u16() >= 300 {
            return Err(NetilionError::malformed_request(describe_failure(response).await));
        }
        Ok(())
    }
}
