// # Route53 Record Store
//
// This crate provides an AWS Route53 record store for svcdns.
//
// ## Record Shape
//
// Every healthy endpoint is published as its own weighted A record set:
//
// - Name: `<service>.<zone name>`
// - SetIdentifier: the address
// - Weight and TTL: from configuration
// - One value: the address
//
// ## Behavior
//
// - One store instance is bound to one hosted zone; its name is resolved once
//   at construction and cached
// - Deletes always target the zone the records were listed from
// - No retries, no caching of records, no background tasks. A failed call is
//   reported and the scheduler tries again on the next tick
//
// ## Security Requirements
//
// - Credentials come from the standard AWS environment variables
// - Secret key and session token NEVER appear in logs or Debug output
//
// ## API Reference
//
// - Get hosted zone: GET `/2013-04-01/hostedzone/:id`
// - List record sets: GET `/2013-04-01/hostedzone/:id/rrset?name=...&type=A`
// - Change record sets: POST `/2013-04-01/hostedzone/:id/rrset/`

pub mod model;
pub mod sigv4;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use std::time::Duration;
use svcdns_core::AdapterRegistry;
use svcdns_core::config::{RecordDefaults, StoreConfig};
use svcdns_core::traits::{RecordStore, RecordStoreFactory};
use svcdns_core::{Address, Error, ObservedSet, RecordHandle, Result, ServiceName, ZoneId, ZoneName};
use tracing::{debug, info, warn};

use model::{
    ApiError, ChangeAction, ChangeResourceRecordSetsRequest, ChangeResourceRecordSetsResponse,
    GetHostedZoneResponse, ListResourceRecordSetsResponse, ResourceRecordSet, bare_zone_id,
};
pub use sigv4::Credentials;

/// Route53 API endpoint
pub const ROUTE53_ENDPOINT: &str = "https://route53.amazonaws.com";

/// API version path prefix
const API_PREFIX: &str = "/2013-04-01";

/// Route53 is a global service signed in us-east-1
const SIGNING_REGION: &str = "us-east-1";
const SIGNING_SERVICE: &str = "route53";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for one Route53 store, fixed at construction
#[derive(Debug, Clone)]
pub struct Route53StoreConfig {
    /// API endpoint (scheme and authority, no path)
    pub endpoint: String,
    /// TTL and weight of upserted records
    pub records: RecordDefaults,
    /// Log change batches instead of sending them
    pub dry_run: bool,
    /// HTTP timeout
    pub timeout: Duration,
}

impl Default for Route53StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: ROUTE53_ENDPOINT.to_string(),
            records: RecordDefaults::default(),
            dry_run: false,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl Route53StoreConfig {
    /// Extract Route53 settings from a store configuration
    pub fn from_store_config(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        match config {
            StoreConfig::Route53 {
                records,
                endpoint,
                dry_run,
            } => Ok(Self {
                endpoint: endpoint
                    .clone()
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| ROUTE53_ENDPOINT.to_string()),
                records: *records,
                dry_run: *dry_run,
                timeout: DEFAULT_HTTP_TIMEOUT,
            }),
            _ => Err(Error::config("Invalid config for Route53 store")),
        }
    }
}

/// Route53 record store bound to one hosted zone
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the store will:
/// - Perform all GET requests (zone lookup, record listing)
/// - Log the intended change batch
/// - **NOT** actually modify any record
pub struct Route53RecordStore {
    config: Route53StoreConfig,

    /// AWS credentials
    /// ⚠️ NEVER log the secret parts
    credentials: Credentials,

    /// Hosted zone id without prefix
    zone_id: ZoneId,

    /// Zone name as Route53 reports it (trailing dot included)
    zone_name: ZoneName,

    /// Host header value derived from the endpoint
    host: String,

    /// Endpoint without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for Route53RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route53RecordStore")
            .field("credentials", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("zone_name", &self.zone_name)
            .field("endpoint", &self.base_url)
            .field("dry_run", &self.config.dry_run)
            .finish()
    }
}

impl Route53RecordStore {
    /// Bind to `zone_id`, resolving its name
    ///
    /// # Errors
    ///
    /// Fails when the endpoint is invalid, the credentials are rejected or
    /// the zone does not exist. Callers treat this as a startup failure.
    pub async fn connect(config: Route53StoreConfig, credentials: Credentials, zone_id: &ZoneId) -> Result<Self> {
        let endpoint = reqwest::Url::parse(config.endpoint.trim())
            .map_err(|e| Error::config(format!("Invalid Route53 endpoint {}: {}", config.endpoint, e)))?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(Error::config(format!("Route53 endpoint has no host: {}", endpoint))),
        };

        let id = bare_zone_id(zone_id.as_str());
        if id.is_empty() {
            return Err(Error::config("Hosted zone id cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let mut store = Self {
            base_url: config.endpoint.trim().trim_end_matches('/').to_string(),
            config,
            credentials,
            zone_id: ZoneId::new(id),
            zone_name: ZoneName::new(""),
            host,
            client,
        };

        store.zone_name = store.fetch_zone_name().await?;

        if store.config.dry_run {
            warn!(zone = %store.zone_id, "Route53 store running in DRY-RUN mode - no changes will be made");
        }

        Ok(store)
    }

    fn zone_path(&self) -> String {
        format!("{}/hostedzone/{}", API_PREFIX, urlencoding::encode(self.zone_id.as_str()))
    }

    /// Resolve the zone's name
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /2013-04-01/hostedzone/:id
    /// ```
    async fn fetch_zone_name(&self) -> Result<ZoneName> {
        let (status, body) = self.send(Method::GET, &self.zone_path(), &[], None).await?;
        if !status.is_success() {
            return Err(self.map_error(status, &body, "Zone lookup"));
        }

        let response: GetHostedZoneResponse = quick_xml::de::from_str(&body)
            .map_err(|e| Error::store(self.zone_id.as_str(), format!("Invalid zone response: {}", e)))?;

        let name = response.hosted_zone.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::store(self.zone_id.as_str(), "Zone has no name"));
        }

        debug!(zone = %self.zone_id, zone_name = %name, "Resolved hosted zone");
        Ok(ZoneName::new(name))
    }

    /// Send a signed request, returning status and body
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<String>,
    ) -> Result<(StatusCode, String)> {
        let query = sigv4::canonical_query(query);
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };

        let payload = body.as_deref().unwrap_or("");
        let signed = sigv4::sign(
            &self.credentials,
            sigv4::Scope {
                region: SIGNING_REGION,
                service: SIGNING_SERVICE,
            },
            sigv4::SigningRequest {
                method: method.as_str(),
                host: &self.host,
                path,
                query: &query,
                payload: payload.as_bytes(),
            },
            Utc::now(),
        )?;

        let mut request = self
            .client
            .request(method, &url)
            .header("x-amz-date", signed.amz_date)
            .header(AUTHORIZATION, signed.authorization);
        if let Some(token) = signed.security_token {
            request = request.header("x-amz-security-token", token);
        }
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/xml").body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::store(self.zone_id.as_str(), format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::store(self.zone_id.as_str(), format!("Failed to read response: {}", e)))?;

        Ok((status, text))
    }

    /// Map an unsuccessful response to an error
    fn map_error(&self, status: StatusCode, body: &str, context: &str) -> Error {
        let api = ApiError::parse(body);
        let detail = if api.code.is_empty() {
            api.message.clone()
        } else {
            format!("{}: {}", api.code, api.message)
        };

        match (status.as_u16(), api.code.as_str()) {
            (401 | 403, _) => Error::auth(format!(
                "{} in zone {} rejected ({}): {}",
                context, self.zone_id, status, detail
            )),
            (_, "NoSuchHostedZone") => Error::not_found(format!("Hosted zone {}: {}", self.zone_id, detail)),
            (404, _) => Error::not_found(format!(
                "{} in zone {}: {} - {}",
                context, self.zone_id, status, detail
            )),
            (429, _) | (_, "Throttling") | (_, "PriorRequestNotComplete") => Error::rate_limited(format!(
                "{} in zone {}: {}",
                context, self.zone_id, detail
            )),
            (500..=599, _) => Error::http(format!(
                "Route53 server error (transient) in zone {}: {} - {}",
                self.zone_id, status, detail
            )),
            _ => Error::store(
                self.zone_id.as_str(),
                format!("{} failed: {} - {}", context, status, detail),
            ),
        }
    }

    /// Send a one-change batch (or log it in dry-run mode)
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /2013-04-01/hostedzone/:id/rrset/
    /// <ChangeResourceRecordSetsRequest>…</ChangeResourceRecordSetsRequest>
    /// ```
    async fn change(&self, action: ChangeAction, record_set: ResourceRecordSet) -> Result<()> {
        let record_name = record_set.name.clone();
        let body = ChangeResourceRecordSetsRequest::single(action, record_set, None).to_xml()?;
        let path = format!("{}/rrset/", self.zone_path());

        if self.config.dry_run {
            info!(
                zone = %self.zone_id,
                record = %record_name,
                action = action.as_str(),
                payload = %body,
                "[DRY-RUN] Would send change batch"
            );
            return Ok(());
        }

        let (status, response) = self.send(Method::POST, &path, &[], Some(body)).await?;
        if !status.is_success() {
            return Err(self.map_error(
                status,
                &response,
                &format!("{} of {}", action.as_str(), record_name),
            ));
        }

        match quick_xml::de::from_str::<ChangeResourceRecordSetsResponse>(&response) {
            Ok(change) => debug!(
                zone = %self.zone_id,
                record = %record_name,
                action = action.as_str(),
                change_id = %change.change_info.id,
                change_status = %change.change_info.status,
                "Change batch accepted"
            ),
            Err(e) => debug!(zone = %self.zone_id, error = %e, "Unrecognized change response"),
        }

        Ok(())
    }
}

#[async_trait]
impl RecordStore for Route53RecordStore {
    fn zone_id(&self) -> &ZoneId {
        &self.zone_id
    }

    fn zone_name(&self) -> &ZoneName {
        &self.zone_name
    }

    /// List the A record sets of `service`
    ///
    /// Follows pagination while the next page still starts at this record
    /// name. Every value of a matching set maps to that set's handle; an
    /// address published by several sets keeps a handle for each.
    async fn list_records(&self, service: &ServiceName) -> Result<ObservedSet> {
        let fqdn = service.record_name(&self.zone_name);
        let path = format!("{}/rrset", self.zone_path());

        let mut observed = ObservedSet::new();
        let mut start_identifier: Option<String> = None;
        let mut start_name = fqdn.clone();

        loop {
            let mut query = vec![("name", start_name.as_str()), ("type", "A")];
            if let Some(identifier) = &start_identifier {
                query.push(("identifier", identifier.as_str()));
            }

            let (status, body) = self.send(Method::GET, &path, &query, None).await?;
            if !status.is_success() {
                return Err(self.map_error(status, &body, &format!("Listing {}", fqdn)));
            }

            let page: ListResourceRecordSetsResponse = quick_xml::de::from_str(&body).map_err(|e| {
                Error::store(self.zone_id.as_str(), format!("Invalid listing response: {}", e))
            })?;

            for set in &page.record_sets.items {
                if set.record_type != "A" || !set.name.eq_ignore_ascii_case(&fqdn) {
                    continue;
                }
                for handle in set.handles() {
                    let address = handle.address.clone();
                    if !observed.insert(handle) {
                        debug!(record = %fqdn, address = %address, "Value repeated within one record set");
                    }
                }
            }

            let continues_here = page.is_truncated
                && page.next_record_type.as_deref() == Some("A")
                && page
                    .next_record_name
                    .as_deref()
                    .is_some_and(|next| next.eq_ignore_ascii_case(&fqdn));
            if !continues_here {
                break;
            }

            start_name = page.next_record_name.unwrap_or_else(|| fqdn.clone());
            start_identifier = page.next_record_identifier;
        }

        debug!(zone = %self.zone_id, record = %fqdn, addresses = observed.len(), "Listed records");
        Ok(observed)
    }

    async fn upsert(&self, service: &ServiceName, address: &Address) -> Result<()> {
        let record_set = ResourceRecordSet::weighted(
            service.record_name(&self.zone_name),
            address,
            self.config.records.ttl,
            self.config.records.weight,
        );
        self.change(ChangeAction::Upsert, record_set).await
    }

    async fn delete(&self, handle: &RecordHandle) -> Result<()> {
        self.change(ChangeAction::Delete, ResourceRecordSet::from_handle(handle)).await
    }

    fn store_name(&self) -> &'static str {
        "route53"
    }
}

/// Factory for creating Route53 stores
///
/// Reads credentials from the environment unless given explicitly.
#[derive(Default)]
pub struct Route53Factory {
    credentials: Option<Credentials>,
}

impl Route53Factory {
    /// Factory using explicit credentials
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
        }
    }
}

#[async_trait]
impl RecordStoreFactory for Route53Factory {
    async fn create(&self, config: &StoreConfig, zone: &ZoneId) -> Result<Box<dyn RecordStore>> {
        let config = Route53StoreConfig::from_store_config(config)?;
        let credentials = match &self.credentials {
            Some(credentials) => credentials.clone(),
            None => Credentials::from_env()?,
        };

        Ok(Box::new(Route53RecordStore::connect(config, credentials, zone).await?))
    }
}

/// Register the Route53 store with a registry
pub fn register(registry: &AdapterRegistry) {
    registry.register_store("route53", Box::new(Route53Factory::default()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ZONE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<GetHostedZoneResponse xmlns="https://route53.amazonaws.com/doc/2013-04-01/">
  <HostedZone><Id>/hostedzone/Z1</Id><Name>example.com.</Name><CallerReference>ref</CallerReference></HostedZone>
</GetHostedZoneResponse>"#;

    const CHANGE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ChangeResourceRecordSetsResponse xmlns="https://route53.amazonaws.com/doc/2013-04-01/">
  <ChangeInfo><Id>/change/C1</Id><Status>PENDING</Status><SubmittedAt>2024-01-01T00:00:00Z</SubmittedAt></ChangeInfo>
</ChangeResourceRecordSetsResponse>"#;

    fn credentials() -> Credentials {
        Credentials::new("AKIDEXAMPLE", "secret", None)
    }

    fn config_for(server: &MockServer, dry_run: bool) -> Route53StoreConfig {
        Route53StoreConfig {
            endpoint: server.uri(),
            dry_run,
            ..Route53StoreConfig::default()
        }
    }

    fn weighted_set(address: &str) -> String {
        format!(
            "<ResourceRecordSet><Name>api.example.com.</Name><Type>A</Type><SetIdentifier>{0}</SetIdentifier>\
             <Weight>100</Weight><TTL>60</TTL><ResourceRecords><ResourceRecord><Value>{0}</Value></ResourceRecord>\
             </ResourceRecords></ResourceRecordSet>",
            address
        )
    }

    fn listing(sets: &[String], next_identifier: Option<&str>) -> String {
        let tail = match next_identifier {
            Some(id) => format!(
                "<IsTruncated>true</IsTruncated><NextRecordName>api.example.com.</NextRecordName>\
                 <NextRecordType>A</NextRecordType><NextRecordIdentifier>{}</NextRecordIdentifier>",
                id
            ),
            None => "<IsTruncated>false</IsTruncated>".to_string(),
        };
        format!(
            "<ListResourceRecordSetsResponse><ResourceRecordSets>{}</ResourceRecordSets>{}<MaxItems>100</MaxItems></ListResourceRecordSetsResponse>",
            sets.concat(),
            tail
        )
    }

    async fn mount_zone(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/2013-04-01/hostedzone/Z1"))
            .and(header_exists("authorization"))
            .and(header_exists("x-amz-date"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ZONE_XML))
            .mount(server)
            .await;
    }

    async fn connect(server: &MockServer, dry_run: bool) -> Route53RecordStore {
        Route53RecordStore::connect(config_for(server, dry_run), credentials(), &"/hostedzone/Z1".into())
            .await
            .unwrap()
    }

    #[test]
    fn test_config_from_store_config() {
        let config = Route53StoreConfig::from_store_config(&StoreConfig::Route53 {
            records: RecordDefaults { ttl: 30, weight: 5 },
            endpoint: None,
            dry_run: true,
        })
        .unwrap();

        assert_eq!(config.endpoint, ROUTE53_ENDPOINT);
        assert_eq!(config.records.ttl, 30);
        assert!(config.dry_run);

        let memory = StoreConfig::Memory {
            records: RecordDefaults::default(),
        };
        assert!(Route53StoreConfig::from_store_config(&memory).is_err());
    }

    #[tokio::test]
    async fn test_connect_resolves_zone_name() {
        let server = MockServer::start().await;
        mount_zone(&server).await;

        let store = connect(&server, false).await;
        assert_eq!(store.zone_id().as_str(), "Z1");
        assert_eq!(store.zone_name().as_str(), "example.com.");
        assert_eq!(store.store_name(), "route53");
    }

    #[tokio::test]
    async fn test_connect_unknown_zone_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2013-04-01/hostedzone/Z1"))
            .respond_with(ResponseTemplate::new(404).set_body_string(
                "<ErrorResponse><Error><Type>Sender</Type><Code>NoSuchHostedZone</Code>\
                 <Message>No hosted zone found with ID: Z1</Message></Error></ErrorResponse>",
            ))
            .mount(&server)
            .await;

        let err = Route53RecordStore::connect(config_for(&server, false), credentials(), &"Z1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(err.to_string().contains("NoSuchHostedZone"));
    }

    #[tokio::test]
    async fn test_connect_rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                "<ErrorResponse><Error><Code>InvalidClientTokenId</Code><Message>bad key</Message></Error></ErrorResponse>",
            ))
            .mount(&server)
            .await;

        let err = Route53RecordStore::connect(config_for(&server, false), credentials(), &"Z1".into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[tokio::test]
    async fn test_list_records_filters_and_paginates() {
        let server = MockServer::start().await;
        mount_zone(&server).await;

        let other_name = "<ResourceRecordSet><Name>api2.example.com.</Name><Type>A</Type><TTL>60</TTL>\
                          <ResourceRecords><ResourceRecord><Value>10.9.9.9</Value></ResourceRecord></ResourceRecords>\
                          </ResourceRecordSet>"
            .to_string();

        Mock::given(method("GET"))
            .and(path("/2013-04-01/hostedzone/Z1/rrset"))
            .and(query_param("name", "api.example.com."))
            .and(query_param("type", "A"))
            .and(query_param("identifier", "10.0.0.2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing(&[weighted_set("10.0.0.2"), other_name], None)),
            )
            .expect(1)
            .mount(&server)
            .await;

        // First page: no identifier parameter
        Mock::given(method("GET"))
            .and(path("/2013-04-01/hostedzone/Z1/rrset"))
            .and(query_param("name", "api.example.com."))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing(&[weighted_set("10.0.0.1")], Some("10.0.0.2"))),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let store = connect(&server, false).await;
        let observed = store.list_records(&"api".into()).await.unwrap();

        let addresses: Vec<&str> = observed.addresses().map(Address::as_str).collect();
        assert_eq!(addresses, vec!["10.0.0.1", "10.0.0.2"]);
        let handle = observed.handle(&"10.0.0.2".into()).unwrap();
        assert_eq!(handle.set_identifier.as_deref(), Some("10.0.0.2"));
        assert_eq!(handle.weight, Some(100));
    }

    #[tokio::test]
    async fn test_list_keeps_every_set_of_an_address() {
        let server = MockServer::start().await;
        mount_zone(&server).await;

        let legacy = weighted_set("10.0.0.5").replacen(
            "<SetIdentifier>10.0.0.5</SetIdentifier>",
            "<SetIdentifier>legacy</SetIdentifier>",
            1,
        );
        Mock::given(method("GET"))
            .and(path("/2013-04-01/hostedzone/Z1/rrset"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(listing(&[weighted_set("10.0.0.5"), legacy], None)),
            )
            .mount(&server)
            .await;

        let store = connect(&server, false).await;
        let observed = store.list_records(&"api".into()).await.unwrap();

        assert_eq!(observed.len(), 1);
        let ids: Vec<_> = observed
            .handles(&"10.0.0.5".into())
            .iter()
            .map(|h| h.set_identifier.as_deref())
            .collect();
        assert_eq!(ids, vec![Some("10.0.0.5"), Some("legacy")]);
    }

    #[tokio::test]
    async fn test_missing_record_reports_operation_not_zone() {
        let server = MockServer::start().await;
        mount_zone(&server).await;
        Mock::given(method("POST"))
            .and(path("/2013-04-01/hostedzone/Z1/rrset/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = connect(&server, false).await;
        let handle = RecordHandle::weighted("api.example.com.", "10.0.0.3".into(), 60, 100);
        let err = store.delete(&handle).await.unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        let message = err.to_string();
        assert!(message.contains("DELETE of api.example.com."), "{}", message);
        assert!(!message.contains("Hosted zone"), "{}", message);
    }

    #[tokio::test]
    async fn test_upsert_sends_weighted_record() {
        let server = MockServer::start().await;
        mount_zone(&server).await;
        Mock::given(method("POST"))
            .and(path("/2013-04-01/hostedzone/Z1/rrset/"))
            .and(header_exists("authorization"))
            .and(body_string_contains("<Action>UPSERT</Action>"))
            .and(body_string_contains("<Name>api.example.com.</Name>"))
            .and(body_string_contains("<SetIdentifier>10.0.0.1</SetIdentifier>"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CHANGE_XML))
            .expect(1)
            .mount(&server)
            .await;

        let store = connect(&server, false).await;
        store.upsert(&"api".into(), &"10.0.0.1".into()).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_sends_exact_record_set() {
        let server = MockServer::start().await;
        mount_zone(&server).await;
        Mock::given(method("POST"))
            .and(path("/2013-04-01/hostedzone/Z1/rrset/"))
            .and(body_string_contains("<Action>DELETE</Action>"))
            .and(body_string_contains("<TTL>300</TTL>"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CHANGE_XML))
            .expect(1)
            .mount(&server)
            .await;

        let store = connect(&server, false).await;
        let handle = RecordHandle {
            name: "api.example.com.".to_string(),
            address: "10.0.0.3".into(),
            values: vec!["10.0.0.3".to_string()],
            ttl: Some(300),
            weight: Some(100),
            set_identifier: Some("10.0.0.3".to_string()),
        };
        store.delete(&handle).await.unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_sends_no_changes() {
        let server = MockServer::start().await;
        mount_zone(&server).await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CHANGE_XML))
            .expect(0)
            .mount(&server)
            .await;

        let store = connect(&server, true).await;
        store.upsert(&"api".into(), &"10.0.0.1".into()).await.unwrap();
    }

    #[tokio::test]
    async fn test_change_error_mapping() {
        let server = MockServer::start().await;
        mount_zone(&server).await;
        Mock::given(method("POST"))
            .and(body_string_contains("10.0.0.1"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                "<ErrorResponse><Error><Type>Sender</Type><Code>Throttling</Code><Message>Rate exceeded</Message></Error></ErrorResponse>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("10.0.0.2"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("10.0.0.3"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                "<InvalidChangeBatch><Messages><Message>Invalid request</Message></Messages></InvalidChangeBatch>",
            ))
            .mount(&server)
            .await;

        let store = connect(&server, false).await;
        let service = ServiceName::from("api");

        let throttled = store.upsert(&service, &"10.0.0.1".into()).await.unwrap_err();
        assert!(matches!(throttled, Error::RateLimited(_)));

        let unavailable = store.upsert(&service, &"10.0.0.2".into()).await.unwrap_err();
        assert!(matches!(unavailable, Error::Http(_)));
        assert!(unavailable.is_transient());

        let invalid = store.upsert(&service, &"10.0.0.3".into()).await.unwrap_err();
        assert!(matches!(invalid, Error::Store { .. }));
        assert!(invalid.to_string().contains("Invalid request"));
    }

    #[tokio::test]
    async fn test_factory_with_credentials() {
        let server = MockServer::start().await;
        mount_zone(&server).await;

        let factory = Route53Factory::with_credentials(credentials());
        let config = StoreConfig::Route53 {
            records: RecordDefaults::default(),
            endpoint: Some(server.uri()),
            dry_run: false,
        };

        let store = factory.create(&config, &"Z1".into()).await.unwrap();
        assert_eq!(store.zone_name().as_str(), "example.com.");
    }

    #[tokio::test]
    async fn test_credentials_not_exposed_in_debug() {
        let server = MockServer::start().await;
        mount_zone(&server).await;

        let store = Route53RecordStore::connect(
            config_for(&server, false),
            Credentials::new("AKID", "very-secret-key", Some("session-token".to_string())),
            &"Z1".into(),
        )
        .await
        .unwrap();

        let rendered = format!("{:?}", store);
        assert!(!rendered.contains("very-secret-key"));
        assert!(!rendered.contains("session-token"));
        assert!(rendered.contains("Route53RecordStore"));
    }
}
