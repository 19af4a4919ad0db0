//! Route53 REST API XML documents
//!
//! Only the elements svcdns reads or writes are modelled; unknown elements
//! are ignored on the way in.

use serde::{Deserialize, Serialize};
use svcdns_core::{Address, Error, RecordHandle, Result};

/// Namespace of the 2013-04-01 API
pub const XMLNS: &str = "https://route53.amazonaws.com/doc/2013-04-01/";

/// `GET /2013-04-01/hostedzone/<id>`
#[derive(Debug, Deserialize)]
pub struct GetHostedZoneResponse {
    #[serde(rename = "HostedZone")]
    pub hosted_zone: HostedZone,
}

#[derive(Debug, Deserialize)]
pub struct HostedZone {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
}

/// `GET /2013-04-01/hostedzone/<id>/rrset`
#[derive(Debug, Deserialize)]
pub struct ListResourceRecordSetsResponse {
    #[serde(rename = "ResourceRecordSets", default)]
    pub record_sets: ResourceRecordSets,
    #[serde(rename = "IsTruncated", default)]
    pub is_truncated: bool,
    #[serde(rename = "NextRecordName", default)]
    pub next_record_name: Option<String>,
    #[serde(rename = "NextRecordType", default)]
    pub next_record_type: Option<String>,
    #[serde(rename = "NextRecordIdentifier", default)]
    pub next_record_identifier: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResourceRecordSets {
    #[serde(rename = "ResourceRecordSet", default)]
    pub items: Vec<ResourceRecordSet>,
}

/// One record set, as listed or as sent in a change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecordSet {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Type")]
    pub record_type: String,
    #[serde(rename = "SetIdentifier", default, skip_serializing_if = "Option::is_none")]
    pub set_identifier: Option<String>,
    #[serde(rename = "Weight", default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u64>,
    #[serde(rename = "TTL", default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(rename = "ResourceRecords", default)]
    pub resource_records: ResourceRecords,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecords {
    #[serde(rename = "ResourceRecord", default)]
    pub items: Vec<ResourceRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    #[serde(rename = "Value")]
    pub value: String,
}

impl ResourceRecordSet {
    /// Weighted single-value A record keyed by its address
    pub fn weighted(name: String, address: &Address, ttl: u32, weight: u64) -> Self {
        Self {
            name,
            record_type: "A".to_string(),
            set_identifier: Some(address.to_string()),
            weight: Some(weight),
            ttl: Some(ttl),
            resource_records: ResourceRecords {
                items: vec![ResourceRecord {
                    value: address.to_string(),
                }],
            },
        }
    }

    /// The exact record set a handle was listed from
    pub fn from_handle(handle: &RecordHandle) -> Self {
        Self {
            name: handle.name.clone(),
            record_type: "A".to_string(),
            set_identifier: handle.set_identifier.clone(),
            weight: handle.weight,
            ttl: handle.ttl,
            resource_records: ResourceRecords {
                items: handle
                    .values
                    .iter()
                    .map(|value| ResourceRecord { value: value.clone() })
                    .collect(),
            },
        }
    }

    /// Values of the set
    pub fn values(&self) -> Vec<String> {
        self.resource_records.items.iter().map(|r| r.value.clone()).collect()
    }

    /// One handle per value, each carrying the whole set
    pub fn handles(&self) -> Vec<RecordHandle> {
        let values = self.values();
        values
            .iter()
            .map(|value| RecordHandle {
                name: self.name.clone(),
                address: Address::new(value.clone()),
                values: values.clone(),
                ttl: self.ttl,
                weight: self.weight,
                set_identifier: self.set_identifier.clone(),
            })
            .collect()
    }
}

/// `POST /2013-04-01/hostedzone/<id>/rrset/`
#[derive(Debug, Serialize)]
#[serde(rename = "ChangeResourceRecordSetsRequest")]
pub struct ChangeResourceRecordSetsRequest {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "ChangeBatch")]
    change_batch: ChangeBatch,
}

#[derive(Debug, Serialize)]
struct ChangeBatch {
    #[serde(rename = "Comment", skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(rename = "Changes")]
    changes: Changes,
}

#[derive(Debug, Serialize)]
struct Changes {
    #[serde(rename = "Change")]
    items: Vec<Change>,
}

#[derive(Debug, Serialize)]
struct Change {
    #[serde(rename = "Action")]
    action: &'static str,
    #[serde(rename = "ResourceRecordSet")]
    record_set: ResourceRecordSet,
}

/// Change action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Upsert,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Upsert => "UPSERT",
            ChangeAction::Delete => "DELETE",
        }
    }
}

impl ChangeResourceRecordSetsRequest {
    /// A batch holding exactly one change
    pub fn single(action: ChangeAction, record_set: ResourceRecordSet, comment: Option<String>) -> Self {
        Self {
            xmlns: XMLNS,
            change_batch: ChangeBatch {
                comment,
                changes: Changes {
                    items: vec![Change {
                        action: action.as_str(),
                        record_set,
                    }],
                },
            },
        }
    }

    /// Serialize to the request body
    pub fn to_xml(&self) -> Result<String> {
        let body = quick_xml::se::to_string(self)
            .map_err(|e| Error::Other(format!("Failed to encode change batch: {}", e)))?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{}", body))
    }
}

/// Response to a change batch
#[derive(Debug, Deserialize)]
pub struct ChangeResourceRecordSetsResponse {
    #[serde(rename = "ChangeInfo")]
    pub change_info: ChangeInfo,
}

#[derive(Debug, Deserialize)]
pub struct ChangeInfo {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Status")]
    pub status: String,
}

/// `<ErrorResponse><Error>…</Error></ErrorResponse>`
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "Error")]
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

/// `<InvalidChangeBatch><Messages><Message>…</Message></Messages></InvalidChangeBatch>`
#[derive(Debug, Deserialize)]
struct InvalidChangeBatch {
    #[serde(rename = "Messages", default)]
    messages: Messages,
}

#[derive(Debug, Default, Deserialize)]
struct Messages {
    #[serde(rename = "Message", default)]
    items: Vec<String>,
}

/// Code and message extracted from an error body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Parse an error body, falling back to its raw text
    pub fn parse(body: &str) -> Self {
        if let Ok(response) = quick_xml::de::from_str::<ErrorResponse>(body) {
            return Self {
                code: response.error.code,
                message: response.error.message,
            };
        }
        if let Ok(batch) = quick_xml::de::from_str::<InvalidChangeBatch>(body) {
            if !batch.messages.items.is_empty() {
                return Self {
                    code: "InvalidChangeBatch".to_string(),
                    message: batch.messages.items.join("; "),
                };
            }
        }

        let message: String = body.trim().chars().take(200).collect();
        Self {
            code: String::new(),
            message,
        }
    }
}

/// Hosted zone id without any `/hostedzone/` prefix
pub fn bare_zone_id(id: &str) -> &str {
    let id = id.trim().trim_start_matches('/');
    id.strip_prefix("hostedzone/").unwrap_or(id)
}
