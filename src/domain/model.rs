use crate::domain::ports::{raise_errors, ApiObject};
use crate::utils::error::{NetilionError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::num::ParseFloatError;
use std::str::FromStr;

/// Parses a Netilion timestamp such as `2021-09-13T08:33:05.178Z` or
/// `2021-11-04T08:19:35Z`. A zone designator is required.
pub fn parse_timestamp(timestamp: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(timestamp).map(|ts| ts.with_timezone(&Utc))
}

/// Netilion expects UTC with millisecond precision.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn lenient_timestamp(timestamp: Option<&str>) -> Option<DateTime<Utc>> {
    let timestamp = timestamp.filter(|ts| !ts.is_empty())?;
    match parse_timestamp(timestamp) {
        Ok(ts) => Some(ts),
        Err(err) => {
            tracing::error!("Unknown datetime format: {}: {}", timestamp, err);
            None
        }
    }
}

fn required<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// Netilion sends `hidden` as either a bool or the string "true".
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Ok(flag),
        Value::String(flag) => Ok(flag.eq_ignore_ascii_case("true")),
        Value::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!("expected a boolean, got {}", other))),
    }
}

fn nullable_vec<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A measurement as sent by Netilion; integers stay integers on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasuredValue {
    Integer(i64),
    Float(f64),
}

impl From<i64> for MeasuredValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for MeasuredValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for MeasuredValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl FromStr for MeasuredValue {
    type Err = ParseFloatError;

    /// Whole numbers stay integers, anything else is read as a float.
    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.parse::<i64>() {
            Ok(value) => Ok(Self::Integer(value)),
            Err(_) => raw.parse::<f64>().map(Self::Float),
        }
    }
}

impl MeasuredValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Integer(value) => *value as f64,
            Self::Float(value) => *value,
        }
    }
}

impl fmt::Display for MeasuredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{}", value),
            Self::Float(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientApplication {
    pub name: String,
    pub id: u64,
}

impl ClientApplication {
    pub fn new(name: impl Into<String>, id: u64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

impl ApiObject for ClientApplication {
    const NAME: &'static str = "ClientApplication";

    fn to_api_json(&self) -> Value {
        json!({"name": self.name, "id": self.id})
    }
}

impl fmt::Display for ClientApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Client Application \"{}\"", self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebHook {
    pub url: String,
    pub event_types: Vec<String>,
    #[serde(deserialize_with = "required")]
    pub id: Option<u64>,
    #[serde(default)]
    pub secret: Option<String>,
}

impl WebHook {
    pub fn new(url: impl Into<String>, event_types: Vec<String>) -> Self {
        Self {
            url: url.into(),
            event_types,
            id: None,
            secret: None,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }
}

/// Webhooks are equal when they deliver the same events to the same URL.
impl PartialEq for WebHook {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url && self.event_types == other.event_types
    }
}

impl ApiObject for WebHook {
    const NAME: &'static str = "WebHook";

    fn to_api_json(&self) -> Value {
        json!({"url": self.url, "event_types": self.event_types})
    }
}

impl fmt::Display for WebHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WebHook <{}> (events {})",
            self.url,
            self.event_types.join(",")
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: u64,
    #[serde(default)]
    pub serial_number: Option<String>,
}

impl Asset {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            serial_number: None,
        }
    }

    pub fn with_serial_number(id: u64, serial_number: impl Into<String>) -> Self {
        Self {
            id,
            serial_number: Some(serial_number.into()),
        }
    }
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl ApiObject for Asset {
    const NAME: &'static str = "Asset";

    fn to_api_json(&self) -> Value {
        json!({"id": self.id})
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Asset {} (serial number {})",
            self.id,
            self.serial_number.as_deref().unwrap_or("n/a")
        )
    }
}

const ALLOWED_UNIT_CODES: &[&str] = &[
    "degree_celsius",
    "metre_per_second",
    "gram_per_cubic_centimetre",
    "percent_mass",
    "percent_volume",
    "degree_plato",
    "percent",
    "millimetre",
    "millipascal_second",
];

#[derive(Deserialize)]
struct RawUnit {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// A Netilion unit. Either the id or the code is always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawUnit")]
pub struct Unit {
    pub id: Option<u64>,
    pub code: Option<String>,
    pub name: Option<String>,
}

impl TryFrom<RawUnit> for Unit {
    type Error = NetilionError;

    fn try_from(raw: RawUnit) -> Result<Self> {
        Unit::new(raw.id, raw.code, raw.name)
    }
}

impl Unit {
    pub fn new(id: Option<u64>, code: Option<String>, name: Option<String>) -> Result<Self> {
        let code = code.filter(|code| !code.is_empty());
        if id.is_none() && code.is_none() {
            return Err(NetilionError::malformed_response(
                "Requires either ID or code to construct unit",
            ));
        }
        Ok(Self { id, code, name })
    }

    pub fn with_id(id: u64) -> Self {
        Self {
            id: Some(id),
            code: None,
            name: None,
        }
    }

    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            id: None,
            code: Some(code.into()),
            name: None,
        }
    }

    /// Returns a code-only unit for the codes this client knows about.
    pub fn by_code(code: &str) -> Option<Self> {
        ALLOWED_UNIT_CODES
            .contains(&code)
            .then(|| Self::with_code(code))
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.code == other.code
    }
}

impl ApiObject for Unit {
    const NAME: &'static str = "Unit";

    // prefer human-readable codes over arbitrary ids
    fn to_api_json(&self) -> Value {
        match (&self.code, self.id) {
            (Some(code), _) => json!({"code": code}),
            (None, id) => json!({"id": id}),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id.map(|id| id.to_string());
        write!(
            f,
            "Unit {}, {} ({})",
            id.as_deref().unwrap_or("id n/a"),
            self.code.as_deref().unwrap_or("code n/a"),
            self.name.as_deref().unwrap_or("name n/a")
        )
    }
}

#[derive(Deserialize)]
struct RawAssetValue {
    key: String,
    unit: Unit,
    value: MeasuredValue,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawAssetValue")]
pub struct AssetValue {
    pub key: String,
    pub unit: Unit,
    pub value: MeasuredValue,
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<RawAssetValue> for AssetValue {
    fn from(raw: RawAssetValue) -> Self {
        Self {
            timestamp: lenient_timestamp(raw.timestamp.as_deref()),
            key: raw.key,
            unit: raw.unit,
            value: raw.value,
        }
    }
}

impl AssetValue {
    pub fn new(key: impl Into<String>, unit: Unit, value: impl Into<MeasuredValue>) -> Self {
        Self {
            key: key.into(),
            unit,
            value: value.into(),
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Timestamps are not part of a value's identity.
impl PartialEq for AssetValue {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.unit == other.unit && self.value == other.value
    }
}

impl ApiObject for AssetValue {
    const NAME: &'static str = "AssetValue";

    fn to_api_json(&self) -> Value {
        let mut body = json!({
            "key": self.key,
            "unit": self.unit.to_api_json(),
            "value": self.value,
        });
        if let Some(ts) = &self.timestamp {
            body["timestamp"] = Value::String(format_timestamp(ts));
        }
        body
    }
}

impl fmt::Display for AssetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timestamp = self.timestamp.as_ref().map(format_timestamp);
        let timestamp = timestamp.as_deref().unwrap_or("timestamp n/a");
        write!(f, "AssetValue {}: {} ", self.key, self.value)?;
        write!(f, "({}, {})", self.unit, timestamp)
    }
}

#[derive(Deserialize)]
struct RawDataPoint {
    value: MeasuredValue,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Deserialize)]
struct RawKeyedValues {
    key: String,
    unit: Unit,
    data: Vec<RawDataPoint>,
}

#[derive(Deserialize)]
struct RawAssetValuesContent {
    asset: Asset,
    values: Vec<RawKeyedValues>,
}

#[derive(Deserialize)]
struct RawAssetValuesEnvelope {
    content: RawAssetValuesContent,
}

/// A batch of values for one asset, as delivered by the
/// `asset_values_created` webhook and as pushed to the values endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawAssetValuesEnvelope")]
pub struct AssetValues {
    pub asset: Asset,
    pub values: Vec<AssetValue>,
}

impl From<RawAssetValuesEnvelope> for AssetValues {
    fn from(envelope: RawAssetValuesEnvelope) -> Self {
        let content = envelope.content;
        let mut values = Vec::new();
        for keyed in content.values {
            for point in keyed.data {
                values.push(AssetValue {
                    key: keyed.key.clone(),
                    unit: keyed.unit.clone(),
                    value: point.value,
                    timestamp: lenient_timestamp(point.timestamp.as_deref()),
                });
            }
        }
        Self {
            asset: content.asset,
            values,
        }
    }
}

impl AssetValues {
    pub fn new(asset: Asset, values: Vec<AssetValue>) -> Self {
        Self { asset, values }
    }
}

impl ApiObject for AssetValues {
    const NAME: &'static str = "AssetValues";

    /// Groups values by key (keys sorted); the unit of the first value of a
    /// key is used for the whole group.
    fn to_api_json(&self) -> Value {
        let mut grouped: BTreeMap<&str, Vec<&AssetValue>> = BTreeMap::new();
        for value in &self.values {
            let key = value.key.as_str();
            grouped.entry(key).or_default().push(value);
        }

        let values: Vec<Value> = grouped
            .into_iter()
            .map(|(key, group)| {
                let data: Vec<Value> = group
                    .iter()
                    .map(|value| {
                        let mut point = json!({"value": value.value});
                        if let Some(ts) = &value.timestamp {
                            point["timestamp"] = Value::String(format_timestamp(ts));
                        }
                        point
                    })
                    .collect();
                json!({
                    "key": key,
                    "data": data,
                    "unit": group[0].unit.to_api_json(),
                })
            })
            .collect();

        json!({"asset": self.asset.to_api_json(), "values": values})
    }
}

impl fmt::Display for AssetValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AssetValues ({}), {} values contained",
            self.asset,
            self.values.len()
        )
    }
}

#[derive(Deserialize)]
struct RawValueByKey {
    value: MeasuredValue,
    timestamp: String,
}

/// One historic data point of a single value key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawValueByKey")]
pub struct AssetValuesByKey {
    pub value: MeasuredValue,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<RawValueByKey> for AssetValuesByKey {
    type Error = String;

    fn try_from(raw: RawValueByKey) -> std::result::Result<Self, Self::Error> {
        let timestamp = parse_timestamp(&raw.timestamp)
            .map_err(|err| format!("invalid timestamp {}: {}", raw.timestamp, err))?;
        Ok(Self {
            value: raw.value,
            timestamp,
        })
    }
}

impl AssetValuesByKey {
    pub fn new(value: impl Into<MeasuredValue>, timestamp: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }
}

impl ApiObject for AssetValuesByKey {
    const NAME: &'static str = "AssetValuesByKey";

    fn to_api_json(&self) -> Value {
        json!({"value": self.value, "timestamp": format_timestamp(&self.timestamp)})
    }
}

impl fmt::Display for AssetValuesByKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timestamp = format_timestamp(&self.timestamp);
        write!(f, "AssetValue {}, {}", self.value, timestamp)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSystem {
    pub id: u64,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub specifications: Vec<Value>,
}

impl AssetSystem {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            specifications: Vec::new(),
        }
    }
}

impl PartialEq for AssetSystem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl ApiObject for AssetSystem {
    const NAME: &'static str = "AssetSystem";

    fn to_api_json(&self) -> Value {
        json!({"id": self.id})
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHealthCondition {
    pub id: u64,
    pub diagnosis_code: String,
}

impl AssetHealthCondition {
    pub fn new(id: u64, diagnosis_code: impl Into<String>) -> Self {
        Self {
            id,
            diagnosis_code: diagnosis_code.into(),
        }
    }
}

impl ApiObject for AssetHealthCondition {
    const NAME: &'static str = "AssetHealthCondition";

    fn to_api_json(&self) -> Value {
        json!({"id": self.id, "diagnosis_code": self.diagnosis_code})
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpecification {
    pub id: u64,
    #[serde(default, deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable_map")]
    pub specifications: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub hidden: bool,
}

fn nullable_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_map<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl NodeSpecification {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: String::new(),
            specifications: Map::new(),
            hidden: false,
        }
    }
}

impl PartialEq for NodeSpecification {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl ApiObject for NodeSpecification {
    const NAME: &'static str = "NodeSpecification";

    fn to_api_json(&self) -> Value {
        let mut body = json!({"id": self.id, "name": self.name, "hidden": self.hidden});
        if !self.specifications.is_empty() {
            body["specifications"] = Value::Object(self.specifications.clone());
        }
        body
    }
}

/// `{"id": …, "href": …}` link to another object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: u64,
    #[serde(default)]
    pub href: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub hidden: bool,
    #[serde(default, rename = "type")]
    pub node_type: Option<Reference>,
    #[serde(default)]
    pub parent: Option<Reference>,
}

impl ApiObject for Node {
    const NAME: &'static str = "Node";

    fn to_api_json(&self) -> Value {
        let mut body = json!({"id": self.id, "name": self.name, "hidden": self.hidden});
        if let Some(description) = &self.description {
            body["description"] = Value::String(description.clone());
        }
        if let Some(parent) = &self.parent {
            body["parent"] = json!({"id": parent.id});
        }
        body
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page_count: u64,
    pub per_page: u64,
    pub page: u64,
    #[serde(default, rename = "next")]
    pub next_url: Option<String>,
}

impl Pagination {
    pub fn new(page_count: u64, per_page: u64, page: u64, next_url: Option<String>) -> Self {
        Self {
            page_count,
            per_page,
            page,
            next_url,
        }
    }
}

impl ApiObject for Pagination {
    const NAME: &'static str = "Pagination";

    fn from_api_json(body: Value) -> Result<Self> {
        let pagination = body
            .get("pagination")
            .cloned()
            .ok_or_else(|| NetilionError::malformed_response("missing pagination"))?;
        Ok(serde_json::from_value(pagination)?)
    }

    fn to_api_json(&self) -> Value {
        let mut body = json!({
            "page_count": self.page_count,
            "per_page": self.per_page,
            "page": self.page,
        });
        if let Some(next) = &self.next_url {
            body["next"] = Value::String(next.clone());
        }
        body
    }
}

/// A single asset specification entry (`key → {value, unit, ui_visible}`).
#[derive(Debug, Clone, PartialEq)]
pub struct Specification {
    pub key: String,
    pub value: Value,
    pub unit: Option<Unit>,
    pub ui_visible: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Specification {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            unit: None,
            ui_visible: false,
            updated_at: None,
        }
    }

    pub fn with_unit(mut self, unit: Option<Unit>) -> Self {
        self.unit = unit;
        self
    }

    pub fn visible(mut self, ui_visible: bool) -> Self {
        self.ui_visible = ui_visible;
        self
    }

    /// Parses the specification map returned for an asset.
    pub fn parse_map_from_api(response_body: Value) -> Result<Vec<Self>> {
        raise_errors(&response_body)?;
        let Value::Object(entries) = response_body else {
            return Err(NetilionError::malformed_response("specifications must be an object"));
        };

        entries
            .into_iter()
            .map(|(key, entry)| -> Result<Self> {
                let Some(value) = entry.get("value").cloned() else {
                    let message = format!("specification {} has no value", key);
                    return Err(NetilionError::malformed_response(message));
                };
                let unit = match entry.get("unit") {
                    Some(Value::String(code)) => Some(Unit::with_code(code.as_str())),
                    Some(unit @ Value::Object(_)) => Some(serde_json::from_value(unit.clone())?),
                    _ => None,
                };
                Ok(Self {
                    key,
                    value,
                    unit,
                    ui_visible: entry
                        .get("ui_visible")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                    updated_at: lenient_timestamp(entry.get("updated_at").and_then(Value::as_str)),
                })
            })
            .collect()
    }

    /// Body for a PATCH of several specifications at once.
    pub fn patch_body(specifications: &[Specification]) -> Value {
        let body: Map<String, Value> = specifications
            .iter()
            .map(|spec| {
                let mut entry = json!({"value": spec.value, "ui_visible": spec.ui_visible});
                if let Some(code) = spec.unit.as_ref().and_then(|unit| unit.code.as_ref()) {
                    entry["unit"] = Value::String(code.clone());
                }
                (spec.key.clone(), entry)
            })
            .collect();
        Value::Object(body)
    }
}

/// `{"id": n}` wire form of the document enums.
#[derive(Serialize, Deserialize)]
struct IdRef {
    id: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IdRef", into = "IdRef")]
pub enum DocumentClassification {
    Undefined = 1,
    Public = 2,
    Internal = 3,
    Confidential = 4,
}

impl TryFrom<IdRef> for DocumentClassification {
    type Error = String;

    fn try_from(raw: IdRef) -> std::result::Result<Self, Self::Error> {
        match raw.id {
            1 => Ok(Self::Undefined),
            2 => Ok(Self::Public),
            3 => Ok(Self::Internal),
            4 => Ok(Self::Confidential),
            other => Err(format!("unknown document classification {}", other)),
        }
    }
}

impl From<DocumentClassification> for IdRef {
    fn from(classification: DocumentClassification) -> Self {
        IdRef {
            id: classification as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "IdRef", into = "IdRef")]
pub enum DocumentStatus {
    Undefined = 1,
}

impl TryFrom<IdRef> for DocumentStatus {
    type Error = String;

    fn try_from(raw: IdRef) -> std::result::Result<Self, Self::Error> {
        match raw.id {
            1 => Ok(Self::Undefined),
            other => Err(format!("unknown document status {}", other)),
        }
    }
}

impl From<DocumentStatus> for IdRef {
    fn from(status: DocumentStatus) -> Self {
        IdRef { id: status as u8 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: u64,
    pub file_name: String,
    pub content_type: String,
}

impl ApiObject for Attachment {
    const NAME: &'static str = "Attachment";

    fn to_api_json(&self) -> Value {
        json!({"id": self.id, "file_name": self.file_name, "content_type": self.content_type})
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    pub name: String,
    pub classification: DocumentClassification,
    pub status: DocumentStatus,
    #[serde(default, deserialize_with = "nullable_vec")]
    pub attachments: Vec<Attachment>,
}

impl ApiObject for Document {
    const NAME: &'static str = "Document";

    fn to_api_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "classification": self.classification,
            "status": self.status,
            "attachments": self.attachments.iter().map(Attachment::to_api_json).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn asset_values_created_payload() -> Value {
        json!({
            "asset": {"id": 1},
            "values": [
                {
                    "key": "k1",
                    "data": [
                        {"value": 1, "timestamp": "2021-09-13T09:44:21.296Z"},
                        {"value": 2, "timestamp": "2021-09-13T09:44:21.296Z"}
                    ],
                    "unit": {"id": 1}
                },
                {
                    "key": "k2",
                    "data": [{"value": 3}],
                    "unit": {"id": 2}
                }
            ]
        })
    }

    fn ts(s: &str) -> DateTime<Utc> {
        parse_timestamp(s).unwrap()
    }

    fn is_malformed<T>(result: Result<T>) -> bool {
        matches!(result, Err(NetilionError::MalformedResponse { .. }))
    }

    #[test]
    fn test_client_application_roundtrip_fields() {
        let body = json!({"name": "name", "id": 42, "something": -1});
        let app = ClientApplication::parse_from_api(body).unwrap();
        assert_eq!(app, ClientApplication::new("name", 42));
        assert_eq!(app.to_api_json(), json!({"name": "name", "id": 42}));
        assert_eq!(app.to_string(), "Client Application \"name\"");
    }

    #[test]
    fn test_client_application_missing_id() {
        let body = json!({"name": "app1"});
        assert!(is_malformed(ClientApplication::parse_from_api(body)));
    }

    #[test]
    fn test_asset_equality_ignores_serial_number() {
        assert_eq!(
            Asset::with_serial_number(12, "abcd"),
            Asset::with_serial_number(12, "efgh")
        );
        assert_eq!(Asset::new(12).to_api_json(), json!({"id": 12}));
    }

    #[test]
    fn test_asset_display() {
        let asset = Asset::with_serial_number(12, "abcd");
        assert_eq!(asset.to_string(), "Asset 12 (serial number abcd)");
        assert_eq!(Asset::new(3).to_string(), "Asset 3 (serial number n/a)");
    }

    #[test]
    fn test_webhook_equality_without_id() {
        let events = vec!["event_a".to_string(), "event_b".to_string()];
        let hook = WebHook::new("http://host.local", events);
        let parsed = WebHook::parse_from_api(json!({
            "url": "http://host.local",
            "event_types": ["event_a", "event_b"],
            "id": 42
        }))
        .unwrap();
        assert_eq!(hook, parsed);
        assert_eq!(parsed.id, Some(42));
        assert_eq!(
            parsed.to_api_json(),
            json!({"url": "http://host.local", "event_types": ["event_a", "event_b"]})
        );
        assert_eq!(
            parsed.to_string(),
            "WebHook <http://host.local> (events event_a,event_b)"
        );
    }

    #[test]
    fn test_webhook_requires_id_and_event_types() {
        let without_id = json!({"url": "http://host.local", "event_types": []});
        assert!(WebHook::parse_from_api(without_id).is_err());
        let without_events = json!({"url": "http://host.local", "id": 1});
        assert!(WebHook::parse_from_api(without_events).is_err());
    }

    #[test]
    fn test_unit_serialization_prefers_code() {
        let name = Some("Parsecs".to_string());
        let unit = Unit::new(Some(123), Some("parsec".to_string()), name).unwrap();
        assert_eq!(unit.to_api_json(), json!({"code": "parsec"}));
        assert_eq!(Unit::with_id(123).to_api_json(), json!({"id": 123}));
    }

    #[test]
    fn test_unit_by_code() {
        let unit = Unit::by_code("metre_per_second").unwrap();
        assert_eq!(unit.code.as_deref(), Some("metre_per_second"));
        assert!(Unit::by_code("XYZ").is_none());
    }

    #[test]
    fn test_unit_equality() {
        let body = json!({"id": 123, "code": "parsec", "name": "Parsecs"});
        let unit1 = Unit::parse_from_api(body).unwrap();
        let body = json!({"id": 123, "code": "parsec", "name": "Parsècks"});
        let unit2 = Unit::parse_from_api(body).unwrap();
        assert_eq!(unit1, unit2);

        let unit3 = Unit::parse_from_api(json!({"id": 124, "code": "parsec"})).unwrap();
        assert_ne!(unit1, unit3);
        let unit4 = Unit::parse_from_api(json!({"id": 123, "code": "ft/s"})).unwrap();
        assert_ne!(unit1, unit4);
    }

    #[test]
    fn test_unit_requires_id_or_code() {
        assert!(Unit::new(None, None, Some("name".to_string())).is_err());
        assert!(Unit::new(None, Some(String::new()), None).is_err());
        assert!(is_malformed(Unit::parse_from_api(json!({"name": "näme"}))));
    }

    #[test]
    fn test_unit_display() {
        let name = Some("Parsecs".to_string());
        let unit = Unit::new(Some(7), Some("parsec".to_string()), name).unwrap();
        assert_eq!(unit.to_string(), "Unit 7, parsec (Parsecs)");
        assert_eq!(
            Unit::with_code("percent").to_string(),
            "Unit id n/a, percent (name n/a)"
        );
        let unit = Unit::with_id(8);
        assert_eq!(unit.to_string(), "Unit 8, code n/a (name n/a)");
    }

    #[test]
    fn test_asset_value_serialization() {
        let value = AssetValue::new("k", Unit::with_id(1), 42);
        assert_eq!(
            value.to_api_json(),
            json!({"key": "k", "unit": {"id": 1}, "value": 42})
        );

        let with_ts = value.at(ts("2020-12-24T23:59:59.123Z"));
        assert_eq!(
            with_ts.to_api_json(),
            json!({
                "key": "k",
                "unit": {"id": 1},
                "value": 42,
                "timestamp": "2020-12-24T23:59:59.123Z"
            })
        );
    }

    #[test]
    fn test_asset_value_timestamp_formats() {
        let value = AssetValue::parse_from_api(json!({
            "key": "k",
            "unit": {"id": 1},
            "value": 1,
            "timestamp": "2021-09-13T08:33:05.178Z"
        }))
        .unwrap();
        let second = Utc.with_ymd_and_hms(2021, 9, 13, 8, 33, 5).unwrap();
        let expected = second + chrono::Duration::milliseconds(178);
        assert_eq!(value.timestamp, Some(expected));

        let value = AssetValue::parse_from_api(json!({
            "key": "k",
            "unit": {"id": 1},
            "value": 1,
            "timestamp": "2021-11-04T08:19:35Z"
        }))
        .unwrap();
        let expected = Utc.with_ymd_and_hms(2021, 11, 4, 8, 19, 35).unwrap();
        assert_eq!(value.timestamp, Some(expected));
    }

    #[test]
    fn test_asset_value_drops_unusable_timestamps() {
        for timestamp in ["2021-09-13T08:33:05.178", ""] {
            let value = AssetValue::parse_from_api(json!({
                "key": "k",
                "unit": {"id": 1},
                "value": 1,
                "timestamp": timestamp
            }))
            .unwrap();
            assert!(value.timestamp.is_none());
        }
    }

    #[test]
    fn test_asset_value_missing_unit() {
        let body = json!({"key": "k1", "value": 255});
        assert!(is_malformed(AssetValue::parse_from_api(body)));
    }

    #[test]
    fn test_asset_value_equality() {
        let unit = Unit::new(Some(1234), Some("c".into()), Some("n".into())).unwrap();
        assert_eq!(
            AssetValue::new("k", unit.clone(), 42),
            AssetValue::new("k", unit.clone(), 42).at(Utc::now())
        );
        let other_unit = Unit::new(Some(5678), Some("c1".into()), None).unwrap();
        assert_ne!(
            AssetValue::new("k", unit, 42),
            AssetValue::new("k", other_unit, 42)
        );
    }

    #[test]
    fn test_asset_value_display() {
        let value = AssetValue::new("level", Unit::with_code("percent"), 81.5);
        assert_eq!(
            value.to_string(),
            "AssetValue level: 81.5 (Unit id n/a, percent (name n/a), timestamp n/a)"
        );
        let value = value.at(ts("2021-11-04T08:19:35Z"));
        let rendered = value.to_string();
        assert!(rendered.ends_with(", 2021-11-04T08:19:35.000Z)"));
    }

    #[test]
    fn test_measured_value_keeps_number_kind() {
        let int: MeasuredValue = serde_json::from_value(json!(255)).unwrap();
        let float: MeasuredValue = serde_json::from_value(json!(22.5)).unwrap();
        assert_eq!(int, MeasuredValue::Integer(255));
        assert_eq!(float, MeasuredValue::Float(22.5));
        assert_eq!(serde_json::to_value(int).unwrap(), json!(255));
    }

    #[test]
    fn test_measured_value_conversions() {
        assert_eq!(MeasuredValue::from(7_i32), MeasuredValue::Integer(7));
        assert_eq!(MeasuredValue::from(7_i64), MeasuredValue::Integer(7));
        assert_eq!(MeasuredValue::from(0.5), MeasuredValue::Float(0.5));
        assert_eq!(MeasuredValue::Integer(3).as_f64(), 3.0);
        assert_eq!(MeasuredValue::Float(2.5).as_f64(), 2.5);
        assert_eq!(MeasuredValue::Integer(-4).to_string(), "-4");
        assert_eq!(MeasuredValue::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_measured_value_from_str() {
        let parse = |raw: &str| raw.parse::<MeasuredValue>().ok();
        assert_eq!(parse("3"), Some(MeasuredValue::Integer(3)));
        assert_eq!(parse("-3"), Some(MeasuredValue::Integer(-3)));
        assert_eq!(parse("3.0"), Some(MeasuredValue::Float(3.0)));
        assert_eq!(parse("1e3"), Some(MeasuredValue::Float(1000.0)));
        assert!(parse("three").is_none());
    }

    #[test]
    fn test_asset_values_by_key() {
        let value = AssetValuesByKey::new(42, ts("2020-12-24T23:59:59.123Z"));
        assert_eq!(
            value.to_api_json(),
            json!({"value": 42, "timestamp": "2020-12-24T23:59:59.123Z"})
        );
        let rendered = value.to_string();
        assert_eq!(rendered, "AssetValue 42, 2020-12-24T23:59:59.123Z");

        let body = json!({"value": 1, "timestamp": "2021-11-04T08:19:35Z"});
        let parsed = AssetValuesByKey::parse_from_api(body).unwrap();
        let expected = Utc.with_ymd_and_hms(2021, 11, 4, 8, 19, 35).unwrap();
        assert_eq!(parsed.value, MeasuredValue::Integer(1));
        assert_eq!(parsed.timestamp, expected);

        let body = json!({"value": 1, "timestamp": "yesterday"});
        assert!(AssetValuesByKey::parse_from_api(body).is_err());
    }

    #[test]
    fn test_asset_values_serialize_empty() {
        let values = AssetValues::new(Asset::new(1), vec![]);
        assert_eq!(
            values.to_api_json(),
            json!({"asset": {"id": 1}, "values": []})
        );
        assert_eq!(
            values.to_string(),
            "AssetValues (Asset 1 (serial number n/a)), 0 values contained"
        );
    }

    #[test]
    fn test_asset_values_serialize_groups_by_key() {
        let true_ts = ts("2021-09-13T09:44:21.296Z");
        let values = AssetValues::new(
            Asset::new(1),
            vec![
                AssetValue::new("k2", Unit::with_id(2), 3),
                AssetValue::new("k1", Unit::with_id(1), 1).at(true_ts),
                AssetValue::new("k1", Unit::with_id(1), 2).at(true_ts),
            ],
        );
        assert_eq!(values.to_api_json(), asset_values_created_payload());
    }

    #[test]
    fn test_asset_values_deserialize_webhook_content() {
        let body = json!({"content": asset_values_created_payload()});
        let incoming = AssetValues::parse_from_api(body).unwrap();
        assert_eq!(incoming.asset, Asset::new(1));
        assert_eq!(incoming.values.len(), 3);
        let k1 = |value: i64| AssetValue::new("k1", Unit::with_id(1), value);
        assert!(incoming.values.contains(&k1(1)));
        assert!(incoming.values.contains(&k1(2)));
        let k2 = AssetValue::new("k2", Unit::with_id(2), 3);
        assert!(incoming.values.contains(&k2));
        assert!(incoming.values[2].timestamp.is_none());
    }

    #[test]
    fn test_asset_values_order_matters() {
        let k1 = || AssetValue::new("k1", Unit::by_code("degree_celsius").unwrap(), 22.0);
        let k2 = || AssetValue::new("k2", Unit::by_code("metre_per_second").unwrap(), 36);
        let as1 = AssetValues::new(Asset::new(1), vec![k1(), k2()]);
        let as2 = AssetValues::new(Asset::new(1), vec![k1(), k2()]);
        let reversed = AssetValues::new(Asset::new(1), vec![k2(), k1()]);
        assert_eq!(as1, as2);
        assert_ne!(as1, reversed);
    }

    #[test]
    fn test_asset_system() {
        let body = json!({"id": 1234, "specifications": [{"id": 0xC0FEFE}]});
        let system = AssetSystem::parse_from_api(body).unwrap();
        assert_eq!(system, AssetSystem::new(1234));
        assert_eq!(system.specifications, vec![json!({"id": 0xC0FEFE})]);
        assert_eq!(system.to_api_json(), json!({"id": 1234}));
        assert_ne!(AssetSystem::new(1), AssetSystem::new(2));

        let body = json!({"id": 1, "specifications": null});
        let system = AssetSystem::parse_from_api(body).unwrap();
        assert!(system.specifications.is_empty());
    }

    #[test]
    fn test_node_specification_deserialization() {
        let node = NodeSpecification::parse_from_api(json!({
            "id": 1234,
            "hidden": true,
            "specifications": {"secret": {"value": 12345}}
        }))
        .unwrap();
        assert_eq!(node.id, 1234);
        assert!(node.hidden);
        assert_eq!(node.specifications["secret"]["value"], json!(12345));

        let body = json!({"id": 99, "name": "n", "hidden": "true"});
        let hidden_as_string = NodeSpecification::parse_from_api(body).unwrap();
        assert!(hidden_as_string.hidden);
    }

    #[test]
    fn test_node_specification_tolerates_nulls() {
        let body = json!({"id": 5, "name": null, "specifications": null, "hidden": null});
        let node = NodeSpecification::parse_from_api(body).unwrap();
        assert_eq!(node, NodeSpecification::new(5));
        assert!(node.name.is_empty());
        assert!(node.specifications.is_empty());
        assert!(!node.hidden);

        let body = json!({"id": 5, "hidden": 1});
        assert!(is_malformed(NodeSpecification::parse_from_api(body)));
    }

    #[test]
    fn test_node_specification_serialization() {
        let mut node = NodeSpecification::new(1234);
        assert_eq!(
            node.to_api_json(),
            json!({"id": 1234, "name": "", "hidden": false})
        );

        node.name = "NodeName".to_string();
        node.hidden = true;
        let secret = json!({"value": "abcd"});
        node.specifications.insert("secret".to_string(), secret);
        assert_eq!(
            node.to_api_json(),
            json!({
                "id": 1234,
                "name": "NodeName",
                "specifications": {"secret": {"value": "abcd"}},
                "hidden": true
            })
        );
    }

    #[test]
    fn test_node() {
        let node = Node::parse_from_api(json!({
            "id": 20,
            "name": "plant",
            "description": "north",
            "hidden": "true",
            "type": {"id": 3, "href": "https://host.local/v1/node_types/3"},
            "parent": {"id": 10}
        }))
        .unwrap();
        assert!(node.hidden);
        let node_type = node.node_type.clone().unwrap();
        assert_eq!(node_type.id, 3);
        assert_eq!(
            node.to_api_json(),
            json!({
                "id": 20,
                "name": "plant",
                "hidden": true,
                "description": "north",
                "parent": {"id": 10}
            })
        );
    }

    #[test]
    fn test_health_condition() {
        let body = json!({"id": 1, "diagnosis_code": "diag"});
        let cond = AssetHealthCondition::parse_from_api(body).unwrap();
        assert_eq!(cond, AssetHealthCondition::new(1, "diag"));
        assert_eq!(
            cond.to_api_json(),
            json!({"id": 1, "diagnosis_code": "diag"})
        );
        assert_ne!(
            AssetHealthCondition::new(1, "diag1"),
            AssetHealthCondition::new(1, "diag2")
        );
    }

    #[test]
    fn test_pagination() {
        let pagination = Pagination::parse_from_api(json!({"pagination": {
            "page_count": 8,
            "per_page": 500,
            "page": 1,
            "next": "https://next-url.com"
        }}))
        .unwrap();
        let next = Some("https://next-url.com".to_string());
        assert_eq!(pagination, Pagination::new(8, 500, 1, next));
        assert_eq!(
            pagination.to_api_json(),
            json!({"page_count": 8, "per_page": 500, "page": 1, "next": "https://next-url.com"})
        );
        assert_eq!(
            Pagination::new(8, 500, 1, None).to_api_json(),
            json!({"page_count": 8, "per_page": 500, "page": 1})
        );
    }

    #[test]
    fn test_missing_pagination() {
        let body = json!({"assets": []});
        assert!(is_malformed(Pagination::parse_from_api(body)));
    }

    #[test]
    fn test_specifications_map() {
        let specs = Specification::parse_map_from_api(json!({
            "eh.pcps.connection.standard": {
                "value": "802.11ax",
                "ui_visible": false,
                "updated_at": "2022-07-06T11:49:57.092Z"
            },
            "eh.pcps.connection.type": {"value": "wifi", "ui_visible": true, "unit": "percent"},
            "eh.pcps.signal": {"value": 60, "unit": {"id": 8}}
        }))
        .unwrap();
        assert_eq!(specs.len(), 3);

        let by_key = |key: &str| specs.iter().find(|spec| spec.key == key).unwrap();
        let standard = by_key("eh.pcps.connection.standard");
        assert!(standard.unit.is_none());
        assert_eq!(standard.updated_at, Some(ts("2022-07-06T11:49:57.092Z")));
        let connection_type = by_key("eh.pcps.connection.type");
        assert!(connection_type.ui_visible);
        assert_eq!(connection_type.unit, Some(Unit::with_code("percent")));
        assert_eq!(by_key("eh.pcps.signal").unit, Some(Unit::with_id(8)));
    }

    #[test]
    fn test_malformed_specifications() {
        let not_a_map = json!(["eh.pcps.signal"]);
        assert!(is_malformed(Specification::parse_map_from_api(not_a_map)));

        let without_value = json!({"eh.pcps.signal": {"ui_visible": true}});
        assert!(is_malformed(Specification::parse_map_from_api(without_value)));
    }

    #[test]
    fn test_specifications_patch_body() {
        let specs = vec![
            Specification::new("test_key_1", "test_value_1")
                .with_unit(Unit::by_code("metre_per_second"))
                .visible(true),
            Specification::new("test_key_2", "test_value_2"),
        ];
        assert_eq!(
            Specification::patch_body(&specs),
            json!({
                "test_key_1": {
                    "value": "test_value_1",
                    "unit": "metre_per_second",
                    "ui_visible": true
                },
                "test_key_2": {"value": "test_value_2", "ui_visible": false}
            })
        );
    }

    #[test]
    fn test_document_with_attachments() {
        let body = json!({
            "id": 1234,
            "name": "test_document",
            "classification": {"id": 3},
            "status": {"id": 1},
            "attachments": [{"id": 98, "file_name": "a.json", "content_type": "application/json"}]
        });
        let document = Document::parse_from_api(body.clone()).unwrap();
        assert_eq!(document.classification, DocumentClassification::Internal);
        assert_eq!(document.status, DocumentStatus::Undefined);
        assert_eq!(document.attachments.len(), 1);
        assert_eq!(document.to_api_json(), body);
    }

    #[test]
    fn test_document_classification_ids() {
        let classifications = [
            DocumentClassification::Undefined,
            DocumentClassification::Public,
            DocumentClassification::Internal,
            DocumentClassification::Confidential,
        ];
        for (id, classification) in (1..).zip(classifications) {
            let body = json!({"id": id});
            let parsed: DocumentClassification = serde_json::from_value(body.clone()).unwrap();
            assert_eq!(parsed, classification);
            assert_eq!(serde_json::to_value(parsed).unwrap(), body);
        }
    }

    #[test]
    fn test_document_unknown_classification_or_status() {
        let body = json!({"id": 1, "name": "d", "classification": {"id": 9}, "status": {"id": 1}});
        assert!(is_malformed(Document::parse_from_api(body)));

        let body = json!({"id": 1, "name": "d", "classification": {"id": 2}, "status": {"id": 2}});
        assert!(is_malformed(Document::parse_from_api(body)));
    }
}
