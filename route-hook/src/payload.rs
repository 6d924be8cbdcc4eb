//! Normalization of a city selection into the event forwarded downstream.
//!
//! The caller's payload is untyped JSON where every field is optional. The
//! normalizer never fails: any missing (or `null`) field degrades to a fixed
//! default, and present values are copied as-is whatever their JSON type.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::net::IpAddr;

pub const EVENT_TYPE: &str = "city_route_selection";
pub const UNKNOWN: &str = "unknown";
pub const DEFAULT_SOURCE: &str = "telegram_web_app";

/// `YYYY-MM-DD HH:MM:SS`, used for every human readable timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The JSON object posted by the mini-app.
pub type RawSelection = Map<String, Value>;

/// Transport-level facts about the inbound request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestMeta {
    pub remote_addr: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub server_name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Domestic,
    International,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Route {
    pub origin_country: Value,
    pub origin_country_code: Value,
    pub origin_city: Value,
    pub origin_city_code: Value,
    pub origin_city_population: Value,

    pub destination_country: Value,
    pub destination_country_code: Value,
    pub destination_city: Value,
    pub destination_city_code: Value,
    pub destination_city_population: Value,

    pub display_text: Value,
    pub display_text_en: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EventMetadata {
    pub ip_address: Value,
    pub user_agent: String,
    pub server_name: String,
    pub processed_at: String,
}

/// The envelope delivered to the webhook.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CanonicalEvent {
    pub event_type: &'static str,
    pub timestamp: String,
    pub server_time: i64,
    pub source: Value,
    pub action: Value,
    pub route_type: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Route>,
    /// Present exactly when `route` is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_type_detailed: Option<RouteKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_user: Option<Value>,
    pub metadata: EventMetadata,
}

/// Builds the canonical event for `raw`.
///
/// Pure: the result depends only on the arguments.
pub fn normalize(raw: &RawSelection, meta: &RequestMeta, now: DateTime<Utc>) -> CanonicalEvent {
    let timestamp = format_timestamp(now);

    let route = build_route(raw);
    let route_type_detailed = route.as_ref().map(|_| classify_route(raw));

    let ip_address = lookup(raw, &["ip_address"])
        .cloned()
        .or_else(|| meta.remote_addr.map(|ip| Value::String(ip.to_string())))
        .unwrap_or_else(|| Value::from(UNKNOWN));

    CanonicalEvent {
        event_type: EVENT_TYPE,
        timestamp: timestamp.clone(),
        server_time: now.timestamp(),
        source: field_or(raw, &["source"], DEFAULT_SOURCE),
        action: field_or(raw, &["action"], UNKNOWN),
        route_type: field_or(raw, &["route_type"], UNKNOWN),
        route,
        route_type_detailed,
        telegram_user: lookup(raw, &["telegram_user"]).cloned(),
        metadata: EventMetadata {
            ip_address,
            user_agent: meta.user_agent.clone().unwrap_or_else(|| UNKNOWN.into()),
            server_name: meta.server_name.clone().unwrap_or_else(|| UNKNOWN.into()),
            processed_at: timestamp,
        },
    }
}

pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

fn build_route(raw: &RawSelection) -> Option<Route> {
    lookup(raw, &["origin"])?;
    lookup(raw, &["destination"])?;

    Some(Route {
        origin_country: field_or(raw, &["origin", "country", "name"], UNKNOWN),
        origin_country_code: field_or(raw, &["origin", "country", "code"], UNKNOWN),
        origin_city: field_or(raw, &["origin", "city", "name"], UNKNOWN),
        origin_city_code: field_or(raw, &["origin", "city", "code"], UNKNOWN),
        origin_city_population: field_or(raw, &["origin", "city", "population"], UNKNOWN),

        destination_country: field_or(raw, &["destination", "country", "name"], UNKNOWN),
        destination_country_code: field_or(raw, &["destination", "country", "code"], UNKNOWN),
        destination_city: field_or(raw, &["destination", "city", "name"], UNKNOWN),
        destination_city_code: field_or(raw, &["destination", "city", "code"], UNKNOWN),
        destination_city_population: field_or(
            raw,
            &["destination", "city", "population"],
            UNKNOWN,
        ),

        display_text: field_or(raw, &["display_text"], ""),
        display_text_en: field_or(raw, &["display_text_en"], ""),
    })
}

/// Codes are compared with strict JSON equality; a missing code counts as
/// `""`, so two missing codes make a domestic route.
fn classify_route(raw: &RawSelection) -> RouteKind {
    let origin = field_or(raw, &["origin", "country", "code"], "");
    let destination = field_or(raw, &["destination", "country", "code"], "");

    if origin == destination {
        RouteKind::Domestic
    } else {
        RouteKind::International
    }
}

fn field_or(raw: &RawSelection, path: &[&str], default: &str) -> Value {
    lookup(raw, path)
        .cloned()
        .unwrap_or_else(|| Value::from(default))
}

/// Walks nested objects along `path`. Anything that is not an object on the
/// way, and a final `null`, yields `None`.
fn lookup<'a>(raw: &'a RawSelection, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = raw.get(*first)?;

    for key in rest {
        current = current.as_object()?.get(*key)?;
    }

    match current {
        Value::Null => None,
        value => Some(value),
    }
}
