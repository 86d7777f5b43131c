//! OpenSearch instance parameters
//!
//! The API returns parameters as a free-form JSON object. Known parameters
//! are declared in `PARAMETERS` with their kind and API name; every mapping
//! goes through that table.

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};
use stackit_core::reconcile::reconcile_string_lists;
use stackit_core::schema::{AttributeSchema, AttributeType};

use crate::conversion::{MappingError, json_type_name, normalize_int64};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    String,
    Bool,
    Int64,
    StringList,
}

/// A parameter value; `None` is the typed null of an unset parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    String(Option<String>),
    Bool(Option<bool>),
    Int64(Option<i64>),
    StringList(Option<Vec<String>>),
}

impl ParameterValue {
    pub fn null(kind: ParameterKind) -> Self {
        match kind {
            ParameterKind::String => ParameterValue::String(None),
            ParameterKind::Bool => ParameterValue::Bool(None),
            ParameterKind::Int64 => ParameterValue::Int64(None),
            ParameterKind::StringList => ParameterValue::StringList(None),
        }
    }

    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::String(_) => ParameterKind::String,
            ParameterValue::Bool(_) => ParameterKind::Bool,
            ParameterValue::Int64(_) => ParameterKind::Int64,
            ParameterValue::StringList(_) => ParameterKind::StringList,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            ParameterValue::String(v) => v.is_none(),
            ParameterValue::Bool(v) => v.is_none(),
            ParameterValue::Int64(v) => v.is_none(),
            ParameterValue::StringList(v) => v.is_none(),
        }
    }

    fn to_json(&self) -> Option<Json> {
        match self {
            ParameterValue::String(v) => v.clone().map(Json::String),
            ParameterValue::Bool(v) => v.map(Json::Bool),
            ParameterValue::Int64(v) => v.map(Json::from),
            ParameterValue::StringList(v) => v
                .as_ref()
                .map(|items| Json::Array(items.iter().cloned().map(Json::String).collect())),
        }
    }

    /// Interpret a JSON value as `kind`; JSON null is the typed null
    fn from_json(attribute: &str, kind: ParameterKind, value: &Json) -> Result<Self, MappingError> {
        if value.is_null() {
            return Ok(Self::null(kind));
        }
        let mismatch = |expected| MappingError::TypeMismatch {
            attribute: attribute.to_string(),
            found: json_type_name(value),
            expected,
        };
        match kind {
            ParameterKind::String => value
                .as_str()
                .map(|s| ParameterValue::String(Some(s.to_string())))
                .ok_or_else(|| mismatch("string")),
            ParameterKind::Bool => value
                .as_bool()
                .map(|b| ParameterValue::Bool(Some(b)))
                .ok_or_else(|| mismatch("bool")),
            ParameterKind::Int64 => {
                normalize_int64(attribute, value).map(|i| ParameterValue::Int64(Some(i)))
            }
            ParameterKind::StringList => {
                let items = value.as_array().ok_or_else(|| mismatch("array of string"))?;
                let strings = items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| MappingError::ListElement {
                            attribute: attribute.to_string(),
                            found: json_type_name(item),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ParameterValue::StringList(Some(strings)))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    /// Attribute name in the declarative model
    pub name: &'static str,
    /// Key in the API payload
    pub wire_name: &'static str,
    pub kind: ParameterKind,
    pub description: &'static str,
}

pub const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec {
        name: "sgw_acl",
        wire_name: "sgw_acl",
        kind: ParameterKind::String,
        description: "Comma separated list of IP networks in CIDR notation which are allowed to access this instance.",
    },
    ParameterSpec {
        name: "enable_monitoring",
        wire_name: "enable_monitoring",
        kind: ParameterKind::Bool,
        description: "Enable monitoring.",
    },
    ParameterSpec {
        name: "graphite",
        wire_name: "graphite",
        kind: ParameterKind::String,
        description: "If set, monitoring with Graphite will be enabled. Expects the host and port where the Graphite metrics should be sent to (host:port).",
    },
    ParameterSpec {
        name: "java_garbage_collector",
        wire_name: "java_garbage_collector",
        kind: ParameterKind::String,
        description: "The garbage collector to use for OpenSearch.",
    },
    ParameterSpec {
        name: "java_heapspace",
        wire_name: "java_heapspace",
        kind: ParameterKind::Int64,
        description: "The amount of memory (in MB) allocated as heap by the JVM for OpenSearch.",
    },
    ParameterSpec {
        name: "java_maxmetaspace",
        wire_name: "java_maxmetaspace",
        kind: ParameterKind::Int64,
        description: "The amount of memory (in MB) used by the JVM to store metadata for OpenSearch.",
    },
    ParameterSpec {
        name: "max_disk_threshold",
        wire_name: "max_disk_threshold",
        kind: ParameterKind::Int64,
        description: "The maximum disk threshold in MB. If the disk usage exceeds this threshold, the instance will be stopped.",
    },
    ParameterSpec {
        name: "metrics_frequency",
        wire_name: "metrics_frequency",
        kind: ParameterKind::Int64,
        description: "The frequency in seconds at which metrics are emitted.",
    },
    ParameterSpec {
        name: "metrics_prefix",
        wire_name: "metrics_prefix",
        kind: ParameterKind::String,
        description: "The prefix for the metrics.",
    },
    ParameterSpec {
        name: "monitoring_instance_id",
        wire_name: "monitoring_instance_id",
        kind: ParameterKind::String,
        description: "The ID of the STACKIT monitoring instance.",
    },
    ParameterSpec {
        name: "plugins",
        wire_name: "plugins",
        kind: ParameterKind::StringList,
        description: "List of plugins to install. The plugins `repository-s3` and `repository-azure` are enabled by default and cannot be disabled.",
    },
    ParameterSpec {
        name: "syslog",
        wire_name: "syslog",
        kind: ParameterKind::StringList,
        description: "List of syslog servers to send logs to.",
    },
    ParameterSpec {
        name: "tls_ciphers",
        wire_name: "tls-ciphers",
        kind: ParameterKind::StringList,
        description: "List of TLS ciphers to use.",
    },
    ParameterSpec {
        name: "tls_protocols",
        wire_name: "tls-protocols",
        kind: ParameterKind::StringList,
        description: "The TLS protocols to use.",
    },
];

/// Attribute type of the nested `parameters` object
pub fn parameters_type() -> AttributeType {
    AttributeType::Object(
        PARAMETERS
            .iter()
            .map(|spec| {
                let attr_type = match spec.kind {
                    ParameterKind::String => AttributeType::String,
                    ParameterKind::Bool => AttributeType::Bool,
                    ParameterKind::Int64 => AttributeType::Int,
                    ParameterKind::StringList => {
                        AttributeType::List(Box::new(AttributeType::String))
                    }
                };
                AttributeSchema::new(spec.name, attr_type)
                    .optional_computed()
                    .with_description(spec.description)
            })
            .collect(),
    )
}

/// Every declared parameter, each set or typed null
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    values: BTreeMap<&'static str, ParameterValue>,
}

impl Parameters {
    /// Parse an API payload (keys are wire names)
    pub fn from_wire(params: &Map<String, Json>) -> Result<Self, MappingError> {
        Self::parse(params, |spec| spec.wire_name)
    }

    /// Parse the model's `parameters` object (keys are attribute names)
    pub fn from_model(params: &Map<String, Json>) -> Result<Self, MappingError> {
        Self::parse(params, |spec| spec.name)
    }

    fn parse(
        params: &Map<String, Json>,
        key: impl Fn(&ParameterSpec) -> &'static str,
    ) -> Result<Self, MappingError> {
        let mut values = BTreeMap::new();
        for spec in PARAMETERS {
            let value = match params.get(key(spec)) {
                Some(raw) => ParameterValue::from_json(spec.name, spec.kind, raw)?,
                None => ParameterValue::null(spec.kind),
            };
            values.insert(spec.name, value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// API payload with wire names; unset parameters are omitted
    pub fn to_wire(&self) -> Map<String, Json> {
        self.render(|spec| spec.wire_name)
    }

    /// Model object with attribute names; unset parameters are omitted
    pub fn to_model(&self) -> Map<String, Json> {
        self.render(|spec| spec.name)
    }

    fn render(&self, key: impl Fn(&ParameterSpec) -> &'static str) -> Map<String, Json> {
        PARAMETERS
            .iter()
            .filter_map(|spec| {
                self.values
                    .get(spec.name)
                    .and_then(ParameterValue::to_json)
                    .map(|json| (key(spec).to_string(), json))
            })
            .collect()
    }

    /// Keep the order of previously known list parameters stable
    pub fn reconcile_lists(&mut self, prior: &Parameters) {
        for (name, value) in self.values.iter_mut() {
            if let (
                ParameterValue::StringList(Some(remote)),
                Some(ParameterValue::StringList(Some(local))),
            ) = (&mut *value, prior.values.get(name))
            {
                *remote = reconcile_string_lists(local, remote);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Json) -> Map<String, Json> {
        match value {
            Json::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn absent_keys_are_typed_nulls() {
        let params = Parameters::from_wire(&Map::new()).unwrap();
        for spec in PARAMETERS {
            let value = params.get(spec.name).unwrap();
            assert!(value.is_null(), "{} should be null", spec.name);
            assert_eq!(value.kind(), spec.kind);
        }
        assert!(params.to_wire().is_empty());
    }

    #[test]
    fn maps_every_kind_from_wire() {
        let params = Parameters::from_wire(&object(json!({
            "sgw_acl": "10.0.0.0/8",
            "enable_monitoring": true,
            "java_heapspace": 2048.0,
            "metrics_frequency": 60,
            "plugins": ["analysis-icu"],
            "tls-ciphers": ["TLS_AES_128_GCM_SHA256"],
            "unknown": "ignored"
        })))
        .unwrap();

        assert_eq!(
            params.get("sgw_acl"),
            Some(&ParameterValue::String(Some("10.0.0.0/8".to_string())))
        );
        assert_eq!(
            params.get("enable_monitoring"),
            Some(&ParameterValue::Bool(Some(true)))
        );
        assert_eq!(
            params.get("java_heapspace"),
            Some(&ParameterValue::Int64(Some(2048)))
        );
        assert_eq!(
            params.get("tls_ciphers"),
            Some(&ParameterValue::StringList(Some(vec![
                "TLS_AES_128_GCM_SHA256".to_string()
            ])))
        );
        assert_eq!(params.get("tls_protocols"), Some(&ParameterValue::StringList(None)));
    }

    #[test]
    fn wire_names_translate_both_directions() {
        let params = Parameters::from_model(&object(json!({
            "tls_protocols": ["TLSv1.3"],
            "graphite": "host:2003"
        })))
        .unwrap();

        let wire = params.to_wire();
        assert_eq!(wire.get("tls-protocols"), Some(&json!(["TLSv1.3"])));
        assert!(!wire.contains_key("tls_protocols"));

        let model = params.to_model();
        assert_eq!(model.get("tls_protocols"), Some(&json!(["TLSv1.3"])));
        assert_eq!(model.get("graphite"), Some(&json!("host:2003")));
    }

    #[test]
    fn type_mismatch_is_mapping_error() {
        let cases = [
            json!({"sgw_acl": 1}),
            json!({"enable_monitoring": "yes"}),
            json!({"max_disk_threshold": "80"}),
            json!({"syslog": "logs.example:514"}),
            json!({"plugins": ["a", 1]}),
        ];
        for case in cases {
            assert!(
                Parameters::from_wire(&object(case.clone())).is_err(),
                "{} should fail",
                case
            );
        }
    }

    #[test]
    fn reconcile_keeps_prior_order() {
        let prior = Parameters::from_model(&object(json!({
            "plugins": ["a", "b", "c"]
        })))
        .unwrap();
        let mut remote = Parameters::from_wire(&object(json!({
            "plugins": ["d", "c", "b"],
            "syslog": ["x"]
        })))
        .unwrap();

        remote.reconcile_lists(&prior);
        assert_eq!(
            remote.get("plugins"),
            Some(&ParameterValue::StringList(Some(vec![
                "b".to_string(),
                "c".to_string(),
                "d".to_string()
            ])))
        );
        assert_eq!(
            remote.get("syslog"),
            Some(&ParameterValue::StringList(Some(vec!["x".to_string()])))
        );
    }

    #[test]
    fn parameters_type_declares_every_parameter() {
        match parameters_type() {
            AttributeType::Object(fields) => assert_eq!(fields.len(), PARAMETERS.len()),
            other => panic!("unexpected type {:?}", other),
        }
    }
}
