//! Service/socket dependency registry.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const JSON_REGISTRY: &str = "sockets/registry.json";
pub const TS_REGISTRY: &str = "src/lib/asymm-socket/registry.ts";

static TS_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'(?P<id>[^']+)':\s*\{(?P<body>[^}]*)\}").unwrap());

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"['"]([^'"]+)['"]"#).unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLinks {
    #[serde(default)]
    pub upstream: Vec<String>,
    #[serde(default)]
    pub downstream: Vec<String>,
}

pub type ServiceRegistry = BTreeMap<String, ServiceLinks>;

#[derive(Debug, Deserialize)]
struct JsonRegistry {
    #[serde(default)]
    sockets: Vec<JsonSocket>,
}

#[derive(Debug, Deserialize)]
struct JsonSocket {
    id: String,
    #[serde(flatten)]
    links: ServiceLinks,
}

pub fn parse_json_registry(text: &str) -> ServiceRegistry {
    match serde_json::from_str::<JsonRegistry>(text) {
        Ok(registry) => registry
            .sockets
            .into_iter()
            .map(|socket| (socket.id, socket.links))
            .collect(),
        Err(e) => {
            log::warn!("Could not parse service registry: {}", e);
            ServiceRegistry::new()
        }
    }
}

fn list_after(body: &str, key: &str) -> Vec<String> {
    let pattern = format!(r"{key}:\s*\[([^\]]*)\]");
    Regex::new(&pattern)
        .ok()
        .and_then(|re| re.captures(body).map(|c| c[1].to_string()))
        .map(|list| {
            QUOTED
                .captures_iter(&list)
                .map(|c| c[1].to_string())
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_ts_registry(text: &str) -> ServiceRegistry {
    TS_ENTRY
        .captures_iter(text)
        .filter(|c| c["body"].contains("stream"))
        .map(|c| {
            let body = &c["body"];
            (
                c["id"].to_string(),
                ServiceLinks {
                    upstream: list_after(body, "upstream"),
                    downstream: list_after(body, "downstream"),
                },
            )
        })
        .collect()
}

pub fn load_registry(project_root: &Path) -> ServiceRegistry {
    let json = project_root.join(JSON_REGISTRY);
    if let Ok(text) = std::fs::read_to_string(&json) {
        return parse_json_registry(&text);
    }
    std::fs::read_to_string(project_root.join(TS_REGISTRY))
        .map(|text| parse_ts_registry(&text))
        .unwrap_or_default()
}
