//! Payloads of the endpoints the client exposes directly.
//!
//! Only the commonly used fields are typed; everything else the daemon
//! sends is kept in `extra`.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Component of a daemon version report (`Engine`, `containerd`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComponentVersion {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// `GET /version`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerVersion {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub api_version: String,
    #[serde(default, rename = "MinAPIVersion")]
    pub min_api_version: Option<String>,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub kernel_version: Option<String>,
    #[serde(default)]
    pub experimental: bool,
    #[serde(default)]
    pub components: Vec<ComponentVersion>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET /info`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemInfo {
    #[serde(default, rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub server_version: String,
    #[serde(default)]
    pub operating_system: String,
    #[serde(default, rename = "OSType")]
    pub os_type: String,
    #[serde(default)]
    pub architecture: String,
    #[serde(default, rename = "NCPU")]
    pub ncpu: u32,
    #[serde(default)]
    pub mem_total: u64,
    #[serde(default)]
    pub containers: u64,
    #[serde(default)]
    pub images: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_server_version_payload() {
        let version: ServerVersion = serde_json::from_str(
            r#"{
                "Version": "24.0.7",
                "ApiVersion": "1.43",
                "MinAPIVersion": "1.12",
                "Os": "linux",
                "Arch": "amd64",
                "Components": [
                    {"Name": "Engine", "Version": "24.0.7", "Details": {"GitCommit": "311b9ff"}}
                ],
                "GoVersion": "go1.20.10"
            }"#,
        )
        .unwrap();

        assert_eq!(version.api_version, "1.43");
        assert_eq!(version.min_api_version.as_deref(), Some("1.12"));
        assert_eq!(version.os, "linux");
        assert_eq!(version.components[0].name, "Engine");
        assert_eq!(version.extra["GoVersion"], "go1.20.10");
    }

    #[test]
    fn test_system_info_payload() {
        let info: SystemInfo = serde_json::from_str(
            r#"{
                "ID": "7TRN",
                "Name": "node-1",
                "OSType": "linux",
                "NCPU": 8,
                "MemTotal": 16777216,
                "Driver": "overlay2"
            }"#,
        )
        .unwrap();

        assert_eq!(info.id, "7TRN");
        assert_eq!(info.os_type, "linux");
        assert_eq!(info.ncpu, 8);
        assert_eq!(info.extra["Driver"], "overlay2");
    }
}
