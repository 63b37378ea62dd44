use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The ios.cfw.guide `main.json` catalog, reduced to what lookups need.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CfwGuide {
    #[serde(rename = "jailbreak", default)]
    pub jailbreaks: Vec<Jailbreak>,
    #[serde(rename = "ios", default)]
    pub firmwares: Vec<Firmware>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jailbreak {
    pub name: String,
    #[serde(default)]
    pub info: Option<JailbreakInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JailbreakInfo {
    pub color: Option<String>,
    pub icon: Option<String>,
    pub latest_ver: Option<String>,
    #[serde(default)]
    pub firmwares: Vec<String>,
    pub soc: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub website: Option<Link>,
    #[serde(default)]
    pub guide: Vec<Guide>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Firmware {
    pub version: String,
    pub build: String,
    pub released: Option<String>,
    #[serde(default, deserialize_with = "device_identifiers")]
    pub devices: Vec<String>,
}

impl Firmware {
    /// `"<version> (<build>)"`, the form firmware autocomplete offers.
    pub fn label(&self) -> String {
        format!("{} ({})", self.version, self.build)
    }
}

/// The guide lists supported devices either as an array or as an object keyed by identifier.
fn device_identifiers<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Devices {
        List(Vec<String>),
        Keyed(BTreeMap<String, Value>),
    }

    Ok(match Option::<Devices>::deserialize(deserializer)? {
        Some(Devices::List(devices)) => devices,
        Some(Devices::Keyed(devices)) => devices.into_keys().collect(),
        None => Vec::new(),
    })
}

/// An app listed on Jailbreaks.app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JbaApp {
    pub name: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Jailbreaks.app certificate status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignedStatus {
    #[serde(default)]
    pub status: String,
}

impl SignedStatus {
    pub fn is_signed(&self) -> bool {
        self.status == "Signed"
    }
}

/// A device entry from ipsw.me.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub identifier: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_guide_with_keyed_and_listed_devices() {
        let guide: CfwGuide = serde_json::from_value(json!({
            "jailbreak": [{
                "name": "Dopamine",
                "info": {
                    "latestVer": "2.0",
                    "firmwares": ["15.0", "16.6.1"],
                    "type": "Semi-untethered",
                    "website": { "url": "https://ellekit.space/dopamine/" },
                    "guide": [{ "name": "Installing Dopamine", "url": "/installing-dopamine" }]
                }
            }],
            "ios": [
                { "version": "16.6", "build": "20G75", "devices": ["iPhone15,2", "iPad13,1"] },
                { "version": "16.5", "build": "20F66", "devices": { "iPhone14,2": {}, "iPhone14,3": {} } }
            ]
        }))
        .unwrap();

        let info = guide.jailbreaks[0].info.as_ref().unwrap();
        assert_eq!(info.latest_ver.as_deref(), Some("2.0"));
        assert_eq!(info.kind.as_deref(), Some("Semi-untethered"));
        assert_eq!(info.guide[0].url, "/installing-dopamine");
        assert_eq!(guide.firmwares[0].devices.len(), 2);
        assert_eq!(guide.firmwares[1].devices, vec!["iPhone14,2", "iPhone14,3"]);
        assert_eq!(guide.firmwares[1].label(), "16.5 (20F66)");
    }

    #[test]
    fn signed_status_is_exact_match() {
        assert!(SignedStatus { status: "Signed".into() }.is_signed());
        assert!(!SignedStatus { status: "Revoked".into() }.is_signed());
        assert!(!SignedStatus::default().is_signed());
    }
}
