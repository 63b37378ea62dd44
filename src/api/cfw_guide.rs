use crate::api::CatalogSource;
use crate::config::CatalogSettings;
use crate::error::FetchError;
use crate::models::catalog::{CfwGuide, Device, JbaApp, SignedStatus};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

lazy_static::lazy_static! {
    static ref PARENTHESIZED: Regex = Regex::new(r"\((.*?)\)").expect("static pattern compiles");
}

/// ipsw.me omits this one.
const MISSING_DEVICE: &str = "iPhone SE 2";

/// HTTP client for ios.cfw.guide, Jailbreaks.app and ipsw.me.
pub struct CfwGuideApi {
    client: Client,
    settings: CatalogSettings,
}

impl CfwGuideApi {
    pub fn new(settings: CatalogSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        debug!("Sending request to {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::request(url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        // status.php answers with a text/html content type, so decode by hand.
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::request(url, e))?;
        serde_json::from_str(&body).map_err(|e| FetchError::malformed(url, e))
    }
}

#[async_trait]
impl CatalogSource for CfwGuideApi {
    async fn fetch_guide(&self) -> Result<CfwGuide, FetchError> {
        let guide: CfwGuide = self.get_json(&self.settings.guide_url).await?;
        debug!(
            "Parsed {} jailbreaks and {} firmwares",
            guide.jailbreaks.len(),
            guide.firmwares.len()
        );
        Ok(guide)
    }

    async fn fetch_jba_apps(&self) -> Result<Vec<JbaApp>, FetchError> {
        self.get_json(&self.settings.jba_apps_url).await
    }

    async fn fetch_signed_status(&self) -> Result<SignedStatus, FetchError> {
        self.get_json(&self.settings.signed_status_url).await
    }

    async fn fetch_devices(&self) -> Result<Vec<String>, FetchError> {
        let mut devices: Vec<Device> = self.get_json(&self.settings.devices_url).await?;
        devices.push(Device {
            name: MISSING_DEVICE.to_string(),
            identifier: "iPhone12,8".to_string(),
        });
        let names = device_names(devices.iter().map(|device| device.name.as_str()));
        debug!("Parsed {} device names", names.len());
        Ok(names)
    }
}

/// Strips regional suffixes like `(CDMA)` and square brackets.
pub fn tidy_device_name(name: &str) -> String {
    PARENTHESIZED
        .replace_all(name, "")
        .replace(['[', ']'], "")
        .trim()
        .to_string()
}

/// Tidied names, first occurrence wins.
pub fn device_names<'a, I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut names: Vec<String> = Vec::new();
    for name in raw.into_iter().map(tidy_device_name) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
