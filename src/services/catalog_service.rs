use crate::api::CatalogSource;
use crate::config::CatalogSettings;
use crate::error::{CommandError, FetchError};
use crate::models::cache::{CachedFetch, TtlCache};
use crate::models::catalog::{CfwGuide, Firmware, Jailbreak, JbaApp, SignedStatus};
use crate::utils::autocomplete::{self, starts_with_ignore_case, MAX_CHOICES};
use crate::utils::clock::{Clock, SystemClock};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// First words of device names worth offering in device autocomplete.
const DEVICE_FAMILIES: [&str; 5] = ["iphone", "ipod", "ipad", "homepod", "apple"];

const JBA_INSTALL_URL: &str = "https://api.jailbreaks.app/install/";

/// Cached lookups over the jailbreak and firmware catalogs.
///
/// Every remote resource sits behind its own [`TtlCache`], keyed by endpoint
/// URL, so concurrent commands asking for the same catalog share one fetch.
pub struct CatalogService {
    guide: CachedFetch<String, CfwGuide>,
    jba_apps: CachedFetch<String, Vec<JbaApp>>,
    signed_status: CachedFetch<String, SignedStatus>,
    devices: CachedFetch<String, Vec<String>>,
}

impl CatalogService {
    pub fn new(source: Arc<dyn CatalogSource>, settings: &CatalogSettings) -> Self {
        Self::with_clock(source, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        source: Arc<dyn CatalogSource>,
        settings: &CatalogSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let timeout = settings.fetch_timeout();
        let guide = {
            let source = Arc::clone(&source);
            move || {
                let source = Arc::clone(&source);
                async move { source.fetch_guide().await }
            }
        };
        let jba_apps = {
            let source = Arc::clone(&source);
            move || {
                let source = Arc::clone(&source);
                async move { source.fetch_jba_apps().await }
            }
        };
        let signed_status = {
            let source = Arc::clone(&source);
            move || {
                let source = Arc::clone(&source);
                async move { source.fetch_signed_status().await }
            }
        };
        let devices = move || {
            let source = Arc::clone(&source);
            async move { source.fetch_devices().await }
        };

        Self {
            guide: bind(&clock, timeout, &settings.guide_url, settings.guide_ttl(), guide),
            jba_apps: bind(&clock, timeout, &settings.jba_apps_url, settings.jba_apps_ttl(), jba_apps),
            signed_status: bind(
                &clock,
                timeout,
                &settings.signed_status_url,
                settings.signed_status_ttl(),
                signed_status,
            ),
            devices: bind(&clock, timeout, &settings.devices_url, settings.devices_ttl(), devices),
        }
    }

    pub async fn guide(&self) -> Result<Arc<CfwGuide>, FetchError> {
        self.guide.get().await
    }

    pub async fn jba_apps(&self) -> Result<Arc<Vec<JbaApp>>, FetchError> {
        self.jba_apps.get().await
    }

    pub async fn signed_status(&self) -> Result<Arc<SignedStatus>, FetchError> {
        self.signed_status.get().await
    }

    pub async fn devices(&self) -> Result<Arc<Vec<String>>, FetchError> {
        self.devices.get().await
    }

    /// The jailbreak named `name`, ignoring case.
    #[instrument(skip(self))]
    pub async fn jailbreak(&self, name: &str) -> Result<Jailbreak, CommandError> {
        let wanted = name.to_lowercase();
        let guide = self.guide().await?;
        guide
            .jailbreaks
            .iter()
            .find(|jb| jb.name.to_lowercase() == wanted)
            .cloned()
            .ok_or_else(|| CommandError::NotFound("No jailbreak found with that name.".to_string()))
    }

    /// The firmware whose `"<version> (<build>)"` label equals `label`.
    #[instrument(skip(self))]
    pub async fn firmware(&self, label: &str) -> Result<Firmware, CommandError> {
        let guide = self.guide().await?;
        guide
            .firmwares
            .iter()
            .find(|fw| fw.label() == label)
            .cloned()
            .ok_or_else(|| {
                CommandError::NotFound("No firmware found with that version.".to_string())
            })
    }

    /// The Jailbreaks.app listing for `name`, ignoring case.
    #[instrument(skip(self))]
    pub async fn jba_app(&self, name: &str) -> Result<Option<JbaApp>, FetchError> {
        let wanted = name.to_lowercase().replace('œ', "oe");
        let apps = self.jba_apps().await?;
        Ok(apps
            .iter()
            .find(|app| app.name.to_lowercase() == wanted)
            .cloned())
    }

    /// Install link for `name`, if Jailbreaks.app lists it and is currently signed.
    #[instrument(skip(self))]
    pub async fn install_link(&self, name: &str) -> Result<Option<String>, FetchError> {
        let Some(app) = self.jba_app(name).await? else {
            return Ok(None);
        };
        let status = self.signed_status().await?;
        if !status.is_signed() {
            debug!(status = %status.status, "Jailbreaks.app is not signed");
            return Ok(None);
        }
        Ok(Some(format!("{}{}", JBA_INSTALL_URL, app.name.replace(' ', ""))))
    }

    #[instrument(skip(self))]
    pub async fn jailbreak_choices(&self, prefix: &str) -> Result<Vec<String>, FetchError> {
        let guide = self.guide().await?;
        Ok(autocomplete::complete(
            guide.jailbreaks.iter().map(|jb| jb.name.as_str()),
            prefix,
        ))
    }

    /// Firmware labels, newest first, whose version starts with `prefix`.
    #[instrument(skip(self))]
    pub async fn firmware_choices(&self, prefix: &str) -> Result<Vec<String>, FetchError> {
        let guide = self.guide().await?;
        let prefix = prefix.to_lowercase();
        Ok(guide
            .firmwares
            .iter()
            .rev()
            .filter(|fw| starts_with_ignore_case(&fw.version, &prefix))
            .take(MAX_CHOICES)
            .map(Firmware::label)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn device_choices(&self, prefix: &str) -> Result<Vec<String>, FetchError> {
        let devices = self.devices().await?;
        let apple_devices = devices.iter().filter(|name| {
            name.split_whitespace()
                .next()
                .is_some_and(|family| DEVICE_FAMILIES.contains(&family.to_lowercase().as_str()))
        });
        Ok(autocomplete::complete(apple_devices, prefix))
    }

    /// Forgets every cached catalog; the next lookup refetches.
    pub fn invalidate_all(&self) {
        self.guide.invalidate();
        self.jba_apps.invalidate();
        self.signed_status.invalidate();
        self.devices.invalidate();
        debug!("Invalidated all catalogs");
    }
}

fn bind<V, F, Fut>(
    clock: &Arc<dyn Clock>,
    timeout: Option<Duration>,
    url: &str,
    ttl: Duration,
    fetch: F,
) -> CachedFetch<String, V>
where
    V: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, FetchError>> + Send + 'static,
{
    let mut cache = TtlCache::with_clock(Arc::clone(clock));
    if let Some(timeout) = timeout {
        cache = cache.with_fetch_timeout(timeout);
    }
    CachedFetch::new(Arc::new(cache), url.to_string(), ttl, fetch)
}
