//! Tests for cached catalog lookups against an in-memory source.

use async_trait::async_trait;
use cfw_guide::config::CatalogSettings;
use cfw_guide::models::catalog::{CfwGuide, Firmware, Jailbreak, JbaApp, SignedStatus};
use cfw_guide::{CatalogService, CatalogSource, CommandError, FetchError, ManualClock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct FakeSource {
    guide_calls: AtomicUsize,
    apps_calls: AtomicUsize,
    guide_down: AtomicBool,
    signed: AtomicBool,
}

fn jailbreak(name: &str) -> Jailbreak {
    Jailbreak {
        name: name.to_string(),
        info: None,
    }
}

fn firmware(version: &str, build: &str) -> Firmware {
    Firmware {
        version: version.to_string(),
        build: build.to_string(),
        released: None,
        devices: vec!["iPhone15,2".to_string()],
    }
}

fn app(name: &str) -> JbaApp {
    JbaApp {
        name: name.to_string(),
        extra: BTreeMap::new(),
    }
}

#[async_trait]
impl CatalogSource for FakeSource {
    async fn fetch_guide(&self) -> Result<CfwGuide, FetchError> {
        self.guide_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.guide_down.load(Ordering::SeqCst) {
            return Err(FetchError::Other("ios.cfw.guide unreachable".to_string()));
        }
        Ok(CfwGuide {
            jailbreaks: vec![
                jailbreak("unc0ver"),
                jailbreak("Dopamine"),
                jailbreak("palera1n"),
                jailbreak("Odyssey"),
                jailbreak("odysseyra1n"),
            ],
            // Oldest first, as the guide lists them.
            firmwares: vec![
                firmware("15.7", "19H12"),
                firmware("16.5", "20F66"),
                firmware("16.6", "20G75"),
                firmware("17.0", "21A329"),
            ],
        })
    }

    async fn fetch_jba_apps(&self) -> Result<Vec<JbaApp>, FetchError> {
        self.apps_calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![app("Odyssey"), app("Chimera TV"), app("Phoenix")])
    }

    async fn fetch_signed_status(&self) -> Result<SignedStatus, FetchError> {
        let status = if self.signed.load(Ordering::SeqCst) {
            "Signed"
        } else {
            "Revoked"
        };
        Ok(SignedStatus {
            status: status.to_string(),
        })
    }

    async fn fetch_devices(&self) -> Result<Vec<String>, FetchError> {
        Ok(vec![
            "iPhone 15 Pro".to_string(),
            "iPad Air".to_string(),
            "HomePod mini".to_string(),
            "Apple Watch Series 9".to_string(),
            "MacBook Pro".to_string(),
            "iPhone SE 2".to_string(),
            "iPod touch".to_string(),
        ])
    }
}

fn service() -> (Arc<FakeSource>, Arc<ManualClock>, Arc<CatalogService>) {
    let source = Arc::new(FakeSource::default());
    let clock = Arc::new(ManualClock::new());
    let service = CatalogService::with_clock(source.clone(), &CatalogSettings::default(), clock.clone());
    (source, clock, Arc::new(service))
}

#[tokio::test]
async fn test_jailbreak_lookup_ignores_case() {
    let (_source, _clock, service) = service();

    let jb = service.jailbreak("DOPAMINE").await.unwrap();
    assert_eq!(jb.name, "Dopamine");

    match service.jailbreak("nonexistent").await {
        Err(CommandError::NotFound(message)) => {
            assert_eq!(message, "No jailbreak found with that name.")
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_firmware_lookup_uses_version_and_build_label() {
    let (_source, _clock, service) = service();

    let fw = service.firmware("16.6 (20G75)").await.unwrap();
    assert_eq!(fw.build, "20G75");
    assert!(matches!(
        service.firmware("16.6").await,
        Err(CommandError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_autocomplete_choices() {
    let (_source, _clock, service) = service();

    assert_eq!(
        service.jailbreak_choices("ody").await.unwrap(),
        vec!["Odyssey", "odysseyra1n"]
    );
    assert_eq!(
        service.firmware_choices("16").await.unwrap(),
        vec!["16.6 (20G75)", "16.5 (20F66)"]
    );
    assert_eq!(service.firmware_choices("").await.unwrap()[0], "17.0 (21A329)");
    assert_eq!(
        service.device_choices("").await.unwrap(),
        vec![
            "Apple Watch Series 9",
            "HomePod mini",
            "iPad Air",
            "iPhone 15 Pro",
            "iPhone SE 2",
            "iPod touch"
        ]
    );
    assert_eq!(service.device_choices("IPH").await.unwrap(), vec!["iPhone 15 Pro", "iPhone SE 2"]);
}

#[tokio::test]
async fn test_autocomplete_does_not_reorder_cached_catalog() {
    let (_source, _clock, service) = service();

    service.jailbreak_choices("").await.unwrap();
    let guide = service.guide().await.unwrap();
    assert_eq!(guide.jailbreaks[0].name, "unc0ver");
}

#[tokio::test]
async fn test_install_link_requires_listing_and_signature() {
    let (source, _clock, service) = service();

    assert_eq!(service.install_link("Odyssey").await.unwrap(), None);

    source.signed.store(true, Ordering::SeqCst);
    service.invalidate_all();
    assert_eq!(
        service.install_link("odyssey").await.unwrap().as_deref(),
        Some("https://api.jailbreaks.app/install/Odyssey")
    );
    assert_eq!(
        service.install_link("Chimera TV").await.unwrap().as_deref(),
        Some("https://api.jailbreaks.app/install/ChimeraTV")
    );
    assert_eq!(service.install_link("Dopamine").await.unwrap(), None);
}

#[tokio::test]
async fn test_jba_app_matches_ligature_spelling() {
    let (_source, _clock, service) = service();

    let found = service.jba_app("phœnix").await.unwrap();
    assert_eq!(found.map(|app| app.name), Some("Phoenix".to_string()));
}

#[tokio::test]
async fn test_concurrent_lookups_share_one_guide_fetch() {
    let (source, _clock, service) = service();

    let mut handles = Vec::new();
    for name in ["Dopamine", "palera1n", "unc0ver", "Odyssey"].iter().cycle().take(40) {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move { service.jailbreak(name).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(source.guide_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_guide_refreshes_after_ttl() {
    let (source, clock, service) = service();

    service.jailbreak_choices("").await.unwrap();
    service.firmware_choices("").await.unwrap();
    assert_eq!(source.guide_calls.load(Ordering::SeqCst), 1);

    clock.set(Duration::from_secs(3599));
    service.guide().await.unwrap();
    assert_eq!(source.guide_calls.load(Ordering::SeqCst), 1);

    clock.set(Duration::from_secs(3601));
    service.guide().await.unwrap();
    assert_eq!(source.guide_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_fetch_failure_surfaces_and_recovers() {
    let (source, _clock, service) = service();
    source.guide_down.store(true, Ordering::SeqCst);

    match service.jailbreak("Dopamine").await {
        Err(CommandError::Fetch(err)) => assert_eq!(err.to_string(), "ios.cfw.guide unreachable"),
        other => panic!("expected a fetch error, got {other:?}"),
    }

    source.guide_down.store(false, Ordering::SeqCst);
    assert_eq!(service.jailbreak("Dopamine").await.unwrap().name, "Dopamine");
    assert_eq!(source.guide_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_catalogs_are_cached_independently() {
    let (source, _clock, service) = service();

    service.jba_apps().await.unwrap();
    service.jba_apps().await.unwrap();
    service.guide().await.unwrap();
    assert_eq!(source.apps_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.guide_calls.load(Ordering::SeqCst), 1);

    service.invalidate_all();
    service.jba_apps().await.unwrap();
    assert_eq!(source.apps_calls.load(Ordering::SeqCst), 2);
    assert_eq!(source.guide_calls.load(Ordering::SeqCst), 1);
}
