//! Stealth Profile (spec §4.10): deterministic per-seed browser fingerprint
//! generation plus jittered timing helpers for the render tiers.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientHints {
    pub platform: String,
    pub mobile: bool,
    pub brands: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub user_agent: String,
    pub viewport: Viewport,
    pub device_scale_factor: f32,
    pub locale: String,
    pub timezone_id: String,
    pub platform: String,
    pub client_hints: ClientHints,
}

struct PlatformProfile {
    platform: &'static str,
    ua_token: &'static str,
    ch_platform: &'static str,
}

const PLATFORMS: &[PlatformProfile] = &[
    PlatformProfile { platform: "Win32", ua_token: "Windows NT 10.0; Win64; x64", ch_platform: "Windows" },
    PlatformProfile { platform: "MacIntel", ua_token: "Macintosh; Intel Mac OS X 10_15_7", ch_platform: "macOS" },
    PlatformProfile { platform: "Linux x86_64", ua_token: "X11; Linux x86_64", ch_platform: "Linux" },
];

/// locale/timezone pairs that are mutually consistent (spec §4.10: "form
/// one of a fixed set of compatible pairs").
const LOCALE_TIMEZONE_PAIRS: &[(&str, &str)] = &[
    ("en-US", "America/New_York"),
    ("en-GB", "Europe/London"),
    ("de-DE", "Europe/Berlin"),
    ("fr-FR", "Europe/Paris"),
    ("ja-JP", "Asia/Tokyo"),
    ("pt-BR", "America/Sao_Paulo"),
];

const SCALE_FACTORS: &[f32] = &[1.0, 1.25, 1.5, 2.0];

fn rng_for_seed(seed: Option<&str>) -> ChaCha8Rng {
    match seed {
        Some(seed) => {
            let mut hasher = Sha256::new();
            hasher.update(seed.as_bytes());
            let digest = hasher.finalize();
            let mut seed_bytes = [0u8; 32];
            seed_bytes.copy_from_slice(&digest);
            ChaCha8Rng::from_seed(seed_bytes)
        }
        None => ChaCha8Rng::from_rng(rand::thread_rng()).expect("thread_rng never fails to seed"),
    }
}

/// Generate a fingerprint. `seed` is typically the target domain; the same
/// seed always yields the same fingerprint. `None` yields a random one.
pub fn generate(seed: Option<&str>) -> Fingerprint {
    let mut rng = rng_for_seed(seed);

    let profile = PLATFORMS.choose(&mut rng).expect("PLATFORMS is non-empty");
    let (locale, timezone_id) = *LOCALE_TIMEZONE_PAIRS.choose(&mut rng).expect("non-empty");
    let device_scale_factor = *SCALE_FACTORS.choose(&mut rng).expect("non-empty");

    let widths = [1280u32, 1366, 1440, 1536, 1920];
    let w = *widths.choose(&mut rng).expect("non-empty");
    let h = (w as f32 * 0.5625).round() as u32;

    let chrome_version = 124 + rng.gen_range(0..6);
    let user_agent = format!(
        "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{}.0.0.0 Safari/537.36",
        profile.ua_token, chrome_version
    );

    Fingerprint {
        user_agent,
        viewport: Viewport { w, h },
        device_scale_factor,
        locale: locale.to_string(),
        timezone_id: timezone_id.to_string(),
        platform: profile.platform.to_string(),
        client_hints: ClientHints {
            platform: profile.ch_platform.to_string(),
            mobile: false,
            brands: vec![format!("Chromium;v={chrome_version}"), "Not.A/Brand;v=24".to_string()],
        },
    }
}

impl Fingerprint {
    /// Headers a renderer should send alongside this fingerprint.
    pub fn headers(&self) -> Vec<(String, String)> {
        let (lang, region) = self.locale.split_once('-').unwrap_or((self.locale.as_str(), ""));
        let accept_language = if region.is_empty() {
            format!("{lang};q=0.9,en;q=0.8")
        } else {
            format!("{lang}-{region},{lang};q=0.9,en;q=0.8")
        };
        vec![
            ("User-Agent".to_string(), self.user_agent.clone()),
            ("Accept-Language".to_string(), accept_language),
        ]
    }
}

/// Timing utilities used between render attempts to avoid obviously
/// mechanical request cadence (spec §4.10: `BehavioralDelays`).
pub mod delays {
    use super::*;

    pub fn random_delay(min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        let mut rng = rand::thread_rng();
        let range = (max - min).as_millis() as u64;
        min + Duration::from_millis(rng.gen_range(0..=range))
    }

    /// `base` jittered by `± base * factor`, clamped to never go below 0.
    pub fn jittered_delay(base: Duration, factor: f64) -> Duration {
        let mut rng = rand::thread_rng();
        let jitter_ms = (base.as_millis() as f64 * factor).max(0.0);
        let delta = rng.gen_range(-jitter_ms..=jitter_ms);
        let result_ms = (base.as_millis() as f64 + delta).max(0.0);
        Duration::from_millis(result_ms as u64)
    }

    /// Exponential backoff with ±30% jitter, capped at `max`.
    pub fn exponential_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
        let exp_ms = (base.as_millis() as f64) * 2f64.powi(attempt as i32);
        let capped_ms = exp_ms.min(max.as_millis() as f64);
        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(0.7..=1.3);
        let jittered = (capped_ms * jitter).min(max.as_millis() as f64).max(0.0);
        Duration::from_millis(jittered as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_is_deterministic() {
        let a = generate(Some("example.com"));
        let b = generate(Some("example.com"));
        assert_eq!(a.user_agent, b.user_agent);
        assert_eq!(a.locale, b.locale);
        assert_eq!(a.timezone_id, b.timezone_id);
    }

    #[test]
    fn platform_fields_agree() {
        let fp = generate(Some("news.example.org"));
        let platform_token_in_ua = match fp.platform.as_str() {
            "Win32" => fp.user_agent.contains("Windows"),
            "MacIntel" => fp.user_agent.contains("Macintosh"),
            "Linux x86_64" => fp.user_agent.contains("Linux"),
            _ => false,
        };
        assert!(platform_token_in_ua);
        let ch_agrees = match fp.platform.as_str() {
            "Win32" => fp.client_hints.platform == "Windows",
            "MacIntel" => fp.client_hints.platform == "macOS",
            "Linux x86_64" => fp.client_hints.platform == "Linux",
            _ => false,
        };
        assert!(ch_agrees);
    }

    #[test]
    fn backoff_never_exceeds_cap() {
        let max = Duration::from_secs(10);
        for attempt in 0..10 {
            let d = delays::exponential_backoff(attempt, Duration::from_millis(100), max);
            assert!(d <= max);
        }
    }

    #[test]
    fn jittered_delay_never_negative() {
        let d = delays::jittered_delay(Duration::from_millis(1), 5.0);
        assert!(d >= Duration::ZERO);
    }
}
