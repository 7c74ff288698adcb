//! Browser identity generation. Given the same seed the same identity
//! comes back every time, by seeding a local `StdRng` rather than reaching
//! for a global one.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const CHROME_VERSIONS: &[&str] = &["120.0.0.0", "121.0.0.0", "122.0.0.0", "123.0.0.0", "124.0.0.0"];
const RESOLUTIONS: &[(u32, u32)] = &[
    (1920, 1080),
    (2560, 1440),
    (1366, 768),
    (1536, 864),
    (1440, 900),
];
const DEVICE_PIXEL_RATIOS: &[f64] = &[1.0, 1.25, 1.5, 2.0];
const TIMEZONES: &[(&str, i32)] =
    &[("America/New_York", -300), ("America/Chicago", -360), ("America/Los_Angeles", -480), ("America/Denver", -420)];
const WEBGL_PROFILES: &[(&str, &str)] = &[
    ("Google Inc. (NVIDIA)", "ANGLE (NVIDIA, NVIDIA GeForce RTX 3060 Direct3D11 vs_5_0 ps_5_0, D3D11)"),
    ("Google Inc. (Intel)", "ANGLE (Intel, Intel(R) UHD Graphics 630 Direct3D11 vs_5_0 ps_5_0, D3D11)"),
    ("Google Inc. (AMD)", "ANGLE (AMD, AMD Radeon RX 580 Series Direct3D11 vs_5_0 ps_5_0, D3D11)"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct BrowserIdentity {
    pub user_agent: String,
    pub platform: String,
    pub vendor: String,
    pub languages: Vec<String>,
    pub timezone: String,
    pub timezone_offset_minutes: i32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub device_pixel_ratio: f64,
    pub hardware_concurrency: u32,
    pub device_memory: u32,
    pub webgl_vendor: String,
    pub webgl_renderer: String,
    pub canvas_noise_seed: i64,
    pub sec_ch_ua: String,
}

impl BrowserIdentity {
    /// `Accept-Language` value, most-preferred first with descending q-values.
    pub fn accept_language_header(&self) -> String {
        self.languages
            .iter()
            .enumerate()
            .map(|(i, lang)| if i == 0 { lang.clone() } else { format!("{lang};q={:.1}", 1.0 - i as f64 * 0.1) })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl BrowserIdentity {
    /// Generates a deterministic identity from `seed` (e.g. a task id), or
    /// a fresh random one if `seed` is `None`.
    pub fn generate(seed: Option<&str>) -> Self {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(seed_to_u64(s)),
            None => StdRng::from_entropy(),
        };

        let version = CHROME_VERSIONS.choose(&mut rng).unwrap();
        let (width, height) = *RESOLUTIONS.choose(&mut rng).unwrap();
        let (tz_name, tz_offset) = *TIMEZONES.choose(&mut rng).unwrap();
        let (webgl_vendor, webgl_renderer) = *WEBGL_PROFILES.choose(&mut rng).unwrap();
        let major = version.split('.').next().unwrap_or("120");

        Self {
            user_agent: format!(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{version} Safari/537.36"
            ),
            platform: "Win32".to_string(),
            vendor: "Google Inc.".to_string(),
            languages: vec!["en-US".to_string(), "en".to_string()],
            timezone: tz_name.to_string(),
            timezone_offset_minutes: tz_offset,
            screen_width: width,
            screen_height: height,
            device_pixel_ratio: *DEVICE_PIXEL_RATIOS.choose(&mut rng).unwrap(),
            hardware_concurrency: *[4u32, 8, 16].choose(&mut rng).unwrap(),
            device_memory: *[4u32, 8, 16].choose(&mut rng).unwrap(),
            webgl_vendor: webgl_vendor.to_string(),
            webgl_renderer: webgl_renderer.to_string(),
            canvas_noise_seed: rng.gen_range(i64::MIN..=i64::MAX),
            sec_ch_ua: format!(
                r#""Not_A Brand";v="8", "Chromium";v="{major}", "Google Chrome";v="{major}""#
            ),
        }
    }
}

/// Any stable hash works here since all that matters is determinism, not
/// cryptographic strength.
fn seed_to_u64(seed: &str) -> u64 {
    let mut hash: u64 = 1469598103934665603; // FNV offset basis
    for byte in seed.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(1099511628211); // FNV prime
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_yields_same_identity() {
        let a = BrowserIdentity::generate(Some("task-42"));
        let b = BrowserIdentity::generate(Some("task-42"));
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_usually_differ() {
        let a = BrowserIdentity::generate(Some("task-1"));
        let b = BrowserIdentity::generate(Some("task-2"));
        assert_ne!(a, b);
    }

    #[test]
    fn accept_language_header_ranks_languages_by_q_value() {
        let identity = BrowserIdentity::generate(Some("task-lang"));
        let header = identity.accept_language_header();
        assert!(header.starts_with(&identity.languages[0]));
        assert!(header.contains("en;q=0.9") || identity.languages.len() == 1);
    }

    #[test]
    fn fingerprint_surfaces_webgl_and_canvas_noise() {
        let identity = BrowserIdentity::generate(Some("task-gpu"));
        assert!(!identity.webgl_vendor.is_empty());
        assert!(!identity.webgl_renderer.is_empty());
        assert!(identity.device_pixel_ratio > 0.0);
    }
}
