//! Synthetic device fingerprints
//!
//! Generates internally consistent identities: the GPU, screen, platform and
//! user agent always come from the same device family.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::with_rng;
use crate::StealthConfig;

/// Chrome versions (recent, realistic)
const CHROME_VERSIONS: &[&str] = &[
    "126.0.0.0",
    "127.0.0.0",
    "128.0.0.0",
    "129.0.0.0",
    "130.0.0.0",
    "131.0.0.0",
    "132.0.0.0",
    "133.0.0.0",
    "134.0.0.0",
];

/// macOS versions
const MACOS_VERSIONS: &[&str] = &["10_15_7", "12_6_0", "13_4_0", "14_2_0", "14_4_0"];

/// Device families an identity can be drawn from
pub const DEVICE_PRESETS: &[DevicePreset] = &[
    DevicePreset {
        name: "Generic Desktop",
        gpu: "NVIDIA GeForce RTX 3060",
        resolution: "1920x1080",
        platform: Platform::Windows,
        memory_gb: &[16, 32],
        canvas_baseline: "5f1c9a03be7d4e28",
    },
    DevicePreset {
        name: "MacBook Air",
        gpu: "Apple M1",
        resolution: "2560x1600",
        platform: Platform::MacOS,
        memory_gb: &[8, 16],
        canvas_baseline: "a84e02d7c13f6b90",
    },
    DevicePreset {
        name: "Windows Laptop",
        gpu: "Intel Iris Xe Graphics",
        resolution: "1366x768",
        platform: Platform::Windows,
        memory_gb: &[8, 16],
        canvas_baseline: "0c7b3e91d2a65f48",
    },
];

/// A device family
#[derive(Debug, Clone, Copy)]
pub struct DevicePreset {
    pub name: &'static str,
    pub gpu: &'static str,
    pub resolution: &'static str,
    pub platform: Platform,
    pub memory_gb: &'static [u8],
    /// Canvas hash the device produces without poisoning
    pub canvas_baseline: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "MacIntel")]
    MacOS,
    #[serde(rename = "Win32")]
    Windows,
}

impl Platform {
    /// The `navigator.platform` value
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::MacOS => "MacIntel",
            Platform::Windows => "Win32",
        }
    }
}

fn pick<'a, T, R: Rng + ?Sized>(items: &'a [T], rng: &mut R) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

/// Generate a realistic user agent for a platform
pub fn user_agent_for<R: Rng + ?Sized>(platform: Platform, rng: &mut R) -> String {
    let chrome_version = pick(CHROME_VERSIONS, rng);

    match platform {
        Platform::MacOS => {
            let macos = pick(MACOS_VERSIONS, rng);
            format!(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X {}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
                macos, chrome_version
            )
        }
        Platform::Windows => format!(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
            chrome_version
        ),
    }
}

/// Generate a random realistic user agent
pub fn random_user_agent() -> String {
    with_rng(|rng| {
        let platform = pick(DEVICE_PRESETS, rng).platform;
        user_agent_for(platform, rng)
    })
}

/// Synthetic device identity
///
/// Immutable once generated; a new session activation gets a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fingerprint {
    pub gpu: String,
    pub resolution: String,
    /// Battery level in percent
    pub battery: u8,
    pub canvas_hash: String,
    pub platform: Platform,
    pub user_agent: String,
    /// Device memory in GB
    pub ram: u8,
}

impl Fingerprint {
    /// Generate a fingerprint shaped by the stealth config
    pub fn synthesize<R: Rng + ?Sized>(config: &StealthConfig, rng: &mut R) -> Self {
        let preset = pick(DEVICE_PRESETS, rng);

        // Unpoisoned canvases render identically on every visit
        let canvas_hash = if config.canvas_poisoning {
            format!("{:016x}", rng.gen::<u64>())
        } else {
            preset.canvas_baseline.to_string()
        };

        Self {
            gpu: preset.gpu.to_string(),
            resolution: preset.resolution.to_string(),
            battery: rng.gen_range(20..=100),
            canvas_hash,
            platform: preset.platform,
            user_agent: user_agent_for(preset.platform, rng),
            ram: *pick(preset.memory_gb, rng),
        }
    }

    /// Generate a random fingerprint with the default config
    pub fn random() -> Self {
        with_rng(|rng| Self::synthesize(&StealthConfig::default(), rng))
    }

    /// First word of the GPU name, used as a short node tag
    pub fn gpu_token(&self) -> &str {
        self.gpu.split_whitespace().next().unwrap_or_default()
    }
}
