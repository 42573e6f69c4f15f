//! Per-platform CLI conventions: entering and leaving configuration mode,
//! committing, aborting, paging and rejection detection.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;

static IOS_ERRORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*%\s*(?:Invalid input|Incomplete command|Ambiguous command|Unknown command|Unrecognized command|Error)")
        .expect("Invalid IOS error regex")
});

static IOSXR_ERRORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:%\s*(?:Invalid input|Incomplete command|Ambiguous command|Failed to commit)|!!\s*SEMANTIC ERRORS)")
        .expect("Invalid IOS-XR error regex")
});

static JUNOS_ERRORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:error:|syntax error|unknown command|missing mandatory argument)")
        .expect("Invalid Junos error regex")
});

static CER_ERRORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:%\s*(?:Invalid|Incomplete|Unknown|Ambiguous|Error)|Error:)")
        .expect("Invalid CER error regex")
});

static SAOS_ERRORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:SHELL PARSER FAILURE|ERROR:)").expect("Invalid SAOS error regex")
});

/// Supported device CLI dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Cisco IOS / IOS-XE
    #[default]
    CiscoIos,
    /// Cisco IOS-XR (candidate configuration, explicit commit)
    CiscoIosXr,
    /// Juniper Junos (private candidate, commit and-quit)
    JuniperJunos,
    /// Casa CER cable platform
    CasaCer,
    /// Ciena SAOS (no configuration mode)
    CienaSaos,
}

impl Platform {
    /// Every supported platform.
    pub const ALL: [Platform; 5] = [
        Platform::CiscoIos,
        Platform::CiscoIosXr,
        Platform::JuniperJunos,
        Platform::CasaCer,
        Platform::CienaSaos,
    ];

    /// Lines that enter configuration mode.
    pub fn enter_config(&self) -> &'static [&'static str] {
        match self {
            Platform::CiscoIos | Platform::CiscoIosXr => &["configure terminal"],
            Platform::JuniperJunos => &["configure private"],
            Platform::CasaCer => &["configure"],
            Platform::CienaSaos => &[],
        }
    }

    /// Lines that commit (where needed) and leave configuration mode.
    pub fn commit(&self) -> &'static [&'static str] {
        match self {
            Platform::CiscoIos | Platform::CasaCer => &["end"],
            Platform::CiscoIosXr => &["commit", "end"],
            Platform::JuniperJunos => &["commit and-quit"],
            Platform::CienaSaos => &[],
        }
    }

    /// Lines that discard pending changes and leave configuration mode.
    pub fn abort(&self) -> &'static [&'static str] {
        match self {
            Platform::CiscoIos | Platform::CasaCer => &["end"],
            Platform::CiscoIosXr => &["abort"],
            Platform::JuniperJunos => &["rollback 0", "exit configuration-mode"],
            Platform::CienaSaos => &[],
        }
    }

    /// Lines sent once when a session opens (paging off).
    pub fn prepare(&self) -> &'static [&'static str] {
        match self {
            Platform::CiscoIos => &["terminal length 0", "terminal width 511"],
            Platform::CiscoIosXr => &["terminal length 0", "terminal width 0"],
            Platform::JuniperJunos => &["set cli screen-length 0", "set cli screen-width 0"],
            Platform::CasaCer => &["page-off"],
            Platform::CienaSaos => &["system shell set more off"],
        }
    }

    /// Command printing the running configuration, optionally filtered.
    pub fn show_running(&self, filter: Option<&str>) -> String {
        let base = match self {
            Platform::JuniperJunos => "show configuration",
            Platform::CienaSaos => "configuration show",
            _ => "show running-config",
        };
        match filter {
            Some(f) if !f.trim().is_empty() => format!("{} {}", base, f.trim()),
            _ => base.to_string(),
        }
    }

    /// Line that leaves one level of a nested configuration context.
    pub fn context_exit(&self) -> &'static str {
        match self {
            Platform::JuniperJunos => "up",
            _ => "exit",
        }
    }

    /// Pattern matching a device rejection anywhere in a response.
    pub fn rejection_pattern(&self) -> &'static Regex {
        match self {
            Platform::CiscoIos => &*IOS_ERRORS,
            Platform::CiscoIosXr => &*IOSXR_ERRORS,
            Platform::JuniperJunos => &*JUNOS_ERRORS,
            Platform::CasaCer => &*CER_ERRORS,
            Platform::CienaSaos => &*SAOS_ERRORS,
        }
    }

    /// True when `response` reports a rejected command.
    pub fn is_rejection(&self, response: &str) -> bool {
        self.rejection_pattern().is_match(response)
    }

    /// What the device prints for a command it does not accept.
    pub fn invalid_input_message(&self) -> &'static str {
        match self {
            Platform::CiscoIos | Platform::CiscoIosXr => "% Invalid input detected at '^' marker.",
            Platform::JuniperJunos => "syntax error.",
            Platform::CasaCer => "% Invalid command.",
            Platform::CienaSaos => "SHELL PARSER FAILURE: invalid command",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::CiscoIos => write!(f, "cisco_ios"),
            Platform::CiscoIosXr => write!(f, "cisco_iosxr"),
            Platform::JuniperJunos => write!(f, "juniper_junos"),
            Platform::CasaCer => write!(f, "casa_cer"),
            Platform::CienaSaos => write!(f, "ciena_saos"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "cisco_ios" | "ios" | "ios_xe" | "iosxe" => Ok(Platform::CiscoIos),
            "cisco_iosxr" | "cisco_ios_xr" | "iosxr" | "ios_xr" => Ok(Platform::CiscoIosXr),
            "juniper_junos" | "junos" | "juniper" => Ok(Platform::JuniperJunos),
            "casa_cer" | "cer" | "casa" => Ok(Platform::CasaCer),
            "ciena_saos" | "saos" | "ciena" => Ok(Platform::CienaSaos),
            _ => Err(Error::Config(format!(
                "Unknown platform: {}. Valid options: cisco_ios, cisco_iosxr, juniper_junos, casa_cer, ciena_saos",
                s
            ))),
        }
    }
}
