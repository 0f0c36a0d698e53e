//! Static service catalog.
//!
//! One [`ServiceDescriptor`] per external API, defined at compile time. The
//! descriptor says how to authenticate and which endpoint proves a credential
//! works; the per-service response handling lives in [`crate::adapters`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The fixed set of external services a credential can be stored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceId {
    #[serde(rename = "HACKERONE")]
    HackerOne,
    #[serde(rename = "BUGCROWD")]
    Bugcrowd,
    #[serde(rename = "INTIGRITI")]
    Intigriti,
    #[serde(rename = "SHODAN")]
    Shodan,
    #[serde(rename = "VIRUSTOTAL")]
    VirusTotal,
    #[serde(rename = "NVD")]
    Nvd,
    #[serde(rename = "ALIENVAULT_OTX")]
    AlienVaultOtx,
    #[serde(rename = "GITHUB")]
    GitHub,
}

impl ServiceId {
    /// Every service, in catalog order. Fan-out and listings follow this order.
    pub const ALL: [Self; 8] = [
        Self::HackerOne,
        Self::Bugcrowd,
        Self::Intigriti,
        Self::Shodan,
        Self::VirusTotal,
        Self::Nvd,
        Self::AlienVaultOtx,
        Self::GitHub,
    ];

    /// The persisted identifier (e.g. `HACKERONE`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HackerOne => "HACKERONE",
            Self::Bugcrowd => "BUGCROWD",
            Self::Intigriti => "INTIGRITI",
            Self::Shodan => "SHODAN",
            Self::VirusTotal => "VIRUSTOTAL",
            Self::Nvd => "NVD",
            Self::AlienVaultOtx => "ALIENVAULT_OTX",
            Self::GitHub => "GITHUB",
        }
    }

    /// The static descriptor for this service.
    #[must_use]
    pub fn descriptor(self) -> &'static ServiceDescriptor {
        match self {
            Self::HackerOne => &HACKERONE,
            Self::Bugcrowd => &BUGCROWD,
            Self::Intigriti => &INTIGRITI,
            Self::Shodan => &SHODAN,
            Self::VirusTotal => &VIRUSTOTAL,
            Self::Nvd => &NVD,
            Self::AlienVaultOtx => &ALIENVAULT_OTX,
            Self::GitHub => &GITHUB,
        }
    }

    /// Human-readable name used in notifications.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        self.descriptor().name
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown service '{0}'")]
pub struct UnknownService(pub String);

impl FromStr for ServiceId {
    type Err = UnknownService;

    /// Case-insensitive; `-` and `_` are interchangeable
    /// (`hackerone`, `alienvault-otx`, `ALIENVAULT_OTX`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| UnknownService(s.to_owned()))
    }
}

/// How a service expects its credential to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// The raw key in a named header.
    ApiKey { header: &'static str },
    /// No credential is sent.
    None,
}

/// Static metadata describing how to authenticate against and probe one API.
#[derive(Debug, Clone, Copy)]
pub struct ServiceDescriptor {
    pub id: ServiceId,
    pub name: &'static str,
    pub base_url: &'static str,
    pub auth: AuthScheme,
    /// Side-effect free "who am I" endpoint, relative to `base_url`.
    pub probe_path: &'static str,
    /// Advisory only; never enforced.
    pub scopes: &'static [&'static str],
    pub docs_url: &'static str,
}

/// A read operation that several services offer in equivalent form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Bug-bounty programs.
    Programs,
    /// Recent vulnerabilities, advisories and threat pulses.
    ThreatFeed,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Programs => f.write_str("programs"),
            Self::ThreatFeed => f.write_str("threat feed"),
        }
    }
}

static HACKERONE: ServiceDescriptor = ServiceDescriptor {
    id: ServiceId::HackerOne,
    name: "HackerOne",
    base_url: "https://api.hackerone.com/v1",
    auth: AuthScheme::Bearer,
    probe_path: "/hackers/me",
    scopes: &["hacker:read", "programs:read"],
    docs_url: "https://api.hackerone.com/hacker-resources/",
};

static BUGCROWD: ServiceDescriptor = ServiceDescriptor {
    id: ServiceId::Bugcrowd,
    name: "Bugcrowd",
    base_url: "https://api.bugcrowd.com",
    auth: AuthScheme::Bearer,
    probe_path: "/user",
    scopes: &["programs:read"],
    docs_url: "https://docs.bugcrowd.com/api/getting-started/",
};

static INTIGRITI: ServiceDescriptor = ServiceDescriptor {
    id: ServiceId::Intigriti,
    name: "Intigriti",
    base_url: "https://api.intigriti.com/external/researcher/v1",
    auth: AuthScheme::Bearer,
    probe_path: "/programs?limit=1",
    scopes: &["external_researcher_api"],
    docs_url: "https://api.intigriti.com/external/researcher/swagger/index.html",
};

static SHODAN: ServiceDescriptor = ServiceDescriptor {
    id: ServiceId::Shodan,
    name: "Shodan",
    base_url: "https://api.shodan.io",
    auth: AuthScheme::ApiKey { header: "X-API-Key" },
    probe_path: "/api-info",
    scopes: &[],
    docs_url: "https://developer.shodan.io/api",
};

static VIRUSTOTAL: ServiceDescriptor = ServiceDescriptor {
    id: ServiceId::VirusTotal,
    name: "VirusTotal",
    base_url: "https://www.virustotal.com/api/v3",
    auth: AuthScheme::ApiKey { header: "x-apikey" },
    probe_path: "/users/me",
    scopes: &[],
    docs_url: "https://docs.virustotal.com/reference/overview",
};

static NVD: ServiceDescriptor = ServiceDescriptor {
    id: ServiceId::Nvd,
    name: "NVD",
    base_url: "https://services.nvd.nist.gov/rest/json",
    auth: AuthScheme::ApiKey { header: "apiKey" },
    probe_path: "/cves/2.0?resultsPerPage=1",
    scopes: &[],
    docs_url: "https://nvd.nist.gov/developers/vulnerabilities",
};

static ALIENVAULT_OTX: ServiceDescriptor = ServiceDescriptor {
    id: ServiceId::AlienVaultOtx,
    name: "AlienVault OTX",
    base_url: "https://otx.alienvault.com/api/v1",
    auth: AuthScheme::ApiKey {
        header: "X-OTX-API-KEY",
    },
    probe_path: "/users/me",
    scopes: &[],
    docs_url: "https://otx.alienvault.com/api",
};

static GITHUB: ServiceDescriptor = ServiceDescriptor {
    id: ServiceId::GitHub,
    name: "GitHub",
    base_url: "https://api.github.com",
    auth: AuthScheme::Bearer,
    probe_path: "/user",
    scopes: &["read:user"],
    docs_url: "https://docs.github.com/en/rest/security-advisories/global-advisories",
};
