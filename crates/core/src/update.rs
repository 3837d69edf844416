//! Update lifecycle states, project protocols and device platforms.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device-facing update protocol a project speaks.
///
/// Fixed at project creation; determines which device endpoint is valid
/// for the project's updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateProtocol {
    Expo,
    Codepush,
}

impl UpdateProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expo => "expo",
            Self::Codepush => "codepush",
        }
    }
}

impl fmt::Display for UpdateProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateProtocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expo" => Ok(Self::Expo),
            "codepush" => Ok(Self::Codepush),
            other => Err(Error::InvalidConfig(format!(
                "unknown update protocol: {other}"
            ))),
        }
    }
}

/// Lifecycle state of an update. The stored state is the sole truth.
///
/// - `Empty`: reserved by prepare; uploads in flight; invisible to devices.
/// - `Pending`: commit received; a processing message is enqueued.
/// - `Processing`: the worker took ownership; assets being ingested.
/// - `Published`: ingestion succeeded; eligible for distribution.
/// - `Failed`: delivery attempts exhausted; not eligible.
/// - `Canceled`: rolled back from published; devices revert to embedded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Empty,
    Pending,
    Processing,
    Published,
    Failed,
    Canceled,
}

impl UpdateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Published => "published",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "empty" => Ok(Self::Empty),
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            other => Err(Error::InvalidConfig(format!(
                "unknown update status: {other}"
            ))),
        }
    }
}

/// Mobile platform an asset targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

/// Every platform the ingestion pipeline looks for in bundle metadata.
pub const PLATFORMS: [Platform; 2] = [Platform::Android, Platform::Ios];

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
