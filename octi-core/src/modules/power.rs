use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ModuleError, ModulePayload};
use crate::ids::SyncModuleId;

/// Where Linux exposes power supplies.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/power_supply";

/// Battery charge state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Charging,
    Discharging,
    Full,
    NotCharging,
    Unknown,
}

impl ChargeStatus {
    /// Parses the `status` attribute of a sysfs battery.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "charging" => ChargeStatus::Charging,
            "discharging" => ChargeStatus::Discharging,
            "full" => ChargeStatus::Full,
            "not charging" => ChargeStatus::NotCharging,
            _ => ChargeStatus::Unknown,
        }
    }
}

impl fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChargeStatus::Charging => "charging",
            ChargeStatus::Discharging => "discharging",
            ChargeStatus::Full => "full",
            ChargeStatus::NotCharging => "not charging",
            ChargeStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Power status of a device, published as the `power` module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerInfo {
    /// `None` on devices without a battery.
    pub battery_percent: Option<u8>,
    pub status: ChargeStatus,
    /// Connected to mains or USB power.
    pub plugged: bool,
    pub updated_at: DateTime<Utc>,
}

impl PowerInfo {
    /// Reads the current power status from a sysfs `power_supply` directory.
    ///
    /// Uses the first battery found. Devices without a battery report
    /// `battery_percent: None`.
    pub fn from_sysfs(root: &Path) -> Result<Self, ModuleError> {
        let entries = fs::read_dir(root).map_err(|e| ModuleError::Io(root.to_path_buf(), e))?;

        let mut supplies: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        supplies.sort();

        let mut battery_percent = None;
        let mut status = ChargeStatus::Unknown;
        let mut plugged = false;
        let mut found_battery = false;

        for supply in supplies {
            let kind = match read_attr(&supply, "type") {
                Some(kind) => kind,
                None => continue,
            };

            match kind.as_str() {
                "Battery" if !found_battery => {
                    found_battery = true;
                    battery_percent = read_attr(&supply, "capacity")
                        .and_then(|c| c.parse::<u8>().ok())
                        .map(|c| c.min(100));
                    status = read_attr(&supply, "status")
                        .map(|s| ChargeStatus::parse(&s))
                        .unwrap_or(ChargeStatus::Unknown);
                }
                "Mains" | "USB" | "USB_C" => {
                    if read_attr(&supply, "online").as_deref() == Some("1") {
                        plugged = true;
                    }
                }
                _ => {}
            }
        }

        if matches!(status, ChargeStatus::Charging | ChargeStatus::Full) {
            plugged = true;
        }

        Ok(Self {
            battery_percent,
            status,
            plugged,
            updated_at: Utc::now(),
        })
    }
}

/// Reads a trimmed sysfs attribute, `None` if missing or unreadable.
fn read_attr(dir: &Path, name: &str) -> Option<String> {
    match fs::read_to_string(dir.join(name)) {
        Ok(value) => Some(value.trim().to_string()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::debug!("Failed to read {}/{}: {}", dir.display(), name, e);
            None
        }
    }
}

impl ModulePayload for PowerInfo {
    fn module_id() -> SyncModuleId {
        SyncModuleId::power()
    }
}

impl fmt::Display for PowerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.battery_percent {
            Some(percent) => write!(f, "{}% {}", percent, self.status)?,
            None => write!(f, "no battery")?,
        }
        if self.plugged {
            write!(f, " (plugged in)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn supply(root: &Path, name: &str, attrs: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (attr, value) in attrs {
            fs::write(dir.join(attr), format!("{}\n", value)).unwrap();
        }
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(ChargeStatus::parse("Charging\n"), ChargeStatus::Charging);
        assert_eq!(ChargeStatus::parse("Not charging"), ChargeStatus::NotCharging);
        assert_eq!(ChargeStatus::parse("weird"), ChargeStatus::Unknown);
    }

    #[test]
    fn test_laptop_on_battery() {
        let temp = TempDir::new().unwrap();
        supply(
            temp.path(),
            "BAT0",
            &[("type", "Battery"), ("capacity", "85"), ("status", "Discharging")],
        );
        supply(temp.path(), "AC", &[("type", "Mains"), ("online", "0")]);

        let info = PowerInfo::from_sysfs(temp.path()).unwrap();
        assert_eq!(info.battery_percent, Some(85));
        assert_eq!(info.status, ChargeStatus::Discharging);
        assert!(!info.plugged);
        assert_eq!(info.to_string(), "85% discharging");
    }

    #[test]
    fn test_laptop_charging() {
        let temp = TempDir::new().unwrap();
        supply(
            temp.path(),
            "BAT0",
            &[("type", "Battery"), ("capacity", "40"), ("status", "Charging")],
        );
        supply(temp.path(), "AC", &[("type", "Mains"), ("online", "1")]);

        let info = PowerInfo::from_sysfs(temp.path()).unwrap();
        assert!(info.plugged);
        assert_eq!(info.to_string(), "40% charging (plugged in)");
    }

    #[test]
    fn test_desktop_without_battery() {
        let temp = TempDir::new().unwrap();
        supply(temp.path(), "AC", &[("type", "Mains"), ("online", "1")]);

        let info = PowerInfo::from_sysfs(temp.path()).unwrap();
        assert_eq!(info.battery_percent, None);
        assert_eq!(info.status, ChargeStatus::Unknown);
        assert_eq!(info.to_string(), "no battery (plugged in)");
    }

    #[test]
    fn test_missing_sysfs_root() {
        let temp = TempDir::new().unwrap();
        let result = PowerInfo::from_sysfs(&temp.path().join("missing"));
        assert!(matches!(result, Err(ModuleError::Io(_, _))));
    }

    #[test]
    fn test_payload_roundtrip() {
        let info = PowerInfo {
            battery_percent: Some(100),
            status: ChargeStatus::Full,
            plugged: true,
            updated_at: Utc::now(),
        };

        let update = info.to_update().unwrap();
        assert_eq!(update.module_id, SyncModuleId::power());
        assert_eq!(PowerInfo::from_payload(&update.payload).unwrap(), info);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            PowerInfo::from_payload(b"charging"),
            Err(ModuleError::Decode(_, _))
        ));
    }
}
