//! Device capabilities derived from advertised message names.
//!
//! Servers report what a device accepts as a free-form list of message names
//! (`VibrateCmd`, `ScalarCmd`, ...). A small rule table maps case-insensitive
//! substrings of those names to a closed set of capabilities.

use super::protocol::DeviceInfo;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Vibrate,
    Oscillate,
    Linear,
    Rotate,
    Scalar,
    Stop,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::Vibrate,
        Capability::Oscillate,
        Capability::Linear,
        Capability::Rotate,
        Capability::Scalar,
        Capability::Stop,
    ];

    fn bit(self) -> u8 {
        match self {
            Capability::Vibrate => 1,
            Capability::Oscillate => 1 << 1,
            Capability::Linear => 1 << 2,
            Capability::Rotate => 1 << 3,
            Capability::Scalar => 1 << 4,
            Capability::Stop => 1 << 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Vibrate => "vibrate",
            Capability::Oscillate => "oscillate",
            Capability::Linear => "linear",
            Capability::Rotate => "rotate",
            Capability::Scalar => "scalar",
            Capability::Stop => "stop",
        }
    }
}

/// Substring (lowercase) → capabilities granted when a message name contains it.
///
/// Oscillation is driven through scalar commands, so `scalar` grants both.
pub const CAPABILITY_RULES: &[(&str, &[Capability])] = &[
    ("vibrate", &[Capability::Vibrate]),
    ("linear", &[Capability::Linear]),
    ("rotate", &[Capability::Rotate]),
    ("stopdevice", &[Capability::Stop]),
    ("scalar", &[Capability::Scalar, Capability::Oscillate]),
    ("oscillate", &[Capability::Oscillate]),
];

/// A set of [`Capability`] values. Empty by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet {
    bits: u8,
}

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, capability: Capability) {
        self.bits |= capability.bit();
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.bits & capability.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }

    /// Apply [`CAPABILITY_RULES`] to a list of message names.
    pub fn from_message_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut set = Self::empty();
        for name in names {
            let lower = name.as_ref().to_ascii_lowercase();
            for (needle, granted) in CAPABILITY_RULES {
                if lower.contains(needle) {
                    for capability in *granted {
                        set.insert(*capability);
                    }
                }
            }
        }
        set
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = Self::empty();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = self.iter().map(Capability::as_str).collect();
        write!(f, "{}", names.join(", "))
    }
}

impl Serialize for CapabilitySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Pick the default device from a device list.
///
/// A lone device is always chosen. Otherwise the first device that is not a
/// sensor wins, falling back to the first device.
pub fn select_device(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    if devices.len() == 1 {
        return devices.first();
    }
    devices
        .iter()
        .find(|d| !d.is_sensor)
        .or_else(|| devices.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(index: u32, is_sensor: bool) -> DeviceInfo {
        DeviceInfo {
            device_index: index,
            is_sensor,
            ..DeviceInfo::default()
        }
    }

    #[test]
    fn test_rules_match_case_insensitively() {
        let set = CapabilitySet::from_message_names(&["vibratecmd", "STOPDEVICECMD"]);
        assert!(set.contains(Capability::Vibrate));
        assert!(set.contains(Capability::Stop));
        assert!(!set.contains(Capability::Scalar));
        assert!(!set.contains(Capability::Linear));
    }

    #[test]
    fn test_scalar_grants_oscillate() {
        let set = CapabilitySet::from_message_names(&["ScalarCmd"]);
        assert!(set.contains(Capability::Scalar));
        assert!(set.contains(Capability::Oscillate));
        assert!(!set.contains(Capability::Vibrate));
    }

    #[test]
    fn test_full_device() {
        let set = CapabilitySet::from_message_names(&[
            "VibrateCmd",
            "LinearCmd",
            "RotateCmd",
            "ScalarCmd",
            "StopDeviceCmd",
        ]);
        assert_eq!(set.iter().count(), 6);
        assert_eq!(set.to_string(), "vibrate, oscillate, linear, rotate, scalar, stop");
    }

    #[test]
    fn test_unrelated_names_grant_nothing() {
        let set = CapabilitySet::from_message_names(&["SensorReadCmd", "BatteryLevelCmd"]);
        assert!(set.is_empty());
        assert_eq!(set.to_string(), "none");
        let empty: [&str; 0] = [];
        assert!(CapabilitySet::from_message_names(&empty).is_empty());
    }

    #[test]
    fn test_set_serializes_as_list() {
        let set: CapabilitySet = [Capability::Stop, Capability::Vibrate].into_iter().collect();
        assert_eq!(serde_json::to_string(&set).unwrap(), r#"["vibrate","stop"]"#);
    }

    #[test]
    fn test_single_device_is_selected_even_if_sensor() {
        let devices = vec![device(7, true)];
        assert_eq!(select_device(&devices).unwrap().device_index, 7);
    }

    #[test]
    fn test_first_non_sensor_is_preferred() {
        let devices = vec![device(0, true), device(1, false), device(2, false)];
        assert_eq!(select_device(&devices).unwrap().device_index, 1);
    }

    #[test]
    fn test_all_sensors_falls_back_to_first() {
        let devices = vec![device(3, true), device(4, true)];
        assert_eq!(select_device(&devices).unwrap().device_index, 3);
    }

    #[test]
    fn test_empty_list_selects_nothing() {
        assert!(select_device(&[]).is_none());
    }
}
