//! String-valued enums used across the API
//!
//! Each enum parses from and serializes to its wire string, and lists its
//! accepted values in `VALUES` for validators and error messages.

use super::error::ApiError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $label:expr, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const VALUES: &'static [&'static str] = &[$($wire),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ApiError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(ApiError::invalid_value(
                        $label,
                        format!(
                            "'{}' is not one of: {}",
                            other,
                            Self::VALUES.join(", ")
                        ),
                    )),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_enum!(
    /// Status of an asynchronous task record
    TaskStatus, "task status", {
        Queued => "Queued",
        InProgress => "InProgress",
        Complete => "Complete",
        Failed => "Failed",
    }
);

string_enum!(
    /// Status embedded in resources that converge in the background
    SyncStatus, "sync status", {
        Pending => "Pending",
        Syncing => "Syncing",
        Complete => "Complete",
        Failed => "Failed",
    }
);

string_enum!(Direction, "direction", {
    Ingress => "ingress",
    Egress => "egress",
});

string_enum!(Action, "action", {
    Allow => "allow",
    Deny => "deny",
});

string_enum!(Protocol, "protocol", {
    Tcp => "tcp",
    Udp => "udp",
    Icmp => "icmp",
    Any => "any",
});

string_enum!(
    /// Load balancer distribution algorithm
    Algorithm, "algorithm", {
        RoundRobin => "round_robin",
        LeastConnections => "least_connections",
        SourceIp => "source_ip",
    }
);

string_enum!(VolumeType, "volume type", {
    Standard => "standard",
    Ssd => "ssd",
    Nvme => "nvme",
});

string_enum!(
    /// What a network policy does with traffic no rule matches
    DefaultAction, "default action", {
        Allow => "allow",
        Deny => "deny",
    }
);

string_enum!(IkeVersion, "IKE version", {
    V1 => "ikev1",
    V2 => "ikev2",
});

impl Protocol {
    /// Ports only make sense for tcp and udp
    pub fn has_ports(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Udp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_values() {
        assert_eq!("ingress".parse::<Direction>().unwrap(), Direction::Ingress);
        assert_eq!("round_robin".parse::<Algorithm>().unwrap(), Algorithm::RoundRobin);
        assert_eq!("ikev2".parse::<IkeVersion>().unwrap(), IkeVersion::V2);
        assert_eq!(TaskStatus::InProgress.to_string(), "InProgress");
    }

    #[test]
    fn rejects_unknown_values_listing_accepted_ones() {
        let err = "sideways".parse::<Direction>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid value for direction: 'sideways' is not one of: ingress, egress"
        );
        assert!("TCP".parse::<Protocol>().is_err());
    }

    #[test]
    fn serde_uses_wire_strings() {
        let json = serde_json::to_string(&VolumeType::Nvme).unwrap();
        assert_eq!(json, "\"nvme\"");

        let status: SyncStatus = serde_json::from_str("\"Syncing\"").unwrap();
        assert_eq!(status, SyncStatus::Syncing);
        assert!(serde_json::from_str::<SyncStatus>("\"Broken\"").is_err());
    }
}
