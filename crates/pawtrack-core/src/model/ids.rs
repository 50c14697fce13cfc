// ── Identity types ──
//
// Pets and devices are both keyed by opaque backend strings. Separate
// newtypes keep a device id from ever being passed where a pet id is
// expected (the location resource is keyed by device, everything else
// by pet).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self::new(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_id!(
    /// Identifier of a tracked pet. Immutable once the pet exists.
    PetId
);

string_id!(
    /// Identifier of a collar (the physical tracking device).
    DeviceId
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_transparent_in_json() {
        let id = PetId::from("P1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"P1\"");
        let back: DeviceId = serde_json::from_str("\"ESP32_001\"").unwrap();
        assert_eq!(back.as_str(), "ESP32_001");
    }

    #[test]
    fn display_and_parse() {
        let id: PetId = "luna-01".parse().unwrap();
        assert_eq!(id.to_string(), "luna-01");
    }
}
