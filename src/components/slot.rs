//! Slot keys: canonical names for mounting positions on a bike.
//!
//! Non-pairing types occupy a single position named by the type alone
//! (`FORK`). Pairing types name the end of the bike as well (`TIRES:FRONT`).
//! A pairing type with no location (`TIRES`) is the legacy single-unit slot
//! that predates front/rear tracking.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::{ComponentType, Location};

/// A mounting position on a bike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub component_type: ComponentType,
    pub location: Location,
}

impl Slot {
    /// Build a slot, dropping the location for types that are not tracked per end.
    pub fn new(component_type: ComponentType, location: Location) -> Self {
        let location = if component_type.requires_pairing() {
            location
        } else {
            Location::None
        };
        Self {
            component_type,
            location,
        }
    }

    /// Canonical key for this slot.
    pub fn key(&self) -> String {
        slot_key(self.component_type, self.location)
    }

    /// The slot at the other end of the bike, for pairing types.
    pub fn opposite(&self) -> Option<Slot> {
        if !self.component_type.requires_pairing() {
            return None;
        }
        self.location
            .opposite()
            .map(|location| Slot::new(self.component_type, location))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for Slot {
    type Err = SlotKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (component_type, location) = parse_slot_key(s)?;
        Ok(Slot {
            component_type,
            location,
        })
    }
}

/// Produce the canonical slot key for a type and location.
pub fn slot_key(component_type: ComponentType, location: Location) -> String {
    if component_type.requires_pairing() && location != Location::None {
        format!("{}:{}", component_type.as_str(), location.as_str())
    } else {
        component_type.as_str().to_string()
    }
}

/// Inverse of [`slot_key`].
pub fn parse_slot_key(key: &str) -> Result<(ComponentType, Location), SlotKeyError> {
    match key.split_once(':') {
        None => {
            let component_type = key
                .parse::<ComponentType>()
                .map_err(|_| SlotKeyError::UnknownType(key.to_string()))?;
            Ok((component_type, Location::None))
        }
        Some((type_part, location_part)) => {
            let component_type = type_part
                .parse::<ComponentType>()
                .map_err(|_| SlotKeyError::UnknownType(type_part.to_string()))?;
            if !component_type.requires_pairing() {
                return Err(SlotKeyError::UnexpectedLocation(key.to_string()));
            }
            let location = match location_part {
                "FRONT" => Location::Front,
                "REAR" => Location::Rear,
                _ => return Err(SlotKeyError::UnknownLocation(key.to_string())),
            };
            Ok((component_type, location))
        }
    }
}

/// Slot key parse errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotKeyError {
    #[error("Unknown component type in slot key: {0}")]
    UnknownType(String),

    #[error("Unknown location in slot key: {0}")]
    UnknownLocation(String),

    #[error("Component type does not take a location: {0}")]
    UnexpectedLocation(String),
}
