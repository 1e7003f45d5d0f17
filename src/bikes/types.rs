//! Bike records and the bike specification used to derive components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::components::types::{ComponentType, UnknownVariant};

/// A user's bike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bike {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub year: Option<u16>,
    pub spec: BikeSpec,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a bike.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBike {
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub year: Option<u16>,
    pub spec: BikeSpec,
}

impl NewBike {
    pub fn new(name: impl Into<String>, spec: BikeSpec) -> Self {
        Self {
            name: name.into(),
            manufacturer: None,
            model: None,
            year: None,
            spec,
        }
    }
}

/// Suspension layout of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Suspension {
    Rigid,
    Hardtail { fork_travel_mm: u32 },
    /// Rear shock with a rigid fork
    RearOnly { shock_travel_mm: u32 },
    Full { fork_travel_mm: u32, shock_travel_mm: u32 },
}

impl Suspension {
    /// Derive the layout from travel figures. Zero travel means no suspension.
    pub fn from_travel(fork_travel_mm: Option<u32>, shock_travel_mm: Option<u32>) -> Self {
        match (
            fork_travel_mm.filter(|&t| t > 0),
            shock_travel_mm.filter(|&t| t > 0),
        ) {
            (Some(fork), Some(shock)) => Suspension::Full {
                fork_travel_mm: fork,
                shock_travel_mm: shock,
            },
            (Some(fork), None) => Suspension::Hardtail {
                fork_travel_mm: fork,
            },
            (None, Some(shock)) => Suspension::RearOnly {
                shock_travel_mm: shock,
            },
            (None, None) => Suspension::Rigid,
        }
    }

    pub fn has_front(&self) -> bool {
        matches!(self, Suspension::Hardtail { .. } | Suspension::Full { .. })
    }

    pub fn has_rear(&self) -> bool {
        matches!(self, Suspension::RearOnly { .. } | Suspension::Full { .. })
    }

    pub fn fork_travel_mm(&self) -> Option<u32> {
        match self {
            Suspension::Hardtail { fork_travel_mm } | Suspension::Full { fork_travel_mm, .. } => {
                Some(*fork_travel_mm)
            }
            _ => None,
        }
    }

    pub fn shock_travel_mm(&self) -> Option<u32> {
        match self {
            Suspension::RearOnly { shock_travel_mm } | Suspension::Full { shock_travel_mm, .. } => {
                Some(*shock_travel_mm)
            }
            _ => None,
        }
    }
}

/// Seatpost fitted to the bike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeatpostKind {
    #[default]
    Rigid,
    Dropper,
}

/// Brake system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BrakeKind {
    #[default]
    Disc,
    Rim,
}

/// Drivetrain layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Drivetrain {
    #[default]
    Derailleur,
    SingleSpeed,
    /// Gearbox or internally geared hub
    Internal,
}

macro_rules! token_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $token:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $token),+
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok($ty::$variant),)+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

token_enum!(SeatpostKind, "seatpost kind", { Rigid => "RIGID", Dropper => "DROPPER" });
token_enum!(BrakeKind, "brake kind", { Disc => "DISC", Rim => "RIM" });
token_enum!(Drivetrain, "drivetrain", {
    Derailleur => "DERAILLEUR",
    SingleSpeed => "SINGLE_SPEED",
    Internal => "INTERNAL",
});

/// What a bike is built from, as far as wear tracking is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BikeSpec {
    pub suspension: Suspension,
    pub seatpost: SeatpostKind,
    pub brakes: BrakeKind,
    pub drivetrain: Drivetrain,
}

impl Default for BikeSpec {
    fn default() -> Self {
        Self {
            suspension: Suspension::Rigid,
            seatpost: SeatpostKind::Rigid,
            brakes: BrakeKind::Disc,
            drivetrain: Drivetrain::Derailleur,
        }
    }
}

impl BikeSpec {
    /// Full suspension trail bike with a dropper and disc brakes.
    pub fn full_suspension(fork_travel_mm: u32, shock_travel_mm: u32) -> Self {
        Self {
            suspension: Suspension::Full {
                fork_travel_mm,
                shock_travel_mm,
            },
            seatpost: SeatpostKind::Dropper,
            ..Default::default()
        }
    }

    /// Hardtail with a rigid seatpost and disc brakes.
    pub fn hardtail(fork_travel_mm: u32) -> Self {
        Self {
            suspension: Suspension::Hardtail { fork_travel_mm },
            ..Default::default()
        }
    }

    /// Whether a component type is part of this bike's build.
    pub fn applies(&self, component_type: ComponentType) -> bool {
        match component_type {
            ComponentType::Fork => self.suspension.has_front(),
            ComponentType::Shock | ComponentType::PivotBearings => self.suspension.has_rear(),
            ComponentType::Seatpost => self.seatpost == SeatpostKind::Rigid,
            ComponentType::Dropper => self.seatpost == SeatpostKind::Dropper,
            ComponentType::BrakeRotor => self.brakes == BrakeKind::Disc,
            ComponentType::Cassette | ComponentType::RearDerailleur => {
                self.drivetrain == Drivetrain::Derailleur
            }
            ComponentType::WheelHubs
            | ComponentType::Tires
            | ComponentType::Brakes
            | ComponentType::BrakePad
            | ComponentType::Headset
            | ComponentType::BottomBracket
            | ComponentType::Chain
            | ComponentType::Chainring
            | ComponentType::Stem
            | ComponentType::Handlebar => true,
            // Aftermarket or ad-hoc parts are only ever added by hand
            ComponentType::Rims | ComponentType::Pedals | ComponentType::Other => false,
        }
    }

    /// Component types this bike is built with, in display order.
    pub fn applicable_types(&self) -> Vec<ComponentType> {
        ComponentType::ALL
            .iter()
            .copied()
            .filter(|&t| self.applies(t))
            .collect()
    }
}
