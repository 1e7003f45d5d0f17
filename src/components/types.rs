//! Component, install history and service log types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A stored enum value that did not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Kind of physical bike part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentType {
    Fork,
    Shock,
    Seatpost,
    Dropper,
    WheelHubs,
    Rims,
    Tires,
    Brakes,
    BrakePad,
    BrakeRotor,
    PivotBearings,
    Headset,
    BottomBracket,
    Chain,
    Cassette,
    Chainring,
    RearDerailleur,
    Stem,
    Handlebar,
    Pedals,
    Other,
}

impl ComponentType {
    /// Every component type, in display order.
    pub const ALL: [ComponentType; 21] = [
        ComponentType::Fork,
        ComponentType::Shock,
        ComponentType::Seatpost,
        ComponentType::Dropper,
        ComponentType::WheelHubs,
        ComponentType::Rims,
        ComponentType::Tires,
        ComponentType::Brakes,
        ComponentType::BrakePad,
        ComponentType::BrakeRotor,
        ComponentType::PivotBearings,
        ComponentType::Headset,
        ComponentType::BottomBracket,
        ComponentType::Chain,
        ComponentType::Cassette,
        ComponentType::Chainring,
        ComponentType::RearDerailleur,
        ComponentType::Stem,
        ComponentType::Handlebar,
        ComponentType::Pedals,
        ComponentType::Other,
    ];

    /// Canonical upper-case token used in storage and slot keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Fork => "FORK",
            ComponentType::Shock => "SHOCK",
            ComponentType::Seatpost => "SEATPOST",
            ComponentType::Dropper => "DROPPER",
            ComponentType::WheelHubs => "WHEEL_HUBS",
            ComponentType::Rims => "RIMS",
            ComponentType::Tires => "TIRES",
            ComponentType::Brakes => "BRAKES",
            ComponentType::BrakePad => "BRAKE_PAD",
            ComponentType::BrakeRotor => "BRAKE_ROTOR",
            ComponentType::PivotBearings => "PIVOT_BEARINGS",
            ComponentType::Headset => "HEADSET",
            ComponentType::BottomBracket => "BOTTOM_BRACKET",
            ComponentType::Chain => "CHAIN",
            ComponentType::Cassette => "CASSETTE",
            ComponentType::Chainring => "CHAINRING",
            ComponentType::RearDerailleur => "REAR_DERAILLEUR",
            ComponentType::Stem => "STEM",
            ComponentType::Handlebar => "HANDLEBAR",
            ComponentType::Pedals => "PEDALS",
            ComponentType::Other => "OTHER",
        }
    }

    /// Whether this part exists once per wheel end and is tracked as a FRONT/REAR pair.
    pub fn requires_pairing(&self) -> bool {
        matches!(
            self,
            ComponentType::Tires
                | ComponentType::Rims
                | ComponentType::Brakes
                | ComponentType::BrakePad
                | ComponentType::BrakeRotor
        )
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "component type",
                value: s.to_string(),
            })
    }
}

/// Where on the bike a component sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Location {
    Front,
    Rear,
    #[default]
    None,
}

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Front => "FRONT",
            Location::Rear => "REAR",
            Location::None => "NONE",
        }
    }

    /// The other end of a pair. `None` has no opposite.
    pub fn opposite(&self) -> Option<Location> {
        match self {
            Location::Front => Some(Location::Rear),
            Location::Rear => Some(Location::Front),
            Location::None => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FRONT" => Ok(Location::Front),
            "REAR" => Ok(Location::Rear),
            "NONE" => Ok(Location::None),
            _ => Err(UnknownVariant {
                kind: "location",
                value: s.to_string(),
            }),
        }
    }
}

/// Lifecycle state of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentStatus {
    /// Owned but not mounted on any bike
    Inventory,
    /// Mounted on a bike with one open install record
    Installed,
    /// Terminal; kept for history
    Retired,
}

impl ComponentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::Inventory => "INVENTORY",
            ComponentStatus::Installed => "INSTALLED",
            ComponentStatus::Retired => "RETIRED",
        }
    }
}

impl FromStr for ComponentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INVENTORY" => Ok(ComponentStatus::Inventory),
            "INSTALLED" => Ok(ComponentStatus::Installed),
            "RETIRED" => Ok(ComponentStatus::Retired),
            _ => Err(UnknownVariant {
                kind: "component status",
                value: s.to_string(),
            }),
        }
    }
}

/// How a baseline wear estimate was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BaselineMethod {
    #[default]
    Default,
    Slider,
    Dates,
}

impl BaselineMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaselineMethod::Default => "DEFAULT",
            BaselineMethod::Slider => "SLIDER",
            BaselineMethod::Dates => "DATES",
        }
    }
}

impl FromStr for BaselineMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEFAULT" => Ok(BaselineMethod::Default),
            "SLIDER" => Ok(BaselineMethod::Slider),
            "DATES" => Ok(BaselineMethod::Dates),
            _ => Err(UnknownVariant {
                kind: "baseline method",
                value: s.to_string(),
            }),
        }
    }
}

/// Confidence in a baseline wear estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BaselineConfidence {
    #[default]
    Low,
    Medium,
    High,
}

impl BaselineConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaselineConfidence::Low => "LOW",
            BaselineConfidence::Medium => "MEDIUM",
            BaselineConfidence::High => "HIGH",
        }
    }
}

impl FromStr for BaselineConfidence {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(BaselineConfidence::Low),
            "MEDIUM" => Ok(BaselineConfidence::Medium),
            "HIGH" => Ok(BaselineConfidence::High),
            _ => Err(UnknownVariant {
                kind: "baseline confidence",
                value: s.to_string(),
            }),
        }
    }
}

/// A physical part owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Unique identifier
    pub id: Uuid,
    /// Owner
    pub user_id: Uuid,
    /// Bike the part is mounted on (None in inventory or retired)
    pub bike_id: Option<Uuid>,
    pub component_type: ComponentType,
    pub location: Location,
    pub brand: String,
    pub model: String,
    pub notes: Option<String>,
    /// Came with the bike
    pub is_stock: bool,
    /// Accumulated ride hours since install or last service (never negative)
    pub hours_used: f64,
    /// Per-component override of the default service interval
    pub service_due_at_hours: Option<f64>,
    pub last_serviced_at: Option<DateTime<Utc>>,
    /// Estimated wear when tracking began (0-100)
    pub baseline_wear_percent: f64,
    pub baseline_method: BaselineMethod,
    pub baseline_confidence: BaselineConfidence,
    pub baseline_set_at: Option<DateTime<Utc>>,
    pub status: ComponentStatus,
    pub installed_at: Option<DateTime<Utc>>,
    pub retired_at: Option<DateTime<Utc>>,
    /// Successor that replaced this part
    pub replaced_by_id: Option<Uuid>,
    /// Shared by the FRONT and REAR members of a pair
    pub pair_group_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Component {
    /// Create a fresh inventory component with default baseline values.
    pub fn new(
        user_id: Uuid,
        component_type: ComponentType,
        location: Location,
        spec: &PartSpec,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            bike_id: None,
            component_type,
            location,
            brand: spec.brand.clone(),
            model: spec.model.clone(),
            notes: spec.notes.clone(),
            is_stock: false,
            hours_used: 0.0,
            service_due_at_hours: None,
            last_serviced_at: None,
            baseline_wear_percent: 0.0,
            baseline_method: BaselineMethod::Default,
            baseline_confidence: BaselineConfidence::Low,
            baseline_set_at: None,
            status: ComponentStatus::Inventory,
            installed_at: None,
            retired_at: None,
            replaced_by_id: None,
            pair_group_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Place the component on a bike as of `at`.
    pub fn mounted_on(mut self, bike_id: Uuid, at: DateTime<Utc>) -> Self {
        self.bike_id = Some(bike_id);
        self.status = ComponentStatus::Installed;
        self.installed_at = Some(at);
        self
    }

    /// Mark the part as brand new and confirmed by the user.
    pub fn confirmed_fresh(mut self, at: DateTime<Utc>) -> Self {
        self.baseline_wear_percent = 0.0;
        self.baseline_method = BaselineMethod::Default;
        self.baseline_confidence = BaselineConfidence::High;
        self.baseline_set_at = Some(at);
        self
    }

    pub fn is_installed(&self) -> bool {
        self.status == ComponentStatus::Installed && self.bike_id.is_some()
    }

    pub fn is_retired(&self) -> bool {
        self.status == ComponentStatus::Retired
    }
}

/// Brand/model description of a part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartSpec {
    pub brand: String,
    pub model: String,
    pub notes: Option<String>,
}

impl PartSpec {
    pub fn new(brand: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            model: model.into(),
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Generic placeholder for parts that came with the bike.
    pub fn stock() -> Self {
        Self::new("Stock", "Stock")
    }
}

/// One mounting event in a bike's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BikeComponentInstall {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bike_id: Uuid,
    pub component_id: Uuid,
    pub slot_key: String,
    pub installed_at: DateTime<Utc>,
    /// None while the component still occupies the slot
    pub removed_at: Option<DateTime<Utc>>,
}

impl BikeComponentInstall {
    pub fn is_open(&self) -> bool {
        self.removed_at.is_none()
    }
}

/// A maintenance event. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceLog {
    pub id: Uuid,
    pub component_id: Uuid,
    pub performed_at: DateTime<Utc>,
    pub notes: Option<String>,
    /// Snapshot of hours_used when the service happened
    pub hours_at_service: f64,
    pub created_at: DateTime<Utc>,
}

/// Partial update of a single field.
///
/// Distinguishes "leave unchanged" from "clear the value".
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Unset,
    Clear,
    Set(T),
}

impl<T> FieldUpdate<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, FieldUpdate::Unset)
    }

    /// Apply to a nullable field.
    pub fn apply_to(self, field: &mut Option<T>) {
        match self {
            FieldUpdate::Unset => {}
            FieldUpdate::Clear => *field = None,
            FieldUpdate::Set(value) => *field = Some(value),
        }
    }
}

/// User edits to a component's descriptive fields.
#[derive(Debug, Clone, Default)]
pub struct ComponentUpdate {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub notes: FieldUpdate<String>,
    pub service_due_at_hours: FieldUpdate<f64>,
}

impl ComponentUpdate {
    pub fn is_empty(&self) -> bool {
        self.brand.is_none()
            && self.model.is_none()
            && self.notes.is_unset()
            && self.service_due_at_hours.is_unset()
    }
}

/// Calibration of a component's starting wear.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineUpdate {
    pub component_id: Uuid,
    pub wear_percent: f64,
    pub method: BaselineMethod,
    pub confidence: BaselineConfidence,
}
