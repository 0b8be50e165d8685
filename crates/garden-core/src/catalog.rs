//! Element type catalog.
//!
//! Descriptors are immutable lookup data shared by every placed instance.
//! [`ElementTypeId::descriptor`] is the only way to reach them.

use crate::types::Layer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Simulation cycles in one day (24h at one cycle per 5 minutes)
pub const CYCLES_PER_DAY: u64 = 288;

/// Identifier of an element type, serialized as the catalog key (`"OAK_TREE"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementTypeId {
    OakTree,
    Wildflower,
    GrassPatch,
    RainCloud,
    Sunbeam,
    CompostPile,
    Boulder,
}

/// Broad behavior family of an element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Plant,
    Environmental,
}

/// Static description of an element type
#[derive(Debug)]
pub struct ElementType {
    pub id: ElementTypeId,
    pub name: &'static str,
    pub icon: &'static str,
    pub category: Category,
    pub description: &'static str,
    pub color: &'static str,
    /// Cycles needed to pass through every growth stage
    pub growth_time: Option<u64>,
    pub growth_stages: u32,
    /// `None` means the element never ages out
    pub max_age: Option<u64>,
    pub needs_sunlight: bool,
    pub min_sunlight: f64,
    pub provides_shade: bool,
    pub shade_radius: i32,
    pub attracts_pollinators: bool,
    pub spreads: bool,
    /// Lifetime in cycles for non-permanent environmental elements
    pub duration: Option<u64>,
    pub permanent: bool,
    pub effect_radius: i32,
    pub moisture_boost: f64,
    pub sunlight_boost: f64,
    pub nutrient_boost: f64,
    pub growth_boost: f64,
}

impl ElementType {
    /// Layer an instance of this type occupies. Atmospheric membership is a
    /// closed set; everything else sits on the ground.
    pub fn layer(&self) -> Layer {
        self.id.layer()
    }

    pub fn is_plant(&self) -> bool {
        self.category == Category::Plant
    }

    pub fn is_environmental(&self) -> bool {
        self.category == Category::Environmental
    }
}

const BASE: ElementType = ElementType {
    id: ElementTypeId::Boulder,
    name: "",
    icon: "",
    category: Category::Environmental,
    description: "",
    color: "",
    growth_time: None,
    growth_stages: 0,
    max_age: None,
    needs_sunlight: false,
    min_sunlight: 0.0,
    provides_shade: false,
    shade_radius: 0,
    attracts_pollinators: false,
    spreads: false,
    duration: None,
    permanent: false,
    effect_radius: 0,
    moisture_boost: 0.0,
    sunlight_boost: 0.0,
    nutrient_boost: 0.0,
    growth_boost: 1.0,
};

static OAK_TREE: ElementType = ElementType {
    id: ElementTypeId::OakTree,
    name: "Oak Tree",
    icon: "🌳",
    category: Category::Plant,
    description: "Slow growth (7 days to mature), lives 60+ days, provides shade, attracts birds",
    color: "#558B2F",
    growth_time: Some(7 * CYCLES_PER_DAY),
    growth_stages: 3,
    max_age: Some(60 * CYCLES_PER_DAY),
    needs_sunlight: true,
    min_sunlight: 50.0,
    provides_shade: true,
    shade_radius: 2,
    ..BASE
};

static WILDFLOWER: ElementType = ElementType {
    id: ElementTypeId::Wildflower,
    name: "Wildflower",
    icon: "🌸",
    category: Category::Plant,
    description: "Fast bloom (2 days), lives 10-15 days, requires sunlight, attracts pollinators",
    color: "#EC407A",
    growth_time: Some(2 * CYCLES_PER_DAY),
    growth_stages: 2,
    max_age: Some(15 * CYCLES_PER_DAY),
    needs_sunlight: true,
    min_sunlight: 60.0,
    attracts_pollinators: true,
    ..BASE
};

static GRASS_PATCH: ElementType = ElementType {
    id: ElementTypeId::GrassPatch,
    name: "Grass Patch",
    icon: "🌿",
    category: Category::Plant,
    description: "Spreads to adjacent tiles (1 per day), lives indefinitely with water",
    color: "#7CB342",
    growth_time: Some(CYCLES_PER_DAY),
    growth_stages: 1,
    max_age: None,
    needs_sunlight: true,
    min_sunlight: 40.0,
    spreads: true,
    ..BASE
};

static RAIN_CLOUD: ElementType = ElementType {
    id: ElementTypeId::RainCloud,
    name: "Rain Cloud",
    icon: "🌧️",
    category: Category::Environmental,
    description: "Waters 3x3 tile area, lasts 1 cycle, critical for survival",
    color: "#42A5F5",
    duration: Some(1),
    effect_radius: 1,
    moisture_boost: 80.0,
    ..BASE
};

static SUNBEAM: ElementType = ElementType {
    id: ElementTypeId::Sunbeam,
    name: "Sunbeam",
    icon: "☀️",
    category: Category::Environmental,
    description: "Boosts growth in 2x2 area for 2 cycles, needed for flowers",
    color: "#FDD835",
    duration: Some(2),
    effect_radius: 1,
    sunlight_boost: 90.0,
    ..BASE
};

static COMPOST_PILE: ElementType = ElementType {
    id: ElementTypeId::CompostPile,
    name: "Compost",
    icon: "🍂",
    category: Category::Environmental,
    description: "Enriches soil in 2x2 area permanently (+50% growth speed)",
    color: "#795548",
    permanent: true,
    effect_radius: 1,
    nutrient_boost: 50.0,
    growth_boost: 1.5,
    ..BASE
};

static BOULDER: ElementType = ElementType {
    id: ElementTypeId::Boulder,
    name: "Boulder",
    icon: "🪨",
    category: Category::Environmental,
    description: "Permanent decoration, creates shade, blocks spread",
    color: "#78909C",
    permanent: true,
    provides_shade: true,
    shade_radius: 1,
    ..BASE
};

impl ElementTypeId {
    pub const ALL: [ElementTypeId; 7] = [
        ElementTypeId::OakTree,
        ElementTypeId::Wildflower,
        ElementTypeId::GrassPatch,
        ElementTypeId::RainCloud,
        ElementTypeId::Sunbeam,
        ElementTypeId::CompostPile,
        ElementTypeId::Boulder,
    ];

    pub fn descriptor(self) -> &'static ElementType {
        match self {
            ElementTypeId::OakTree => &OAK_TREE,
            ElementTypeId::Wildflower => &WILDFLOWER,
            ElementTypeId::GrassPatch => &GRASS_PATCH,
            ElementTypeId::RainCloud => &RAIN_CLOUD,
            ElementTypeId::Sunbeam => &SUNBEAM,
            ElementTypeId::CompostPile => &COMPOST_PILE,
            ElementTypeId::Boulder => &BOULDER,
        }
    }

    pub fn layer(self) -> Layer {
        match self {
            ElementTypeId::RainCloud | ElementTypeId::Sunbeam => Layer::Atmospheric,
            _ => Layer::Ground,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementTypeId::OakTree => "OAK_TREE",
            ElementTypeId::Wildflower => "WILDFLOWER",
            ElementTypeId::GrassPatch => "GRASS_PATCH",
            ElementTypeId::RainCloud => "RAIN_CLOUD",
            ElementTypeId::Sunbeam => "SUNBEAM",
            ElementTypeId::CompostPile => "COMPOST_PILE",
            ElementTypeId::Boulder => "BOULDER",
        }
    }
}

impl fmt::Display for ElementTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownElementType(pub String);

impl fmt::Display for UnknownElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown element type: {}", self.0)
    }
}

impl std::error::Error for UnknownElementType {}

impl FromStr for ElementTypeId {
    type Err = UnknownElementType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        ElementTypeId::ALL
            .into_iter()
            .find(|id| id.as_str() == normalized)
            .ok_or_else(|| UnknownElementType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_lookup_matches_id() {
        for id in ElementTypeId::ALL {
            assert_eq!(id.descriptor().id, id);
        }
    }

    #[test]
    fn test_atmospheric_set_is_closed() {
        let atmospheric: Vec<_> = ElementTypeId::ALL
            .into_iter()
            .filter(|id| id.layer() == Layer::Atmospheric)
            .collect();
        assert_eq!(
            atmospheric,
            vec![ElementTypeId::RainCloud, ElementTypeId::Sunbeam]
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!("OAK_TREE".parse::<ElementTypeId>(), Ok(ElementTypeId::OakTree));
        assert_eq!("rain-cloud".parse::<ElementTypeId>(), Ok(ElementTypeId::RainCloud));
        assert!("MUSHROOM".parse::<ElementTypeId>().is_err());
    }

    #[test]
    fn test_serde_uses_catalog_keys() {
        let json = serde_json::to_string(&ElementTypeId::CompostPile).unwrap();
        assert_eq!(json, "\"COMPOST_PILE\"");
    }

    #[test]
    fn test_plant_growth_timing() {
        let oak = ElementTypeId::OakTree.descriptor();
        assert_eq!(oak.growth_time, Some(7 * CYCLES_PER_DAY));
        assert_eq!(oak.growth_stages, 3);
        assert!(ElementTypeId::GrassPatch.descriptor().max_age.is_none());
    }
}
