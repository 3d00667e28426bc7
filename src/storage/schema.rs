//! Persisted row definitions
//!
//! Two append-only collections are written by the ingestion pipeline
//! (commodity prices and mining events) plus one seeded reference collection
//! (mining sites). Rows carry typed fields for everything the dashboards
//! query; nothing here is schema-less JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MarketRecord, MiningEventRecord};

/// One commodity price observation at a station.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommodityPriceRow {
    pub commodity_name: String,
    pub station_name: String,
    pub system_name: String,
    pub buy_price: u64,
    pub sell_price: u64,
    pub supply: u64,
    pub demand: u64,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&MarketRecord> for CommodityPriceRow {
    fn from(record: &MarketRecord) -> Self {
        Self {
            commodity_name: record.commodity_name.clone(),
            station_name: record.station_name.clone(),
            system_name: record.system_name.clone(),
            buy_price: record.buy_price,
            sell_price: record.sell_price,
            supply: record.supply,
            demand: record.demand,
            source: record.source.clone(),
            timestamp: record.timestamp,
        }
    }
}

/// One refinement event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningEventRow {
    pub system_name: String,
    pub body_name: String,
    pub material_refined: String,
    pub amount: u64,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&MiningEventRecord> for MiningEventRow {
    fn from(record: &MiningEventRecord) -> Self {
        Self {
            system_name: record.system_name.clone(),
            body_name: record.body_name.clone(),
            material_refined: record.material_refined.clone(),
            amount: record.amount,
            source: record.source.clone(),
            timestamp: record.timestamp,
        }
    }
}

/// Kind of mining location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteType {
    AsteroidBelt,
    PlanetaryRing,
    Hotspot,
    ResSite,
}

impl SiteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteType::AsteroidBelt => "asteroid_belt",
            SiteType::PlanetaryRing => "planetary_ring",
            SiteType::Hotspot => "hotspot",
            SiteType::ResSite => "res_site",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asteroid_belt" => Some(SiteType::AsteroidBelt),
            "planetary_ring" => Some(SiteType::PlanetaryRing),
            "hotspot" => Some(SiteType::Hotspot),
            "res_site" => Some(SiteType::ResSite),
            _ => None,
        }
    }
}

/// Ring/belt composition class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialType {
    Metallic,
    MetalRich,
    Rocky,
    Icy,
    PristineMetallic,
}

impl MaterialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialType::Metallic => "metallic",
            MaterialType::MetalRich => "metal_rich",
            MaterialType::Rocky => "rocky",
            MaterialType::Icy => "icy",
            MaterialType::PristineMetallic => "pristine_metallic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "metallic" => Some(MaterialType::Metallic),
            "metal_rich" => Some(MaterialType::MetalRich),
            "rocky" => Some(MaterialType::Rocky),
            "icy" => Some(MaterialType::Icy),
            "pristine_metallic" => Some(MaterialType::PristineMetallic),
            _ => None,
        }
    }
}

/// A known mining location with its galactic position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningSiteRow {
    pub system_name: String,
    pub body_name: Option<String>,
    pub site_type: SiteType,
    pub material_type: Option<MaterialType>,
    pub hotspot_materials: Vec<String>,
    /// Galactic coordinates (x, y, z) in light years
    pub coordinates: [f64; 3],
    pub source: String,
}
