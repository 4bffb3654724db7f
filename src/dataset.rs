// src/dataset.rs
//! Dataset catalogue: which asset types exist, which of them carry a lease
//! (rent) variant, and how each (asset, trade) pair maps onto an upstream
//! endpoint, a raw-cache prefix and the pair of tool names.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Apartment,
    Officetel,
    RowHouse,
    SingleDetached,
    Commercial,
    Land,
    Industrial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeType {
    Trade,
    Rent,
}

impl AssetType {
    pub const ALL: [AssetType; 7] = [
        AssetType::Apartment,
        AssetType::Officetel,
        AssetType::RowHouse,
        AssetType::SingleDetached,
        AssetType::Commercial,
        AssetType::Land,
        AssetType::Industrial,
    ];

    /// Commercial, land and industrial only publish sales.
    pub fn is_trade_only(self) -> bool {
        matches!(
            self,
            AssetType::Commercial | AssetType::Land | AssetType::Industrial
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::Apartment => "apartment",
            AssetType::Officetel => "officetel",
            AssetType::RowHouse => "row_house",
            AssetType::SingleDetached => "single_detached",
            AssetType::Commercial => "commercial",
            AssetType::Land => "land",
            AssetType::Industrial => "industrial",
        }
    }
}

impl TradeType {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeType::Trade => "trade",
            TradeType::Rent => "rent",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A valid (asset, trade) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dataset {
    pub asset: AssetType,
    pub trade: TradeType,
}

impl Dataset {
    pub const ALL: [Dataset; 11] = [
        Dataset::of(AssetType::Apartment, TradeType::Trade),
        Dataset::of(AssetType::Apartment, TradeType::Rent),
        Dataset::of(AssetType::Officetel, TradeType::Trade),
        Dataset::of(AssetType::Officetel, TradeType::Rent),
        Dataset::of(AssetType::RowHouse, TradeType::Trade),
        Dataset::of(AssetType::RowHouse, TradeType::Rent),
        Dataset::of(AssetType::SingleDetached, TradeType::Trade),
        Dataset::of(AssetType::SingleDetached, TradeType::Rent),
        Dataset::of(AssetType::Commercial, TradeType::Trade),
        Dataset::of(AssetType::Land, TradeType::Trade),
        Dataset::of(AssetType::Industrial, TradeType::Trade),
    ];

    const fn of(asset: AssetType, trade: TradeType) -> Self {
        Self { asset, trade }
    }

    /// Returns `None` for rent on a trade-only asset type.
    pub fn new(asset: AssetType, trade: TradeType) -> Option<Self> {
        if asset.is_trade_only() && trade == TradeType::Rent {
            return None;
        }
        Some(Self { asset, trade })
    }

    pub fn is_lease(self) -> bool {
        self.trade == TradeType::Rent
    }

    /// Path below the upstream base URL, e.g. `RTMSDataSvcAptTrade/getRTMSDataSvcAptTrade`.
    pub fn endpoint_path(self) -> String {
        let svc = self.service_name();
        format!("{svc}/get{svc}")
    }

    fn service_name(self) -> &'static str {
        match (self.asset, self.trade) {
            (AssetType::Apartment, TradeType::Trade) => "RTMSDataSvcAptTrade",
            (AssetType::Apartment, TradeType::Rent) => "RTMSDataSvcAptRent",
            (AssetType::Officetel, TradeType::Trade) => "RTMSDataSvcOffiTrade",
            (AssetType::Officetel, TradeType::Rent) => "RTMSDataSvcOffiRent",
            (AssetType::RowHouse, TradeType::Trade) => "RTMSDataSvcRHTrade",
            (AssetType::RowHouse, TradeType::Rent) => "RTMSDataSvcRHRent",
            (AssetType::SingleDetached, TradeType::Trade) => "RTMSDataSvcSHTrade",
            (AssetType::SingleDetached, TradeType::Rent) => "RTMSDataSvcSHRent",
            (AssetType::Commercial, _) => "RTMSDataSvcNrgTrade",
            (AssetType::Land, _) => "RTMSDataSvcLandTrade",
            (AssetType::Industrial, _) => "RTMSDataSvcInduTrade",
        }
    }

    /// Upper-case prefix used for raw cache file names.
    pub fn cache_prefix(self) -> &'static str {
        match (self.asset, self.trade) {
            (AssetType::Apartment, TradeType::Trade) => "APT_TRADE",
            (AssetType::Apartment, TradeType::Rent) => "APT_RENT",
            (AssetType::Officetel, TradeType::Trade) => "OFFICETEL_TRADE",
            (AssetType::Officetel, TradeType::Rent) => "OFFICETEL_RENT",
            (AssetType::RowHouse, TradeType::Trade) => "RH_TRADE",
            (AssetType::RowHouse, TradeType::Rent) => "RH_RENT",
            (AssetType::SingleDetached, TradeType::Trade) => "SH_TRADE",
            (AssetType::SingleDetached, TradeType::Rent) => "SH_RENT",
            (AssetType::Commercial, _) => "NRG_TRADE",
            (AssetType::Land, _) => "LAND_TRADE",
            (AssetType::Industrial, _) => "INDU_TRADE",
        }
    }

    fn tool_stem(self) -> &'static str {
        match self.asset {
            AssetType::Apartment => "apartment",
            AssetType::Officetel => "officetel",
            AssetType::RowHouse => "row_house",
            AssetType::SingleDetached => "single_detached_house",
            AssetType::Commercial => "commercial_property",
            AssetType::Land => "land",
            AssetType::Industrial => "industrial_property",
        }
    }

    /// e.g. `get_apartment_trade_data`
    pub fn fetch_tool_name(self) -> String {
        format!("get_{}_{}_data", self.tool_stem(), self.trade)
    }

    /// e.g. `analyze_apartment_trade`
    pub fn analyze_tool_name(self) -> String {
        format!("analyze_{}_{}", self.tool_stem(), self.trade)
    }

    /// Human label used in tool descriptions.
    pub fn label(self) -> &'static str {
        match (self.asset, self.trade) {
            (AssetType::Apartment, TradeType::Trade) => "apartment sales",
            (AssetType::Apartment, TradeType::Rent) => "apartment leases (jeonse/wolse)",
            (AssetType::Officetel, TradeType::Trade) => "officetel sales",
            (AssetType::Officetel, TradeType::Rent) => "officetel leases (jeonse/wolse)",
            (AssetType::RowHouse, TradeType::Trade) => "row-house / multi-family sales",
            (AssetType::RowHouse, TradeType::Rent) => "row-house / multi-family leases",
            (AssetType::SingleDetached, TradeType::Trade) => "single-detached / multi-household sales",
            (AssetType::SingleDetached, TradeType::Rent) => "single-detached / multi-household leases",
            (AssetType::Commercial, _) => "commercial / business property sales",
            (AssetType::Land, _) => "land sales",
            (AssetType::Industrial, _) => "factory / warehouse property sales",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.asset, self.trade)
    }
}
