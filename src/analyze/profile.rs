// src/analyze/profile.rs
//! Per-asset analysis profiles: which grouped sections a report carries and
//! which area basis its per-pyeong figures use. The aggregation itself is the
//! same for every asset type; only this table differs.

use crate::dataset::AssetType;
use crate::record::resolve::Concept;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    /// Distinct values of a resolved text column.
    Field(Concept),
    BuildingAge,
    AreaScale,
}

#[derive(Debug, Clone, Copy)]
pub struct Section {
    pub name: &'static str,
    pub by: Grouping,
}

const fn section(name: &'static str, by: Grouping) -> Section {
    Section { name, by }
}

#[derive(Debug)]
pub struct Profile {
    pub sections: &'static [Section],
    /// Which area the per-pyeong and scale figures are based on.
    pub area_basis: &'static str,
    pub notes: &'static str,
}

const BY_DONG: Section = section("statisticsByDong", Grouping::Field(Concept::Location));
const BY_AGE: Section = section("statisticsByBuildingAge", Grouping::BuildingAge);

static APARTMENT: Profile = Profile {
    sections: &[
        section("statisticsByApartmentComplex", Grouping::Field(Concept::Complex)),
        BY_DONG,
        BY_AGE,
    ],
    area_basis: "exclusive use area",
    notes: "Price per pyeong is calculated based on the 'exclusive use area'.",
};

static OFFICETEL: Profile = Profile {
    sections: &[
        section("statisticsByOfficetelComplex", Grouping::Field(Concept::Complex)),
        BY_DONG,
        BY_AGE,
    ],
    area_basis: "exclusive use area",
    notes: "Price per pyeong is calculated based on the 'exclusive use area'.",
};

static ROW_HOUSE: Profile = Profile {
    sections: &[
        section("statisticsByBuilding", Grouping::Field(Concept::Complex)),
        section("statisticsByHouseType", Grouping::Field(Concept::PropertyType)),
        BY_DONG,
        BY_AGE,
    ],
    area_basis: "exclusive use area",
    notes: "Price per pyeong is calculated based on the 'exclusive use area'. Row houses and multi-family houses are reported together and split by house type.",
};

static SINGLE_DETACHED: Profile = Profile {
    sections: &[
        section("statisticsByHouseType", Grouping::Field(Concept::PropertyType)),
        BY_DONG,
        BY_AGE,
        section("statisticsByBuildingScale_totalFloorArea", Grouping::AreaScale),
    ],
    area_basis: "total floor area",
    notes: "Price per pyeong and building scale are calculated based on the 'total floor area'. Land area is not included in this analysis.",
};

static COMMERCIAL: Profile = Profile {
    sections: &[
        BY_DONG,
        section("statisticsByZoning", Grouping::Field(Concept::Zoning)),
        BY_AGE,
        section("statisticsByBuildingScale_exclusiveArea", Grouping::AreaScale),
    ],
    area_basis: "exclusive use area",
    notes: "Price per pyeong and building scale are calculated based on the 'exclusive use area'. Data for 'land share' or 'road access conditions' is not provided by the API and is not included in this analysis.",
};

static LAND: Profile = Profile {
    sections: &[
        section("statisticsByLandCategory", Grouping::Field(Concept::PropertyType)),
        section("statisticsByZoning", Grouping::Field(Concept::Zoning)),
        BY_DONG,
        section("statisticsByLandScale", Grouping::AreaScale),
    ],
    area_basis: "transaction land area",
    notes: "Price per pyeong and land scale are calculated based on the 'transaction land area'. Partial-share transactions are included as reported.",
};

static INDUSTRIAL: Profile = Profile {
    sections: &[
        BY_DONG,
        section("statisticsByZoning", Grouping::Field(Concept::Zoning)),
        BY_AGE,
        section("statisticsByBuildingScale", Grouping::AreaScale),
    ],
    area_basis: "building area",
    notes: "Price per pyeong and building scale are calculated based on the reported building area. Land area is not included in this analysis.",
};

pub fn profile(asset: AssetType) -> &'static Profile {
    match asset {
        AssetType::Apartment => &APARTMENT,
        AssetType::Officetel => &OFFICETEL,
        AssetType::RowHouse => &ROW_HOUSE,
        AssetType::SingleDetached => &SINGLE_DETACHED,
        AssetType::Commercial => &COMMERCIAL,
        AssetType::Land => &LAND,
        AssetType::Industrial => &INDUSTRIAL,
    }
}
