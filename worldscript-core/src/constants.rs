//! Named constants of the world map interpreter: special variables, savemap
//! addresses, model ids and field destination ids.
//!
//! The disassembler renders known numbers as `$Name`; the assembler resolves
//! `$Name` and bare identifiers back to numbers. Lookup across the four maps
//! happens in a fixed order (special, savemap, model, field) so a colliding
//! name would resolve deterministically; the shipped tables keep names
//! disjoint.

use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::opcode::codes::SAVEMAP_BASE;

static SPECIAL_VARS: &[(u16, &str)] = &[
    (1, "EntityMeshX"),
    (2, "EntityMeshZ"),
    (3, "EntityXInMesh"),
    (4, "EntityDirection"),
    (5, "EntityZInMesh"),
    (6, "LastFieldID"),
    (8, "PlayerEntityModelId"),
    (9, "CurrentTriangleType"),
    (10, "WindowWaiting"),
    (16, "Random8BitNumber"),
];

/// Absolute savemap addresses. Only named addresses render symbolically;
/// everything else stays as hex so dumps remain assemblable.
static SAVEMAP_VARS: &[(u16, &str)] = &[
    (SAVEMAP_BASE, "GameProgress"),
    (0xD73, "YuffieFlags"),
    (0xD74, "VincentFlags"),
];

static MODELS: &[(u16, &str)] = &[
    (0, "Cloud"),
    (1, "Tifa"),
    (2, "Cid"),
    (3, "Highwind"),
    (4, "WildChocobo"),
    (5, "TinyBronco"),
    (6, "Buggy"),
    (7, "JunonCannon"),
    (8, "CargoShip"),
    (9, "HighwindPropeller"),
    (10, "DiamondWeapon"),
    (11, "UltimateWeapon"),
    (13, "Submarine"),
    (14, "GoldSaucer"),
    (19, "Chocobo"),
];

static FIELD_IDS: &[(u16, &str)] = &[
    (2, "Kalm"),
    (3, "ChocoboFarm"),
    (4, "MythrilMine"),
    (5, "FortCondor"),
    (6, "JunonTown"),
    (8, "TempleOfTheAncients"),
    (10, "CostaDelSol"),
    (11, "Mideel"),
    (14, "NorthCorel"),
    (16, "Gongaga"),
    (18, "CosmoCanyon"),
    (20, "Nibelheim"),
    (22, "RocketTown"),
    (25, "Wutai"),
    (28, "BoneVillage"),
    (29, "IcicleInn"),
];

lazy_static! {
    static ref SPECIAL_BY_ID: HashMap<u16, &'static str> = SPECIAL_VARS.iter().copied().collect();
    static ref SAVEMAP_BY_ADDR: HashMap<u16, &'static str> = SAVEMAP_VARS.iter().copied().collect();
    static ref MODEL_BY_ID: HashMap<u16, &'static str> = MODELS.iter().copied().collect();
    static ref FIELD_BY_ID: HashMap<u16, &'static str> = FIELD_IDS.iter().copied().collect();
    static ref BY_NAME: HashMap<&'static str, u16> = {
        let mut map = HashMap::new();
        for table in [SPECIAL_VARS, SAVEMAP_VARS, MODELS, FIELD_IDS] {
            for &(value, name) in table {
                map.entry(name).or_insert(value);
            }
        }
        map
    };
}

pub fn special_var(id: u16) -> Option<&'static str> {
    SPECIAL_BY_ID.get(&id).copied()
}

pub fn savemap_var(addr: u16) -> Option<&'static str> {
    SAVEMAP_BY_ADDR.get(&addr).copied()
}

pub fn model_name(id: u16) -> Option<&'static str> {
    MODEL_BY_ID.get(&id).copied()
}

pub fn field_name(id: u16) -> Option<&'static str> {
    FIELD_BY_ID.get(&id).copied()
}

/// Resolves a constant name (without the `$` sigil) to its numeric value.
pub fn resolve(name: &str) -> Option<u16> {
    BY_NAME.get(name).copied()
}
