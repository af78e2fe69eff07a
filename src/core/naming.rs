//! Product naming conventions: the acquisition timestamp token shared by L2
//! descriptors and L3 products, L3 product ids, and the synthetic composite
//! product name.
use crate::error::{Error, Result};
use crate::types::PeriodKey;

/// Suffix identifying an L2 metadata descriptor.
pub const DESCRIPTOR_SUFFIX: &str = "MTD_ALL.xml";

/// Platform token of synthetic composite products.
pub const SYNTHETIC_PLATFORM: &str = "SENTINEL2X";

/// Time-of-day part of the synthetic composite date field.
const SYNTHETIC_TIME: &str = "000000-000";

/// Extract the `YYYYMMDD` token from a product name.
///
/// The timestamp is the second `_` field, e.g. `20240415-103021-456` in
/// `SENTINEL2B_20240415-103021-456_L2A_T39SWA_C_V3-1_MTD_ALL.xml`; only the
/// date part before the first `-` is returned.
pub fn timestamp_token(name: &str) -> Result<&str> {
    let field = name
        .split('_')
        .nth(1)
        .ok_or_else(|| Error::malformed(name, "no timestamp field"))?;
    let token = field.split('-').next().unwrap_or(field);
    if token.is_empty() {
        return Err(Error::malformed(name, "empty timestamp field"));
    }
    Ok(token)
}

pub fn is_descriptor(name: &str) -> bool {
    name.ends_with(DESCRIPTOR_SUFFIX)
}

/// Fields of an L3 product id: `platform_date_product_tile_flag_version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L3ProductId {
    pub platform: String,
    pub date: String,
    pub product: String,
    pub tile: String,
    pub flag: String,
    pub version: String,
}

impl L3ProductId {
    pub fn parse(id: &str) -> Result<Self> {
        let fields: Vec<&str> = id.split('_').collect();
        let [platform, date, product, tile, flag, version] = fields.as_slice() else {
            return Err(Error::malformed(
                id,
                format!("expected 6 '_' fields, found {}", fields.len()),
            ));
        };
        Ok(Self {
            platform: platform.to_string(),
            date: date.to_string(),
            product: product.to_string(),
            tile: tile.to_string(),
            flag: flag.to_string(),
            version: version.to_string(),
        })
    }
}

/// Name of a packaged composite:
/// `SENTINEL2X_<YYYYMM>01-000000-000_<product>_<tile>_<flag>_<version>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticProductName {
    pub period: PeriodKey,
    pub product: String,
    pub tile: String,
    pub flag: String,
    pub version: String,
}

impl SyntheticProductName {
    /// Composite name for an L3 product whose date falls in `period`.
    pub fn for_product(id: &L3ProductId, period: PeriodKey) -> Self {
        Self {
            period,
            product: id.product.clone(),
            tile: id.tile.clone(),
            flag: id.flag.clone(),
            version: id.version.clone(),
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        let stem = name
            .strip_suffix(".zip")
            .or_else(|| name.strip_suffix(".tif"))
            .unwrap_or(name);
        let id = L3ProductId::parse(stem)?;
        if id.platform != SYNTHETIC_PLATFORM {
            return Err(Error::malformed(name, "not a synthetic product name"));
        }
        let period_day = id
            .date
            .strip_suffix(SYNTHETIC_TIME)
            .and_then(|d| d.strip_suffix('-'))
            .ok_or_else(|| Error::malformed(name, "unexpected date field"))?;
        let period = period_day
            .strip_suffix("01")
            .filter(|p| p.len() == 6)
            .ok_or_else(|| Error::malformed(name, "unexpected date field"))?
            .parse()?;
        Ok(Self {
            period,
            product: id.product,
            tile: id.tile,
            flag: id.flag,
            version: id.version,
        })
    }

    pub fn tif_name(&self) -> String {
        format!("{self}.tif")
    }

    pub fn zip_name(&self) -> String {
        format!("{self}.zip")
    }
}

impl std::fmt::Display for SyntheticProductName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}_{}01-{}_{}_{}_{}_{}",
            SYNTHETIC_PLATFORM,
            self.period,
            SYNTHETIC_TIME,
            self.product,
            self.tile,
            self.flag,
            self.version
        )
    }
}
