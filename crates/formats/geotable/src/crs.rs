//! Coordinate reference systems and reprojection.
//!
//! Shapefiles describe their CRS with an ESRI-flavoured WKT `.prj` sidecar that
//! rarely carries an authority code. [`Crs::from_wkt`] recognises the systems used
//! by the Census TIGER/Line and Analyze Boston datasets by name, and
//! [`Transformer`] reprojects between any two recognised systems with `proj4rs`.

use std::fmt;

use geo::MapCoords;
use geo_types::{Coord, Geometry};
use proj4rs::proj::Proj;

use crate::error::{GeoTableError, Result};

/// A coordinate reference system definition the crate knows how to project.
struct KnownCrs {
    epsg: u32,
    /// Root `GEOGCS`/`PROJCS` names as they appear in ESRI and OGC WKT.
    names: &'static [&'static str],
    proj: &'static str,
    geographic: bool,
    /// Full PROJJSON for systems written to GeoParquet as-is.
    projjson: Option<&'static str>,
}

const KNOWN_CRS: &[KnownCrs] = &[
    KnownCrs {
        epsg: 4326,
        names: &["GCS_WGS_1984", "WGS 84", "WGS84"],
        proj: "+proj=longlat +datum=WGS84 +no_defs",
        geographic: true,
        projjson: Some(
            r#"{"type":"GeographicCRS","name":"WGS 84","datum":{"type":"GeodeticReferenceFrame","name":"World Geodetic System 1984","ellipsoid":{"name":"WGS 84","semi_major_axis":6378137,"inverse_flattening":298.257223563}},"coordinate_system":{"subtype":"ellipsoidal","axis":[{"name":"Geodetic latitude","abbreviation":"Lat","direction":"north","unit":"degree"},{"name":"Geodetic longitude","abbreviation":"Lon","direction":"east","unit":"degree"}]},"id":{"authority":"EPSG","code":4326}}"#,
        ),
    },
    KnownCrs {
        epsg: 4269,
        names: &["GCS_North_American_1983", "NAD83"],
        proj: "+proj=longlat +datum=NAD83 +no_defs",
        geographic: true,
        projjson: Some(
            r#"{"type":"GeographicCRS","name":"NAD83","datum":{"type":"GeodeticReferenceFrame","name":"North American Datum 1983","ellipsoid":{"name":"GRS 1980","semi_major_axis":6378137,"inverse_flattening":298.257222101}},"coordinate_system":{"subtype":"ellipsoidal","axis":[{"name":"Geodetic latitude","abbreviation":"Lat","direction":"north","unit":"degree"},{"name":"Geodetic longitude","abbreviation":"Lon","direction":"east","unit":"degree"}]},"id":{"authority":"EPSG","code":4269}}"#,
        ),
    },
    KnownCrs {
        epsg: 3857,
        names: &[
            "WGS_1984_Web_Mercator_Auxiliary_Sphere",
            "WGS 84 / Pseudo-Mercator",
        ],
        proj: "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs",
        geographic: false,
        projjson: None,
    },
    KnownCrs {
        epsg: 2249,
        names: &[
            "NAD_1983_StatePlane_Massachusetts_Mainland_FIPS_2001_Feet",
            "NAD83 / Massachusetts Mainland (ftUS)",
        ],
        proj: "+proj=lcc +lat_0=41 +lon_0=-71.5 +lat_1=42.6833333333333 +lat_2=41.7166666666667 +x_0=200000.0001016 +y_0=750000 +datum=NAD83 +units=us-ft +no_defs",
        geographic: false,
        projjson: None,
    },
    KnownCrs {
        epsg: 26986,
        names: &[
            "NAD_1983_StatePlane_Massachusetts_Mainland_FIPS_2001",
            "NAD83 / Massachusetts Mainland",
        ],
        proj: "+proj=lcc +lat_0=41 +lon_0=-71.5 +lat_1=42.6833333333333 +lat_2=41.7166666666667 +x_0=200000 +y_0=750000 +datum=NAD83 +units=m +no_defs",
        geographic: false,
        projjson: None,
    },
];

fn known(epsg: u32) -> Option<&'static KnownCrs> {
    KNOWN_CRS.iter().find(|k| k.epsg == epsg)
}

/// Coordinate reference system attached to a [`GeoTable`](crate::GeoTable).
///
/// Either component may be absent: a shapefile without `.prj` yields
/// [`Crs::unknown`], and a `.prj` the crate does not recognise keeps its WKT
/// with no EPSG code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Crs {
    epsg: Option<u32>,
    wkt: Option<String>,
}

impl Crs {
    /// A CRS with no definition.
    #[must_use]
    pub fn unknown() -> Self {
        Self::default()
    }

    /// A CRS identified only by its EPSG code.
    #[must_use]
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    /// Parses a `.prj` style WKT string.
    ///
    /// An explicit trailing `AUTHORITY["EPSG", ...]` wins; otherwise the root
    /// `GEOGCS`/`PROJCS` name is matched against the known systems.
    #[must_use]
    pub fn from_wkt(wkt: &str) -> Self {
        let wkt = wkt.trim();
        if wkt.is_empty() {
            return Self::unknown();
        }
        let epsg = root_authority_code(wkt).or_else(|| {
            let name = root_name(wkt)?;
            KNOWN_CRS
                .iter()
                .find(|k| k.names.iter().any(|n| n.eq_ignore_ascii_case(name)))
                .map(|k| k.epsg)
        });
        Self {
            epsg,
            wkt: Some(wkt.to_string()),
        }
    }

    /// EPSG code, when known.
    #[must_use]
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Raw WKT definition, when the CRS came from a `.prj` file.
    #[must_use]
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Returns `true` when there is no definition at all.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.epsg.is_none() && self.wkt.is_none()
    }

    /// Returns `true` for longitude/latitude systems.
    #[must_use]
    pub fn is_geographic(&self) -> bool {
        match self.epsg.and_then(known) {
            Some(k) => k.geographic,
            None => self
                .wkt
                .as_deref()
                .is_some_and(|w| w.trim_start().starts_with("GEOGCS")),
        }
    }

    /// Whether two definitions describe the same system.
    #[must_use]
    pub fn is_equivalent(&self, other: &Self) -> bool {
        match (self.epsg, other.epsg) {
            (Some(a), Some(b)) => a == b,
            (None, None) => match (&self.wkt, &other.wkt) {
                (Some(a), Some(b)) => normalize_wkt(a) == normalize_wkt(b),
                (None, None) => true,
                _ => false,
            },
            _ => false,
        }
    }

    /// PROJJSON representation for GeoParquet `crs` metadata.
    ///
    /// Known geographic systems get a complete definition; other EPSG codes get
    /// an identifier-only object; a CRS without EPSG code yields `None`.
    #[must_use]
    pub fn to_projjson(&self) -> Option<serde_json::Value> {
        let code = self.epsg?;
        let full = known(code)
            .and_then(|k| k.projjson)
            .and_then(|s| serde_json::from_str(s).ok());
        Some(full.unwrap_or_else(|| {
            serde_json::json!({
                "type": if self.is_geographic() { "GeographicCRS" } else { "ProjectedCRS" },
                "name": self
                    .wkt
                    .as_deref()
                    .and_then(root_name)
                    .or_else(|| known(code).and_then(|k| k.names.last().copied()))
                    .unwrap_or("unnamed"),
                "id": { "authority": "EPSG", "code": code },
            })
        }))
    }

    /// Reads the EPSG identifier out of a PROJJSON object.
    #[must_use]
    pub fn from_projjson(value: &serde_json::Value) -> Self {
        let id = &value["id"];
        let is_epsg = id["authority"]
            .as_str()
            .is_some_and(|a| a.eq_ignore_ascii_case("EPSG"));
        match id["code"].as_u64().and_then(|c| u32::try_from(c).ok()) {
            Some(code) if is_epsg => Self::from_epsg(code),
            _ => Self::unknown(),
        }
    }

    fn proj_definition(&self) -> Option<(&'static str, bool)> {
        self.epsg.and_then(known).map(|k| (k.proj, k.geographic))
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.epsg, &self.wkt) {
            (Some(code), _) => write!(f, "EPSG:{code}"),
            (None, Some(wkt)) => write!(f, "{}", root_name(wkt).unwrap_or("custom WKT")),
            (None, None) => f.write_str("unknown"),
        }
    }
}

/// First quoted string of the WKT, i.e. the name of the root element.
fn root_name(wkt: &str) -> Option<&str> {
    let start = wkt.find('"')? + 1;
    let len = wkt[start..].find('"')?;
    Some(&wkt[start..start + len])
}

/// `AUTHORITY["EPSG","1234"]` as the last element of the root node.
fn root_authority_code(wkt: &str) -> Option<u32> {
    let trimmed = wkt.trim_end().strip_suffix(']')?;
    let idx = trimmed.rfind("AUTHORITY[")?;
    let tail = &trimmed[idx + "AUTHORITY[".len()..];
    // Nested authorities close before the root does.
    let tail = tail.strip_suffix(']')?;
    if tail.contains(']') {
        return None;
    }
    let mut parts = tail.split(',').map(|p| p.trim().trim_matches('"'));
    match (parts.next(), parts.next()) {
        (Some(auth), Some(code)) if auth.eq_ignore_ascii_case("EPSG") => code.parse().ok(),
        _ => None,
    }
}

fn normalize_wkt(wkt: &str) -> String {
    wkt.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Reprojects coordinates from one [`Crs`] to another.
pub struct Transformer {
    src: Proj,
    dst: Proj,
    src_geographic: bool,
    dst_geographic: bool,
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer")
            .field("src_geographic", &self.src_geographic)
            .field("dst_geographic", &self.dst_geographic)
            .finish_non_exhaustive()
    }
}

impl Transformer {
    /// Builds a transformer, or `None` when the two systems are equivalent.
    ///
    /// # Errors
    ///
    /// Returns [`GeoTableError::UnsupportedReprojection`] when either side has no
    /// projection definition.
    pub fn new(from: &Crs, to: &Crs) -> Result<Option<Self>> {
        if from.is_equivalent(to) {
            return Ok(None);
        }
        let unsupported = || GeoTableError::UnsupportedReprojection {
            from: from.to_string(),
            to: to.to_string(),
        };
        let (src_def, src_geographic) = from.proj_definition().ok_or_else(unsupported)?;
        let (dst_def, dst_geographic) = to.proj_definition().ok_or_else(unsupported)?;
        let src = Proj::from_proj_string(src_def)
            .map_err(|e| GeoTableError::Projection(e.to_string()))?;
        let dst = Proj::from_proj_string(dst_def)
            .map_err(|e| GeoTableError::Projection(e.to_string()))?;
        Ok(Some(Self {
            src,
            dst,
            src_geographic,
            dst_geographic,
        }))
    }

    /// Transforms a single coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`GeoTableError::Projection`] when the coordinate is outside the
    /// projection's domain.
    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        let (mut x, mut y) = (coord.x, coord.y);
        if self.src_geographic {
            x = x.to_radians();
            y = y.to_radians();
        }
        let mut point = (x, y, 0.0);
        proj4rs::transform::transform(&self.src, &self.dst, &mut point)
            .map_err(|e| GeoTableError::Projection(e.to_string()))?;
        let (mut x, mut y) = (point.0, point.1);
        if self.dst_geographic {
            x = x.to_degrees();
            y = y.to_degrees();
        }
        Ok(Coord { x, y })
    }

    /// Transforms every coordinate of a geometry.
    ///
    /// # Errors
    ///
    /// Propagates the first coordinate failure.
    pub fn transform_geometry(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        geometry.try_map_coords(|c| self.transform_coord(c))
    }
}
