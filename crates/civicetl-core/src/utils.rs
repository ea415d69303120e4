//! Formatting helpers shared by the library and the CLI.

use arrow_schema::DataType;

/// Extension trait for formatting Arrow [`DataType`] into human-readable strings.
///
/// String and binary view types, which `DataFusion` produces when reading
/// Parquet, are shown under the same label as their plain counterparts.
///
/// # Examples
///
/// ```
/// use arrow_schema::DataType;
/// use civicetl_core::utils::ArrowDataTypeExt;
///
/// assert_eq!(DataType::Int64.format(), "Int64");
/// assert_eq!(DataType::Utf8View.format(), "String");
/// ```
pub trait ArrowDataTypeExt {
    /// Format the data type into a human-readable string.
    fn format(&self) -> String;
}

impl ArrowDataTypeExt for DataType {
    fn format(&self) -> String {
        match self {
            DataType::Boolean => "Boolean".to_string(),
            DataType::Int8 => "Int8".to_string(),
            DataType::Int16 => "Int16".to_string(),
            DataType::Int32 => "Int32".to_string(),
            DataType::Int64 => "Int64".to_string(),
            DataType::UInt8 => "UInt8".to_string(),
            DataType::UInt16 => "UInt16".to_string(),
            DataType::UInt32 => "UInt32".to_string(),
            DataType::UInt64 => "UInt64".to_string(),
            DataType::Float32 => "Float32".to_string(),
            DataType::Float64 => "Float64".to_string(),
            DataType::Utf8 | DataType::Utf8View => "String".to_string(),
            DataType::LargeUtf8 => "LargeString".to_string(),
            DataType::Binary | DataType::BinaryView => "Binary".to_string(),
            DataType::LargeBinary => "LargeBinary".to_string(),
            DataType::Date32 | DataType::Date64 => "Date".to_string(),
            DataType::Timestamp(unit, tz) => {
                let tz_str = tz.as_ref().map_or("", |t| t.as_ref());
                format!("Timestamp({unit:?}, {tz_str})")
            },
            _ => format!("{self:?}"),
        }
    }
}

/// Formats a `[xmin, ymin, xmax, ymax]` bounding box for display.
///
/// Anything that is not four numbers is shown as-is.
#[must_use]
pub fn format_bbox(bbox: &[f64]) -> String {
    match bbox {
        [xmin, ymin, xmax, ymax] => {
            format!("({xmin:.6}, {ymin:.6}) - ({xmax:.6}, {ymax:.6})")
        },
        other => format!("{other:?}"),
    }
}

/// Formats a byte count with a binary unit suffix.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
