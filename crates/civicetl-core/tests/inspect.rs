mod common;

use civicetl_core::info::inspect_dataset;
use civicetl_core::prepare::prepare_single;
use civicetl_core::sources::single_resources;
use common::{FakeDownloader, layout, shapefile_zip, square};

#[tokio::test]
async fn prepared_output_is_reported_as_geoparquet() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let resource = single_resources()[0];
    let body = shapefile_zip(
        "Boston_Neighborhood_Boundaries",
        "name",
        &[
            ("Back Bay", 1.0, square(-71.09, 42.34, 0.02)),
            ("Fenway", 2.0, square(-71.11, 42.33, 0.02)),
            ("Roxbury", 3.0, square(-71.09, 42.31, 0.02)),
        ],
    );
    let downloader = FakeDownloader::new().with(resource.url, body);
    prepare_single(&layout, &resource, &downloader).await.unwrap();

    let info = inspect_dataset(&layout.processed_path(resource.name))
        .await
        .unwrap();

    assert_eq!(info.driver, "GeoParquet");
    assert_eq!(info.row_count, 3);
    let names: Vec<&str> = info.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["name", "ALAND"]);
    assert_eq!(info.geometry_columns.len(), 1);
    let geometry = &info.geometry_columns[0];
    assert_eq!(geometry.name, "geometry");
    assert_eq!(geometry.encoding, "WKB");
    assert_eq!(geometry.crs.as_deref(), Some("EPSG:4269"));
    assert_eq!(geometry.geometry_types, vec!["MultiPolygon"]);
    assert!(geometry.bbox.is_some());
}
