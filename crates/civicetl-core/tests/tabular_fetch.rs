mod common;

use civicetl_core::error::{CivicEtlError, FetchError};
use civicetl_core::sources::tabular_sources;
use civicetl_core::tabular::{YearStatus, fetch_tabular};
use common::{FakeDownloader, layout};

#[tokio::test]
async fn present_years_issue_no_requests() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let sources = tabular_sources();
    layout.ensure_raw_dir().unwrap();
    for source in &sources {
        std::fs::write(layout.tabular_path(source), b"case_enquiry_id\n1\n").unwrap();
    }

    let downloader = FakeDownloader::new();
    let report = fetch_tabular(&layout, &sources, &downloader).await.unwrap();

    assert!(downloader.requests().is_empty());
    assert!(report.is_success());
    assert_eq!(report.downloaded(), 0);
    assert!(
        report
            .outcomes
            .iter()
            .all(|o| matches!(o.status, YearStatus::Present))
    );
}

#[tokio::test]
async fn missing_and_empty_years_are_requested_once() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let sources = tabular_sources();
    layout.ensure_raw_dir().unwrap();
    std::fs::write(layout.tabular_path(&sources[0]), b"case_enquiry_id\n1\n").unwrap();
    std::fs::write(layout.tabular_path(&sources[1]), b"").unwrap();

    let mut downloader = FakeDownloader::new();
    for source in &sources {
        downloader = downloader.with(source.url, format!("case_enquiry_id\n{}\n", source.year));
    }
    let report = fetch_tabular(&layout, &sources, &downloader).await.unwrap();

    let expected: Vec<String> = sources[1..].iter().map(|s| s.url.to_string()).collect();
    assert_eq!(downloader.requests(), expected);
    assert_eq!(report.downloaded(), sources.len() - 1);
    assert!(matches!(report.outcomes[0].status, YearStatus::Present));
    for source in &sources {
        assert!(layout.tabular_present(source), "{} missing", source.year);
    }
}

#[tokio::test]
async fn failing_year_does_not_stop_later_years() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let sources = tabular_sources();

    let mut downloader = FakeDownloader::new();
    for source in sources.iter().filter(|s| s.year != 2017) {
        downloader = downloader.with(source.url, "case_enquiry_id\n1\n");
    }
    let report = fetch_tabular(&layout, &sources, &downloader).await.unwrap();

    assert_eq!(downloader.requests().len(), sources.len());
    assert!(!report.is_success());
    let failed: Vec<u16> = report.failures().map(|o| o.year).collect();
    assert_eq!(failed, vec![2017]);
    let failure = report.failures().next().unwrap();
    assert!(matches!(
        failure.status,
        YearStatus::Failed {
            error: CivicEtlError::Fetch(FetchError::Status { status: 404, .. })
        }
    ));
    assert!(!failure.path.exists());
    assert!(
        report
            .outcomes
            .iter()
            .filter(|o| o.year > 2017)
            .all(|o| matches!(o.status, YearStatus::Downloaded { .. }))
    );
}

#[tokio::test]
async fn outcomes_are_in_ascending_year_order() {
    let dir = tempfile::tempdir().unwrap();
    let layout = layout(dir.path());
    let mut sources = tabular_sources();
    sources.reverse();

    let downloader = FakeDownloader::new();
    let report = fetch_tabular(&layout, &sources, &downloader).await.unwrap();

    let years: Vec<u16> = report.outcomes.iter().map(|o| o.year).collect();
    assert_eq!(years, (2015..=2024).collect::<Vec<_>>());
    let requested: Vec<String> = tabular_sources().iter().map(|s| s.url.to_string()).collect();
    assert_eq!(downloader.requests(), requested);
    assert!(layout.raw_dir().is_dir());
}
