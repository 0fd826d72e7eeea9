//! Input connectors driven through the registry, as an orchestrator would

mod common;

use common::{init_tracing, mock_config, zip_bytes};
use geoedf_connectors::{Error, InputConnector, Params, available_inputs, build_input};
use serde_json::json;
use std::path::Path;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn run(
    name: &str,
    params: Params,
    server: &MockServer,
    target: &Path,
) -> geoedf_connectors::Result<bool> {
    let mut input: Box<dyn InputConnector> =
        build_input(name, &params, &mock_config(&server.uri()))?;
    input.set_target_path(target.to_path_buf());
    input.get().await
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_http_input_single_file() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/report.csv"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Disposition", "attachment; filename=\"renamed.csv\"")
                .set_body_string("a,b\n1,2\n"),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/files/report.csv", server.uri());
    assert!(
        run("HTTPInput", Params::new().with("url", url.as_str()), &server, dir.path())
            .await
            .unwrap()
    );
    assert_eq!(file_names(dir.path()), vec!["renamed.csv"]);
}

#[tokio::test]
async fn test_http_input_failure_leaves_no_partial_file() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("{}/files/missing.tif", server.uri());
    let err = run("HTTPInput", Params::new().with("url", url.as_str()), &server, dir.path())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Operation { .. }), "{}", err);
    assert!(file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn test_wqp_then_nwis_stat_share_target() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Result/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("MonitoringLocationIdentifier\nUSGS-03335500\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dv/"))
        .and(query_param("stateCd", "in"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": {"timeSeries": [{
                "name": "USGS:03335500:00060:00003",
                "sourceInfo": {
                    "siteCode": [{"value": "03335500"}],
                    "geoLocation": {"geogLocation": {"latitude": 40.42, "longitude": -86.89}}
                },
                "variable": {"variableCode": [{"value": "00060"}], "noDataValue": -999999.0},
                "values": [{"value": [
                    {"value": "2", "dateTime": "2018-01-01T00:00:00.000"},
                    {"value": "4", "dateTime": "2018-01-02T00:00:00.000"}
                ]}]
            }]}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    run(
        "WQPInput",
        Params::new().with("site_id", "USGS-03335500"),
        &server,
        dir.path(),
    )
    .await
    .unwrap();
    let params = Params::new()
        .with("start_yr", 2018)
        .with("end_yr", 2018)
        .with("state", "IN")
        .with("variable", "00060");
    run("NWISStatInput", params, &server, dir.path()).await.unwrap();

    assert_eq!(file_names(dir.path()), vec!["IN_00060.csv", "USGS-03335500.csv"]);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("IN_00060.csv")).unwrap(),
        "lat,lon,year,stn,value\n40.42,-86.89,2018,USGS:03335500,3\n"
    );
}

#[tokio::test]
async fn test_cuahsi_subsetter_job() {
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wbd/gethucbbox/lcc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"bbox": [-87.1, 40.2, -86.9, 40.4]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/nwm/v2_0/subset"))
        .respond_with(ResponseTemplate::new(303).insert_header("Location", "/jobs-view?jobid=abc"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs-view"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "finished"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download-zip/abc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(zip_bytes(&[("Route_Link.nc", "nc")])),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let params = Params::new().with("huc12_id", json!(["051202011504", "051202011505"]));
    assert!(run("CUAHSISubsetterInput", params, &server, dir.path()).await.unwrap());
    assert_eq!(file_names(dir.path()), vec!["Route_Link.nc"]);
}

#[tokio::test]
async fn test_every_input_requires_its_parameters() {
    let server = MockServer::start().await;
    for name in available_inputs() {
        let err = build_input(name, &Params::new(), &mock_config(&server.uri()))
            .err()
            .unwrap();
        assert!(err.is_config(), "{}: {}", name, err);
    }
}

/// Talks to the real Water Quality Portal
#[cfg(feature = "live-tests")]
#[tokio::test]
#[ignore]
async fn test_live_wqp() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut input = build_input(
        "WQPInput",
        &Params::new()
            .with("site_id", "USGS-03335500")
            .with("start_date", "01-01-2019")
            .with("end_date", "12-31-2019"),
        &geoedf_connectors::Config::default(),
    )
    .unwrap();
    input.set_target_path(dir.path().to_path_buf());
    assert!(input.get().await.unwrap());
    assert!(dir.path().join("USGS-03335500.csv").exists());
}
