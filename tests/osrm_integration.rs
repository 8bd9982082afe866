//! OSRM-backed planning against a real road network.
//!
//! Needs docker and a dataset already prepared for the MLD pipeline
//! (`osrm-extract`, `osrm-partition`, `osrm-customize`) in `OSRM_DATA_DIR`.
//! `OSRM_DATASET` names the `.osrm` base file, default `nebraska-latest`.

mod fixtures;

use std::env;
use std::path::Path;
use std::time::{Duration, Instant, UNIX_EPOCH};

use testcontainers::ReuseDirective;
use testcontainers::core::{IntoContainerPort, Mount};
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, GenericImage, ImageExt, TestcontainersError};
use uuid::Uuid;

use fixtures::*;
use hos_planner::cost::LinearCostModel;
use hos_planner::haversine::HaversineMatrix;
use hos_planner::model::{PlanRequest, StopAction, Waypoint};
use hos_planner::osrm::{OsrmClient, OsrmConfig};
use hos_planner::plan_route;
use hos_planner::segment::SegmentKind;
use hos_planner::traits::DistanceMatrixProvider;

fn osrm_container() -> Result<(Container<GenericImage>, String), TestcontainersError> {
    let data_dir = env::var("OSRM_DATA_DIR").unwrap_or_else(|_| "osrm-data".to_string());
    let dataset = env::var("OSRM_DATASET").unwrap_or_else(|_| "nebraska-latest".to_string());
    let partition = Path::new(&data_dir).join(format!("{dataset}.osrm.partition"));
    if !partition.exists() {
        return Err(TestcontainersError::other(format!(
            "no prepared dataset at {}",
            partition.display()
        )));
    }
    let mtime = std::fs::metadata(&partition)
        .ok()
        .and_then(|meta| meta.modified().ok())
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_secs())
        .unwrap_or(0);

    let image = GenericImage::new("osrm/osrm-backend", "latest")
        .with_exposed_port(5000.tcp())
        .with_mount(Mount::bind_mount(data_dir, "/data"))
        .with_cmd(vec![
            "osrm-routed".to_string(),
            "--algorithm".to_string(),
            "mld".to_string(),
            format!("/data/{dataset}.osrm"),
        ])
        .with_container_name(format!("osrm-{dataset}-mld-{mtime}"))
        .with_startup_timeout(Duration::from_secs(30))
        .with_reuse(ReuseDirective::Always);

    let container = image.start()?;
    let port = container.get_host_port_ipv4(5000.tcp())?;
    Ok((container, format!("http://127.0.0.1:{port}")))
}

/// Poll a one-point table until the router answers.
fn wait_for_router(base_url: &str) -> bool {
    let ready_url = format!("{base_url}/table/v1/driving/{:.6},{:.6}", OMAHA_DC.lng, OMAHA_DC.lat);
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(15) {
        if let Ok(resp) = reqwest::blocking::get(&ready_url) {
            if resp.status().is_success() {
                return true;
            }
        }
        std::thread::sleep(Duration::from_millis(500));
    }
    false
}

fn client(base_url: &str) -> OsrmClient {
    OsrmClient::new(OsrmConfig {
        base_url: base_url.to_string(),
        profile: "driving".to_string(),
        timeout_secs: 10,
    })
    .expect("build OSRM client")
}

#[test]
#[ignore = "needs docker and a prepared OSRM dataset"]
fn osrm_table_replaces_great_circle_estimates() {
    init_tracing();
    let (container, base_url) = osrm_container().expect("start OSRM container");
    if !wait_for_router(&base_url) {
        if let Ok(stderr) = container.stderr_to_vec() {
            eprintln!("OSRM stderr:\n{}", String::from_utf8_lossy(&stderr));
        }
        panic!("OSRM did not become ready");
    }

    let locations = vec![OMAHA_DC.coords(), TRUCK_STOPS[2].location.coords(), TRUCK_STOPS[3].location.coords()];
    let matrix = client(&base_url).matrix_for(&locations, false);
    let estimate = HaversineMatrix::default().matrix_for(&locations, false);

    for from in &locations {
        for to in &locations {
            assert!(matrix.leg(*from, *to).is_some(), "missing leg {from:?} -> {to:?}");
        }
    }
    let road = matrix.leg(locations[0], locations[1]).expect("Omaha to York");
    let straight = estimate.leg(locations[0], locations[1]).expect("Omaha to York");
    assert!(road.miles > 80.0 && road.miles < 140.0, "Omaha to York {:.1} mi", road.miles);
    assert!((road.miles - straight.miles).abs() > 1e-3);

    drop(container);
}

#[test]
#[ignore = "needs docker and a prepared OSRM dataset"]
fn osrm_backed_plan_is_compliant() {
    init_tracing();
    let (container, base_url) = osrm_container().expect("start OSRM container");
    assert!(wait_for_router(&base_url), "OSRM did not become ready");

    let north_platte = &TRUCK_STOPS[3].location;
    let request = PlanRequest {
        origin: Waypoint::new(OMAHA_DC.name, OMAHA_DC.coords()),
        stops: vec![
            corridor_stop("oma", &OMAHA_DC, StopAction::Pickup, "L-77", 1.0),
            corridor_stop("lnp", north_platte, StopAction::Delivery, "L-77", 1.0),
        ],
        fuel_stations: truck_stop_stations(),
        ..two_stop_request()
    };

    let plan = plan_route(request, &client(&base_url), &LinearCostModel, Uuid::new_v4(), departure())
        .expect("plan over OSRM legs");

    assert!(plan.is_feasible, "issues: {:?}", plan.issues);
    assert!(plan.compliance.is_fully_compliant);
    assert!(plan.segments.iter().any(|s| matches!(s.kind, SegmentKind::Drive { .. })));
    assert!(plan.totals.distance_miles > 250.0);

    drop(container);
}
