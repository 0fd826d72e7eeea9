//! Common helpers for the plugin integration tests

#![allow(dead_code)]

use geoedf_connectors::{Config, DataConfig, EndpointConfig, PollConfig, RetryConfig};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

/// Path of a file under `tests/data`
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Configuration pointing every service at `base` and the reference
/// datasets at the test fixtures, without retries and with fast polling
pub fn mock_config(base: &str) -> Config {
    Config {
        endpoints: EndpointConfig::all(base),
        data: DataConfig {
            gage_loc_shapefile: fixture("gageloc.shp"),
            huc2_shapefile: fixture("huc2.shp"),
            states_shapefile: fixture("states.shp"),
        },
        retry: RetryConfig::none(),
        poll: PollConfig {
            interval: Duration::from_millis(10),
            max_attempts: 5,
        },
        ..Default::default()
    }
}

/// ZIP archive holding `entries` as `(name, contents)`
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        for (name, body) in entries {
            zip.start_file(*name, zip::write::FileOptions::default())
                .expect("start zip entry");
            zip.write_all(body.as_bytes()).expect("write zip entry");
        }
        zip.finish().expect("finish zip");
    }
    cursor.into_inner()
}

/// Install a test subscriber once so `RUST_LOG` shows plugin logs
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
