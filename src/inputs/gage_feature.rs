//! Watershed features of USGS gages from StreamCat
//!
//! For every gage the site file gives its location, datum and drainage area.
//! The location picks the HUC2 hydro-region, and the StreamCat tables of
//! those regions are downloaded and joined to the gages through the NHDPlus
//! flowline (`FLComID` in GageLoc, `COMID` in StreamCat). Only gages present
//! in every table are written. The downloaded tables are removed afterwards,
//! leaving `gages.csv` as the only file in the target path.

use super::{cell, write_csv};
use crate::archive::unzip_and_remove;
use crate::config::Config;
use crate::error::{Error, OperationContext, Result};
use crate::geo::Layer;
use crate::http::HttpClient;
use crate::params::{ParamSchema, Params};
use crate::plugin::{InputConnector, impl_plugin, prepare_target};
use crate::services::{NwisClient, SiteInfo};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// StreamCat tables and the watershed variables taken from each
pub const STREAMCAT: [(&str, &[&str]); 9] = [
    ("Elevation", &["ElevWs"]),
    ("Dams", &["DamDensWs"]),
    (
        "NLCD2011",
        &[
            "PctConif2011Ws",
            "PctDecid2011Ws",
            "PctMxtFst2011Ws",
            "PctUrbHi2011Ws",
            "PctUrbLo2011Ws",
            "PctUrbOp2011Ws",
        ],
    ),
    ("STATSGO_Set2", &["PermWs"]),
    ("RoadDensity", &["RdDensWs"]),
    ("WetIndx", &["WetIndexWs"]),
    ("STATSGO_Set1", &["SandWs", "ClayWs"]),
    ("GeoChemPhys3", &["HydrlCondWs"]),
    ("ImperviousSurfaces2011", &["PctImp2011Ws"]),
];

const BASE_COLUMNS: [&str; 6] = [
    "Gage_Number2",
    "Lat",
    "Long",
    "Drainage_Area",
    "Datum",
    "FLComID",
];

/// Builds `gages.csv` with StreamCat watershed attributes for a list of gages
#[derive(Debug)]
pub struct GageFeatureInput {
    gages: Vec<String>,
    http: HttpClient,
    nwis: NwisClient,
    streamcat_url: String,
    gage_loc_shapefile: PathBuf,
    huc2_shapefile: PathBuf,
    target_path: Option<PathBuf>,
}

/// A gage located in a hydro-region
#[derive(Debug)]
struct Gage {
    id: String,
    site: SiteInfo,
    huc2: String,
}

/// Variable values of one StreamCat table, keyed by COMID
type Table = HashMap<String, Vec<String>>;

impl GageFeatureInput {
    /// Parameters understood by this connector
    pub const SCHEMA: ParamSchema = ParamSchema {
        plugin: "GageFeatureInput",
        required: &["gages"],
        optional: &[],
    };

    /// Construct from parameters
    pub fn new(params: &Params, config: &Config) -> Result<Self> {
        let schema = &Self::SCHEMA;
        schema.validate(params)?;
        let http = HttpClient::new(config)?;
        Ok(Self {
            gages: schema.string_list(params, "gages")?,
            nwis: NwisClient::new(http.clone(), &config.endpoints.nwis),
            http,
            streamcat_url: config.endpoints.streamcat.clone(),
            gage_loc_shapefile: config.data.gage_loc_shapefile.clone(),
            huc2_shapefile: config.data.huc2_shapefile.clone(),
            target_path: None,
        })
    }

    /// Site info and region of every gage that has both
    async fn locate(&self, regions: &Layer) -> Vec<Gage> {
        let mut located = Vec::new();
        for id in &self.gages {
            let site = match self.nwis.site_info(id).await {
                Ok(site) => site,
                Err(e) => {
                    warn!(gage = %id, error = %e, "error fetching site info for gage, skipping");
                    continue;
                }
            };
            let (Some(lat), Some(lon)) = (site.latitude, site.longitude) else {
                warn!(gage = %id, "site info has no coordinates, skipping");
                continue;
            };
            let Some(huc2) = regions
                .features
                .iter()
                .find(|region| region.contains(lon, lat))
                .and_then(|region| region.text("huc2"))
            else {
                warn!(gage = %id, lat, lon, "gage is outside every HUC2 region, skipping");
                continue;
            };
            debug!(gage = %id, huc2 = %huc2, "located gage");
            located.push(Gage {
                id: id.clone(),
                site,
                huc2,
            });
        }
        located
    }

    /// Download and unpack the StreamCat tables of every region
    async fn fetch_tables(&self, regions: &BTreeSet<String>, target: &Path) -> Result<()> {
        for huc2 in regions {
            for (file, _) in STREAMCAT {
                let name = format!("{}_Region{}.zip", file, huc2);
                let archive = target.join(&name);
                let url = format!("{}/{}", self.streamcat_url, name);
                self.http.download(&url, &archive).await.op_context(
                    Self::SCHEMA.plugin,
                    format!("Error downloading StreamCat file {}", name),
                )?;
                unzip_and_remove(&archive, target).await.op_context(
                    Self::SCHEMA.plugin,
                    format!("Error extracting StreamCat file {}", name),
                )?;
            }
        }
        Ok(())
    }
}

impl_plugin!(GageFeatureInput);

#[async_trait]
impl InputConnector for GageFeatureInput {
    async fn get(&mut self) -> Result<bool> {
        let plugin = Self::SCHEMA.plugin;
        let target = prepare_target(self).await?;

        let regions = Layer::load(&self.huc2_shapefile)
            .await
            .op_context(plugin, "Error opening HUC2 regions shapefile")?;
        let gages = self.locate(&regions).await;
        let huc2s: BTreeSet<String> = gages.iter().map(|g| g.huc2.clone()).collect();
        info!(plugin, located = gages.len(), regions = huc2s.len(), "gages located");

        self.fetch_tables(&huc2s, &target).await?;

        let gage_loc = Layer::load(&self.gage_loc_shapefile)
            .await
            .op_context(plugin, "Error opening GageLoc shapefile")?;
        let flowlines: HashMap<String, String> = gage_loc
            .features
            .iter()
            .filter_map(|f| Some((f.text("SOURCE_FEA")?, f.text("FLComID")?)))
            .collect();

        let mut tables: HashMap<(String, &str), Table> = HashMap::new();
        for huc2 in &huc2s {
            for (file, variables) in STREAMCAT {
                let path = target.join(format!("{}_Region{}.csv", file, huc2));
                let table = read_table(path, variables).await.op_context(
                    plugin,
                    format!("Error reading StreamCat table {} for region {}", file, huc2),
                )?;
                tables.insert((huc2.clone(), file), table);
            }
        }

        let rows: Vec<Vec<String>> = gages
            .iter()
            .filter_map(|gage| {
                let comid = flowlines.get(&gage.id)?;
                let mut row = vec![
                    gage.id.clone(),
                    cell(gage.site.latitude),
                    cell(gage.site.longitude),
                    cell(gage.site.drainage_area),
                    cell(gage.site.altitude),
                    comid.clone(),
                ];
                for (file, _) in STREAMCAT {
                    let values = tables.get(&(gage.huc2.clone(), file))?.get(comid)?;
                    row.extend(values.iter().cloned());
                }
                Some(row)
            })
            .collect();

        clear_dir(&target)
            .await
            .op_context(plugin, "Error cleaning up downloaded StreamCat files")?;

        let header: Vec<&str> = BASE_COLUMNS
            .iter()
            .copied()
            .chain(STREAMCAT.iter().flat_map(|(_, vars)| vars.iter().copied()))
            .collect();
        let path = target.join("gages.csv");
        let count = rows.len();
        write_csv(&path, &header, rows)
            .await
            .op_context(plugin, "Error writing gages.csv")?;
        info!(plugin, gages = count, "wrote gage features");
        Ok(true)
    }
}

/// Normalize a flowline ID so `18485220` and `18485220.0` compare equal
fn comid_key(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        _ => trimmed.to_string(),
    }
}

/// Read `variables` of every COMID in a StreamCat CSV
async fn read_table(path: PathBuf, variables: &'static [&'static str]) -> Result<Table> {
    tokio::task::spawn_blocking(move || read_table_blocking(&path, variables))
        .await
        .map_err(|e| Error::InvalidResponse(format!("table reader task panicked: {}", e)))?
}

fn read_table_blocking(path: &Path, variables: &[&str]) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers.iter().position(|h| h == name).ok_or_else(|| {
            Error::InvalidResponse(format!("{} has no {} column", path.display(), name))
        })
    };
    let comid = column("COMID")?;
    let columns: Vec<usize> = variables.iter().map(|v| column(v)).collect::<Result<_>>()?;

    let mut table = Table::new();
    for record in reader.records() {
        let record = record?;
        let Some(id) = record.get(comid) else { continue };
        let values = columns
            .iter()
            .map(|&i| record.get(i).unwrap_or_default().to_string())
            .collect();
        table.insert(comid_key(id), values);
    }
    Ok(table)
}

async fn clear_dir(dir: &Path) -> Result<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(entry.path()).await?;
        } else {
            tokio::fs::remove_file(entry.path()).await?;
        }
    }
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::plugin::Plugin;
    use std::io::Write;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn site_rdb(lat: f64, lon: f64, alt: f64, area: f64) -> String {
        format!(
            "# USGS site file\n\
             agency_cd\tsite_no\tdec_lat_va\tdec_long_va\talt_va\tdrain_area_va\n\
             5s\t15s\t16s\t16s\t8s\t8s\n\
             USGS\tX\t{}\t{}\t{}\t{}\n",
            lat, lon, alt, area
        )
    }

    fn streamcat_zip(file: &str, vars: &[&str], rows: &[(&str, &str)]) -> Vec<u8> {
        let mut csv = format!("COMID,CatAreaSqKm,{}\n", vars.join(","));
        for (comid, value) in rows {
            let values: Vec<&str> = vars.iter().map(|_| *value).collect();
            csv.push_str(&format!("{},1.5,{}\n", comid, values.join(",")));
        }
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            zip.start_file(format!("{}_Region05.csv", file), zip::write::FileOptions::default())
                .unwrap();
            zip.write_all(csv.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[tokio::test]
    async fn test_builds_gage_table() {
        let server = MockServer::start().await;
        for (gage, rdb) in [
            ("03335500", site_rdb(40.4209, -86.8967, 506.0, 7267.0)),
            ("05525500", site_rdb(40.9381, -87.1611, 640.0, 449.0)),
            ("07374000", site_rdb(30.4455, -91.1915, 0.0, 1125810.0)),
        ] {
            Mock::given(method("GET"))
                .and(path("/site/"))
                .and(query_param("sites", gage))
                .respond_with(ResponseTemplate::new(200).set_body_string(rdb))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/site/"))
            .and(query_param("sites", "03333050"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        for (file, vars) in STREAMCAT {
            // 14770540 (gage 05525500) is missing from the dams table
            let rows: &[(&str, &str)] = if file == "Dams" {
                &[("18485220", "0.25")]
            } else {
                &[("18485220.0", "7"), ("14770540", "3")]
            };
            Mock::given(method("GET"))
                .and(path(format!("/{}_Region05.zip", file)))
                .respond_with(
                    ResponseTemplate::new(200).set_body_bytes(streamcat_zip(file, vars, rows)),
                )
                .expect(1)
                .mount(&server)
                .await;
        }

        let dir = tempfile::tempdir().unwrap();
        let params = Params::new().with("gages", "03335500,03333050,05525500,07374000");
        let mut input = GageFeatureInput::new(&params, &test_config(&server.uri())).unwrap();
        input.set_target_path(dir.path().to_path_buf());
        assert!(input.get().await.unwrap());

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["gages.csv"]);

        let csv = std::fs::read_to_string(dir.path().join("gages.csv")).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Gage_Number2,Lat,Long,Drainage_Area,Datum,FLComID,ElevWs,DamDensWs,\
             PctConif2011Ws,PctDecid2011Ws,PctMxtFst2011Ws,PctUrbHi2011Ws,PctUrbLo2011Ws,\
             PctUrbOp2011Ws,PermWs,RdDensWs,WetIndexWs,SandWs,ClayWs,HydrlCondWs,PctImp2011Ws"
        );
        assert_eq!(
            lines.next().unwrap(),
            "03335500,40.4209,-86.8967,7267,506,18485220,7,0.25,7,7,7,7,7,7,7,7,7,7,7,7,7"
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_comid_key() {
        assert_eq!(comid_key("18485220"), "18485220");
        assert_eq!(comid_key(" 18485220.0 "), "18485220");
        assert_eq!(comid_key("abc"), "abc");
    }

    #[test]
    fn test_table_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Elevation_Region05.csv");
        std::fs::write(&path, "COMID,Other\n1,2\n").unwrap();
        let err = read_table_blocking(&path, &["ElevWs"]).unwrap_err();
        assert!(err.to_string().contains("no ElevWs column"));
    }

    #[tokio::test]
    async fn test_missing_huc2_layer() {
        let mut config = test_config("http://127.0.0.1:9");
        config.data.huc2_shapefile = PathBuf::from("/nonexistent/huc2.shp");
        let dir = tempfile::tempdir().unwrap();
        let mut input =
            GageFeatureInput::new(&Params::new().with("gages", "03335500"), &config).unwrap();
        input.set_target_path(dir.path().to_path_buf());
        let err = input.get().await.unwrap_err();
        assert!(err.to_string().contains("HUC2 regions shapefile"));
    }
}
