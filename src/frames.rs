// Frame operations: schema fetch and client-side table upload

use log::info;
use uuid::Uuid;

use crate::cluster::Cluster;
use crate::error::{NimbusError, Result};
use crate::models::{key_name, Frame, LocalTable};
use crate::params::{ParamSet, ParamValue};

impl Cluster {
    /// Fetch a frame reference by key, caching its column schema client-side
    /// for selector validation.
    pub fn frame(&self, key: &str) -> Result<Frame> {
        let payload = self.get(&format!("/3/Frames/{}", key), ParamSet::new())?;
        Frame::from_frames_payload(&payload)
    }

    /// Ship a client-side table to the cluster as CSV and return the frame
    /// key it landed under. A destination key is generated when the caller
    /// does not name one.
    pub fn upload_table(&self, table: &LocalTable, destination: Option<&str>) -> Result<String> {
        if table.is_empty() {
            return Err(NimbusError::InvalidArgument(
                "cannot upload an empty table".to_string(),
            ));
        }
        let key = match destination {
            Some(key) => key.to_string(),
            None => format!("upload_{}", Uuid::new_v4().simple()),
        };
        let mut params = ParamSet::new();
        params.set("destination_frame", ParamValue::Key(key.clone()));
        let payload = self.upload_bytes("/3/PostFile", params, table.to_csv().as_bytes())?;
        let confirmed = payload
            .get("destination_frame")
            .and_then(key_name)
            .unwrap_or(key);
        info!(
            "uploaded {} rows as frame {}",
            table.row_count(),
            confirmed
        );
        Ok(confirmed)
    }
}
