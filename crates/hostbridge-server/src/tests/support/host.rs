//! Host state and handlers used by the behaviour suites.

use serde_json::{Value, json};

use crate::dispatch::{DispatchTable, HandlerError, Params};

/// Host whose handlers record what ran on the main thread.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub executed: Vec<String>,
}

/// Builds a table with `record`, `fail` and `explode` handlers.
pub fn recording_table() -> DispatchTable<RecordingHost> {
    let mut table = DispatchTable::new();
    table
        .register("record", |host: &mut RecordingHost, params: &Params| {
            let label = params
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or("unlabelled")
                .to_owned();
            host.executed.push(label);
            Ok(json!({"executed": host.executed.len()}))
        })
        .expect("register record");
    table
        .register("fail", |_host: &mut RecordingHost, _params: &Params| {
            Err(HandlerError::new("host refused the command"))
        })
        .expect("register fail");
    table
        .register("explode", |_host: &mut RecordingHost, _params: &Params| {
            panic!("host handler exploded")
        })
        .expect("register explode");
    table
}
