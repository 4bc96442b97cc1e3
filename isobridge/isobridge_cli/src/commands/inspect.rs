//! The `inspect` command: list the objects of a bundle through the export
//! surface.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use isobridge_ffi::{isobridge_initialize, isobridge_release_handle, isobridge_unload_isolation_context};
use serde::Serialize;

use crate::bridge;

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to the bundle manifest
    #[clap(long)]
    pub bundle: PathBuf,

    /// Glob pattern selecting objects
    #[clap(long)]
    pub pattern: Option<String>,

    /// Load the bundle into a fresh isolated domain
    #[clap(long)]
    pub isolated: bool,

    /// Print JSON instead of a table
    #[clap(long)]
    pub json: bool,
}

/// One listed object.
#[derive(Debug, Serialize)]
pub struct ObjectRow {
    pub url: String,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub size: Option<i64>,
}

fn hex(bytes: &[u8; 16]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Implementation of the inspect command
pub fn execute(args: &InspectArgs) -> Result<()> {
    let manifest = args
        .bundle
        .to_str()
        .context("bundle path is not valid UTF-8")?;

    isobridge_initialize();
    let domain = if args.isolated {
        bridge::create_domain()?
    } else {
        0
    };

    let bundle = bridge::load_bundle(manifest, domain)?;
    let urls = bridge::query(bundle, args.pattern.as_deref())?;

    let mut rows = Vec::with_capacity(urls.len());
    for url in urls {
        let id = bridge::object_id(&url, domain)?;
        rows.push(ObjectRow {
            type_name: id.as_ref().and_then(|id| bridge::object_type(id, domain)),
            size: id.as_ref().and_then(|id| bridge::object_size(id, domain)),
            id: id.as_ref().map(hex),
            url,
        });
    }
    isobridge_release_handle(bundle);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("domain {domain}: {} objects", rows.len());
        for row in &rows {
            println!(
                "{}\t{}\t{}",
                row.url,
                row.type_name.as_deref().unwrap_or("-"),
                row.size.map_or_else(|| "-".to_string(), |size| size.to_string())
            );
        }
    }

    if args.isolated {
        isobridge_unload_isolation_context(domain);
    }
    Ok(())
}
