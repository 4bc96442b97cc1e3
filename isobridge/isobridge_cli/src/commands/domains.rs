//! The `domains` command: create, list and unload isolation domains.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use isobridge_ffi::{isobridge_unload_isolation_context, runtime, TRUE};

use crate::bridge;

/// Arguments for the domains command
#[derive(Args, Debug)]
pub struct DomainsArgs {
    /// Number of domains to create
    #[clap(long, default_value_t = 1)]
    pub count: usize,

    /// Unload the domains again before exiting
    #[clap(long)]
    pub unload: bool,
}

/// Implementation of the domains command
pub fn execute(args: &DomainsArgs) -> Result<()> {
    let mut created = Vec::with_capacity(args.count);
    for _ in 0..args.count {
        let id = bridge::create_domain()?;
        println!("created domain {id}");
        created.push(id);
    }

    let rt = runtime()?;
    let live: Vec<String> = rt.domain_ids().iter().map(|id| id.as_raw().to_string()).collect();
    println!("live domains: [{}]", live.join(", "));

    if args.unload {
        for id in created {
            let unloaded = isobridge_unload_isolation_context(id) == TRUE;
            println!("unloaded domain {id}: {unloaded}");
        }
        rt.drain_teardown(Duration::from_secs(5));
        let stats = rt.teardown_stats();
        println!("teardowns completed: {}", stats.jobs_completed);
    }
    Ok(())
}
