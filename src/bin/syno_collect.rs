//! syno-collect: run the DiskStation metric families.

use clap::Parser;
use std::collections::BTreeMap;
use std::process::ExitCode;
use std::time::Instant;
use syno_snmp::Family;
use syno_snmp::cli::args::{self, CommonArgs, OutputArgs, V3Args};
use syno_snmp::cli::output::{CollectResult, OutputContext, write_error};

/// Collect metric families and print `key value` lines or JSON.
#[derive(Debug, Parser)]
#[command(name = "syno-collect", version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    v3: V3Args,

    #[command(flatten)]
    output: OutputArgs,

    /// Families to run: disk, load, cpu, mem, net, system. All when omitted.
    #[arg(short = 'f', long = "family", value_name = "FAMILY")]
    families: Vec<Family>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    args.output.init_tracing();

    let families = if args.families.is_empty() {
        Family::ALL.to_vec()
    } else {
        args.families.clone()
    };

    let start = Instant::now();
    let mut client = match args::connect(&args.common, &args.v3).await {
        Ok(client) => client,
        Err(e) => {
            write_error(&e);
            return ExitCode::FAILURE;
        }
    };

    let mut result = CollectResult {
        target: client.peer_addr().to_string(),
        families: BTreeMap::new(),
        errors: BTreeMap::new(),
        timing_ms: None,
    };
    for family in families {
        match family.collect(&mut client).await {
            Ok(samples) => {
                result.families.insert(family.to_string(), samples);
            }
            Err(e) => {
                tracing::warn!(target: "syno_snmp::collector", %family, error = %e, "family failed");
                result.errors.insert(family.to_string(), e.to_string());
            }
        }
    }
    result.timing_ms = Some(start.elapsed().as_secs_f64() * 1000.0);

    let ctx = OutputContext {
        format: args.output.format,
        show_timing: args.output.timing,
    };
    if let Err(e) = ctx.write_samples(&result) {
        eprintln!("Error writing output: {e}");
        return ExitCode::FAILURE;
    }
    if result.errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        for (family, error) in &result.errors {
            eprintln!("Error: {family}: {error}");
        }
        ExitCode::FAILURE
    }
}
