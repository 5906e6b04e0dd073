//! syno-get: read SNMP objects from a DiskStation.

use clap::Parser;
use std::process::ExitCode;
use std::time::Instant;
use syno_snmp::Oid;
use syno_snmp::cli::args::{self, CommonArgs, OutputArgs, V3Args};
use syno_snmp::cli::output::{OutputContext, write_error};

/// GET one or more objects.
#[derive(Debug, Parser)]
#[command(name = "syno-get", version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    v3: V3Args,

    #[command(flatten)]
    output: OutputArgs,

    /// OIDs in dotted notation (a leading '.' is accepted).
    #[arg(required = true, value_name = "OID")]
    oids: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    args.output.init_tracing();

    let oids = match args.oids.iter().map(|s| Oid::parse(s)).collect::<Result<Vec<_>, _>>() {
        Ok(oids) => oids,
        Err(e) => {
            write_error(&e);
            return ExitCode::FAILURE;
        }
    };

    let start = Instant::now();
    let result = async {
        let mut client = args::connect(&args.common, &args.v3).await?;
        let varbinds = client.get(&oids).await?;
        Ok::<_, syno_snmp::Error>((client.peer_addr(), varbinds))
    }
    .await;
    let elapsed = start.elapsed();

    match result {
        Ok((target, varbinds)) => {
            let ctx = OutputContext {
                format: args.output.format,
                show_timing: args.output.timing,
            };
            let version = args::effective_version(&args.common, &args.v3);
            if let Err(e) = ctx.write_results(target, version, &varbinds, Some(elapsed)) {
                eprintln!("Error writing output: {e}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            write_error(&e);
            ExitCode::FAILURE
        }
    }
}
