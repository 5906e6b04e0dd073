//! syno-walk: walk a subtree on a DiskStation.

use clap::Parser;
use std::process::ExitCode;
use std::time::Instant;
use syno_snmp::Oid;
use syno_snmp::cli::args::{self, CommonArgs, OutputArgs, V3Args};
use syno_snmp::cli::output::{OutputContext, write_error};

/// Walk an OID subtree with GETBULK (v2c/v3) or GETNEXT (v1).
#[derive(Debug, Parser)]
#[command(name = "syno-walk", version, about)]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    #[command(flatten)]
    v3: V3Args,

    #[command(flatten)]
    output: OutputArgs,

    /// Subtree root in dotted notation.
    #[arg(value_name = "OID", default_value = "1.3.6.1.4.1.6574")]
    oid: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    args.output.init_tracing();

    let root = match Oid::parse(&args.oid) {
        Ok(oid) => oid,
        Err(e) => {
            write_error(&e);
            return ExitCode::FAILURE;
        }
    };

    let start = Instant::now();
    let result = async {
        let mut client = args::connect(&args.common, &args.v3).await?;
        let target = client.peer_addr();
        let varbinds = client.walk(root).collect().await?;
        Ok::<_, syno_snmp::Error>((target, varbinds))
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
