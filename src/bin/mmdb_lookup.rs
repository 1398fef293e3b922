use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

use mmdb::Reader;

fn main() {
    let mut verbose = false;
    let mut args = env::args();
    let program = args.next().unwrap();
    let program = std::path::Path::new(&program);
    let program = program.file_name().unwrap().to_string_lossy();

    let args = args
        .filter(|arg| {
            if arg == "-v" || arg == "--verbose" {
                verbose = true;
                false
            } else {
                true
            }
        })
        .collect::<Vec<_>>();

    if args.len() != 2 {
        eprintln!("{program} -- look up an IP address in a MaxMind DB file");
        eprintln!("USAGE: {program} <ip address> <mmdb_path>");
        eprintln!("   eg. {program} 1.1.1.1 ./GeoLite2-Country.mmdb");
        eprintln!("FLAGS:");
        eprintln!("       --verbose (-v)      Enables verbose logging");
        std::process::exit(1);
    }

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let Ok(ip) = args[0].parse::<IpAddr>() else {
        eprintln!("ERR: the provided ip address '{}' is invalid", args[0]);
        std::process::exit(1);
    };

    let db_path = PathBuf::from(&args[1]);

    let mut reader = match Reader::open(&db_path) {
        Ok(reader) => reader,
        Err(err) => {
            eprintln!("ERR: failed to open '{}': {err}", db_path.display());
            std::process::exit(1);
        }
    };

    match reader.lookup(ip) {
        Ok((Some(value), depth)) => println!("{value}\n(matched /{depth})"),
        Ok((None, depth)) => println!("No data found (searched to /{depth})"),
        Err(err) => {
            eprintln!("ERR: lookup failed: {err}");
            std::process::exit(1);
        }
    }
}
