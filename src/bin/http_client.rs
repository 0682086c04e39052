//! Concurrent HTTP/1.1 GET client: `-j N` coroutines each fetch the same
//! file and stream the body to standard output.

use std::io;
use std::net::ToSocketAddrs;
use std::process;

use clap::Parser;

use corofd::http;
use corofd::{CoroutineBuilder, Machine};

#[derive(Parser)]
#[command(name = "http-client")]
#[command(about = "Concurrent HTTP/1.1 GET client", long_about = None)]
struct Cli {
    /// Number of concurrent fetch coroutines.
    #[arg(short = 'j', long = "jobs", default_value_t = 1)]
    jobs: usize,

    /// Server hostname.
    host: String,

    /// File to request.
    filename: String,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    // Resolve once; every coroutine connects to the same IPv4 address.
    let address = (cli.host.as_str(), 80u16)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.find(|a| a.is_ipv4()))
        .unwrap_or_else(|| {
            eprintln!("http-client: unknown host {}", cli.host);
            process::exit(1);
        })
        .to_string();

    let machine = Machine::new().unwrap_or_else(|error| {
        eprintln!("http-client: {error}");
        process::exit(1);
    });

    for _ in 0..cli.jobs {
        let host = cli.host.clone();
        let address = address.clone();
        let filename = cli.filename.clone();
        let fetcher = CoroutineBuilder::new()
            .stack_size(64 * 1024)
            .spawn(&machine, move |co| {
                let mut stdout = io::stdout();
                if let Err(error) = http::fetch(co, &host, &address, &filename, &mut stdout) {
                    eprintln!("http-client ({}): {error}", co.name());
                }
            })
            .unwrap_or_else(|error| {
                eprintln!("http-client: {error}");
                process::exit(1);
            });
        fetcher.start();
    }

    machine.run();
}
