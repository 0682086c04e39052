//! Single-threaded HTTP/1.1 GET server: one coroutine accepts, one
//! coroutine per connection serves.

use std::process;

use clap::Parser;

use corofd::http;
use corofd::net::TcpListener;
use corofd::{CoroutineBuilder, Machine};

#[derive(Parser)]
#[command(name = "http-server")]
#[command(about = "Coroutine-per-connection HTTP/1.1 GET file server", long_about = None)]
struct Cli {
    /// TCP port to listen on.
    #[arg(long, default_value_t = 80)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let address = format!("{}:{}", cli.bind, cli.port);
    let listener = TcpListener::bind(&address).unwrap_or_else(|error| {
        eprintln!("http-server: bind {address}: {error}");
        process::exit(1);
    });
    log::info!("listening on {address}");

    let machine = Machine::new().unwrap_or_else(|error| {
        eprintln!("http-server: {error}");
        process::exit(1);
    });
    let acceptor = CoroutineBuilder::new()
        .name("listener")
        .stack_size(64 * 1024)
        .spawn(&machine, move |co| http::serve(co, listener))
        .unwrap_or_else(|error| {
            eprintln!("http-server: {error}");
            process::exit(1);
        });
    acceptor.start();

    machine.run();
}
