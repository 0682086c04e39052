use std::cell::RefCell;
use std::io::{Read, Write};
use std::net::TcpStream as StdTcpStream;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;

use corofd::net::TcpListener;
use corofd::{http, CoroutineBuilder, Machine};

const HANDLER_STACK: usize = 64 * 1024;

/// Runs a machine on its own thread serving exactly `connections`
/// connections on an ephemeral port, and reports the port back.
fn one_shot_server(connections: usize) -> (thread::JoinHandle<()>, u16) {
    let (port_tx, port_rx) = mpsc::channel();
    let server = thread::spawn(move || {
        let machine = Machine::new().expect("machine");
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        let port = listener.local_addr().expect("local addr").port();
        port_tx.send(port).expect("report port");

        let acceptor = CoroutineBuilder::new()
            .stack_size(HANDLER_STACK)
            .spawn(&machine, move |co| {
                for _ in 0..connections {
                    let (stream, _peer) = listener.accept(co).expect("accept");
                    http::serve_connection(co, stream);
                }
            })
            .expect("spawn acceptor");
        acceptor.start();
        machine.run();
    });
    let port = port_rx.recv().expect("server port");
    (server, port)
}

#[test]
fn get_of_an_existing_file_returns_200_with_the_body() {
    let path = "/tmp/corofd-http-200.html";
    std::fs::write(path, "<h1>hi</h1>").unwrap();

    let (server, port) = one_shot_server(1);

    let mut client = StdTcpStream::connect(("127.0.0.1", port)).expect("connect");
    client
        .write_all(format!("GET {path} HTTP/1.1\r\nHost: local\r\n\r\n").as_bytes())
        .expect("send request");
    let mut response = Vec::new();
    client.read_to_end(&mut response).expect("read response");
    server.join().unwrap();

    assert_eq!(
        String::from_utf8_lossy(&response),
        "HTTP/1.1 200 OK\r\nContent-type: text/html\r\nContent-length: 11\r\n\r\n<h1>hi</h1>"
    );
}

#[test]
fn get_of_a_missing_file_returns_404_with_no_body() {
    let (server, port) = one_shot_server(1);

    let mut client = StdTcpStream::connect(("127.0.0.1", port)).expect("connect");
    client
        .write_all(b"GET /tmp/corofd-no-such-file HTTP/1.1\r\nHost: local\r\n\r\n")
        .expect("send request");
    let mut response = Vec::new();
    client.read_to_end(&mut response).expect("read response");
    server.join().unwrap();

    assert_eq!(String::from_utf8_lossy(&response), "HTTP/1.1 404 Not Found\r\n\r\n");
}

#[test]
fn non_get_methods_are_rejected_with_400() {
    let (server, port) = one_shot_server(1);

    let mut client = StdTcpStream::connect(("127.0.0.1", port)).expect("connect");
    client
        .write_all(b"PUT /tmp/x HTTP/1.1\r\nHost: local\r\n\r\n")
        .expect("send request");
    let mut response = Vec::new();
    client.read_to_end(&mut response).expect("read response");
    server.join().unwrap();

    assert_eq!(
        String::from_utf8_lossy(&response),
        "HTTP/1.1 400 Invalid request method\r\n\r\n"
    );
}

#[test]
fn coroutine_client_fetches_from_coroutine_server() {
    let path = "/tmp/corofd-http-fetch.html";
    std::fs::write(path, "<p>fetch</p>").unwrap();

    // Server and client share one machine; everything runs on one thread.
    let machine = Machine::new().expect("machine");
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
    let address = format!(
        "127.0.0.1:{}",
        listener.local_addr().expect("local addr").port()
    );

    let acceptor = CoroutineBuilder::new()
        .stack_size(HANDLER_STACK)
        .spawn(&machine, move |co| {
            let (stream, _peer) = listener.accept(co).expect("accept");
            http::serve_connection(co, stream);
        })
        .expect("spawn acceptor");
    acceptor.start();

    let body = Rc::new(RefCell::new(Vec::new()));
    let sink = body.clone();
    let fetcher = CoroutineBuilder::new()
        .stack_size(HANDLER_STACK)
        .spawn(&machine, move |co| {
            let mut received = Vec::new();
            http::fetch(co, "local", &address, path, &mut received).expect("fetch");
            *sink.borrow_mut() = received;
        })
        .expect("spawn fetcher");
    fetcher.start();

    machine.run();

    assert_eq!(String::from_utf8_lossy(&body.borrow()), "<p>fetch</p>");
}
