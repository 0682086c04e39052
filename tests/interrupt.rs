use corofd::{CoroutineState, Interest, Machine};

#[test]
fn stop_breaks_a_blocked_run() {
    let machine = Machine::new().unwrap();

    // A pipe that is never written: the waiter would park forever.
    let mut fds = [0i32; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0, "pipe() failed");
    let read_fd = fds[0];

    let waiter = machine
        .spawn(move |co| {
            co.wait(read_fd, Interest::READABLE);
        })
        .unwrap();

    let stopper = machine
        .spawn(|co| {
            // Let the waiter park first, then ask the machine to stop.
            co.yield_now();
            co.machine().stop();
        })
        .unwrap();

    waiter.start();
    stopper.start();
    machine.run();

    // run returned with the waiter still parked; it is torn down with the
    // machine.
    assert_eq!(waiter.state(), CoroutineState::Waiting);
    assert_eq!(machine.len(), 1);
    drop(machine);

    unsafe {
        libc::close(fds[0]);
        libc::close(fds[1]);
    }
}
