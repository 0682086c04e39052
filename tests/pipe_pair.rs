use std::cell::RefCell;
use std::rc::Rc;

use corofd::{Interest, Machine};

#[test]
fn pipe_writer_and_reader_preserve_order() {
    let machine = Machine::new().unwrap();

    let mut fds = [0i32; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0, "pipe() failed");
    let (read_fd, write_fd) = (fds[0], fds[1]);

    let received = Rc::new(RefCell::new(String::new()));

    let writer = machine
        .spawn(move |co| {
            for i in 0..20 {
                let line = format!("FOO {i}\n");
                co.wait(write_fd, Interest::WRITABLE);
                let n =
                    unsafe { libc::write(write_fd, line.as_ptr() as *const _, line.len()) };
                assert_eq!(n as usize, line.len());
                co.yield_now();
            }
            unsafe { libc::close(write_fd) };
        })
        .unwrap();

    let sink = received.clone();
    let reader = machine
        .spawn(move |co| {
            loop {
                co.wait(read_fd, Interest::READABLE);
                let mut buf = [0u8; 256];
                let n = unsafe { libc::read(read_fd, buf.as_mut_ptr() as *mut _, buf.len()) };
                assert!(n >= 0, "pipe read failed");
                if n == 0 {
                    sink.borrow_mut().push_str("EOF\n");
                    break;
                }
                sink.borrow_mut()
                    .push_str(std::str::from_utf8(&buf[..n as usize]).unwrap());
            }
            unsafe { libc::close(read_fd) };
        })
        .unwrap();

    reader.start();
    writer.start();
    machine.run();

    let mut expected: String = (0..20).map(|i| format!("FOO {i}\n")).collect();
    expected.push_str("EOF\n");
    assert_eq!(*received.borrow(), expected);
}

#[test]
fn hangup_is_delivered_to_the_waiter() {
    let machine = Machine::new().unwrap();

    let mut fds = [0i32; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0, "pipe() failed");
    let read_fd = fds[0];
    unsafe { libc::close(fds[1]) };

    let co = machine
        .spawn(move |co| {
            let revents = co.wait(read_fd, Interest::READABLE);
            // The write end is gone: the poller reports the condition and
            // the coroutine decides; a read sees a clean EOF.
            assert!(revents.intersects(Interest::READABLE | Interest::HANGUP));
            let mut buf = [0u8; 8];
            let n = unsafe { libc::read(read_fd, buf.as_mut_ptr() as *mut _, buf.len()) };
            assert_eq!(n, 0);
            unsafe { libc::close(read_fd) };
        })
        .unwrap();

    co.start();
    machine.run();
    assert!(machine.is_empty());
}
