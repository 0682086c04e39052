use std::cell::RefCell;
use std::rc::Rc;

use corofd::{CoroutineState, Machine};

#[test]
fn single_coroutine_yields_100_times() {
    let machine = Machine::new().unwrap();
    let counter = Rc::new(RefCell::new(0));

    let tally = counter.clone();
    let co = machine
        .spawn(move |co| {
            for _ in 0..100 {
                *tally.borrow_mut() += 1;
                co.yield_now();
            }
        })
        .unwrap();

    assert_eq!(co.state(), CoroutineState::New);
    co.start();
    assert_eq!(co.state(), CoroutineState::Ready);

    machine.run();

    assert_eq!(*counter.borrow(), 100);
    assert_eq!(co.state(), CoroutineState::Dead);
    assert!(machine.is_empty());
}

#[test]
fn yielding_peers_run_round_robin() {
    let machine = Machine::new().unwrap();
    let order = Rc::new(RefCell::new(Vec::new()));

    for tag in ["a", "b", "c"] {
        let order = order.clone();
        let co = machine
            .spawn(move |co| {
                for _ in 0..5 {
                    order.borrow_mut().push(tag);
                    co.yield_now();
                }
            })
            .unwrap();
        co.start();
    }

    machine.run();

    // Strict FIFO fairness: with every peer continuously runnable, the
    // longest-waiting one goes next, which is a fixed rotation.
    let expected: Vec<&str> = ["a", "b", "c"].iter().cycle().take(15).copied().collect();
    assert_eq!(*order.borrow(), expected);
}
