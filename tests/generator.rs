use std::cell::RefCell;
use std::rc::Rc;

use corofd::{CoroutineState, Machine};

#[test]
fn generator_produces_values_in_order() {
    let machine = Machine::new().unwrap();
    let values = Rc::new(RefCell::new(Vec::new()));

    let generator = machine
        .spawn(|co| {
            for i in 1..5i32 {
                co.yield_value(&i);
            }
        })
        .unwrap();

    let observed = values.clone();
    let callee = generator.clone();
    let consumer = machine
        .spawn(move |co| {
            let mut calls = 0;
            loop {
                let mut slot = 0i32;
                let produced = co.call(&callee, &mut slot);
                calls += 1;
                if !produced {
                    // The body returned during the fifth call.
                    assert_eq!(calls, 5);
                    assert!(!co.is_alive(&callee));
                    break;
                }
                observed.borrow_mut().push(slot);
            }
        })
        .unwrap();

    // The generator is never started explicitly; the first call starts it.
    consumer.start();
    machine.run();

    assert_eq!(*values.borrow(), vec![1, 2, 3, 4]);
    assert_eq!(generator.state(), CoroutineState::Dead);
    assert!(machine.is_empty());
}

#[test]
fn payload_free_call_is_a_pure_rendezvous() {
    let machine = Machine::new().unwrap();
    let meetings = Rc::new(RefCell::new(0));

    let counted = meetings.clone();
    let responder = machine
        .spawn(move |co| {
            for _ in 0..3 {
                *counted.borrow_mut() += 1;
                co.yield_value(&());
            }
        })
        .unwrap();

    let callee = responder.clone();
    let initiator = machine
        .spawn(move |co| {
            while co.call_rendezvous(&callee) {}
        })
        .unwrap();

    initiator.start();
    machine.run();

    assert_eq!(*meetings.borrow(), 3);
    assert!(machine.is_empty());
}
