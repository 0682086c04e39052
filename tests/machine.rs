use std::cell::{Cell, RefCell};
use std::rc::Rc;

use corofd::{CoroutineBuilder, CoroutineState, Error, Machine};

#[test]
fn run_with_no_coroutines_returns_immediately() {
    let machine = Machine::new().unwrap();
    machine.run();
    assert!(machine.is_empty());
}

#[test]
fn ids_start_at_zero_and_are_reused_after_death() {
    let machine = Machine::new().unwrap();

    let first = machine.spawn(|_| {}).unwrap();
    let second = machine.spawn(|_| {}).unwrap();
    assert_eq!(first.id(), 0);
    assert_eq!(second.id(), 1);
    assert_eq!(first.name(), "co-0");
    assert_eq!(second.name(), "co-1");

    first.start();
    second.start();
    machine.run();
    assert!(machine.is_empty());

    // The lowest dead slot comes back first.
    let third = machine.spawn(|_| {}).unwrap();
    assert_eq!(third.id(), 0);
}

#[test]
fn zero_stack_size_is_rejected() {
    let machine = Machine::new().unwrap();
    let result = CoroutineBuilder::new()
        .stack_size(0)
        .spawn(&machine, |_| {});
    assert!(matches!(result, Err(Error::ZeroStackSize)));
    assert!(machine.is_empty());
}

#[test]
fn builder_sets_name_and_user_data() {
    let machine = Machine::new().unwrap();

    let seen = Rc::new(RefCell::new(String::new()));
    let sink = seen.clone();
    let co = CoroutineBuilder::new()
        .name("worker")
        .user_data(Rc::new(42i32))
        .spawn(&machine, move |co| {
            let data = co.user_data().unwrap();
            let value = data.downcast_ref::<i32>().unwrap();
            *sink.borrow_mut() = format!("{} saw {}", co.name(), value);
        })
        .unwrap();
    assert_eq!(co.name(), "worker");

    co.start();
    machine.run();
    assert_eq!(*seen.borrow(), "worker saw 42");
}

struct DropFlag(Rc<Cell<bool>>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.set(true);
    }
}

#[test]
fn exit_terminates_the_body_and_drops_its_locals() {
    let machine = Machine::new().unwrap();
    let progress = Rc::new(Cell::new(0));
    let dropped = Rc::new(Cell::new(false));

    let steps = progress.clone();
    let flag = dropped.clone();
    let co = machine
        .spawn(move |co| {
            let _guard = DropFlag(flag);
            steps.set(1);
            if steps.get() == 1 {
                co.exit();
            }
            steps.set(2);
        })
        .unwrap();

    co.start();
    machine.run();

    assert_eq!(progress.get(), 1);
    assert!(dropped.get(), "exit must unwind the coroutine's locals");
    assert_eq!(co.state(), CoroutineState::Dead);
    assert!(machine.is_empty());
}

#[test]
fn show_lists_every_coroutine() {
    let machine = Machine::new().unwrap();
    let _first = machine.spawn(|_| {}).unwrap();
    let second = CoroutineBuilder::new()
        .name("parked")
        .spawn(&machine, |_| {})
        .unwrap();

    let mut listing = Vec::new();
    machine.show(&mut listing).unwrap();
    let listing = String::from_utf8(listing).unwrap();
    assert!(listing.contains("co-0"));
    assert!(listing.contains("parked"));
    assert!(listing.contains("state: new"));
    drop(second);
}
