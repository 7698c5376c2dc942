// The MIT License (MIT)

// Copyright (c) 2026 Strand Developers

// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use std::cell::{Cell, RefCell};
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::{sleep, spawn, yield_now, Channel, Deadline, Direction, Error, FileDesc, Group, State};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Sleep-drive the scheduler until `pred` holds; sleeping (rather than
/// yielding) empties the ready queue so timers and descriptors get polled.
fn drive_until<F: Fn() -> bool>(pred: F) {
    while !pred() {
        sleep(Duration::from_millis(1)).unwrap();
    }
}

fn socket_pair() -> (RawFd, RawFd) {
    let mut fds = [0 as libc::c_int; 2];
    let rc = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
    assert_eq!(rc, 0, "socketpair failed");
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFL);
            assert!(flags >= 0);
            assert_eq!(libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK), 0);
        }
    }
    (fds[0], fds[1])
}

fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

#[test]
fn round_robin_yield_sums_counter() {
    init_logs();
    let total = Rc::new(Cell::new(0));

    let mut handles = Vec::new();
    for &(value, times) in &[(7, 3), (11, 1), (5, 2)] {
        let total = total.clone();
        let handle = spawn(move || {
            for _ in 0..times {
                total.set(total.get() + value);
                yield_now().unwrap();
            }
        })
        .unwrap();
        handles.push(handle);
    }

    while handles.iter().any(|h| !h.is_done()) {
        yield_now().unwrap();
    }
    assert_eq!(total.get(), 42);
}

#[test]
fn spawned_coroutine_runs_after_caller_continues() {
    init_logs();
    let order = Rc::new(RefCell::new(Vec::new()));

    let log = order.clone();
    let handle = spawn(move || log.borrow_mut().push("child"))
        .unwrap();

    // The caller keeps running past the spawn.
    order.borrow_mut().push("parent");
    drive_until(|| handle.is_done());

    assert_eq!(*order.borrow(), vec!["parent", "child"]);
    assert_eq!(handle.state(), State::Finished);
}

#[test]
fn wake_order_follows_sleep_durations() {
    init_logs();
    let ch = Channel::<u32>::new();

    for &(ms, value) in &[(30, 111), (40, 222), (10, 333), (20, 444)] {
        let tx = ch.clone();
        spawn(move || {
            sleep(Duration::from_millis(ms)).unwrap();
            tx.send(value, Deadline::NEVER).unwrap();
        })
        .unwrap();
    }

    let received: Vec<u32> = (0..4)
        .map(|_| ch.receive(Deadline::NEVER).unwrap())
        .collect();
    assert_eq!(received, vec![333, 444, 111, 222]);
}

#[test]
fn sleep_resumes_near_the_deadline() {
    init_logs();
    let start = Instant::now();
    sleep(Duration::from_millis(100)).unwrap();
    let elapsed = start.elapsed();

    assert!(
        elapsed >= Duration::from_millis(100),
        "woke early: {:?}",
        elapsed
    );
    assert!(
        elapsed <= Duration::from_millis(200),
        "woke late: {:?}",
        elapsed
    );
}

#[test]
fn elapsed_deadline_still_yields_once() {
    init_logs();
    let ran_after = Rc::new(Cell::new(false));

    let flag = ran_after.clone();
    let handle = spawn(move || flag.set(true)).unwrap();

    // The deadline is already in the past, but the spawned coroutine must
    // get its turn before the send reports Timeout.
    let ch = Channel::<u8>::new();
    match ch.send(1, Deadline::immediate()) {
        Err(Error::Timeout) => {}
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert!(ran_after.get());
    assert!(handle.is_done());
}

#[test]
fn cancelled_yield_and_spawn_fail() {
    init_logs();
    let observed = Rc::new(RefCell::new(Vec::new()));

    let log = observed.clone();
    let handle = spawn(move || loop {
        match yield_now() {
            Ok(()) => {}
            Err(Error::Canceled) => {
                log.borrow_mut().push("yield canceled");
                match spawn(|| {}) {
                    Err(Error::Canceled) => log.borrow_mut().push("spawn canceled"),
                    other => log.borrow_mut().push(match other {
                        Ok(_) => "spawn unexpectedly succeeded",
                        Err(_) => "spawn failed with the wrong error",
                    }),
                }
                break;
            }
            Err(_) => {
                log.borrow_mut().push("yield failed with the wrong error");
                break;
            }
        }
    })
    .unwrap();

    yield_now().unwrap(); // let it reach a yield
    handle.cancel();
    drive_until(|| handle.is_done());

    assert_eq!(*observed.borrow(), vec!["yield canceled", "spawn canceled"]);
    assert_eq!(handle.state(), State::Cancelled);
}

#[test]
fn cancelled_sleep_fails() {
    init_logs();
    let outcome = Rc::new(RefCell::new(None));

    let slot = outcome.clone();
    let handle = spawn(move || {
        *slot.borrow_mut() = Some(sleep(Duration::from_secs(30)));
    })
    .unwrap();

    yield_now().unwrap(); // let it park in the timer heap
    handle.cancel();
    drive_until(|| handle.is_done());

    assert!(matches!(*outcome.borrow(), Some(Err(Error::Canceled))));
    assert_eq!(handle.state(), State::Cancelled);
}

#[test]
fn poll_write_ready_then_read_timeout_then_data() {
    init_logs();
    let (local, peer) = socket_pair();
    let fd = FileDesc::new(local);

    // A fresh socket pair has buffer space: write readiness twice in a row.
    fd.poll(Direction::Write, Deadline::after(Duration::from_secs(1)))
        .unwrap();
    fd.poll(Direction::Write, Deadline::after(Duration::from_secs(1)))
        .unwrap();

    // Nothing to read yet.
    match fd.poll(Direction::Read, Deadline::after(Duration::from_millis(100))) {
        Err(Error::Timeout) => {}
        other => panic!("expected Timeout, got {:?}", other),
    }

    // One byte from the peer makes the read side ready.
    let sent = unsafe { libc::send(peer, b"x".as_ptr() as *const libc::c_void, 1, 0) };
    assert_eq!(sent, 1);
    fd.poll(Direction::Read, Deadline::after(Duration::from_secs(1)))
        .unwrap();

    let mut buf = [0u8; 4];
    let got = unsafe { libc::recv(local, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
    assert_eq!(got, 1);
    assert_eq!(buf[0], b'x');

    close_fd(local);
    close_fd(peer);
}

#[test]
fn poll_rejects_negative_fd() {
    init_logs();
    match FileDesc::new(-1).poll(Direction::Read, Deadline::NEVER) {
        Err(Error::InvalidFd) => {}
        other => panic!("expected InvalidFd, got {:?}", other),
    }
}

#[test]
fn second_reader_on_same_fd_is_rejected() {
    init_logs();
    let (local, peer) = socket_pair();
    let first_result = Rc::new(RefCell::new(None));
    let second_result = Rc::new(RefCell::new(None));

    let slot = first_result.clone();
    let first = spawn(move || {
        *slot.borrow_mut() = Some(FileDesc::new(local).poll(Direction::Read, Deadline::NEVER));
    })
    .unwrap();

    let slot = second_result.clone();
    let second = spawn(move || {
        *slot.borrow_mut() = Some(FileDesc::new(local).poll(
            Direction::Read,
            Deadline::after(Duration::from_secs(1)),
        ));
    })
    .unwrap();

    yield_now().unwrap(); // first parks, second fails immediately
    drive_until(|| second.is_done());
    assert!(matches!(*second_result.borrow(), Some(Err(Error::FdBlocked))));

    first.cancel();
    drive_until(|| first.is_done());
    assert!(matches!(*first_result.borrow(), Some(Err(Error::Canceled))));

    close_fd(local);
    close_fd(peer);
}

#[test]
fn poll_observes_a_prior_cancel_even_when_ready() {
    init_logs();
    let (local, peer) = socket_pair();
    let outcome = Rc::new(RefCell::new(None));

    let slot = outcome.clone();
    let handle = spawn(move || {
        // The cancel below lands before this body ever runs; the write
        // side is ready the whole time, but the poll must still fail.
        *slot.borrow_mut() = Some(FileDesc::new(local).poll(
            Direction::Write,
            Deadline::after(Duration::from_secs(1)),
        ));
    })
    .unwrap();

    handle.cancel(); // target is still Ready: only the flag is set
    drive_until(|| handle.is_done());

    assert!(matches!(*outcome.borrow(), Some(Err(Error::Canceled))));
    assert_eq!(handle.state(), State::Cancelled);

    close_fd(local);
    close_fd(peer);
}

#[test]
fn channel_rendezvous_preserves_sender_order() {
    init_logs();
    let ch = Channel::<u32>::new();

    for value in [1, 2] {
        let tx = ch.clone();
        spawn(move || {
            tx.send(value, Deadline::NEVER).unwrap();
        })
        .unwrap();
    }

    assert_eq!(ch.receive(Deadline::NEVER).unwrap(), 1);
    assert_eq!(ch.receive(Deadline::NEVER).unwrap(), 2);
}

#[test]
fn channel_send_times_out_without_receiver() {
    init_logs();
    let ch = Channel::<u32>::new();
    let start = Instant::now();
    match ch.send(9, Deadline::after(Duration::from_millis(20))) {
        Err(Error::Timeout) => {}
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert!(start.elapsed() >= Duration::from_millis(20));
}

#[test]
fn channel_transports_errors_unchanged() {
    init_logs();

    #[derive(Debug)]
    struct Flaky {
        code: i32,
    }
    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky failure {}", self.code)
        }
    }
    impl std::error::Error for Flaky {}

    let ch = Channel::<u8>::new();
    let tx = ch.clone();
    spawn(move || {
        tx.send_error(Box::new(Flaky { code: 37 }), Deadline::NEVER)
            .unwrap();
    })
    .unwrap();

    match ch.receive(Deadline::NEVER) {
        Err(Error::Carried(inner)) => {
            let flaky = inner.downcast::<Flaky>().expect("wrong error type");
            assert_eq!(flaky.code, 37);
        }
        other => panic!("expected a carried error, got {:?}", other),
    }
}

#[test]
fn done_releases_blocked_parties_and_rejects_new_ones() {
    init_logs();
    let send_side = Channel::<u32>::new();
    let recv_side = Channel::<u32>::new();
    let sender_saw = Rc::new(RefCell::new(None));
    let receiver_saw = Rc::new(RefCell::new(None));

    let tx = send_side.clone();
    let slot = sender_saw.clone();
    let sender = spawn(move || {
        *slot.borrow_mut() = Some(tx.send(5, Deadline::NEVER));
    })
    .unwrap();

    let rx = recv_side.clone();
    let slot = receiver_saw.clone();
    let receiver = spawn(move || {
        *slot.borrow_mut() = Some(rx.receive(Deadline::NEVER));
    })
    .unwrap();

    yield_now().unwrap(); // both park
    send_side.done();
    recv_side.done();
    drive_until(|| sender.is_done() && receiver.is_done());

    assert!(matches!(*sender_saw.borrow(), Some(Err(Error::ChannelDone))));
    assert!(matches!(
        *receiver_saw.borrow(),
        Some(Err(Error::ChannelDone))
    ));

    // The terminal state is sticky for every later operation.
    assert!(matches!(
        send_side.send(6, Deadline::NEVER),
        Err(Error::ChannelDone)
    ));
    assert!(matches!(
        send_side.receive(Deadline::NEVER),
        Err(Error::ChannelDone)
    ));
    send_side.done(); // idempotent
    assert!(send_side.is_done());
}

#[test]
fn cancel_is_idempotent_and_ignores_the_finished() {
    init_logs();
    let finished = spawn(|| {}).unwrap();
    drive_until(|| finished.is_done());
    assert_eq!(finished.state(), State::Finished);

    finished.cancel();
    finished.cancel();
    assert_eq!(finished.state(), State::Finished);

    let looper = spawn(|| loop {
        if yield_now().is_err() {
            break;
        }
    })
    .unwrap();
    yield_now().unwrap();
    looper.cancel();
    looper.cancel();
    drive_until(|| looper.is_done());
    assert_eq!(looper.state(), State::Cancelled);
}

#[test]
fn group_cancels_all_children() {
    init_logs();
    let group = Group::new();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let handle = group
            .spawn(|| loop {
                if yield_now().is_err() {
                    break;
                }
            })
            .unwrap();
        handles.push(handle);
    }
    assert_eq!(group.len(), 3);

    yield_now().unwrap();
    group.cancel();
    assert!(group.is_empty());

    drive_until(|| handles.iter().all(|h| h.is_done()));
    for handle in &handles {
        assert_eq!(handle.state(), State::Cancelled);
    }
}

#[test]
fn panic_terminates_only_the_panicking_coroutine() {
    init_logs();
    let victim = spawn(|| panic!("exercising panic containment")).unwrap();
    drive_until(|| victim.is_done());
    assert_eq!(victim.state(), State::Finished);

    // The scheduler survives and keeps spawning.
    let after = spawn(|| {}).unwrap();
    drive_until(|| after.is_done());
    assert_eq!(after.state(), State::Finished);
}

#[test]
fn yield_in_plain_main_is_fine() {
    init_logs();
    yield_now().unwrap();
}

#[test]
fn clean_releases_a_parked_poller() {
    init_logs();
    let (local, peer) = socket_pair();
    let outcome = Rc::new(RefCell::new(None));

    let slot = outcome.clone();
    let handle = spawn(move || {
        *slot.borrow_mut() = Some(FileDesc::new(local).poll(Direction::Read, Deadline::NEVER));
    })
    .unwrap();

    yield_now().unwrap(); // let it park
    FileDesc::new(local).clean();
    drive_until(|| handle.is_done());

    assert!(matches!(*outcome.borrow(), Some(Err(Error::Canceled))));

    close_fd(local);
    close_fd(peer);
}
