//! End-to-end scenarios across runners, tasks, events, and disposal.

mod common;

use common::init_test_logging;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskline::{
    action_ok, join_all, Dispose, Error, ErrorKind, Event, Outcome, Runner, RunnerBuilder, Task,
    TaskState,
};

#[test]
fn pooled_schedule_chain_join_dispose() {
    init_test_logging();
    let runner = Runner::pooled(2);

    let task = runner.schedule(|| 42).then(|v| v + 1);
    assert_eq!(task.join(), Outcome::success(43));
    assert_eq!(task.state(), TaskState::Completed);

    assert!(runner.dispose());
    assert!(!runner.dispose());
    assert!(runner.is_disposed());
}

#[test]
fn chain_preserves_order_regardless_of_worker_count() {
    init_test_logging();
    for runner in [Runner::pooled(1), Runner::pooled(4)] {
        let task = runner
            .schedule(|| String::from("a"))
            .then(|s| s + "b")
            .then(|s| s + "c")
            .then(|s| s + "d");
        assert_eq!(task.join(), Outcome::success(String::from("abcd")));
    }
}

#[test]
fn single_worker_runs_submissions_in_fifo_order() {
    init_test_logging();
    let runner = RunnerBuilder::pooled(1)
        .thread_name_prefix("fifo")
        .build();
    let log = Arc::new(Mutex::new(Vec::new()));

    let tasks: Vec<Task<()>> = (0..8)
        .map(|i| {
            let log = Arc::clone(&log);
            runner.schedule(move || log.lock().unwrap().push(i))
        })
        .collect();

    join_all(&tasks).check();
    assert_eq!(*log.lock().unwrap(), (0..8).collect::<Vec<_>>());
}

fn echo_one_connection(listener: TcpListener) -> taskline::Result<Vec<u8>> {
    let (mut stream, _peer) = listener.accept()?;
    let mut received = Vec::new();
    stream.read_to_end(&mut received)?;
    stream.write_all(&received)?;
    Ok(received)
}

fn request_echo(port: u16, payload: &[u8]) -> taskline::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(("127.0.0.1", port))?;
    stream.write_all(payload)?;
    stream.shutdown(std::net::Shutdown::Write)?;
    let mut reply = Vec::new();
    stream.read_to_end(&mut reply)?;
    Ok(reply)
}

#[test]
fn tcp_echo_between_two_runners() {
    init_test_logging();
    let server_runner = RunnerBuilder::pooled(1)
        .thread_name_prefix("echo-server")
        .build();
    let client_runner = RunnerBuilder::pooled(1)
        .thread_name_prefix("echo-client")
        .build();

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let payload = b"hello through the wire".to_vec();

    let served = server_runner.schedule_outcome(move || echo_one_connection(listener).into());
    let sent = payload.clone();
    let replied = client_runner.schedule_outcome(move || request_echo(port, &sent).into());

    let outcome = join_all(&[served, replied]);
    assert_eq!(outcome, Outcome::success(vec![payload.clone(), payload]));
}

#[test]
fn connection_refused_is_an_operation_failure() {
    init_test_logging();
    let runner = Runner::pooled(1);

    // Grab a port the OS just released so nothing is listening on it.
    let port = {
        let probe = TcpListener::bind("127.0.0.1:0").expect("bind");
        probe.local_addr().expect("local addr").port()
    };

    let task = runner.schedule_outcome(move || request_echo(port, b"nobody home").into());
    let outcome = task.join();

    let err = outcome.error().expect("connect must fail");
    assert_eq!(err.kind(), ErrorKind::External);
}

#[test]
fn failure_skips_transforms_and_recovers_at_the_end() {
    init_test_logging();
    let runner = Runner::pooled(2);
    let transforms_run = Arc::new(AtomicUsize::new(0));

    let t = Arc::clone(&transforms_run);
    let task = runner
        .schedule_outcome(|| Outcome::<i32>::failure(Error::not_found("record 7")))
        .then(move |v| {
            t.fetch_add(1, Ordering::SeqCst);
            v * 2
        })
        .and_then(|v| Outcome::success(v + 1));

    let outcome = task.join();
    assert_eq!(transforms_run.load(Ordering::SeqCst), 0);
    assert_eq!(
        outcome.recover_if(ErrorKind::NotFound, |_| -1),
        Outcome::success(-1)
    );
}

#[test]
fn cooperative_and_pooled_interoperate() {
    init_test_logging();
    let local = Runner::current_thread();
    let pool = RunnerBuilder::pooled(2)
        .thread_name_prefix("interop")
        .build();

    // Heavy work on the pool, result folded back on the local queue.
    let fetched = pool.schedule(|| {
        std::thread::sleep(Duration::from_millis(10));
        vec![1, 2, 3, 4]
    });
    let summed: Task<i32> = fetched.then_on(&local, |v| Outcome::success(v.iter().sum()));

    assert_eq!(summed.join(), Outcome::success(10));
}

#[test]
fn event_driven_scheduling() {
    init_test_logging();
    let runner = Runner::pooled(1);
    let event: Event<i32> = Event::new();
    let scheduled = Arc::new(Mutex::new(Vec::new()));

    let r = runner.clone();
    let s = Arc::clone(&scheduled);
    let sub = event.subscribe(action_ok(move |arg| {
        let arg = *arg;
        s.lock().unwrap().push(r.schedule(move || arg * arg));
    }));

    event.emit(&3).check();
    event.emit(&5).check();

    let tasks = std::mem::take(&mut *scheduled.lock().unwrap());
    assert_eq!(join_all(&tasks), Outcome::success(vec![9, 25]));

    assert!(sub.dispose());
    event.emit(&7).check();
    assert!(scheduled.lock().unwrap().is_empty());
}

#[test]
fn disposed_runner_abandons_pending_chain() {
    init_test_logging();
    let runner = Runner::current_thread();
    let ran = Arc::new(AtomicUsize::new(0));

    let r = Arc::clone(&ran);
    let task = runner
        .schedule(move || {
            r.fetch_add(1, Ordering::SeqCst);
            1
        })
        .then(|v| v + 1);

    runner.dispose();
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(task.state(), TaskState::Faulted);

    let joined = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| task.join()));
    assert!(joined.is_err(), "abandoned work must re-raise at join");
}

#[test]
fn join_all_reports_first_failure_in_task_order() {
    init_test_logging();
    let runner = Runner::pooled(3);

    let slow_failure: Task<u8> = runner.schedule_outcome(|| {
        std::thread::sleep(Duration::from_millis(30));
        Outcome::failure(Error::parse("slow but first"))
    });
    let fast_failure: Task<u8> =
        runner.schedule_outcome(|| Outcome::failure(Error::user("fast but second")));
    let ok = runner.schedule(|| 9);

    assert_eq!(
        join_all(&[slow_failure, fast_failure, ok]),
        Outcome::failure(Error::parse("slow but first"))
    );
}
