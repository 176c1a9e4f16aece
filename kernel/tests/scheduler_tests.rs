//! Scheduler scenario tests
//!
//! Drives a private scheduler + process table pair tick by tick, the same
//! way the trap path does, and checks the end-to-end properties: fairness,
//! real-time preemption, MLFQ demotion, and starvation boosting.

#![cfg(not(target_os = "none"))]

use rvos_kernel::process::{ProcessState, ProcessTable, SchedPolicy};
use rvos_kernel::sched::{Scheduler, TaskRef, BOOST_PERIOD, NUM_QUEUE_LEVELS, QUEUE_TIME_SLICES};

fn fresh() -> (Scheduler, ProcessTable) {
    let mut sched = Scheduler::new();
    sched.init();
    (sched, ProcessTable::new())
}

fn spawn(table: &mut ProcessTable, name: &str) -> usize {
    let slot = table.alloc().expect("free slot");
    table.get_mut(slot).set_name(name);
    slot
}

/// One timer interrupt, as the trap path performs it.
fn step(sched: &mut Scheduler, table: &mut ProcessTable) {
    if sched.tick(table) {
        sched.resched(table);
    }
}

#[test]
fn boot_to_idle() {
    let (mut sched, mut table) = fresh();

    sched.resched(&mut table);
    assert_eq!(
        sched.current(),
        Some(TaskRef::Idle(0)),
        "nothing queued: idle runs"
    );

    step(&mut sched, &mut table);
    let stats = sched.stats();
    assert_eq!(stats.idle_ticks[0], 1);
    assert_eq!(stats.cpu_ticks[0], 1);
}

#[test]
fn two_equal_tasks_split_the_cpu() {
    let (mut sched, mut table) = fresh();
    let p1 = spawn(&mut table, "p1");
    let p2 = spawn(&mut table, "p2");
    sched.add(&mut table, p1);
    sched.add(&mut table, p2);
    sched.resched(&mut table);

    for _ in 0..1000 {
        step(&mut sched, &mut table);
    }

    let t1 = table.get(p1).stats.cpu_time;
    let t2 = table.get(p2).stats.cpu_time;
    assert_eq!(t1 + t2, 1000, "every tick lands on one of the two");
    assert!((490..=510).contains(&t1), "p1 got {}", t1);
    assert!((490..=510).contains(&t2), "p2 got {}", t2);
}

#[test]
fn fairness_extends_to_three_tasks() {
    let (mut sched, mut table) = fresh();
    let mut slots = [0usize; 3];
    for slot in slots.iter_mut() {
        *slot = spawn(&mut table, "worker");
        sched.add(&mut table, *slot);
    }
    sched.resched(&mut table);

    for _ in 0..1000 {
        step(&mut sched, &mut table);
    }

    let times = slots.map(|s| table.get(s).stats.cpu_time);
    assert_eq!(times.iter().sum::<u64>(), 1000);
    let max = *times.iter().max().expect("nonempty");
    let min = *times.iter().min().expect("nonempty");
    assert!(
        max - min <= QUEUE_TIME_SLICES[0],
        "spread {:?} exceeds one slice",
        times
    );
}

#[test]
fn rt_preempts_running_normal_within_one_tick() {
    let (mut sched, mut table) = fresh();
    let normal = spawn(&mut table, "normal");
    sched.add(&mut table, normal);
    sched.resched(&mut table);

    for _ in 0..5 {
        step(&mut sched, &mut table);
    }
    assert_eq!(sched.current(), Some(TaskRef::Slot(normal)));

    let rt = spawn(&mut table, "rt");
    sched.set_policy(&mut table, rt, SchedPolicy::RoundRobin);
    sched.set_priority(&mut table, rt, 50);
    sched.add(&mut table, rt);

    step(&mut sched, &mut table);
    assert_eq!(sched.current(), Some(TaskRef::Slot(rt)));
    assert_eq!(table.get(rt).state, ProcessState::Running);

    // The normal task's clock freezes while the RT task holds the CPU.
    let frozen = table.get(normal).stats.cpu_time;
    for _ in 0..50 {
        step(&mut sched, &mut table);
    }
    assert_eq!(table.get(normal).stats.cpu_time, frozen);
    assert_eq!(table.get(rt).stats.cpu_time, 50);
}

#[test]
fn mlfq_demotes_through_the_levels() {
    let (mut sched, mut table) = fresh();
    let solo = spawn(&mut table, "solo");
    sched.add(&mut table, solo);
    sched.resched(&mut table);

    for _ in 0..10 {
        step(&mut sched, &mut table);
    }
    assert_eq!(table.get(solo).queue_level, 1);
    assert_eq!(table.get(solo).time_slice, QUEUE_TIME_SLICES[1]);

    for _ in 0..20 {
        step(&mut sched, &mut table);
    }
    assert_eq!(table.get(solo).queue_level, 2);
    assert_eq!(table.get(solo).time_slice, QUEUE_TIME_SLICES[2]);
}

#[test]
fn queued_tasks_are_boosted_within_one_period() {
    let (mut sched, mut table) = fresh();
    let p1 = spawn(&mut table, "p1");
    let p2 = spawn(&mut table, "p2");
    sched.add(&mut table, p1);
    sched.add(&mut table, p2);
    sched.resched(&mut table);

    let queued_level = |sched: &Scheduler, table: &ProcessTable| -> usize {
        if sched.current() == Some(TaskRef::Slot(p1)) {
            table.get(p2).queue_level
        } else {
            table.get(p1).queue_level
        }
    };

    for _ in 0..(BOOST_PERIOD - 1) {
        step(&mut sched, &mut table);
    }
    assert_eq!(
        queued_level(&sched, &table),
        NUM_QUEUE_LEVELS - 1,
        "fully demoted just before the boost"
    );

    step(&mut sched, &mut table);
    assert_eq!(queued_level(&sched, &table), 0, "boosted back to L0");
}

#[test]
fn fifo_runs_until_it_yields() {
    let (mut sched, mut table) = fresh();
    let fifo = spawn(&mut table, "fifo");
    let normal = spawn(&mut table, "normal");
    sched.set_policy(&mut table, fifo, SchedPolicy::Fifo);
    sched.add(&mut table, fifo);
    sched.add(&mut table, normal);
    sched.resched(&mut table);
    assert_eq!(sched.current(), Some(TaskRef::Slot(fifo)));

    for _ in 0..300 {
        step(&mut sched, &mut table);
    }
    assert_eq!(
        sched.current(),
        Some(TaskRef::Slot(fifo)),
        "timer never takes FIFO off the CPU"
    );

    // Death is a state transition; the next handover picks the normal task.
    table.get_mut(fifo).state = ProcessState::Zombie;
    sched.resched(&mut table);
    assert_eq!(sched.current(), Some(TaskRef::Slot(normal)));
}

#[test]
fn rt_queue_orders_by_priority_with_fifo_ties() {
    let (mut sched, mut table) = fresh();
    let low = spawn(&mut table, "low");
    let high_a = spawn(&mut table, "high-a");
    let high_b = spawn(&mut table, "high-b");

    for (slot, prio) in [(low, 90), (high_a, 10), (high_b, 10)] {
        sched.set_policy(&mut table, slot, SchedPolicy::RoundRobin);
        sched.set_priority(&mut table, slot, prio);
        sched.add(&mut table, slot);
    }

    sched.resched(&mut table);
    assert_eq!(
        sched.current(),
        Some(TaskRef::Slot(high_a)),
        "highest priority first, ties in enqueue order"
    );
}
