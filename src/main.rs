//! # EDF OS Example Firmware
//!
//! Demonstrates the deadline scheduler with three periodic tasks:
//!
//! | Task | Relative deadline | Period | First wake | Work per activation |
//! |------|-------------------|--------|------------|---------------------|
//! | `TA` | 10 ticks   | 500 ticks  | 500  | 3 ticks  |
//! | `TB` | 10 ticks   | 5000 ticks | 5000 | 3 ticks  |
//! | `TC` | 1000 ticks | 500 ticks  | 1000 | 20 ticks |
//!
//! ## Expected Schedule
//!
//! 1. **Tick 0**: all three are released and each parks itself at once in
//!    `delay_until`, in EDF order: `TA` (deadline 10, created first), `TB`
//!    (deadline 10), `TC` (deadline 1000). Nobody does work at tick 0.
//! 2. **Every 500 ticks**: `TA` wakes with a deadline 10 ticks out and
//!    preempts `TC` if it is mid-work. `TC` keeps its own deadline and
//!    resumes afterwards.
//! 3. **Tick 1000**: `TA` (deadline 1010) and `TC` (deadline 2000) wake
//!    together; `TA` runs first.
//! 4. **Steady state**: no deadline misses. Each task logs the snapshot
//!    after finishing its work, over ITM stimulus port 0.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use log::{error, info, LevelFilter};
use panic_halt as _;

use edfos::config::MINIMAL_STACK_SIZE;
use edfos::kernel;
use edfos::logger;
use edfos::periodic::PeriodicActivation;
use edfos::Tick;

/// Static description of one demo task; the task's parameter indexes
/// into [`DEMO_TASKS`].
struct DemoTask {
    name: &'static str,
    relative_deadline: u32,
    period: u32,
    offset: u32,
    work_ticks: u32,
}

static DEMO_TASKS: [DemoTask; 3] = [
    DemoTask { name: "TA", relative_deadline: 10, period: 500, offset: 0, work_ticks: 3 },
    DemoTask { name: "TB", relative_deadline: 10, period: 5000, offset: 0, work_ticks: 3 },
    DemoTask { name: "TC", relative_deadline: 1000, period: 500, offset: 1000, work_ticks: 20 },
];

// ---------------------------------------------------------------------------
// Task entry point
// ---------------------------------------------------------------------------

/// Busy-work loop shared by all demo tasks.
extern "C" fn periodic_task(index: usize) -> ! {
    let task = &DEMO_TASKS[index];
    let start = kernel::tick_count();
    let mut activation = if task.offset == 0 {
        PeriodicActivation::new(start, task.period)
    } else {
        PeriodicActivation::with_offset(start, task.offset, task.period)
    };

    loop {
        if let Err(err) = kernel::delay_until(&mut activation) {
            error!("{} cannot wait for its next period: {}", task.name, err);
        }

        busy_work(task.work_ticks);

        let snap = kernel::snapshot();
        if let Some(slot) = snap.current_slot() {
            info!(
                "{} done at {}: deadline {:?}, runtime {:?}, misses {:?}",
                task.name,
                kernel::tick_count(),
                snap.deadline_of(slot),
                snap.runtime_of(slot),
                snap.deadline_misses_of(slot),
            );
        }
    }
}

/// Spin for `ticks` tick changes. Time spent preempted counts as one.
fn busy_work(ticks: u32) {
    let mut seen = 0;
    let mut last: Tick = kernel::tick_count();
    while seen < ticks {
        let now = kernel::tick_count();
        if now != last {
            seen += 1;
            last = now;
        }
        core::hint::spin_loop();
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Firmware entry point. Initializes logging and the kernel, creates the
/// demo tasks, and starts the EDF scheduler. Does not return.
#[entry]
fn main() -> ! {
    // Take ownership of core peripherals
    let cp = cortex_m::Peripherals::take().expect("core peripherals already taken");

    logger::init(cp.ITM, LevelFilter::Info).ok();

    kernel::init();

    for (index, task) in DEMO_TASKS.iter().enumerate() {
        kernel::create_deadline_task(
            periodic_task,
            task.name,
            MINIMAL_STACK_SIZE,
            index,
            1,
            task.relative_deadline,
        )
        .expect("Failed to create demo task");
    }

    // Start the scheduler — returns only if startup is refused
    match kernel::start(cp.SYST) {
        Ok(never) => match never {},
        Err(err) => {
            error!("{}", err);
            loop {
                cortex_m::asm::wfi();
            }
        }
    }
}
