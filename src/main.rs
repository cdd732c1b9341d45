//! # PriOS Demo Firmware
//!
//! Three tasks sharing one measurement slot:
//!
//! | Task             | Priority | Behavior                                  |
//! |------------------|----------|-------------------------------------------|
//! | `sampler_task`   | 1        | Updates the shared sample every 10 ticks  |
//! | `control_task`   | 2        | Consumes the sample every 50 ticks        |
//! | `heartbeat_task` | 6        | Wakes every 500 ticks                     |
//!
//! The sampler outranks the controller, so a tick that wakes both runs the
//! sampler first; the kernel mutex serializes their access to the sample
//! slot, and the heartbeat demonstrates a long explicit delay. Whenever
//! all three are asleep, the idle task parks the core in WFE.

#![cfg_attr(all(target_arch = "arm", target_os = "none"), no_std)]
#![cfg_attr(all(target_arch = "arm", target_os = "none"), no_main)]

#[cfg(all(target_arch = "arm", target_os = "none"))]
mod firmware {
    use core::cell::Cell;
    use cortex_m::interrupt::Mutex as IrqCell;
    use cortex_m_rt::entry;
    use panic_halt as _;

    use prios::kernel;
    use prios::mutex::MutexHandle;
    use prios::sync;

    /// Handle of the kernel mutex guarding the sample slot. Written once
    /// before launch, read by the tasks.
    static SAMPLE_LOCK: IrqCell<Cell<Option<MutexHandle>>> = IrqCell::new(Cell::new(None));

    /// The shared measurement the sampler produces and the controller
    /// consumes.
    static LATEST_SAMPLE: IrqCell<Cell<u32>> = IrqCell::new(Cell::new(0));

    fn sample_lock() -> MutexHandle {
        sync::critical_section(|cs| SAMPLE_LOCK.borrow(cs).get())
            .expect("sample lock created before launch")
    }

    /// Produces a new sample every 10 ticks.
    fn sampler_task() {
        let lock = sample_lock();
        let mut raw: u32 = 0;
        loop {
            // Stand-in for an ADC read.
            raw = raw.wrapping_mul(31).wrapping_add(7);

            kernel::acquire_mutex(lock);
            sync::critical_section(|cs| LATEST_SAMPLE.borrow(cs).set(raw));
            kernel::release_mutex(lock);

            kernel::task_yield();
        }
    }

    /// Folds the latest sample into an actuator command every 50 ticks.
    fn control_task() {
        let lock = sample_lock();
        loop {
            kernel::acquire_mutex(lock);
            let sample = sync::critical_section(|cs| LATEST_SAMPLE.borrow(cs).get());
            kernel::release_mutex(lock);

            // Stand-in for the control law and actuator write.
            let _command = sample >> 2;

            kernel::task_yield();
        }
    }

    /// Low-urgency liveness beacon.
    fn heartbeat_task() {
        loop {
            kernel::task_delay(500);
        }
    }

    #[entry]
    fn main() -> ! {
        kernel::init();

        let lock = kernel::create_mutex().expect("mutex pool exhausted");
        sync::critical_section(|cs| SAMPLE_LOCK.borrow(cs).set(Some(lock)));

        kernel::create_task(sampler_task, 128, 1, 10).expect("failed to create sampler_task");
        kernel::create_task(control_task, 128, 2, 50).expect("failed to create control_task");
        kernel::create_task(heartbeat_task, 64, 6, 0).expect("failed to create heartbeat_task");

        kernel::launch()
    }
}

/// The firmware only runs on the embedded target; give host builds a
/// trivial entry point so the workspace still compiles everywhere.
#[cfg(not(all(target_arch = "arm", target_os = "none")))]
fn main() {}
