//! Host port. There is no second context to switch to: the kernel's
//! bookkeeping runs as on target and the switch itself is left to the
//! caller (see the simulation in the kernel tests).

#[inline]
pub fn request_context_switch() {}

#[inline]
pub fn wait_for_interrupt() {
    core::hint::spin_loop();
}
