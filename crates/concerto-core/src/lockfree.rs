//! Atomic cells shared between the control and audio threads.
//!
//! Stores publish with `Release` and loads observe with `Acquire`, so a value
//! written before a snapshot swap is visible to the block that picks it up.

use atomic_float::{AtomicF32, AtomicF64};
use std::sync::atomic::{AtomicBool, Ordering};

macro_rules! atomic_cell {
    ($(#[$meta:meta])* $name:ident($atomic:ty, $value:ty)) => {
        $(#[$meta])*
        #[derive(Debug)]
        pub struct $name($atomic);

        impl $name {
            pub fn new(value: $value) -> Self {
                Self(<$atomic>::new(value))
            }

            #[inline]
            pub fn get(&self) -> $value {
                self.0.load(Ordering::Acquire)
            }

            #[inline]
            pub fn set(&self, value: $value) {
                self.0.store(value, Ordering::Release);
            }
        }
    };
}

atomic_cell!(
    /// CPU meter readings.
    #[repr(align(64))]
    AtomicFloat(AtomicF32, f32)
);

atomic_cell!(
    /// Parameter values and negotiated sample rates.
    AtomicDouble(AtomicF64, f64)
);

atomic_cell!(
    /// Halt and dirty flags.
    AtomicFlag(AtomicBool, bool)
);

impl AtomicFlag {
    /// Stores `value` and returns the previous one in a single step.
    #[inline]
    pub fn swap(&self, value: bool) -> bool {
        self.0.swap(value, Ordering::AcqRel)
    }
}
