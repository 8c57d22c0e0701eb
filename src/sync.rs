#[cfg(feature = "loom")]
mod imp {
    pub(crate) use loom::{
        hint::spin_loop,
        sync::{
            Condvar, Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
    };
}

#[cfg(not(feature = "loom"))]
mod imp {
    pub(crate) use core::{
        hint::spin_loop,
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    };
    pub(crate) use std::sync::{Condvar, Mutex};
}

pub(crate) use imp::*;
