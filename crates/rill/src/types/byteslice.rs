use std::sync::{Mutex, MutexGuard};

/// A mutable byte sequence.
#[derive(Debug, Default)]
pub struct ByteSlice {
    data: Mutex<Vec<u8>>,
}

impl ByteSlice {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Mutex::new(data),
        }
    }

    pub(crate) fn borrow(&self) -> MutexGuard<'_, Vec<u8>> {
        self.data
            .lock()
            .expect("byte_slice lock poisoned - a thread panicked while holding it")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.borrow().is_empty()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.borrow().clone()
    }
}
