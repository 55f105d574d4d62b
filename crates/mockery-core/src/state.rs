//! Opaque per-fixture state shared by a setup, its tests and its teardown

use std::any::Any;
use std::fmt;

/// Slot a setup fills and later items read back
///
/// The runner hands each test the state of the innermost open setup, or a fresh
/// empty slot when no setup is open.
#[derive(Default)]
pub struct TestState {
    slot: Option<Box<dyn Any>>,
}

impl TestState {
    /// An empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, replacing whatever was there
    pub fn set<T: Any>(&mut self, value: T) {
        self.slot = Some(Box::new(value));
    }

    /// Borrow the stored value as `T`
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.slot.as_deref().and_then(|value| value.downcast_ref::<T>())
    }

    /// Mutably borrow the stored value as `T`
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.slot.as_deref_mut().and_then(|value| value.downcast_mut::<T>())
    }

    /// Remove and return the stored value if it is a `T`
    pub fn take<T: Any>(&mut self) -> Option<T> {
        match self.slot.take()?.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.slot = Some(other);
                None
            }
        }
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// Drop the stored value
    pub fn clear(&mut self) {
        self.slot = None;
    }
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState")
            .field("occupied", &self.slot.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_access() {
        let mut state = TestState::new();
        assert!(state.is_empty());

        state.set(vec![1u32, 2]);
        assert_eq!(state.get::<Vec<u32>>(), Some(&vec![1, 2]));
        assert!(state.get::<String>().is_none());

        state.get_mut::<Vec<u32>>().unwrap().push(3);
        assert!(state.take::<String>().is_none());
        assert_eq!(state.take::<Vec<u32>>(), Some(vec![1, 2, 3]));
        assert!(state.is_empty());
    }
}
