use crate::new_trait::New;
use crate::{type_of, TypeId};
use std::any::Any;
use std::collections::HashMap;

/// Holds every data plugin of a simulation run: random streams, the population and the
/// infection manager. Engine operations are provided by extension traits on `Context`.
pub struct Context {
    // This is actually a `HashMap<TypeId, Box<dyn New>>` but must be declared this way to avoid
    // having to implement an `as_any()` method on everything.
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Context {
            data_plugins: HashMap::new(),
        }
    }

    /// Returns a mutable reference for the data container for `T`, creating it if it doesn't
    /// exist yet.
    pub fn get_data_container_mut<T: New>(&mut self) -> &mut T {
        self.data_plugins
            .entry(type_of::<T>())
            .or_insert_with(|| Box::new(<T as New>::new()))
            .downcast_mut::<T>()
            .unwrap() // Will never panic as data container has the matching type
    }

    /// Returns a reference to the data container for `T` if it exists.
    /// If you need a mutable reference or lazy instantiation, use
    /// `Context::get_data_container_mut()`.
    pub fn get_data_container<T: New>(&self) -> Option<&T> {
        self.data_plugins
            .get(&type_of::<T>())
            .and_then(|data| data.downcast_ref::<T>())
    }

    /// Replaces the data container for `T`, returning the previous one if there was one.
    pub fn set_data_container<T: New>(&mut self, value: T) -> Option<T> {
        self.data_plugins
            .insert(type_of::<T>(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }
}
