/*!

An object safe trait for types that know how to construct themselves with `new()`. Every data
plugin stored in a [`Context`](crate::Context) implements it, so that
`Context::get_data_container_mut()` can create the plugin the first time it is asked for.
The type needs to be `'static`, which every plugin in this crate is.

```rust
# use epidemic_engine::New;

struct CaseCounter {
  cases: u32,
  disease: &'static str
}

impl New for CaseCounter {
  const new: &'static dyn Fn() -> Self = &||CaseCounter{ cases: 0, disease: "flu" };
}

let counter = <CaseCounter as New>::new();
assert_eq!(counter.cases, 0);
```

Types that already implement `Default` can point the constructor at it:

```rust
# use epidemic_engine::New;
#[derive(Default)]
struct Tally(Vec<f64>);

impl New for Tally {
  const new: &'static dyn Fn() -> Self = &Tally::default;
}
```

*/

use std::any::Any;

/// An object-safe trait that can construct itself.
pub trait New: Any + 'static {
  /// A constant reference to a constructor
  #[allow(non_upper_case_globals)]
  const new: &'static dyn Fn() -> Self;
}

impl<T: 'static> New for Vec<T> {
  const new: &'static dyn Fn() -> Self = &Vec::<T>::new;
}

impl New for String {
  const new: &'static dyn Fn() -> Self = &String::new;
}
