/*!

Named, independently seeded random number streams.

Each stream is declared with [`define_rng!`] and identified by its type. The first time a stream
is used it is seeded with `base_seed + hash(name)`, so adding draws to one stream never shifts
the values another stream produces. Sampling methods take `&self`: the generators live behind a
`RefCell`, which lets a sampler closure read other data plugins while it draws.

*/

use std::any::Any;
use std::cell::RefCell;

use rand::distr::uniform::{SampleRange, SampleUniform};
use rand::distr::weighted::{Weight, WeightedIndex};
use rand::prelude::Distribution;
use rand::{Rng, RngCore, SeedableRng};

use crate::context::Context;
use crate::hashing::{hash_str, HashMap};
use crate::log::trace;
use crate::{type_of, New, TypeId};

/// Identifies a random stream. Implemented by [`define_rng!`].
pub trait RngId: 'static {
    type RngType: SeedableRng + RngCore + 'static;

    /// The stream name, hashed into the seed offset.
    fn name() -> &'static str;
}

struct RngPlugin {
    base_seed: Option<u64>,
    // This is actually a `HashMap<TypeId, R::RngType>`
    rng_map: RefCell<HashMap<TypeId, Box<dyn Any>>>,
}

impl New for RngPlugin {
    #[allow(non_upper_case_globals)]
    const new: &'static dyn Fn() -> Self = &|| RngPlugin {
        base_seed: None,
        rng_map: RefCell::new(HashMap::default()),
    };
}

impl RngPlugin {
    fn with_rng<R: RngId, T>(&self, sampler: impl FnOnce(&mut R::RngType) -> T) -> T {
        let base_seed = self
            .base_seed
            .expect("random streams used before `init_random` was called");
        let mut rng_map = self.rng_map.borrow_mut();
        let rng = rng_map
            .entry(type_of::<R>())
            .or_insert_with(|| {
                let seed = base_seed.wrapping_add(hash_str(R::name()));
                Box::new(<R::RngType as SeedableRng>::seed_from_u64(seed))
            })
            .downcast_mut::<R::RngType>()
            .unwrap(); // Only `R::RngType` is ever stored under `type_of::<R>()`
        sampler(rng)
    }
}

fn rng_plugin(context: &Context) -> &RngPlugin {
    context
        .get_data_container::<RngPlugin>()
        .expect("random streams used before `init_random` was called")
}

pub trait ContextRandomExt {
    /// Sets the base seed and discards existing generators, so every stream is re-seeded
    /// lazily on its next use.
    fn init_random(&mut self, base_seed: u64);

    /// Gets a random sample from the random number generator associated with the given
    /// `RngId` by applying the specified sampler function. If the Rng has not been used
    /// before, one will be created with the base seed you defined in `init_random`.
    /// Note that this will panic if `init_random` was not called yet.
    fn sample<R: RngId, T>(&self, sampler: impl FnOnce(&mut R::RngType) -> T) -> T;

    /// Gets a random sample from the specified distribution using the generator associated
    /// with the given `RngId`.
    /// Note that this will panic if `init_random` was not called yet.
    fn sample_distr<R: RngId, T>(&self, distribution: impl Distribution<T>) -> T;

    /// Gets a random sample within the range provided by `range`
    /// using the generator associated with the given `RngId`.
    /// Note that this will panic if `init_random` was not called yet.
    fn sample_range<R: RngId, S, T>(&self, range: S) -> T
    where
        S: SampleRange<T>,
        T: SampleUniform;

    /// Gets a random boolean value which is true with probability `p`
    /// using the generator associated with the given `RngId`.
    /// Note that this will panic if `init_random` was not called yet.
    fn sample_bool<R: RngId>(&self, p: f64) -> bool;

    /// Draws a random entry out of the list provided in `weights`
    /// with the given weights using the generator associated with the
    /// given `RngId`. Returns `None` when the weights are empty or sum to zero.
    /// Note that this will panic if `init_random` was not called yet.
    fn sample_weighted<R: RngId, T>(&self, weights: &[T]) -> Option<usize>
    where
        T: Clone
            + Default
            + SampleUniform
            + for<'a> std::ops::AddAssign<&'a T>
            + PartialOrd
            + Weight;
}

impl ContextRandomExt for Context {
    fn init_random(&mut self, base_seed: u64) {
        trace!("initializing random module with seed {base_seed}");
        let rng_container = self.get_data_container_mut::<RngPlugin>();
        rng_container.base_seed = Some(base_seed);

        // Clear any existing Rngs to ensure they get re-seeded when they are next used
        rng_container.rng_map.get_mut().clear();
    }

    fn sample<R: RngId, T>(&self, sampler: impl FnOnce(&mut R::RngType) -> T) -> T {
        rng_plugin(self).with_rng::<R, T>(sampler)
    }

    fn sample_distr<R: RngId, T>(&self, distribution: impl Distribution<T>) -> T {
        self.sample::<R, T>(|rng| distribution.sample(rng))
    }

    fn sample_range<R: RngId, S, T>(&self, range: S) -> T
    where
        S: SampleRange<T>,
        T: SampleUniform,
    {
        self.sample::<R, T>(|rng| rng.random_range(range))
    }

    fn sample_bool<R: RngId>(&self, p: f64) -> bool {
        self.sample::<R, bool>(|rng| rng.random_bool(p.clamp(0.0, 1.0)))
    }

    fn sample_weighted<R: RngId, T>(&self, weights: &[T]) -> Option<usize>
    where
        T: Clone
            + Default
            + SampleUniform
            + for<'a> std::ops::AddAssign<&'a T>
            + PartialOrd
            + Weight,
    {
        let index = WeightedIndex::new(weights).ok()?;
        Some(self.sample::<R, usize>(|rng| index.sample(rng)))
    }
}

/// Declares a random stream type. The stream is backed by `StdRng` unless another
/// `SeedableRng` type is given.
///
/// ```
/// use epidemic_engine::{define_rng, Context, ContextRandomExt};
///
/// define_rng!(SeedingRng);
///
/// let mut context = Context::new();
/// context.init_random(42);
/// let draw: f64 = context.sample::<SeedingRng, _>(|rng| epidemic_engine::rand::Rng::random(rng));
/// assert!((0.0..1.0).contains(&draw));
/// ```
#[macro_export]
macro_rules! define_rng {
    ($vis:vis $random_id:ident) => {
        $crate::define_rng!($vis $random_id, $crate::rand::rngs::StdRng);
    };
    ($vis:vis $random_id:ident, $rng_type:ty) => {
        #[derive(Copy, Clone, Debug)]
        $vis struct $random_id;

        impl $crate::random::RngId for $random_id {
            type RngType = $rng_type;

            fn name() -> &'static str {
                stringify!($random_id)
            }
        }
    };
}

#[cfg(test)]
mod test {
    use crate::context::Context;
    use crate::random::ContextRandomExt;
    use rand::RngCore;
    use rand::distr::weighted::WeightedIndex;
    use rand::prelude::Distribution;

    define_rng!(FooRng);
    define_rng!(BarRng);

    #[test]
    fn get_rng_basic() {
        let mut context = Context::new();
        context.init_random(42);

        assert_ne!(
            context.sample::<FooRng, _>(RngCore::next_u64),
            context.sample::<FooRng, _>(RngCore::next_u64)
        );
    }

    #[test]
    #[should_panic(expected = "init_random")]
    fn sampling_before_init_panics() {
        let context = Context::new();
        context.sample::<FooRng, _>(RngCore::next_u64);
    }

    #[test]
    fn multiple_rng_types() {
        let mut context = Context::new();
        context.init_random(42);

        assert_ne!(
            context.sample::<FooRng, _>(RngCore::next_u64),
            context.sample::<BarRng, _>(RngCore::next_u64)
        );
    }

    #[test]
    fn streams_are_independent() {
        let mut context = Context::new();
        context.init_random(42);
        let first = context.sample::<FooRng, _>(RngCore::next_u64);

        let mut other = Context::new();
        other.init_random(42);
        // Drawing from another stream first must not shift FooRng.
        other.sample::<BarRng, _>(RngCore::next_u64);
        assert_eq!(first, other.sample::<FooRng, _>(RngCore::next_u64));
    }

    #[test]
    fn reset_seed() {
        let mut context = Context::new();
        context.init_random(42);

        let run_0 = context.sample::<FooRng, _>(RngCore::next_u64);
        let run_1 = context.sample::<FooRng, _>(RngCore::next_u64);

        // Reset with same seed, ensure we get the same values
        context.init_random(42);
        assert_eq!(run_0, context.sample::<FooRng, _>(RngCore::next_u64));
        assert_eq!(run_1, context.sample::<FooRng, _>(RngCore::next_u64));

        // Reset with different seed, ensure we get different values
        context.init_random(88);
        assert_ne!(run_0, context.sample::<FooRng, _>(RngCore::next_u64));
        assert_ne!(run_1, context.sample::<FooRng, _>(RngCore::next_u64));
    }

    #[test]
    fn sampler_function_closure_capture() {
        let mut context = Context::new();
        context.init_random(42);
        let wi = WeightedIndex::new(vec![1.0, 2.0]).unwrap();

        let n_samples = 3000;
        let mut zero_counter = 0;
        for _ in 0..n_samples {
            let sample = context.sample::<FooRng, _>(|rng| wi.sample(rng));
            if sample == 0 {
                zero_counter += 1;
            }
        }
        assert!((zero_counter - 1000_i32).abs() < 100);
    }

    #[test]
    fn sample_distribution() {
        let mut context = Context::new();
        context.init_random(42);
        let wi = WeightedIndex::new(vec![1.0, 2.0]).unwrap();

        let n_samples = 3000;
        let mut zero_counter = 0;
        for _ in 0..n_samples {
            let sample = context.sample_distr::<FooRng, usize>(&wi);
            if sample == 0 {
                zero_counter += 1;
            }
        }
        assert!((zero_counter - 1000_i32).abs() < 100);
    }

    #[test]
    fn sample_range() {
        let mut context = Context::new();
        context.init_random(42);
        let result = context.sample_range::<FooRng, _, i32>(0..10);
        assert!((0..10).contains(&result));
    }

    #[test]
    fn sample_bool() {
        let mut context = Context::new();
        context.init_random(42);
        assert!(context.sample_bool::<FooRng>(1.0));
        assert!(!context.sample_bool::<FooRng>(0.0));
    }

    #[test]
    fn sample_weighted() {
        let mut context = Context::new();
        context.init_random(42);
        let r = context.sample_weighted::<FooRng, _>(&[0.1, 0.3, 0.4]);
        assert!(r.is_some_and(|index| index < 3));
        assert_eq!(context.sample_weighted::<FooRng, f64>(&[0.0, 0.0]), None);
    }
}
