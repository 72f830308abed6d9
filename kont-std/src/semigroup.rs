//! Associative combination, used to accumulate `ior` left values.

/// A type with an associative `combine`.
///
/// Implementations must satisfy
/// `a.combine(b).combine(c) == a.combine(b.combine(c))`.
pub trait Semigroup {
    /// Combine `self` with `other`, `self` first.
    fn combine(self, other: Self) -> Self;
}

impl Semigroup for String {
    fn combine(mut self, other: Self) -> Self {
        self.push_str(&other);
        self
    }
}

impl<T> Semigroup for Vec<T> {
    fn combine(mut self, mut other: Self) -> Self {
        self.append(&mut other);
        self
    }
}

impl Semigroup for () {
    fn combine(self, _other: Self) -> Self {}
}

macro_rules! sum_semigroup {
    ($($t:ty),*) => {
        $(
            /// Wrapping addition.
            impl Semigroup for $t {
                fn combine(self, other: Self) -> Self {
                    self.wrapping_add(other)
                }
            }
        )*
    };
}

sum_semigroup!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
