//! Fast-doubling Fibonacci on arbitrary-precision integers.
//!
//! Uses the identities
//! `F(2k) = F(k) * (2*F(k+1) - F(k))` and `F(2k+1) = F(k)^2 + F(k+1)^2`,
//! so `F(n)` costs O(log n) big-integer multiplications.

use num_bigint::BigUint;

/// Compute the `n`-th Fibonacci number.
pub fn fibonacci(n: u64) -> BigUint {
    fib_pair(n).0
}

/// Returns `(F(n), F(n+1))`.
fn fib_pair(n: u64) -> (BigUint, BigUint) {
    if n == 0 {
        return (BigUint::from(0u8), BigUint::from(1u8));
    }

    let (a, b) = fib_pair(n / 2);
    // 2*F(k+1) >= F(k) for every k, so the subtraction never underflows.
    let c = &a * ((&b << 1usize) - &a);
    let d = &a * &a + &b * &b;

    if n % 2 == 0 {
        (c, d)
    } else {
        let next = &c + &d;
        (d, next)
    }
}
