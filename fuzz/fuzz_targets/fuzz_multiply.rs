#![no_main]

use libfuzzer_sys::fuzz_target;
use num_bigint::BigUint;

use ntmul_core::interop::{from_biguint_base, to_biguint_base};
use ntmul_core::{ConvolutionEngine, EngineConfig};

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    // First byte picks the base exponent and the split point of the operands.
    let base = 1u64 << (8 + u32::from(data[0]) % 52);
    let split = 1 + usize::from(data[1]) % (data.len() - 2);
    let (a, b) = data[2..].split_at(split.min(data.len() - 2));
    if a.is_empty() || b.is_empty() {
        return;
    }

    let bits = base.trailing_zeros() as usize;
    let a = BigUint::from_bytes_be(a);
    let b = BigUint::from_bytes_be(b);
    let x_len = (a.bits() as usize).div_ceil(bits).max(1);
    let y_len = (b.bits() as usize).div_ceil(bits).max(1);
    let x = from_biguint_base(&a, base, x_len).unwrap();
    let y = from_biguint_base(&b, base, y_len).unwrap();

    let engine = ConvolutionEngine::new(base, EngineConfig::default()).unwrap();
    match engine.multiply(&x, &y) {
        Ok(product) => assert_eq!(to_biguint_base(&product, base), &a * &b),
        // Operands too long for a small base are rejected before transforming.
        Err(e) => assert!(e.is_configuration(), "{e}"),
    }
});
