pub mod bignum;
pub mod number;

pub use number::{parse_number, scan_number, Number, NumberShape};
