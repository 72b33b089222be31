//! Compare command - orders two peer versions.

use lanchat_core::version::compare_versions;
use std::cmp::Ordering;

pub fn execute(left: &str, right: &str) {
    let symbol = match compare_versions(left, right) {
        Ordering::Less => "<",
        Ordering::Equal => "=",
        Ordering::Greater => ">",
    };
    println!("{} {} {}", left, symbol, right);
}
