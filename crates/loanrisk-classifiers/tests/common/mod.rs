//! Synthetic loan tables shared by the integration tests.
#![allow(dead_code)]

use std::fmt::Write;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const EMPLOYMENT: [&str; 3] = ["Employed", "Self-employed", "Unemployed"];

/// `LoanID,Age,Income,Employment,Default` with defaults driven by low
/// income, youth and unemployment.
pub fn synthetic_loans(n: usize, seed: u64) -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = String::from("LoanID,Age,Income,Employment,Default\n");
    for i in 0..n {
        let age: u32 = rng.gen_range(18..70);
        let income: f64 = rng.gen_range(15_000.0..120_000.0);
        let employment = EMPLOYMENT[rng.gen_range(0..EMPLOYMENT.len())];

        let mut z = -1.2 - (income - 60_000.0) / 20_000.0 - (age as f64 - 40.0) / 25.0;
        if employment == "Unemployed" {
            z += 1.0;
        }
        let p = 1.0 / (1.0 + (-z).exp());
        let default = u8::from(rng.gen::<f64>() < p);
        writeln!(out, "L{:05},{},{:.2},{},{}", i, age, income, employment, default).unwrap();
    }
    out
}

pub fn write_table(dir: &std::path::Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}
