// Copyright (c) Hetu Project
// SPDX-License-Identifier: Apache-2.0

//! SR and C scores.
//!
//! Both are squashed into `[0, 1]` with `sigmoid(sign(raw) * ln(1 + |raw|))`.
//! A non-finite raw value is treated as 0, which squashes to 0.5.

use squid_types::BranchingParams;

const SR_BETA: f64 = 0.12;
const SR_LAMBDA: f64 = -0.1;
const SR_ALPHA: f64 = 1.5;
const SR_P_MAX: u32 = 4;
const SR_UNSTABLE_ABOVE: f64 = 1e6;

const C_EXPONENT: f64 = 0.5;
const C_P: f64 = 0.1;

const EPS: f64 = 1e-12;

fn squash(raw: f64) -> f64 {
    let raw = if raw.is_finite() { raw } else { 0.0 };
    let sign = if raw >= 0.0 { 1.0 } else { -1.0 };
    let x = raw.abs().ln_1p() * sign;
    let normalized = 1.0 / (1.0 + (-x).exp());
    normalized.clamp(0.0, 1.0)
}

fn leaf_total(params: &BranchingParams) -> f64 {
    (params.b as f64).powf(params.m as f64)
}

fn full_super_relation(params: &BranchingParams) -> f64 {
    let (b, m, t) = (params.b as f64, params.m as f64, params.t as f64);
    let total = leaf_total(params);
    if total <= 0.0 {
        return 1.0;
    }

    let c1 = 2.0 * t / total;
    let c2 = (SR_BETA * (m - 1.0)).exp();
    let c3: f64 = (1..=SR_P_MAX)
        .map(|p| {
            let p = p as f64;
            let prob = p / SR_P_MAX as f64;
            let prob_term = prob * (1.0 - prob) + EPS;
            (SR_LAMBDA * p).exp() / (p.powf(SR_ALPHA) * prob_term)
        })
        .sum();
    let g = b * (b + 1.0).ln();

    squash(c1 * c2 * c3 * g)
}

fn simplified_super_relation(params: &BranchingParams) -> f64 {
    let total = leaf_total(params);
    if total <= 0.0 {
        return 1.0;
    }
    let sr = (params.t as f64 / total) * (1.0 + params.b as f64) / (1.0 + params.m as f64);
    if sr.is_finite() && sr >= 0.0 {
        sr
    } else {
        1.0
    }
}

/// Super-relation score.
///
/// Falls back to `(t / b^m) * (1 + b) / (1 + m)` when the full formula is
/// unstable, and to 1.0 when both are.
pub fn super_relation(params: &BranchingParams) -> f64 {
    if params.b == 0 || params.m == 0 || params.t == 0 {
        return 1.0;
    }

    let mut sr = full_super_relation(params);
    if !sr.is_finite() || sr < 0.0 || sr > SR_UNSTABLE_ABOVE {
        sr = simplified_super_relation(params);
    }
    if !sr.is_finite() || sr < 0.0 {
        return 1.0;
    }
    sr
}

/// Correlation coefficient `t * b^0.5 * (b * m) / 0.1^(2m + 1)`, squashed.
pub fn correlation_coefficient(params: &BranchingParams) -> f64 {
    let (b, m, t) = (params.b as f64, params.m as f64, params.t as f64);
    let numerator = t * b.powf(C_EXPONENT) * (b * m);
    let denominator = C_P.powf(2.0 * m + 1.0).max(EPS);
    squash(numerator / denominator)
}
