use super::descriptive::{mean, std_dev};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Magnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl Magnitude {
    /// Conventional bands for Cohen's d.
    pub fn of_cohens_d(d: f64) -> Self {
        match d.abs() {
            v if v < 0.2 => Magnitude::Negligible,
            v if v < 0.5 => Magnitude::Small,
            v if v < 0.8 => Magnitude::Medium,
            _ => Magnitude::Large,
        }
    }
}

impl fmt::Display for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Magnitude::Negligible => "negligible",
            Magnitude::Small => "small",
            Magnitude::Medium => "medium",
            Magnitude::Large => "large",
        };
        f.write_str(s)
    }
}

/// Standardized mean difference `(mean(treated) - mean(control)) / pooled sample std`.
pub fn cohens_d(treated: &[f64], control: &[f64]) -> Option<f64> {
    let (n1, n2) = (treated.len(), control.len());
    if n1 < 2 || n2 < 2 {
        return None;
    }
    let (s1, s2) = (std_dev(treated)?, std_dev(control)?);
    let pooled = (((n1 - 1) as f64 * s1 * s1 + (n2 - 1) as f64 * s2 * s2) / (n1 + n2 - 2) as f64)
        .sqrt();
    if pooled == 0.0 {
        return None;
    }
    Some((mean(treated)? - mean(control)?) / pooled)
}

/// Mean difference scaled by the control group's sample std.
pub fn glass_delta(treated: &[f64], control: &[f64]) -> Option<f64> {
    let sd = std_dev(control)?;
    if sd == 0.0 {
        return None;
    }
    Some((mean(treated)? - mean(control)?) / sd)
}

/// Cliff's delta: `P(t > c) - P(t < c)` over all cross pairs.
pub fn cliffs_delta(treated: &[f64], control: &[f64]) -> Option<f64> {
    if treated.is_empty() || control.is_empty() {
        return None;
    }
    let mut balance: i64 = 0;
    for t in treated {
        for c in control {
            if t > c {
                balance += 1;
            } else if t < c {
                balance -= 1;
            }
        }
    }
    Some(balance as f64 / (treated.len() * control.len()) as f64)
}
