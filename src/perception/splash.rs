use std::fmt;

/// How much a fully aged bobber adds to the raw splash probability
pub const BIAS_WEIGHT: f64 = 0.2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplashDecision {
    /// Splash seen, reel in
    Act,
    /// Keep watching
    Wait,
    /// The bobber outlived its lifetime, cast again
    Expire,
}

impl fmt::Display for SplashDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SplashDecision::Act => "act",
            SplashDecision::Wait => "wait",
            SplashDecision::Expire => "expire",
        })
    }
}

/// Raw probability plus a linear bonus growing with the bobber age.
///
/// This is a decision score, not a probability: it isn't clamped.
#[must_use]
pub fn biased_score(raw_probability: f64, elapsed_seconds: f64, max_lifetime_seconds: f64) -> f64 {
    raw_probability + (elapsed_seconds / max_lifetime_seconds) * BIAS_WEIGHT
}

/// Decide what to do with the current splash probability.
///
/// Lifetime is checked first: once `elapsed_seconds > max_lifetime_seconds`
/// the result is always [`SplashDecision::Expire`], whatever the score.
/// Otherwise the biased score must be strictly above `threshold` to act.
#[must_use]
pub fn evaluate(
    raw_probability: f64,
    elapsed_seconds: f64,
    max_lifetime_seconds: f64,
    threshold: f64,
) -> SplashDecision {
    if elapsed_seconds > max_lifetime_seconds {
        return SplashDecision::Expire;
    }

    if biased_score(raw_probability, elapsed_seconds, max_lifetime_seconds) > threshold {
        SplashDecision::Act
    } else {
        SplashDecision::Wait
    }
}
