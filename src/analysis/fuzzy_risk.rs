// src/analysis/fuzzy_risk.rs
//
// Twelve-rule fuzzy inference over (relative distance, approach velocity).
//
//   distance  ─┐                      ┌─ min(μd, μv) × consequent
//              ├→ fuzzify → rule grid ┤                          → weighted avg → × phone → clamp
//   velocity  ─┘                      └─ Σ truth
//
// Breakpoints and consequents are calibrated against the deployed camera
// geometry (640px wide frame, boundary at x=300). Changing them changes
// every downstream threshold.

/// Highest score the engine reports. 100 stays reserved for sources that
/// are certain, which the weighted average never is.
pub const MAX_RISK: f64 = 99.9;

/// Distraction multiplier when a phone is in view.
pub const PHONE_FACTOR: f64 = 1.4;

/// Trapezoidal membership function with breakpoints `a <= b <= c <= d`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trapezoid {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Trapezoid {
    pub const fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    /// Degree of membership in [0, 1]. A vertical edge (`a == b` or
    /// `c == d`) acts as a step: everything on the inner side is fully in.
    pub fn membership(&self, x: f64) -> f64 {
        let rising = if self.b > self.a {
            (x - self.a) / (self.b - self.a)
        } else {
            1.0
        };
        let falling = if self.d > self.c {
            (self.d - x) / (self.d - self.c)
        } else {
            1.0
        };
        rising.min(1.0).min(falling).clamp(0.0, 1.0)
    }
}

pub fn trapezoid(x: f64, a: f64, b: f64, c: f64, d: f64) -> f64 {
    Trapezoid::new(a, b, c, d).membership(x)
}

// Distance to the boundary (px). Negative = already crossed.
pub const DIST_CRITICAL: Trapezoid = Trapezoid::new(-500.0, -500.0, 0.0, 30.0);
pub const DIST_DANGER: Trapezoid = Trapezoid::new(20.0, 50.0, 80.0, 120.0);
pub const DIST_SAFE: Trapezoid = Trapezoid::new(100.0, 200.0, 1000.0, 1000.0);

// Approach velocity (px/s). Positive = moving toward the boundary.
pub const VEL_STARTLED: Trapezoid = Trapezoid::new(60.0, 100.0, 1000.0, 1000.0);
pub const VEL_NORMAL: Trapezoid = Trapezoid::new(5.0, 20.0, 40.0, 60.0);
pub const VEL_STATIONARY: Trapezoid = Trapezoid::new(-15.0, -5.0, 5.0, 15.0);
pub const VEL_RECEDING: Trapezoid = Trapezoid::new(-1000.0, -1000.0, -30.0, -10.0);

/// Consequent risk per rule. Rows: critical, danger, safe.
/// Columns: startled, normal, stationary, receding.
const RULES: [[f64; 4]; 3] = [
    [100.0, 98.0, 95.0, 80.0],
    [90.0, 65.0, 40.0, 20.0],
    [45.0, 15.0, 5.0, 0.0],
];

/// Membership degrees for one input pair, kept for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fuzzified {
    pub distance: [f64; 3],
    pub velocity: [f64; 4],
}

impl Fuzzified {
    pub fn new(distance: f64, velocity: f64) -> Self {
        Self {
            distance: [
                DIST_CRITICAL.membership(distance),
                DIST_DANGER.membership(distance),
                DIST_SAFE.membership(distance),
            ],
            velocity: [
                VEL_STARTLED.membership(velocity),
                VEL_NORMAL.membership(velocity),
                VEL_STATIONARY.membership(velocity),
                VEL_RECEDING.membership(velocity),
            ],
        }
    }

    /// Weighted-average defuzzification over the full rule grid.
    /// Returns 0 when no rule fires.
    pub fn defuzzify(&self) -> f64 {
        let mut numerator = 0.0;
        let mut denominator = 0.0;

        for (row, mu_d) in RULES.iter().zip(self.distance) {
            for (consequent, mu_v) in row.iter().zip(self.velocity) {
                let truth = mu_d.min(mu_v);
                numerator += truth * consequent;
                denominator += truth;
            }
        }

        if denominator > 0.0 {
            numerator / denominator
        } else {
            0.0
        }
    }
}

/// Risk before the distraction modifier, for a relative distance.
pub fn base_risk(distance: f64, velocity: f64) -> f64 {
    Fuzzified::new(distance, velocity).defuzzify()
}

/// Risk score in [0, 99.9] for a subject at `point_x` with the boundary at
/// `line_x`.
pub fn fuzzy_risk(point_x: i64, line_x: i64, velocity: f64, has_phone: bool) -> f64 {
    let distance = (line_x - point_x) as f64;
    let mut risk = base_risk(distance, velocity);

    if has_phone {
        risk *= PHONE_FACTOR;
    }

    risk.clamp(0.0, MAX_RISK)
}
