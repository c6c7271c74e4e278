//! Psychrometric approximations (Magnus formula).
//!
//! Temperatures are in degrees Celsius, relative humidity in percent,
//! pressures in hPa. Inputs are not validated.

use std::f64::consts::LOG10_E;

/// Reference saturation vapor pressure at 0 °C, in hPa.
pub const SVP_AT_ZERO: f64 = 6.1078;

/// Molar mass of water vapor, in kg/kmol.
const MOLAR_MASS_WATER: f64 = 18.016;

/// Universal gas constant, in J/(kmol*K).
const GAS_CONSTANT: f64 = 8314.3;

/// Magnus coefficients: over water for `t >= 0`, over ice below.
const fn coefficients(t: f64) -> (f64, f64) {
    if t >= 0.0 { (7.5, 237.3) } else { (7.6, 240.7) }
}

/// Converts degrees Celsius to Kelvin.
#[must_use]
pub fn celsius_to_kelvin(t: f64) -> f64 {
    t + 273.15
}

/// Saturation vapor pressure at temperature `t`.
#[must_use]
pub fn saturation_vapor_pressure(t: f64) -> f64 {
    let (a, b) = coefficients(t);
    SVP_AT_ZERO * ((a * t) / (b + t) / LOG10_E).exp()
}

/// Actual vapor pressure at temperature `t` and relative humidity `r`.
#[must_use]
pub fn vapor_pressure(t: f64, r: f64) -> f64 {
    (r / 100.0) * saturation_vapor_pressure(t)
}

/// Dew point for temperature `t` and relative humidity `r`.
#[must_use]
pub fn dew_point(t: f64, r: f64) -> f64 {
    let (a, b) = coefficients(t);
    let c = (vapor_pressure(t, r) / SVP_AT_ZERO).ln() * LOG10_E;
    (b * c) / (a - c)
}

/// Relative humidity for temperature `t` and dew point `td`.
#[must_use]
pub fn relative_humidity(t: f64, td: f64) -> f64 {
    100.0 * (saturation_vapor_pressure(td) / saturation_vapor_pressure(t))
}

/// Absolute humidity in g/m³.
#[must_use]
pub fn absolute_humidity(t: f64, r: f64) -> f64 {
    let vp = 100.0 * vapor_pressure(t, r);
    1000.0 * (MOLAR_MASS_WATER / GAS_CONSTANT) * (vp / celsius_to_kelvin(t))
}

/// Rounds to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_saturation_at_freezing() {
        assert_abs_diff_eq!(saturation_vapor_pressure(0.0), 6.1078, epsilon = 1e-3);
    }

    #[test]
    fn test_saturation_at_twenty() {
        // Reference tables: 23.37 hPa
        assert_abs_diff_eq!(saturation_vapor_pressure(20.0), 23.37, epsilon = 0.1);
    }

    #[test]
    fn test_reference_table_values() {
        // 20 °C / 50 %: dew point 9.3 °C, absolute humidity 8.6 g/m³
        assert_abs_diff_eq!(dew_point(20.0, 50.0), 9.3, epsilon = 0.2);
        assert_abs_diff_eq!(absolute_humidity(20.0, 50.0), 8.6, epsilon = 0.2);
    }

    #[test]
    fn test_dew_point_equals_temperature_when_saturated() {
        assert_abs_diff_eq!(dew_point(15.0, 100.0), 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_below_freezing_coefficients() {
        let expected = SVP_AT_ZERO * ((7.6 * -10.0) / (240.7 - 10.0) / LOG10_E).exp();
        assert_abs_diff_eq!(saturation_vapor_pressure(-10.0), expected, epsilon = 1e-12);
        assert_abs_diff_eq!(saturation_vapor_pressure(-10.0), 2.86, epsilon = 0.01);
    }

    #[test]
    fn test_relative_humidity_inverts_dew_point() {
        let td = dew_point(22.0, 40.0);
        assert_abs_diff_eq!(relative_humidity(22.0, td), 40.0, epsilon = 1e-6);
    }

    #[test]
    fn test_round1() {
        assert_abs_diff_eq!(round1(9.2649), 9.3, epsilon = 1e-12);
        assert_abs_diff_eq!(round1(-1.04), -1.0, epsilon = 1e-12);
    }
}
