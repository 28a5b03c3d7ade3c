use std::fmt;

// Ref: https://www.airnow.gov/sites/default/files/2020-05/aqi-technical-assistance-document-sept2018.pdf
// (concentration upper bound used for range testing, table low, table high, index low, index high)
const PM25_BREAKPOINTS: [(f64, f64, f64, i32, i32); 6] = [
    (12.0, 0.0, 12.0, 0, 50),
    (35.4, 12.1, 35.4, 51, 100),
    (55.4, 35.5, 55.4, 101, 150),
    (150.4, 55.5, 150.4, 151, 200),
    (250.4, 150.5, 250.4, 201, 300),
    (f64::INFINITY, 250.5, 500.4, 301, 500),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AqiResult {
    pub aqi: i32,
    pub category: AqiCategory,
}

impl AqiResult {
    pub fn from_pm25(pm25: f64) -> Self {
        let aqi = calculate_aqi(pm25);
        Self {
            aqi,
            category: get_aqi_category(aqi),
        }
    }
}

/// Converts a PM2.5 concentration (µg/m³) to the US EPA Air Quality Index.
///
/// Each segment interpolates from its table lower bound, which sits 0.1 above the previous
/// segment's range bound. The result is truncated toward zero and is not clamped, so
/// concentrations past the last breakpoint extrapolate beyond 500.
pub fn calculate_aqi(pm25: f64) -> i32 {
    let (_, c_lo, c_hi, i_lo, i_hi) = PM25_BREAKPOINTS
        .iter()
        .copied()
        .find(|&(upper, ..)| pm25 <= upper)
        .unwrap_or(PM25_BREAKPOINTS[PM25_BREAKPOINTS.len() - 1]);

    (f64::from(i_hi - i_lo) / (c_hi - c_lo) * (pm25 - c_lo) + f64::from(i_lo)) as i32
}

pub fn get_aqi_category(aqi: i32) -> AqiCategory {
    match aqi {
        ..=50 => AqiCategory::Good,
        ..=100 => AqiCategory::Moderate,
        ..=150 => AqiCategory::UnhealthyForSensitiveGroups,
        ..=200 => AqiCategory::Unhealthy,
        ..=300 => AqiCategory::VeryUnhealthy,
        _ => AqiCategory::Hazardous,
    }
}
