//! Layered run configuration.
//!
//! Precedence, lowest first:
//!
//! 1. `StrategyConfig::default()`
//! 2. the business profile's suggested levers (when requested)
//! 3. a TOML file (`--config`, else the `DPLAN_CONFIG` environment variable)
//! 4. explicit overrides from the command line
//!
//! ```toml
//! [strategy]
//! business_profile = "fashion"
//! model_choice = "heuristic"
//! return_rate_pct = 20
//! active_festivals = ["Diwali"]
//!
//! [model]
//! knn_k = 5
//!
//! [festivals]
//! "Summer Sale" = "2026-07-15"
//!
//! [profile]
//! trend = 1.05
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::{BusinessProfile, MaShape, ModelChoice, StrategyConfig};
use crate::error::PlanError;

pub const CONFIG_ENV_VAR: &str = "DPLAN_CONFIG";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigPatch {
    pub strategy: Option<StrategyPatch>,
    pub model: Option<ModelPatch>,
    /// Festival name → ISO date; adds a date to the built-in calendar.
    pub festivals: Option<BTreeMap<String, String>>,
    pub profile: Option<ProfilePatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyPatch {
    pub surge_multiplier: Option<f64>,
    pub marketing_lift_pct: Option<f64>,
    pub return_rate_pct: Option<f64>,
    pub safety_buffer_pct: Option<f64>,
    pub active_festivals: Option<Vec<String>>,
    pub peak_lift_pct: Option<f64>,
    pub window_lift_pct: Option<f64>,
    pub lead_time_days: Option<u32>,
    pub model_choice: Option<ModelChoice>,
    pub business_profile: Option<BusinessProfile>,
    pub forecast_horizon_days: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelPatch {
    pub ma_span: Option<usize>,
    pub ma_shape: Option<MaShape>,
    pub ma_end_ratio: Option<f64>,
    pub knn_k: Option<usize>,
    pub tree_max_depth: Option<usize>,
    pub tree_min_samples_leaf: Option<usize>,
    pub trend_sensitivity: Option<f64>,
    pub marketing_weight: Option<f64>,
    pub baseline_window: Option<usize>,
    pub short_span: Option<usize>,
    pub long_span: Option<usize>,
    pub momentum_threshold: Option<f64>,
    pub dampening: Option<f64>,
    pub time_weighted: Option<bool>,
    pub festival_ramp_pct: Option<f64>,
    pub festival_ramp_days: Option<i64>,
    pub guardrail_ratio: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilePatch {
    pub trend: Option<f64>,
    pub season: Option<f64>,
    pub marketing: Option<f64>,
}

/// Command-line overrides; `None` leaves the lower layers in place.
#[derive(Debug, Clone, Default)]
pub struct StrategyOverrides {
    pub surge_multiplier: Option<f64>,
    pub marketing_lift_pct: Option<f64>,
    pub return_rate_pct: Option<f64>,
    pub safety_buffer_pct: Option<f64>,
    /// Replaces the active set when non-empty.
    pub active_festivals: Vec<String>,
    pub peak_lift_pct: Option<f64>,
    pub window_lift_pct: Option<f64>,
    pub lead_time_days: Option<u32>,
    pub model_choice: Option<ModelChoice>,
    pub business_profile: Option<BusinessProfile>,
    pub forecast_horizon_days: Option<usize>,
    pub ma_span: Option<usize>,
    pub ma_shape: Option<MaShape>,
    pub knn_k: Option<usize>,
    pub trend_sensitivity: Option<f64>,
    pub marketing_weight: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    /// Start from the business profile's suggested levers.
    pub suggested: bool,
    pub overrides: StrategyOverrides,
}

/// Build and validate the run's `StrategyConfig` from all layers.
pub fn load_strategy(options: LoadOptions) -> Result<StrategyConfig, PlanError> {
    let patch = match resolve_config_path(options.config_path.as_deref()) {
        Some(path) => Some(read_patch(&path)?),
        None => None,
    };
    let config = build_strategy(patch, options.suggested, options.overrides)?;
    config.validate()?;
    Ok(config)
}

/// Merge the layers without touching the filesystem or environment.
pub fn build_strategy(
    patch: Option<ConfigPatch>,
    suggested: bool,
    overrides: StrategyOverrides,
) -> Result<StrategyConfig, PlanError> {
    let mut config = StrategyConfig::default();

    // The profile decides the suggested levers, so resolve it first.
    let file_profile = patch
        .as_ref()
        .and_then(|p| p.strategy.as_ref())
        .and_then(|s| s.business_profile);
    if let Some(profile) = overrides.business_profile.or(file_profile) {
        config.business_profile = profile;
    }
    if suggested {
        config.apply_suggested_levers();
        debug!(profile = %config.business_profile.display_name(), "applied suggested levers");
    }

    if let Some(patch) = patch {
        apply_patch(&mut config, patch)?;
    }
    apply_overrides(&mut config, overrides);
    Ok(config)
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| read_env(CONFIG_ENV_VAR).map(PathBuf::from))
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn read_patch(path: &Path) -> Result<ConfigPatch, PlanError> {
    let text = fs::read_to_string(path)
        .map_err(|e| PlanError::Io(format!("could not read config file '{}': {e}", path.display())))?;
    let patch = parse_patch(&text, &path.display().to_string())?;
    info!(path = %path.display(), "loaded config file");
    Ok(patch)
}

pub fn parse_patch(text: &str, source: &str) -> Result<ConfigPatch, PlanError> {
    toml::from_str(text)
        .map_err(|e| PlanError::InvalidConfig(format!("could not parse config file '{source}': {e}")))
}

fn apply_patch(config: &mut StrategyConfig, patch: ConfigPatch) -> Result<(), PlanError> {
    if let Some(festivals) = patch.festivals {
        for (name, raw) in festivals {
            let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                PlanError::InvalidConfig(format!("festival '{name}' has invalid date '{raw}' (expected YYYY-MM-DD)"))
            })?;
            config.calendar.insert(&name, date);
        }
    }

    if let Some(s) = patch.strategy {
        if let Some(v) = s.surge_multiplier {
            config.surge_multiplier = v;
        }
        if let Some(v) = s.marketing_lift_pct {
            config.marketing_lift_pct = v;
        }
        if let Some(v) = s.return_rate_pct {
            config.return_rate_pct = v;
        }
        if let Some(v) = s.safety_buffer_pct {
            config.safety_buffer_pct = v;
        }
        if let Some(v) = s.active_festivals {
            config.active_festivals = v.into_iter().collect();
        }
        if let Some(v) = s.peak_lift_pct {
            config.peak_lift_pct = v;
        }
        if let Some(v) = s.window_lift_pct {
            config.window_lift_pct = v;
        }
        if let Some(v) = s.lead_time_days {
            config.lead_time_days = v;
        }
        if let Some(v) = s.model_choice {
            config.model_choice = v;
        }
        if let Some(v) = s.forecast_horizon_days {
            config.forecast_horizon_days = v;
        }
    }

    if let Some(m) = patch.model {
        let params = &mut config.model_params;
        if let Some(v) = m.ma_span {
            params.ma_span = v;
        }
        if let Some(v) = m.ma_shape {
            params.ma_shape = v;
        }
        if let Some(v) = m.ma_end_ratio {
            params.ma_end_ratio = v;
        }
        if let Some(v) = m.knn_k {
            params.knn_k = v;
        }
        if let Some(v) = m.tree_max_depth {
            params.tree_max_depth = v;
        }
        if let Some(v) = m.tree_min_samples_leaf {
            params.tree_min_samples_leaf = v;
        }
        if let Some(v) = m.trend_sensitivity {
            params.trend_sensitivity = v;
        }
        if let Some(v) = m.marketing_weight {
            params.marketing_weight = v;
        }
        if let Some(v) = m.baseline_window {
            params.baseline_window = v;
        }
        if let Some(v) = m.short_span {
            params.short_span = v;
        }
        if let Some(v) = m.long_span {
            params.long_span = v;
        }
        if let Some(v) = m.momentum_threshold {
            params.momentum_threshold = v;
        }
        if let Some(v) = m.dampening {
            params.dampening = v;
        }
        if let Some(v) = m.time_weighted {
            params.time_weighted = v;
        }
        if let Some(v) = m.festival_ramp_pct {
            params.festival_ramp_pct = v;
        }
        if let Some(v) = m.festival_ramp_days {
            params.festival_ramp_days = v;
        }
        if let Some(v) = m.guardrail_ratio {
            params.guardrail_ratio = v;
        }
    }

    if let Some(p) = patch.profile {
        if let Some(v) = p.trend {
            config.custom_profile.trend = v;
        }
        if let Some(v) = p.season {
            config.custom_profile.season = v;
        }
        if let Some(v) = p.marketing {
            config.custom_profile.marketing = v;
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut StrategyConfig, overrides: StrategyOverrides) {
    if let Some(v) = overrides.surge_multiplier {
        config.surge_multiplier = v;
    }
    if let Some(v) = overrides.marketing_lift_pct {
        config.marketing_lift_pct = v;
    }
    if let Some(v) = overrides.return_rate_pct {
        config.return_rate_pct = v;
    }
    if let Some(v) = overrides.safety_buffer_pct {
        config.safety_buffer_pct = v;
    }
    if !overrides.active_festivals.is_empty() {
        config.active_festivals = overrides.active_festivals.into_iter().collect();
    }
    if let Some(v) = overrides.peak_lift_pct {
        config.peak_lift_pct = v;
    }
    if let Some(v) = overrides.window_lift_pct {
        config.window_lift_pct = v;
    }
    if let Some(v) = overrides.lead_time_days {
        config.lead_time_days = v;
    }
    if let Some(v) = overrides.model_choice {
        config.model_choice = v;
    }
    if let Some(v) = overrides.forecast_horizon_days {
        config.forecast_horizon_days = v;
    }
    if let Some(v) = overrides.ma_span {
        config.model_params.ma_span = v;
    }
    if let Some(v) = overrides.ma_shape {
        config.model_params.ma_shape = v;
    }
    if let Some(v) = overrides.knn_k {
        config.model_params.knn_k = v;
    }
    if let Some(v) = overrides.trend_sensitivity {
        config.model_params.trend_sensitivity = v;
    }
    if let Some(v) = overrides.marketing_weight {
        config.model_params.marketing_weight = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[strategy]
business_profile = "fashion"
model_choice = "knn"
safety_buffer_pct = 20
active_festivals = ["Diwali", "Summer Sale"]

[model]
knn_k = 5
ma_shape = "linear_decay"

[festivals]
"Summer Sale" = "2026-07-15"

[profile]
trend = 1.3
"#;

    #[test]
    fn file_layer_applies_every_section() {
        let patch = parse_patch(SAMPLE, "sample.toml").unwrap();
        let config = build_strategy(Some(patch), false, StrategyOverrides::default()).unwrap();
        assert_eq!(config.business_profile, BusinessProfile::Fashion);
        assert_eq!(config.model_choice, ModelChoice::Knn);
        assert_eq!(config.safety_buffer_pct, 20.0);
        assert_eq!(config.model_params.knn_k, 5);
        assert_eq!(config.model_params.ma_shape, MaShape::LinearDecay);
        assert_eq!(config.custom_profile.trend, 1.3);
        assert_eq!(
            config.calendar.dates("summer sale"),
            vec![NaiveDate::from_ymd_opt(2026, 7, 15).unwrap()]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn layers_apply_in_precedence_order() {
        let patch = parse_patch(SAMPLE, "sample.toml").unwrap();
        let overrides = StrategyOverrides {
            safety_buffer_pct: Some(5.0),
            ..StrategyOverrides::default()
        };
        let config = build_strategy(Some(patch), true, overrides).unwrap();
        // suggested (Fashion) < file
        assert_eq!(config.return_rate_pct, 25.0);
        // file < command line
        assert_eq!(config.safety_buffer_pct, 5.0);
    }

    #[test]
    fn command_line_profile_drives_suggested_levers() {
        let overrides = StrategyOverrides {
            business_profile: Some(BusinessProfile::Electronics),
            ..StrategyOverrides::default()
        };
        let config = build_strategy(None, true, overrides).unwrap();
        assert_eq!(config.business_profile, BusinessProfile::Electronics);
        assert_eq!(config.return_rate_pct, 10.0);
    }

    #[test]
    fn unknown_keys_and_bad_dates_are_rejected() {
        let err = parse_patch("[strategy]\nsurge = 2\n", "bad.toml").unwrap_err();
        assert!(matches!(err, PlanError::InvalidConfig(_)));

        let patch = parse_patch("[festivals]\nLaunch = \"15/07/2026\"\n", "bad.toml").unwrap();
        let err = build_strategy(Some(patch), false, StrategyOverrides::default()).unwrap_err();
        assert!(matches!(err, PlanError::InvalidConfig(_)));
    }

    #[test]
    fn load_reads_file_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[strategy]\nreturn_rate_pct = 150").unwrap();
        let err = load_strategy(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            ..LoadOptions::default()
        })
        .unwrap_err();
        assert!(matches!(err, PlanError::InvalidConfig(_)));

        let missing = load_strategy(LoadOptions {
            config_path: Some(PathBuf::from("/definitely/not/here.toml")),
            ..LoadOptions::default()
        })
        .unwrap_err();
        assert!(matches!(missing, PlanError::Io(_)));
    }
}
