//! Runtime settings backed by the key-value store
//!
//! Every getter falls back to a compiled default when the key is absent or
//! holds a value of the wrong shape. Setters validate before writing and
//! report rejected input as [`SettingsError::Invalid`].

use crate::error::SettingsError;
use crate::strategy::StrategyKind;
use kaleido_store::{KvOp, KvStore};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Keys used in the key-value store
pub mod keys {
    pub const LATEST_ID: &str = "site_latest_id";
    pub const LATEST_TS: &str = "site_latest_ts";
    pub const LATEST_META: &str = "site_latest_meta";
    pub const HISTORY: &str = "site_index";
    pub const RATE_LIMIT: &str = "site_config_gen_per_min";
    pub const MODEL: &str = "site_config_model";
    pub const INCLUDE_IMAGE: &str = "site_config_include_image";
    pub const IMAGE_PROMPT: &str = "site_config_image_prompt";
    pub const STRATEGY: &str = "site_config_generation_strategy";
    pub const PLANNING_PROMPT: &str = "site_config_planning_prompt";
    pub const SECTION_PROMPT: &str = "site_config_section_prompt";
}

/// Every runtime setting read at once
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    pub strategy: StrategyKind,
    pub model: Option<String>,
    pub rate_limit: Option<u64>,
    pub include_image: bool,
    pub image_prompt: Option<String>,
    pub planning_prompt: Option<String>,
    pub section_prompt: Option<String>,
}

/// Settings provider
#[derive(Clone)]
pub struct Settings {
    store: Arc<dyn KvStore>,
    default_model: Option<String>,
}

impl Settings {
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            default_model: None,
        }
    }

    /// Model reported when none is stored
    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.default_model = (!model.trim().is_empty()).then_some(model);
        self
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    async fn string(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(match self.store.get(key).await? {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            _ => None,
        })
    }

    /// Store a string, or delete the key when it is blank
    async fn set_optional_string(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let op = if value.trim().is_empty() {
            KvOp::delete(key)
        } else {
            KvOp::upsert(key, value)
        };
        self.store.apply(vec![op]).await?;
        Ok(())
    }

    /// Configured generation strategy; unknown values select the default
    pub async fn strategy(&self) -> Result<StrategyKind, SettingsError> {
        let raw = self.string(keys::STRATEGY).await?;
        Ok(StrategyKind::parse_or_default(raw.as_deref()))
    }

    pub async fn set_strategy(&self, value: &str) -> Result<StrategyKind, SettingsError> {
        let kind: StrategyKind = value
            .parse()
            .map_err(|e: crate::strategy::UnknownStrategy| SettingsError::invalid("strategy", e.to_string()))?;
        self.store.set(keys::STRATEGY, Value::from(kind.as_str())).await?;
        tracing::info!(strategy = %kind, "generation strategy updated");
        Ok(kind)
    }

    /// Section model override, else the configured default
    pub async fn model(&self) -> Result<Option<String>, SettingsError> {
        Ok(self
            .string(keys::MODEL)
            .await?
            .or_else(|| self.default_model.clone()))
    }

    pub async fn set_model(&self, value: &str) -> Result<String, SettingsError> {
        let model = value.trim();
        if model.is_empty() {
            return Err(SettingsError::invalid("model", "must not be empty"));
        }
        self.store.set(keys::MODEL, Value::from(model)).await?;
        tracing::info!(model, "model updated");
        Ok(model.to_string())
    }

    /// Generations allowed per minute; `None` means unlimited
    pub async fn rate_limit(&self) -> Result<Option<u64>, SettingsError> {
        Ok(self
            .store
            .get(keys::RATE_LIMIT)
            .await?
            .as_ref()
            .and_then(positive_integer))
    }

    pub async fn set_rate_limit(&self, value: &Value) -> Result<u64, SettingsError> {
        let limit = positive_integer(value)
            .ok_or_else(|| SettingsError::invalid("limit", "must be a positive number"))?;
        self.store.set(keys::RATE_LIMIT, Value::from(limit)).await?;
        tracing::info!(limit, "rate limit updated");
        Ok(limit)
    }

    pub async fn include_image(&self) -> Result<bool, SettingsError> {
        Ok(matches!(
            self.store.get(keys::INCLUDE_IMAGE).await?,
            Some(Value::Bool(true))
        ))
    }

    pub async fn set_include_image(&self, value: &Value) -> Result<bool, SettingsError> {
        let include = match value {
            Value::Bool(b) => *b,
            Value::String(s) if s == "true" || s == "on" || s == "1" => true,
            Value::String(s) if s == "false" || s == "off" || s == "0" => false,
            _ => return Err(SettingsError::invalid("includeImage", "must be a boolean")),
        };
        self.store.set(keys::INCLUDE_IMAGE, Value::Bool(include)).await?;
        Ok(include)
    }

    pub async fn image_prompt(&self) -> Result<Option<String>, SettingsError> {
        self.string(keys::IMAGE_PROMPT).await
    }

    /// Blank clears the custom prompt
    pub async fn set_image_prompt(&self, value: &str) -> Result<(), SettingsError> {
        self.set_optional_string(keys::IMAGE_PROMPT, value).await
    }

    pub async fn planning_prompt(&self) -> Result<Option<String>, SettingsError> {
        self.string(keys::PLANNING_PROMPT).await
    }

    /// Blank restores the built-in prompt
    pub async fn set_planning_prompt(&self, value: &str) -> Result<(), SettingsError> {
        self.set_optional_string(keys::PLANNING_PROMPT, value).await
    }

    pub async fn section_prompt(&self) -> Result<Option<String>, SettingsError> {
        self.string(keys::SECTION_PROMPT).await
    }

    /// Blank restores the built-in prompt
    pub async fn set_section_prompt(&self, value: &str) -> Result<(), SettingsError> {
        self.set_optional_string(keys::SECTION_PROMPT, value).await
    }

    /// Read every setting
    pub async fn snapshot(&self) -> Result<SettingsSnapshot, SettingsError> {
        Ok(SettingsSnapshot {
            strategy: self.strategy().await?,
            model: self.model().await?,
            rate_limit: self.rate_limit().await?,
            include_image: self.include_image().await?,
            image_prompt: self.image_prompt().await?,
            planning_prompt: self.planning_prompt().await?,
            section_prompt: self.section_prompt().await?,
        })
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

/// Accept positive numbers and numeric strings; fractions round down
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn positive_integer(value: &Value) -> Option<u64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() || number < 1.0 {
        return None;
    }
    Some(number.floor() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaleido_store::MemoryKvStore;
    use serde_json::json;

    fn settings() -> Settings {
        Settings::new(Arc::new(MemoryKvStore::new()))
    }

    #[tokio::test]
    async fn defaults_when_store_is_empty() {
        let snapshot = settings().with_default_model("gpt-4o").snapshot().await.unwrap();
        assert_eq!(snapshot.strategy, StrategyKind::DesignSystem);
        assert_eq!(snapshot.model.as_deref(), Some("gpt-4o"));
        assert_eq!(snapshot.rate_limit, None);
        assert!(!snapshot.include_image);
        assert!(snapshot.planning_prompt.is_none());
    }

    #[tokio::test]
    async fn stored_garbage_strategy_reads_as_default() {
        let s = settings();
        s.store()
            .set(keys::STRATEGY, json!("nonexistent-strategy"))
            .await
            .unwrap();
        assert_eq!(s.strategy().await.unwrap(), StrategyKind::DesignSystem);
    }

    #[tokio::test]
    async fn strategy_update_is_validated() {
        let s = settings();
        assert_eq!(
            s.set_strategy("single-pass").await.unwrap(),
            StrategyKind::SinglePass
        );
        assert_eq!(s.strategy().await.unwrap(), StrategyKind::SinglePass);

        let err = s.set_strategy("bogus").await.unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { key: "strategy", .. }));
        assert_eq!(s.strategy().await.unwrap(), StrategyKind::SinglePass);
    }

    #[tokio::test]
    async fn rate_limit_validation() {
        let s = settings();
        assert_eq!(s.set_rate_limit(&json!(5)).await.unwrap(), 5);
        assert_eq!(s.set_rate_limit(&json!("7")).await.unwrap(), 7);
        assert_eq!(s.rate_limit().await.unwrap(), Some(7));
        for bad in [json!(0), json!(-3), json!("abc"), json!(null), json!(0.5)] {
            assert!(s.set_rate_limit(&bad).await.is_err(), "{bad} accepted");
        }
    }

    #[tokio::test]
    async fn model_override_wins_over_default() {
        let s = settings().with_default_model("gpt-4o-mini");
        assert!(s.set_model("  ").await.is_err());
        s.set_model("gpt-4o").await.unwrap();
        assert_eq!(s.model().await.unwrap().as_deref(), Some("gpt-4o"));
    }

    #[tokio::test]
    async fn blank_prompt_clears() {
        let s = settings();
        s.set_planning_prompt("Be bold").await.unwrap();
        assert_eq!(s.planning_prompt().await.unwrap().as_deref(), Some("Be bold"));
        s.set_planning_prompt("").await.unwrap();
        assert!(s.planning_prompt().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn include_image_accepts_form_values() {
        let s = settings();
        assert!(s.set_include_image(&json!("on")).await.unwrap());
        assert!(s.include_image().await.unwrap());
        assert!(!s.set_include_image(&json!(false)).await.unwrap());
        assert!(s.set_include_image(&json!(3)).await.is_err());
    }
}
