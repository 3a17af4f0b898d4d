//! Top-level configuration: the root component plus initial/forbidden state
//! predicates and reachability settings.

use crate::automaton::BaseComponent;
use crate::error::ValidationError;
use crate::validate;
use hybra_syntax::Expr;
use indexmap::IndexMap;

/// Reachability and plotting settings attached to a configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomatonSettings {
    /// Variables selected for plotting (x and y axes).
    pub plot_variables: [String; 2],
    /// Reachability time horizon.
    pub time_horizon: f64,
    /// Sampling period used by time-stepped analyses.
    pub sample_time: f64,
    /// Whether transitions are time-triggered (set by continuization).
    pub time_triggered: bool,
}

impl Default for AutomatonSettings {
    fn default() -> Self {
        Self {
            plot_variables: [String::new(), String::new()],
            time_horizon: 10.0,
            sample_time: 0.1,
            time_triggered: false,
        }
    }
}

/// A complete model: root component, state predicates keyed by mode name,
/// and settings. Constructed once by a loader, mutated in place by passes,
/// and checked by [`Configuration::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    /// The root component. Network components are resolved before passes
    /// run, so the root is always a base component here.
    pub root: BaseComponent,
    /// Initial state predicate per mode.
    pub init: IndexMap<String, Expr>,
    /// Forbidden state predicate per mode.
    pub forbidden: IndexMap<String, Expr>,
    pub settings: AutomatonSettings,
    /// When false, [`Configuration::validate`] is a no-op. Only toggled
    /// through [`Configuration::with_validation_disabled`].
    validation_enabled: bool,
}

impl Configuration {
    /// Create a configuration around a root component.
    pub fn new(root: BaseComponent) -> Self {
        Self {
            root,
            init: IndexMap::new(),
            forbidden: IndexMap::new(),
            settings: AutomatonSettings::default(),
            validation_enabled: true,
        }
    }

    /// Check every structural invariant of the model. Fails fast with a
    /// diagnostic naming the offending mode, transition, or variable.
    ///
    /// Returns `Ok(())` without checking while validation is disabled.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.validation_enabled {
            return Ok(());
        }
        validate::validate_configuration(self)
    }

    /// Run `f` with validation suppressed, restoring the previous state on
    /// every exit path. Used by passes that mutate the graph through
    /// intermediate states that are not yet consistent.
    pub fn with_validation_disabled<R>(
        &mut self,
        f: impl FnOnce(&mut Configuration) -> R,
    ) -> R {
        let previous = self.validation_enabled;
        self.validation_enabled = false;
        let result = f(self);
        self.validation_enabled = previous;
        result
    }

    /// Whether validation is currently enabled.
    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_scope_restores_flag() {
        let mut config = Configuration::new(BaseComponent::new());
        assert!(config.validation_enabled());

        config.with_validation_disabled(|c| {
            assert!(!c.validation_enabled());
            // nested scopes restore to the outer disabled state
            c.with_validation_disabled(|inner| {
                assert!(!inner.validation_enabled());
            });
            assert!(!c.validation_enabled());
        });

        assert!(config.validation_enabled());
    }

    #[test]
    fn test_disabled_validation_skips_checks() {
        let mut component = BaseComponent::new();
        component.create_mode("on").unwrap();
        // invariant references an undeclared variable
        component.mode_mut("on").unwrap().invariant = Expr::var("ghost");
        let mut config = Configuration::new(component);

        assert!(config.validate().is_err());
        let inner = config.with_validation_disabled(|c| c.validate());
        assert!(inner.is_ok());
        assert!(config.validate().is_err());
    }
}
