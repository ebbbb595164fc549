/// Static description of one tunable shader parameter.
///
/// Every spec maps 1:1 to a slot in the uniform block and to a control at the
/// host boundary; the registry below keeps both sides from diverging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: f32,
}

/// The fixed parameter set exposed to shaders and to the host controls.
pub const PARAMETER_SPECS: [ParameterSpec; 5] = [
    ParameterSpec {
        name: "speed",
        min: 0.0,
        max: 2.0,
        step: 0.1,
        default: 1.0,
    },
    ParameterSpec {
        name: "hue_shift",
        min: 0.0,
        max: 1.0,
        step: 0.1,
        default: 0.0,
    },
    ParameterSpec {
        name: "saturation",
        min: 0.0,
        max: 2.0,
        step: 0.1,
        default: 1.0,
    },
    ParameterSpec {
        name: "brightness",
        min: 0.0,
        max: 2.0,
        step: 0.1,
        default: 1.0,
    },
    ParameterSpec {
        name: "shape_scale",
        min: 0.1,
        max: 2.0,
        step: 0.1,
        default: 1.0,
    },
];

/// Snapshot of all parameter values, copied into the uniform block each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterValues {
    pub speed: f32,
    pub hue_shift: f32,
    pub saturation: f32,
    pub brightness: f32,
    pub shape_scale: f32,
}

/// Mutable parameter state, seeded from [`PARAMETER_SPECS`] defaults.
///
/// Writes are clamped into the spec's `[min, max]` range; a slider at the
/// boundary cannot leave the range, so clamping (rather than rejecting)
/// keeps programmatic callers consistent with it.
#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    values: [f32; PARAMETER_SPECS.len()],
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self {
            values: PARAMETER_SPECS.map(|spec| spec.default),
        }
    }

    pub fn specs(&self) -> &'static [ParameterSpec] {
        &PARAMETER_SPECS
    }

    fn index_of(name: &str) -> Option<usize> {
        PARAMETER_SPECS.iter().position(|spec| spec.name == name)
    }

    /// Writes a parameter value, clamped into its spec range.
    ///
    /// Returns the applied value, or `None` for an unknown parameter name.
    /// The value takes effect on the next render tick; there is no separate
    /// apply step.
    pub fn set(&mut self, name: &str, value: f32) -> Option<f32> {
        let index = Self::index_of(name)?;
        let spec = &PARAMETER_SPECS[index];
        let clamped = value.clamp(spec.min, spec.max);
        self.values[index] = clamped;
        Some(clamped)
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        Self::index_of(name).map(|index| self.values[index])
    }

    /// Current value formatted the way the control surface displays it.
    pub fn display_value(&self, name: &str) -> Option<String> {
        self.get(name).map(|value| format!("{value:.1}"))
    }

    /// Restores every parameter to its spec default.
    pub fn reset_all(&mut self) {
        self.values = PARAMETER_SPECS.map(|spec| spec.default);
    }

    /// Snapshot for the uniform upload on the next render tick.
    pub fn values(&self) -> ParameterValues {
        ParameterValues {
            speed: self.values[0],
            hue_shift: self.values[1],
            saturation: self.values[2],
            brightness: self.values[3],
            shape_scale: self.values[4],
        }
    }
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_starts_at_spec_defaults() {
        let registry = ParameterRegistry::new();
        for spec in &PARAMETER_SPECS {
            assert_eq!(registry.get(spec.name), Some(spec.default));
        }
    }

    #[test]
    fn set_clamps_into_spec_range() {
        let mut registry = ParameterRegistry::new();
        assert_eq!(registry.set("speed", 5.0), Some(2.0));
        assert_eq!(registry.set("speed", -1.0), Some(0.0));
        assert_eq!(registry.set("shape_scale", 0.0), Some(0.1));
        assert_eq!(registry.get("shape_scale"), Some(0.1));
    }

    #[test]
    fn unknown_parameter_is_rejected() {
        let mut registry = ParameterRegistry::new();
        assert_eq!(registry.set("gamma", 1.0), None);
        assert_eq!(registry.get("gamma"), None);
    }

    #[test]
    fn reset_all_restores_every_default() {
        let mut registry = ParameterRegistry::new();
        registry.set("speed", 1.7);
        registry.set("hue_shift", 0.9);
        registry.set("brightness", 0.2);
        registry.reset_all();
        for spec in &PARAMETER_SPECS {
            assert_eq!(registry.get(spec.name), Some(spec.default));
        }
    }

    #[test]
    fn display_value_uses_one_decimal_place() {
        let mut registry = ParameterRegistry::new();
        registry.set("hue_shift", 0.25);
        assert_eq!(registry.display_value("hue_shift").as_deref(), Some("0.2"));
        assert_eq!(registry.display_value("speed").as_deref(), Some("1.0"));
    }

    #[test]
    fn values_snapshot_tracks_writes() {
        let mut registry = ParameterRegistry::new();
        registry.set("saturation", 1.5);
        let values = registry.values();
        assert_eq!(values.saturation, 1.5);
        assert_eq!(values.speed, 1.0);
    }
}
