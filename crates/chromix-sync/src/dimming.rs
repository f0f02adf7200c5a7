//! Stepped dimming ramp — gradual tone-curve strength transitions.
//!
//! The controller converges the hardware dimming strength toward a target
//! value in bounded per-frame steps, so brightness changes fade instead of
//! jumping. It is driven from two schedules at once: the brightness path
//! sets targets and modes, the frame path ticks the ramp, so all mutable
//! state sits behind a mutex.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Mode every profile must define.
pub const MODE_NORMAL: &str = "normal";

const DEFAULT_STEP: u32 = 2;

fn default_step() -> u32 {
    DEFAULT_STEP
}

/// Errors from the dimming control path.
#[derive(Debug, thiserror::Error)]
pub enum DimmingError {
    #[error("dimming control write failed: {0}")]
    WriteFailed(String),

    #[error("unknown dimming mode `{0}`")]
    UnknownMode(String),

    #[error("invalid dimming profile: {0}")]
    InvalidProfile(String),

    #[error("failed to parse dimming profile: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One ambient-light breakpoint: at `lux` and above, drive the given
/// ambient-light register and strength target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LuxMapEntry {
    pub lux: u32,
    pub ambient: u32,
    pub strength: u32,
}

/// One named dimming mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimmingMode {
    /// Ambient-light breakpoints, ascending by `lux`.
    pub lux_map: Vec<LuxMapEntry>,
    /// Per-frame step while ramping the strength up.
    #[serde(default = "default_step")]
    pub up_step: u32,
    /// Per-frame step while ramping the strength down.
    #[serde(default = "default_step")]
    pub down_step: u32,
    /// Named auxiliary controls written once on mode entry.
    #[serde(default)]
    pub settings: HashMap<String, u32>,
}

/// Tuning document for the dimming feature, loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimmingProfile {
    #[serde(default)]
    pub version: Option<String>,
    pub modes: HashMap<String, DimmingMode>,
}

impl DimmingProfile {
    /// Parse and validate a profile document.
    pub fn from_json(text: &str) -> Result<Self, DimmingError> {
        let profile: Self = serde_json::from_str(text)?;
        profile.validate()?;
        Ok(profile)
    }

    fn validate(&self) -> Result<(), DimmingError> {
        if !self.modes.contains_key(MODE_NORMAL) {
            return Err(DimmingError::InvalidProfile(format!(
                "missing required `{MODE_NORMAL}` mode"
            )));
        }
        for (name, mode) in &self.modes {
            if mode.lux_map.is_empty() {
                return Err(DimmingError::InvalidProfile(format!(
                    "mode `{name}` has an empty lux map"
                )));
            }
            if mode.up_step == 0 || mode.down_step == 0 {
                return Err(DimmingError::InvalidProfile(format!(
                    "mode `{name}` has a zero ramp step"
                )));
            }
        }
        Ok(())
    }

    pub fn mode(&self, name: &str) -> Option<&DimmingMode> {
        self.modes.get(name)
    }
}

/// Index of the lux-map entry covering `lux`: the last breakpoint at or
/// below it, or the first entry when `lux` is below every breakpoint.
fn lux_map_index(map: &[LuxMapEntry], lux: u32) -> usize {
    let mut index = 0;
    for (i, entry) in map.iter().enumerate() {
        if lux < entry.lux {
            break;
        }
        index = i;
    }
    index
}

/// A control-node value cached alongside a dirty flag, so unchanged values
/// are not rewritten and failed writes are retried.
#[derive(Debug, Clone, Copy)]
struct CtrlValue<T> {
    value: T,
    dirty: bool,
}

impl<T: Copy + PartialEq> CtrlValue<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            dirty: false,
        }
    }

    fn store(&mut self, value: T) {
        if value != self.value {
            self.value = value;
            self.dirty = true;
        }
    }

    fn get(&self) -> T {
        self.value
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

/// Hardware control surface the dimming ramp writes through.
pub trait DimmingSurface {
    fn write_enable(&mut self, enabled: bool) -> Result<(), DimmingError>;
    fn write_strength(&mut self, value: u32) -> Result<(), DimmingError>;
    fn write_ambient(&mut self, value: u32) -> Result<(), DimmingError>;
    /// Auxiliary mode setting, addressed by profile key.
    fn write_setting(&mut self, name: &str, value: u32) -> Result<(), DimmingError>;
}

struct Inner<S> {
    surface: S,
    profile: DimmingProfile,
    /// Active mode name; `None` while the feature is off.
    mode: Option<String>,
    lux: u32,
    enable: CtrlValue<bool>,
    strength: CtrlValue<u32>,
    ambient: CtrlValue<u32>,
    target: u32,
    up_step: u32,
    down_step: u32,
    remaining_steps: u32,
    /// Turn the feature off once the current ramp completes.
    pending_off: bool,
}

impl<S: DimmingSurface> Inner<S> {
    fn animating(&self) -> bool {
        self.remaining_steps > 0 || self.strength.is_dirty()
    }

    fn flush_strength(&mut self) -> Result<(), DimmingError> {
        if self.strength.is_dirty() {
            self.surface.write_strength(self.strength.get())?;
            self.strength.clear_dirty();
        }
        Ok(())
    }

    fn flush_ambient(&mut self) -> Result<(), DimmingError> {
        if self.ambient.is_dirty() {
            self.surface.write_ambient(self.ambient.get())?;
            self.ambient.clear_dirty();
        }
        Ok(())
    }

    fn flush_enable(&mut self) -> Result<(), DimmingError> {
        if self.enable.is_dirty() {
            self.surface.write_enable(self.enable.get())?;
            self.enable.clear_dirty();
        }
        Ok(())
    }

    /// Adopt a new ramp target, recomputing the remaining step budget.
    fn retarget(&mut self, value: u32) {
        if self.target == value {
            return;
        }
        self.target = value;
        let step = if value > self.strength.get() {
            self.up_step
        } else {
            self.down_step
        };
        self.remaining_steps = value.abs_diff(self.strength.get()).div_ceil(step.max(1));
        tracing::debug!(
            "dimming ramp: target={value} steps={} (current {})",
            self.remaining_steps,
            self.strength.get()
        );
    }

    /// One bounded ramp step toward the target, snapping on the final step
    /// so non-divisible step sizes cannot oscillate.
    fn step(&mut self) -> Result<(), DimmingError> {
        let current = self.strength.get();
        let next = if current.saturating_add(self.up_step) < self.target {
            current + self.up_step
        } else if current > self.target.saturating_add(self.down_step) {
            current - self.down_step
        } else {
            self.target
        };
        self.strength.store(next);
        self.flush_strength()?;
        if self.remaining_steps > 0 {
            self.remaining_steps -= 1;
        }
        Ok(())
    }

    fn apply_mode(&mut self, name: &str, mode: &DimmingMode) -> Result<(), DimmingError> {
        for (key, value) in &mode.settings {
            self.surface.write_setting(key, *value)?;
        }
        self.up_step = mode.up_step.max(1);
        self.down_step = mode.down_step.max(1);

        let entry = mode.lux_map[lux_map_index(&mode.lux_map, self.lux)];
        self.ambient.store(entry.ambient);
        self.flush_ambient()?;
        self.retarget(entry.strength);

        self.enable.store(true);
        self.flush_enable()?;
        self.pending_off = false;
        self.mode = Some(name.to_string());
        tracing::info!(
            "dimming mode `{name}` (strength target {}, ambient {})",
            entry.strength,
            entry.ambient
        );
        Ok(())
    }

    fn disable(&mut self) -> Result<(), DimmingError> {
        self.ambient.store(0);
        self.flush_ambient()?;
        self.retarget(0);
        self.mode = None;

        if self.animating() {
            // let the ramp reach zero before turning the feature off
            self.pending_off = true;
            tracing::info!("dimming off deferred until ramp completes");
        } else {
            self.enable.store(false);
            self.flush_enable()?;
            self.pending_off = false;
            tracing::info!("dimming off");
        }
        Ok(())
    }
}

/// Stepped dimming controller for one display.
pub struct DimmingController<S> {
    inner: Mutex<Inner<S>>,
}

impl<S: DimmingSurface> DimmingController<S> {
    pub fn new(surface: S, profile: DimmingProfile) -> Self {
        Self {
            inner: Mutex::new(Inner {
                surface,
                profile,
                mode: None,
                lux: 0,
                enable: CtrlValue::new(false),
                strength: CtrlValue::new(0),
                ambient: CtrlValue::new(0),
                target: 0,
                up_step: DEFAULT_STEP,
                down_step: DEFAULT_STEP,
                remaining_steps: 0,
                pending_off: false,
            }),
        }
    }

    /// Enter the named mode (`None` turns the feature off, deferred until
    /// the ramp completes when one is running).
    pub fn set_mode(&self, name: Option<&str>) -> Result<(), DimmingError> {
        let mut inner = self.inner.lock();
        match name {
            None => inner.disable(),
            Some(name) => {
                let mode = inner
                    .profile
                    .mode(name)
                    .cloned()
                    .ok_or_else(|| DimmingError::UnknownMode(name.to_string()))?;
                inner.apply_mode(name, &mode)
            }
        }
    }

    /// Update the ambient light reading; re-selects the active mode's lux
    /// map entry and retargets the ramp. A no-op while the feature is off.
    pub fn set_ambient_lux(&self, lux: u32) -> Result<(), DimmingError> {
        let mut inner = self.inner.lock();
        inner.lux = lux;
        let Some(mode_name) = inner.mode.clone() else {
            return Ok(());
        };
        let Some(mode) = inner.profile.mode(&mode_name).cloned() else {
            return Ok(());
        };

        let entry = mode.lux_map[lux_map_index(&mode.lux_map, lux)];
        inner.ambient.store(entry.ambient);
        inner.flush_ambient()?;
        inner.retarget(entry.strength);
        Ok(())
    }

    /// Set the ramp target directly.
    pub fn set_target(&self, value: u32) {
        self.inner.lock().retarget(value);
    }

    /// Current strength value.
    pub fn current(&self) -> u32 {
        self.inner.lock().strength.get()
    }

    /// Whether the ramp still has work to do; the frame scheduler keeps
    /// requesting animation frames while this is true.
    pub fn is_animating(&self) -> bool {
        let inner = self.inner.lock();
        inner.animating() || inner.pending_off
    }

    /// Advance the ramp by one frame. Returns whether another animation
    /// frame is needed.
    pub fn tick(&self) -> Result<bool, DimmingError> {
        let mut inner = self.inner.lock();
        if !inner.animating() {
            if inner.pending_off {
                inner.enable.store(false);
                inner.flush_enable()?;
                inner.pending_off = false;
            }
            return Ok(false);
        }

        inner.step()?;

        if inner.pending_off && !inner.animating() {
            inner.enable.store(false);
            inner.flush_enable()?;
            inner.pending_off = false;
            tracing::info!("dimming off (deferred)");
        }
        Ok(inner.animating() || inner.pending_off)
    }

    /// Turn the feature off, deferring until the current ramp completes.
    pub fn request_disable(&self) -> Result<(), DimmingError> {
        self.inner.lock().disable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeSurface {
        strength_writes: Vec<u32>,
        ambient_writes: Vec<u32>,
        enable_writes: Vec<bool>,
        setting_writes: Vec<(String, u32)>,
    }

    impl DimmingSurface for &mut FakeSurface {
        fn write_enable(&mut self, enabled: bool) -> Result<(), DimmingError> {
            self.enable_writes.push(enabled);
            Ok(())
        }

        fn write_strength(&mut self, value: u32) -> Result<(), DimmingError> {
            self.strength_writes.push(value);
            Ok(())
        }

        fn write_ambient(&mut self, value: u32) -> Result<(), DimmingError> {
            self.ambient_writes.push(value);
            Ok(())
        }

        fn write_setting(&mut self, name: &str, value: u32) -> Result<(), DimmingError> {
            self.setting_writes.push((name.to_string(), value));
            Ok(())
        }
    }

    fn profile_with_steps(up: u32, down: u32, strength: u32) -> DimmingProfile {
        let mode = DimmingMode {
            lux_map: vec![LuxMapEntry {
                lux: 0,
                ambient: 10,
                strength,
            }],
            up_step: up,
            down_step: down,
            settings: HashMap::new(),
        };
        DimmingProfile {
            version: None,
            modes: HashMap::from([(MODE_NORMAL.to_string(), mode)]),
        }
    }

    fn drain(controller: &DimmingController<&mut FakeSurface>, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while controller.is_animating() {
            controller.tick().unwrap();
            ticks += 1;
            assert!(ticks <= max_ticks, "ramp did not converge in {max_ticks} ticks");
        }
        ticks
    }

    #[test]
    fn test_ramp_up_converges_in_exact_step_count() {
        let mut surface = FakeSurface::default();
        let controller = DimmingController::new(&mut surface, profile_with_steps(2, 2, 200));
        controller.set_mode(Some(MODE_NORMAL)).unwrap();

        for _ in 0..100 {
            controller.tick().unwrap();
        }
        assert_eq!(controller.current(), 200);
        assert!(!controller.is_animating());
    }

    #[test]
    fn test_ramp_never_overshoots_with_non_divisible_step() {
        let mut surface = FakeSurface::default();
        let controller = DimmingController::new(&mut surface, profile_with_steps(3, 3, 10));
        controller.set_mode(Some(MODE_NORMAL)).unwrap();

        drain(&controller, 8);
        drop(controller);
        assert_eq!(surface.strength_writes, vec![3, 6, 9, 10]);
    }

    #[test]
    fn test_ramp_down_uses_down_step() {
        let mut surface = FakeSurface::default();
        let controller = DimmingController::new(&mut surface, profile_with_steps(2, 5, 20));
        controller.set_mode(Some(MODE_NORMAL)).unwrap();
        drain(&controller, 20);

        controller.set_target(0);
        drain(&controller, 10);
        assert_eq!(controller.current(), 0);
        drop(controller);
        assert_eq!(&surface.strength_writes[10..], &[15, 10, 5, 0]);
    }

    #[test]
    fn test_idle_tick_writes_nothing() {
        let mut surface = FakeSurface::default();
        let controller = DimmingController::new(&mut surface, profile_with_steps(2, 2, 4));
        controller.set_mode(Some(MODE_NORMAL)).unwrap();
        drain(&controller, 10);

        assert!(!controller.tick().unwrap());
        assert!(!controller.tick().unwrap());
        drop(controller);
        assert_eq!(surface.strength_writes, vec![2, 4]);
    }

    #[test]
    fn test_disable_is_deferred_until_ramp_completes() {
        let mut surface = FakeSurface::default();
        let controller = DimmingController::new(&mut surface, profile_with_steps(2, 2, 6));
        controller.set_mode(Some(MODE_NORMAL)).unwrap();
        drain(&controller, 10);

        controller.request_disable().unwrap();
        assert!(controller.is_animating(), "ramp down to zero should run first");
        drain(&controller, 10);

        assert_eq!(controller.current(), 0);
        assert!(!controller.is_animating());
        drop(controller);
        // enable=true on mode entry, enable=false only after the ramp
        assert_eq!(surface.enable_writes, vec![true, false]);
    }

    #[test]
    fn test_disable_while_idle_is_immediate() {
        let mut surface = FakeSurface::default();
        let controller = DimmingController::new(&mut surface, profile_with_steps(2, 2, 0));
        controller.set_mode(Some(MODE_NORMAL)).unwrap();
        controller.request_disable().unwrap();
        assert!(!controller.is_animating());
        drop(controller);
        assert_eq!(surface.enable_writes, vec![true, false]);
    }

    #[test]
    fn test_mode_entry_writes_settings_and_ambient() {
        let mut surface = FakeSurface::default();
        let mut profile = profile_with_steps(2, 2, 8);
        profile
            .modes
            .get_mut(MODE_NORMAL)
            .unwrap()
            .settings
            .insert("local_boost".to_string(), 3);
        let controller = DimmingController::new(&mut surface, profile);
        controller.set_mode(Some(MODE_NORMAL)).unwrap();
        drop(controller);

        assert_eq!(surface.ambient_writes, vec![10]);
        assert_eq!(surface.setting_writes, vec![("local_boost".to_string(), 3)]);
    }

    #[test]
    fn test_ambient_lux_picks_map_entry() {
        let mut surface = FakeSurface::default();
        let mode = DimmingMode {
            lux_map: vec![
                LuxMapEntry {
                    lux: 0,
                    ambient: 1,
                    strength: 0,
                },
                LuxMapEntry {
                    lux: 1000,
                    ambient: 8,
                    strength: 40,
                },
            ],
            up_step: 10,
            down_step: 10,
            settings: HashMap::new(),
        };
        let profile = DimmingProfile {
            version: None,
            modes: HashMap::from([(MODE_NORMAL.to_string(), mode)]),
        };
        let controller = DimmingController::new(&mut surface, profile);
        controller.set_mode(Some(MODE_NORMAL)).unwrap();
        drain(&controller, 10);

        controller.set_ambient_lux(2500).unwrap();
        drain(&controller, 10);
        assert_eq!(controller.current(), 40);
        drop(controller);
        assert_eq!(surface.ambient_writes, vec![1, 8]);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let mut surface = FakeSurface::default();
        let controller = DimmingController::new(&mut surface, profile_with_steps(2, 2, 8));
        assert!(matches!(
            controller.set_mode(Some("outdoor")),
            Err(DimmingError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_profile_requires_normal_mode() {
        let err = DimmingProfile::from_json(r#"{"modes": {}}"#).unwrap_err();
        assert!(matches!(err, DimmingError::InvalidProfile(_)));
    }

    #[test]
    fn test_profile_parses_with_defaults() {
        let profile = DimmingProfile::from_json(
            r#"{
                "version": "2.0",
                "modes": {
                    "normal": {
                        "lux_map": [
                            {"lux": 0, "ambient": 0, "strength": 0},
                            {"lux": 5000, "ambient": 12, "strength": 128}
                        ]
                    }
                }
            }"#,
        )
        .unwrap();
        let mode = profile.mode(MODE_NORMAL).unwrap();
        assert_eq!(mode.up_step, DEFAULT_STEP);
        assert_eq!(mode.lux_map.len(), 2);
    }
}
