//! Tank control pushes with change detection

use shared::{ArenaStructure, Button, Push};

/// Turns button state changes into control pushes.
///
/// Controls are inert until the arena structure is known. A button push is
/// produced only when its state actually changes, so key repeat from the
/// host never reaches the network.
#[derive(Debug, Default)]
pub struct TankControls {
    structure: Option<ArenaStructure>,
    pressed: [bool; 5],
}

impl TankControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, structure: ArenaStructure) {
        self.structure = Some(structure);
        self.reset();
    }

    pub fn stop(&mut self) {
        self.structure = None;
        self.reset();
    }

    /// Forget held buttons; the server-side tank starts from rest after a (re)join.
    pub fn reset(&mut self) {
        self.pressed = [false; 5];
    }

    pub fn is_started(&self) -> bool {
        self.structure.is_some()
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed[button.index()]
    }

    pub fn set(&mut self, button: Button, down: bool) -> Option<Push> {
        if !self.is_started() {
            return None;
        }
        let slot = &mut self.pressed[button.index()];
        if *slot == down {
            return None;
        }
        *slot = down;
        Some(Push::Control { button, down })
    }

    pub fn self_destruct(&self) -> Option<Push> {
        self.is_started().then_some(Push::SelfDestruct)
    }

    /// Launch a tank from the entry point under an arena coordinate.
    pub fn launch(&self, x: f32, y: f32) -> Option<Push> {
        let entry_point = self.structure.as_ref()?.entry_point_at(x, y)?;
        Some(Push::LaunchTank {
            entry_point: entry_point.name.clone(),
        })
    }
}
