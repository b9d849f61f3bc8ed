//! Debug overlay hooks: per-frame access to the actors and field editing helpers.

use cgmath::Vector3;

use crate::{
    data_structures::{actor::Actor, transform::Transform},
    gpu::GraphicsDevice,
};

/// Called once per frame after update, before render.
pub trait Overlay<D: GraphicsDevice> {
    fn frame(&mut self, actors: &mut [Actor<D>], selected: Option<usize>);
}

/// Edits three floats by dragging one axis at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct Vec3Field {
    pub label: &'static str,
    pub speed: f32,
    pub range: Option<(f32, f32)>,
}

impl Vec3Field {
    pub fn new(label: &'static str, speed: f32) -> Self {
        Self {
            label,
            speed,
            range: None,
        }
    }

    pub fn clamped(mut self, min: f32, max: f32) -> Self {
        self.range = Some((min, max));
        self
    }

    /// Moves `axis` (0, 1 or 2) by `delta * speed`. Returns whether the value changed.
    pub fn drag(&self, value: &mut Vector3<f32>, axis: usize, delta: f32) -> bool {
        if axis > 2 {
            log::warn!("{}: no axis {axis}", self.label);
            return false;
        }
        let old = value[axis];
        let mut new = old + delta * self.speed;
        if let Some((min, max)) = self.range {
            new = new.clamp(min, max);
        }
        value[axis] = new;
        new != old
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformField {
    Position,
    Rotation,
    Scale,
}

/// Position, rotation and scale of one transform, each through a [`Vec3Field`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransformPanel {
    pub position: Vec3Field,
    pub rotation: Vec3Field,
    pub scale: Vec3Field,
}

impl Default for TransformPanel {
    fn default() -> Self {
        Self {
            position: Vec3Field::new("position", 0.1),
            rotation: Vec3Field::new("rotation", 0.01)
                .clamped(-std::f32::consts::TAU, std::f32::consts::TAU),
            scale: Vec3Field::new("scale", 0.01).clamped(0.001, 1000.0),
        }
    }
}

impl TransformPanel {
    pub fn drag(
        &self,
        transform: &mut Transform,
        field: TransformField,
        axis: usize,
        delta: f32,
    ) -> bool {
        match field {
            TransformField::Position => self.position.drag(&mut transform.position, axis, delta),
            TransformField::Rotation => self.rotation.drag(&mut transform.rotation, axis, delta),
            TransformField::Scale => self.scale.drag(&mut transform.scale, axis, delta),
        }
    }

    pub fn describe(&self, transform: &Transform) -> String {
        let v = |v: Vector3<f32>| format!("({:.3}, {:.3}, {:.3})", v.x, v.y, v.z);
        format!(
            "{} {} {} {} {} {}",
            self.position.label,
            v(transform.position),
            self.rotation.label,
            v(transform.rotation),
            self.scale.label,
            v(transform.scale)
        )
    }
}

/// Logs the selected actor's transform whenever it differs from the last frame.
#[derive(Debug, Default)]
pub struct LogOverlay {
    panel: TransformPanel,
    last: Option<(usize, Vector3<f32>, Vector3<f32>, Vector3<f32>)>,
}

impl LogOverlay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: GraphicsDevice> Overlay<D> for LogOverlay {
    fn frame(&mut self, actors: &mut [Actor<D>], selected: Option<usize>) {
        let Some((index, actor)) = selected.and_then(|i| actors.get(i).map(|a| (i, a))) else {
            self.last = None;
            return;
        };
        let Some(transform) = actor.transform() else {
            return;
        };
        let current = (index, transform.position, transform.rotation, transform.scale);
        if self.last != Some(current) {
            log::info!("[{}] {}", actor.name(), self.panel.describe(transform));
            self.last = Some(current);
        }
    }
}
