use crate::gpu::{DrawContext, GraphicsDevice};

use super::component::{ComponentType, Components};

/// Something the scene updates and draws every frame.
///
/// The device is borrowed for the length of each call, entities never keep it.
pub trait Entity<D: GraphicsDevice> {
    fn update(&mut self, delta_time: f32, device: &D);

    /// Records draw calls into `ctx` and returns how many were issued.
    fn render(&self, ctx: &mut dyn DrawContext<D>) -> usize;

    fn components(&self) -> &Components;

    fn components_mut(&mut self) -> &mut Components;

    fn add_component<T: ComponentType>(&mut self, component: T) -> Option<T>
    where
        Self: Sized,
    {
        self.components_mut().insert(component)
    }

    fn get_component<T: ComponentType>(&self) -> Option<&T>
    where
        Self: Sized,
    {
        self.components().get::<T>()
    }

    fn get_component_mut<T: ComponentType>(&mut self) -> Option<&mut T>
    where
        Self: Sized,
    {
        self.components_mut().get_mut::<T>()
    }
}
