//! Fly-around camera, its input controller and the projection.

use cgmath::{InnerSpace, Matrix4, Point3, Rad, Vector3, perspective};
use winit::{event::MouseButton, keyboard::KeyCode};

use crate::input::InputEvent;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::from_cols(
    cgmath::Vector4::new(1.0, 0.0, 0.0, 0.0),
    cgmath::Vector4::new(0.0, 1.0, 0.0, 0.0),
    cgmath::Vector4::new(0.0, 0.0, 0.5, 0.0),
    cgmath::Vector4::new(0.0, 0.0, 0.5, 1.0),
);

/// Pitch is kept inside this range so the view never flips over the poles.
pub const PITCH_LIMIT: f32 = 1.5;

#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    yaw: Rad<f32>,
    pitch: Rad<f32>,
    forward: Vector3<f32>,
    right: Vector3<f32>,
    up: Vector3<f32>,
}

impl Camera {
    pub fn new<V: Into<Point3<f32>>, Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(
        position: V,
        yaw: Y,
        pitch: P,
    ) -> Self {
        let mut camera = Self {
            position: position.into(),
            yaw: Rad(0.0),
            pitch: Rad(0.0),
            forward: Vector3::unit_z(),
            right: -Vector3::unit_x(),
            up: Vector3::unit_y(),
        };
        let (yaw, pitch) = (yaw.into(), pitch.into());
        camera.rotate(yaw.0, pitch.0);
        camera
    }

    /// Adds to yaw and pitch (radians) and rebuilds the basis vectors.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += Rad(dx);
        self.pitch = Rad((self.pitch.0 + dy).clamp(-PITCH_LIMIT, PITCH_LIMIT));

        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        self.forward = Vector3::new(cos_yaw * cos_pitch, sin_pitch, sin_yaw * cos_pitch).normalize();
        self.right = self.forward.cross(self.up).normalize();
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.position + self.forward, self.up)
    }

    pub fn yaw(&self) -> Rad<f32> {
        self.yaw
    }

    pub fn pitch(&self) -> Rad<f32> {
        self.pitch
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.forward
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fovy(&self) -> Rad<f32> {
        self.fovy
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// Constant buffer slot 0.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ViewUniform {
    pub view: [[f32; 4]; 4],
}

impl ViewUniform {
    pub fn new(camera: &Camera) -> Self {
        Self {
            view: camera.view_matrix().into(),
        }
    }
}

/// Constant buffer slot 1.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ProjectionUniform {
    pub projection: [[f32; 4]; 4],
}

impl ProjectionUniform {
    pub fn new(projection: &Projection) -> Self {
        Self {
            projection: projection.calc_matrix().into(),
        }
    }
}

/// Turns keyboard and right-button drags into camera movement.
#[derive(Debug, Clone, Default)]
pub struct CameraController {
    amount_left: f32,
    amount_right: f32,
    amount_forward: f32,
    amount_backward: f32,
    amount_up: f32,
    amount_down: f32,
    rotate_horizontal: f32,
    rotate_vertical: f32,
    dragging: bool,
    last_cursor: Option<(f64, f64)>,
    speed: f32,
    sensitivity: f32,
}

impl CameraController {
    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            speed,
            sensitivity,
            ..Default::default()
        }
    }

    /// Returns true when the event was consumed.
    pub fn process_event(&mut self, event: &InputEvent) -> bool {
        match *event {
            InputEvent::KeyDown(key) => self.process_keyboard(key, true),
            InputEvent::KeyUp(key) => self.process_keyboard(key, false),
            InputEvent::MouseButton {
                button: MouseButton::Right,
                pressed,
            } => {
                self.dragging = pressed;
                self.last_cursor = None;
                true
            }
            InputEvent::MouseMoved { x, y } => {
                if !self.dragging {
                    return false;
                }
                if let Some((last_x, last_y)) = self.last_cursor.replace((x, y)) {
                    self.rotate_horizontal += (x - last_x) as f32;
                    // Screen y grows downwards, pitch grows upwards.
                    self.rotate_vertical -= (y - last_y) as f32;
                }
                true
            }
            _ => false,
        }
    }

    fn process_keyboard(&mut self, key: KeyCode, pressed: bool) -> bool {
        let amount = if pressed { 1.0 } else { 0.0 };
        match key {
            KeyCode::KeyW => self.amount_forward = amount,
            KeyCode::KeyS => self.amount_backward = amount,
            KeyCode::KeyA => self.amount_left = amount,
            KeyCode::KeyD => self.amount_right = amount,
            KeyCode::Space => self.amount_up = amount,
            KeyCode::ShiftLeft => self.amount_down = amount,
            _ => return false,
        }
        true
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn update_camera(&mut self, camera: &mut Camera, dt: f32) {
        let forward = camera.forward();
        let right = camera.right();
        let up = camera.up();
        camera.position += forward * (self.amount_forward - self.amount_backward) * self.speed * dt;
        camera.position += right * (self.amount_right - self.amount_left) * self.speed * dt;
        camera.position += up * (self.amount_up - self.amount_down) * self.speed * dt;

        if self.rotate_horizontal != 0.0 || self.rotate_vertical != 0.0 {
            camera.rotate(
                self.rotate_horizontal * self.sensitivity,
                self.rotate_vertical * self.sensitivity,
            );
            self.rotate_horizontal = 0.0;
            self.rotate_vertical = 0.0;
        }
    }
}
